//! Accepts WebSocket connections, authenticates, enrolls sessions into
//! the pool, and runs the background monitor/cross-node consumer tasks
//! (§4.10).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;
use vce_core::events::EventEnvelope;
use vce_core::ports::{AsrDriver, ConnectionRegistry, DeviceRepository, LlmClient, TtsDriver, Vad};
use vce_llm::IntentClassifier;
use vce_speech::MokaTtsCache;
use vce_store::RedisConnectionRegistry;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::pool::ConnectionPool;
use crate::session::Session;

/// Per-connection VAD/ASR/TTS are cheap to build fresh (an `EnergyVad` is
/// a few `u32`s; `AsrPipeline`/`TtsPipeline` just wrap a cloned provider
/// `Arc`), so the gateway constructs one per session from these factories
/// instead of running them through [`vce_speech::pool::ResourcePool`] —
/// that generic pool stays reserved for a future provider-connection-level
/// pooling concern where construction itself is the expensive part.
pub type VadFactory = Box<dyn Fn() -> Box<dyn Vad> + Send + Sync>;
pub type AsrFactory = Box<dyn Fn() -> Box<dyn AsrDriver> + Send + Sync>;
pub type TtsFactory = Box<dyn Fn() -> Box<dyn TtsDriver> + Send + Sync>;

/// How long the cross-node consumer blocks per `XREAD` call (§4.10).
const XREAD_BLOCK_MS: usize = 3_000;
/// Max entries dispatched per `XREAD` batch (§4.10).
const XREAD_BATCH: usize = 100;

/// Unique per-process identity, used as the cross-node stream key
/// `ws:server:{server_id}` (§6).
pub fn new_server_id() -> String {
    format!("server_{}", Uuid::new_v4().simple())
}

pub struct Gateway {
    pub server_id: String,
    pub config: GatewayConfig,
    pub pool: Arc<ConnectionPool<Session>>,
    pub connection_registry: Arc<dyn ConnectionRegistry>,
    pub device_repo: Arc<dyn DeviceRepository>,
    pub intent_classifier: Arc<IntentClassifier>,
    pub tts_cache: Arc<MokaTtsCache>,
    pub llm: Arc<dyn LlmClient>,
    vad_factory: VadFactory,
    asr_factory: AsrFactory,
    tts_factory: TtsFactory,
    /// Only set when the registry is Redis-backed; the cross-node
    /// consumer needs `XREAD`, which isn't part of the
    /// store-independent `ConnectionRegistry` port.
    redis_registry: Option<Arc<RedisConnectionRegistry>>,
    shutdown: Arc<Notify>,
    background_tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl Gateway {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: GatewayConfig,
        connection_registry: Arc<dyn ConnectionRegistry>,
        device_repo: Arc<dyn DeviceRepository>,
        intent_classifier: Arc<IntentClassifier>,
        tts_cache: Arc<MokaTtsCache>,
        llm: Arc<dyn LlmClient>,
        vad_factory: VadFactory,
        asr_factory: AsrFactory,
        tts_factory: TtsFactory,
        redis_registry: Option<Arc<RedisConnectionRegistry>>,
    ) -> Self {
        let pool = Arc::new(ConnectionPool::new(config.connection_pool_capacity));
        Self {
            server_id: new_server_id(),
            config,
            pool,
            connection_registry,
            device_repo,
            intent_classifier,
            tts_cache,
            llm,
            vad_factory,
            asr_factory,
            tts_factory,
            redis_registry,
            shutdown: Arc::new(Notify::new()),
            background_tasks: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// Build the four per-connection handles a fresh [`Session`] needs.
    /// The VAD/ASR/TTS trio is constructed, not pooled (see
    /// [`VadFactory`]); the LLM client is process-wide and simply cloned,
    /// since it holds no per-utterance state beyond its own short
    /// conversation cache and cancel flag.
    pub fn build_session(self: &Arc<Self>, uid: String) -> Session {
        Session::new(
            uid,
            self.config.outbound_queue_capacity,
            Some((self.vad_factory)()),
            Some((self.asr_factory)()),
            Some((self.tts_factory)()),
            Some(self.llm.clone()),
        )
    }

    /// Extract and validate the bearer token at the WebSocket upgrade
    /// boundary (§1, §7: auth-failure terminates before accepting any
    /// frames). Token validation itself (issuance, scopes) is out of
    /// scope; only the presence of a well-formed bearer token is
    /// checked here.
    pub fn authenticate(&self, auth_header: Option<&str>) -> Result<String, GatewayError> {
        let header = auth_header.ok_or_else(|| GatewayError::AuthFailure("missing bearer token".into()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| GatewayError::AuthFailure("malformed authorization header".into()))?;
        if token.trim().is_empty() {
            return Err(GatewayError::AuthFailure("empty bearer token".into()));
        }
        Ok(token.trim().to_string())
    }

    /// Register a new session: add to the local pool and publish the
    /// cross-node routing entry.
    pub async fn enroll(&self, uid: &str, session: Arc<Session>) -> Result<(), GatewayError> {
        self.pool.add(uid, session).await?;
        self.connection_registry
            .register(uid, &self.server_id)
            .await
            .map_err(GatewayError::from)?;
        Ok(())
    }

    pub async fn disenroll(&self, uid: &str) {
        if let Some(session) = self.pool.get(uid).await {
            session.close().await;
        }
        self.pool.remove(uid).await;
        if let Err(e) = self.connection_registry.unregister(uid).await {
            warn!(uid, error = %e, "failed to unregister connection route");
        }
    }

    /// Start the monitor and cross-node consumer background tasks.
    pub async fn start_background_tasks(self: &Arc<Self>) {
        let monitor = self.clone();
        let monitor_shutdown = self.shutdown.clone();
        let monitor_handle = tokio::spawn(async move {
            monitor.run_monitor(monitor_shutdown).await;
        });

        let mut tasks = self.background_tasks.lock().await;
        tasks.push(monitor_handle);

        if self.redis_registry.is_some() {
            let consumer = self.clone();
            let consumer_shutdown = self.shutdown.clone();
            let consumer_handle = tokio::spawn(async move {
                consumer.run_cross_node_consumer(consumer_shutdown).await;
            });
            tasks.push(consumer_handle);
        }
    }

    /// Blocks on `XREAD` against this instance's own stream and
    /// dispatches each entry to the addressed local session, if still
    /// live; entries for disconnected uids are logged and dropped
    /// (§4.10).
    async fn run_cross_node_consumer(&self, shutdown: Arc<Notify>) {
        let Some(registry) = &self.redis_registry else {
            return;
        };
        let mut last_id = "$".to_string();
        loop {
            let read = tokio::select! {
                r = registry.read_stream(&self.server_id, &last_id, XREAD_BLOCK_MS, XREAD_BATCH) => r,
                () = shutdown.notified() => break,
            };

            match read {
                Ok(entries) => {
                    for entry in entries {
                        last_id = entry.entry_id;
                        let Some(session) = self.pool.get(&entry.uid).await else {
                            warn!(uid = %entry.uid, "dropping event for disconnected uid");
                            continue;
                        };
                        match serde_json::from_slice::<EventEnvelope>(&entry.payload) {
                            Ok(event) => session.push_event(event).await,
                            Err(e) => warn!(error = %e, "malformed cross-node event payload"),
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "cross-node stream read failed, backing off");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    async fn run_monitor(&self, shutdown: Arc<Notify>) {
        let mut interval = tokio::time::interval(self.config.heartbeat_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let idle_limit = self.config.session_idle_timeout.as_secs() as i64;
                    for session in self.pool.iter().await {
                        if session.idle_seconds() > idle_limit {
                            info!(uid = %session.uid, "closing idle session");
                            self.disenroll(&session.uid).await;
                        }
                    }
                }
                () = shutdown.notified() => break,
            }
        }
    }

    /// Two-phase shutdown (§4.10): cancel background tasks with a 3s
    /// grace period, then close the pool (which closes every session).
    pub async fn shutdown(&self) {
        self.shutdown.notify_waiters();
        let mut tasks = self.background_tasks.lock().await;
        for task in tasks.drain(..) {
            if tokio::time::timeout(Duration::from_secs(3), task)
                .await
                .is_err()
            {
                warn!("background task did not exit within grace period");
            }
        }
        drop(tasks);
        self.pool.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    use vce_core::domain::Intention;
    use vce_core::ports::{ChatMessage, StreamSink};
    use vce_speech::{EnergyVad, MockAsrProvider, MockTtsProvider, TtsPipeline};
    use vce_speech::asr::AsrPipeline;
    use vce_speech::vad::Aggressiveness;
    use vce_store::memory::{MemoryConnectionRegistry, MemoryDeviceRepository};

    struct StubLlm;

    #[async_trait::async_trait]
    impl LlmClient for StubLlm {
        async fn query(&self, _: &str, _: Option<&str>, _: &[ChatMessage]) -> Result<String, vce_core::CoreError> {
            Ok(String::new())
        }
        async fn query_intention(&self, text: &str, _: &str) -> Result<Intention, vce_core::CoreError> {
            Ok(Intention::chat(text))
        }
        async fn query_stream(&self, _: &str, _: Option<&str>, _: Option<&str>, _: StreamSink) -> Result<(), vce_core::CoreError> {
            Ok(())
        }
        async fn close(&self) {}
    }

    fn test_config() -> GatewayConfig {
        GatewayConfig {
            bind_addr: "127.0.0.1".to_string(),
            bind_port: 0,
            distributed_store_url: String::new(),
            connection_pool_capacity: 4,
            outbound_queue_capacity: 8,
            tts_cache_maxsize: 10,
            tts_cache_ttl: StdDuration::from_secs(60),
            tts_chunk_timeout: StdDuration::from_secs(5),
            heartbeat_interval: StdDuration::from_secs(30),
            session_idle_timeout: StdDuration::from_secs(3600),
            asr_provider: crate::config::ProviderConfig { base_url: String::new(), api_key: String::new() },
            tts_provider: crate::config::ProviderConfig { base_url: String::new(), api_key: String::new() },
            llm_provider: crate::config::ProviderConfig { base_url: String::new(), api_key: String::new() },
            llm_lite_model: "lite".to_string(),
            llm_think_model: "think".to_string(),
        }
    }

    fn test_gateway() -> Arc<Gateway> {
        let llm: Arc<dyn LlmClient> = Arc::new(StubLlm);
        let tts_cache = Arc::new(vce_speech::MokaTtsCache::default());
        Arc::new(Gateway::new(
            test_config(),
            Arc::new(MemoryConnectionRegistry::default()),
            Arc::new(MemoryDeviceRepository::default()),
            Arc::new(IntentClassifier::new(llm.clone())),
            tts_cache.clone(),
            llm,
            Box::new(|| Box::new(EnergyVad::new(Aggressiveness::default()))),
            Box::new(|| Box::new(AsrPipeline::new(Arc::new(MockAsrProvider::default())))),
            Box::new(move || Box::new(TtsPipeline::new(Arc::new(MockTtsProvider), tts_cache.clone()))),
            None,
        ))
    }

    #[test]
    fn authenticate_accepts_well_formed_bearer_token() {
        let gateway = test_gateway();
        let uid = gateway.authenticate(Some("Bearer device-42")).unwrap();
        assert_eq!(uid, "device-42");
    }

    #[test]
    fn authenticate_rejects_missing_header() {
        let gateway = test_gateway();
        assert!(gateway.authenticate(None).is_err());
    }

    #[test]
    fn authenticate_rejects_non_bearer_scheme() {
        let gateway = test_gateway();
        assert!(gateway.authenticate(Some("Basic device-42")).is_err());
    }

    #[tokio::test]
    async fn enroll_then_disenroll_roundtrips_through_the_pool() {
        let gateway = test_gateway();
        let session = Arc::new(gateway.build_session("uid-1".to_string()));
        gateway.enroll("uid-1", session).await.unwrap();
        assert!(gateway.pool.get("uid-1").await.is_some());
        gateway.disenroll("uid-1").await;
        assert!(gateway.pool.get("uid-1").await.is_none());
    }
}
