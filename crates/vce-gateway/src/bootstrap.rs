//! Composition root (§4.11): wires concrete adapters into a [`Gateway`]
//! and returns the axum [`Router`] ready to serve.

use std::sync::Arc;

use axum::Router;
use vce_core::ports::{ConnectionRegistry, DeviceRepository, LlmClient};
use vce_llm::client::ModelSlots;
use vce_llm::{IntentClassifier, LlmPipeline};
use vce_speech::vad::Aggressiveness;
use vce_speech::{
    AsrPipeline, EnergyVad, HttpAsrProvider, HttpTtsProvider, MokaTtsCache, TtsPipeline,
};
use vce_store::{RedisConnectionRegistry, RedisDeviceRepository};

use crate::config::{ConfigError, GatewayConfig};
use crate::gateway::{AsrFactory, Gateway, TtsFactory, VadFactory};
use crate::routes::build_router;

/// Build every adapter the config names, wire them into a [`Gateway`],
/// start its background tasks, and return the router plus the gateway
/// handle `main` needs for graceful shutdown. Fails only on store
/// connectivity — provider adapters are plain HTTP clients and never
/// fail to construct.
pub async fn bootstrap(config: GatewayConfig) -> Result<(Router, Arc<Gateway>), ConfigError> {
    let conn = vce_store::connect(&config.distributed_store_url)
        .await
        .map_err(|e| ConfigError::Invalid {
            name: "VCE_REDIS_URL",
            reason: e.to_string(),
        })?;

    let device_repo: Arc<dyn DeviceRepository> = Arc::new(RedisDeviceRepository::new(conn.clone()));
    let redis_registry = Arc::new(RedisConnectionRegistry::new(conn));
    let connection_registry: Arc<dyn ConnectionRegistry> = redis_registry.clone();

    let llm: Arc<dyn LlmClient> = Arc::new(LlmPipeline::new(
        config.llm_provider.base_url.clone(),
        config.llm_provider.api_key.clone(),
        ModelSlots {
            lite: config.llm_lite_model.clone(),
            think: config.llm_think_model.clone(),
        },
    ));
    let intent_classifier = Arc::new(IntentClassifier::new(llm.clone()));

    let tts_cache = Arc::new(MokaTtsCache::new(
        config.tts_cache_maxsize,
        config.tts_cache_ttl,
        config.tts_chunk_timeout,
    ));

    let vad_factory: VadFactory = Box::new(|| Box::new(EnergyVad::new(Aggressiveness::default())));

    let asr_endpoint = config.asr_provider.base_url.clone();
    let asr_key = config.asr_provider.api_key.clone();
    let asr_factory: AsrFactory = Box::new(move || {
        let provider = Arc::new(HttpAsrProvider::new(asr_endpoint.clone(), asr_key.clone()));
        Box::new(AsrPipeline::new(provider))
    });

    let tts_endpoint = config.tts_provider.base_url.clone();
    let tts_key = config.tts_provider.api_key.clone();
    let tts_voice = "default".to_string();
    let tts_cache_for_factory = tts_cache.clone();
    let tts_factory: TtsFactory = Box::new(move || {
        let provider = Arc::new(HttpTtsProvider::new(
            tts_endpoint.clone(),
            tts_key.clone(),
            tts_voice.clone(),
        ));
        Box::new(TtsPipeline::new(provider, tts_cache_for_factory.clone()))
    });

    let gateway = Arc::new(Gateway::new(
        config,
        connection_registry,
        device_repo,
        intent_classifier,
        tts_cache,
        llm,
        vad_factory,
        asr_factory,
        tts_factory,
        Some(redis_registry),
    ));
    gateway.start_background_tasks().await;

    let router = build_router(gateway.clone());
    Ok((router, gateway))
}
