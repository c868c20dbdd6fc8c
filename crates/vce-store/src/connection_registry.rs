//! Cross-node connection routing (§4.10): a TTL'd `uid → server_id` hash
//! plus one append-only event stream per gateway instance.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use vce_core::error::CoreError;
use vce_core::ports::ConnectionRegistry;

use crate::error::StoreError;

/// One entry read back off a server's event stream: its stream id (used
/// as the next read cursor), the addressed uid, and the opaque payload.
pub struct StreamEntry {
    pub entry_id: String,
    pub uid: String,
    pub payload: Vec<u8>,
}

/// TTL on the `ws:connection:{uid}` routing hash, per §6.
const CONNECTION_TTL_SECS: i64 = 86_400;

pub struct RedisConnectionRegistry {
    conn: ConnectionManager,
}

impl RedisConnectionRegistry {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    fn connection_key(uid: &str) -> String {
        format!("ws:connection:{uid}")
    }

    fn server_stream_key(server_id: &str) -> String {
        format!("ws:server:{server_id}")
    }
}

#[async_trait]
impl ConnectionRegistry for RedisConnectionRegistry {
    async fn register(&self, uid: &str, server_id: &str) -> Result<(), CoreError> {
        let mut conn = self.conn.clone();
        let key = Self::connection_key(uid);
        let _: () = conn
            .hset(&key, "server", server_id)
            .await
            .map_err(StoreError::from)?;
        let _: () = conn
            .expire(&key, CONNECTION_TTL_SECS)
            .await
            .map_err(StoreError::from)?;
        Ok(())
    }

    async fn unregister(&self, uid: &str) -> Result<(), CoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(Self::connection_key(uid))
            .await
            .map_err(StoreError::from)?;
        Ok(())
    }

    async fn lookup(&self, uid: &str) -> Result<Option<String>, CoreError> {
        let mut conn = self.conn.clone();
        let server: Option<String> = conn
            .hget(Self::connection_key(uid), "server")
            .await
            .map_err(StoreError::from)?;
        Ok(server)
    }

    async fn publish_to_server(
        &self,
        server_id: &str,
        uid: &str,
        payload: &[u8],
    ) -> Result<(), CoreError> {
        let mut conn = self.conn.clone();
        let _: String = conn
            .xadd(
                Self::server_stream_key(server_id),
                "*",
                &[("uid", uid.as_bytes()), ("data", payload)],
            )
            .await
            .map_err(StoreError::from)?;
        Ok(())
    }
}

impl RedisConnectionRegistry {
    /// Block up to `block_ms` reading new entries off `server_id`'s own
    /// stream after `last_id`, per §4.10's consumer task (3s block, up
    /// to 100 entries per read).
    pub async fn read_stream(
        &self,
        server_id: &str,
        last_id: &str,
        block_ms: usize,
        count: usize,
    ) -> Result<Vec<StreamEntry>, CoreError> {
        let mut conn = self.conn.clone();
        let opts = StreamReadOptions::default().block(block_ms).count(count);
        let reply: StreamReadReply = conn
            .xread_options(&[Self::server_stream_key(server_id)], &[last_id], &opts)
            .await
            .map_err(StoreError::from)?;

        let mut entries = Vec::new();
        for stream_key in reply.keys {
            for entry in stream_key.ids {
                let uid = entry
                    .map
                    .get("uid")
                    .and_then(|v| match v {
                        redis::Value::BulkString(bytes) => {
                            Some(String::from_utf8_lossy(bytes).to_string())
                        }
                        _ => None,
                    })
                    .unwrap_or_default();
                let payload = entry
                    .map
                    .get("data")
                    .and_then(|v| match v {
                        redis::Value::BulkString(bytes) => Some(bytes.clone()),
                        _ => None,
                    })
                    .unwrap_or_default();
                entries.push(StreamEntry {
                    entry_id: entry.id,
                    uid,
                    payload,
                });
            }
        }
        Ok(entries)
    }
}
