use async_trait::async_trait;

use crate::error::CoreError;

/// Cross-node `uid → server_id` routing, backed by a TTL'd distributed
/// hash in `vce-store` (§4.10, `ws:connection:{uid}`).
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// Record that `uid` is currently attached to `server_id`, refreshing
    /// the TTL.
    async fn register(&self, uid: &str, server_id: &str) -> Result<(), CoreError>;

    /// Remove the routing entry for `uid` (on session close).
    async fn unregister(&self, uid: &str) -> Result<(), CoreError>;

    /// Look up which server currently owns `uid`, if any.
    async fn lookup(&self, uid: &str) -> Result<Option<String>, CoreError>;

    /// Publish `payload` onto `server_id`'s event stream, addressed to
    /// `uid`, for that server's consumer task to dispatch locally.
    async fn publish_to_server(
        &self,
        server_id: &str,
        uid: &str,
        payload: &[u8],
    ) -> Result<(), CoreError>;
}
