//! Distributed device-state repository and cross-node connection
//! registry (C7, half of C9/C10).

mod connection_registry;
mod device_repository;
pub mod error;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

pub use connection_registry::{RedisConnectionRegistry, StreamEntry};
pub use device_repository::RedisDeviceRepository;
pub use error::StoreError;

/// Connect to the distributed store, returning a cheaply-clonable
/// connection manager shared by the repository and the registry.
pub async fn connect(redis_url: &str) -> Result<redis::aio::ConnectionManager, StoreError> {
    let client = redis::Client::open(redis_url)?;
    let conn = client.get_connection_manager().await?;
    Ok(conn)
}
