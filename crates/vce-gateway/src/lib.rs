//! WebSocket gateway, per-connection session state machine, and HTTP
//! pull surface (C7-C10): the process that glues `vce-speech`,
//! `vce-llm`, and `vce-store` into the conversational voice protocol.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod pool;
pub mod routes;
pub mod session;
pub mod state;
pub mod wav;
pub mod wire;

pub use bootstrap::bootstrap;
pub use config::GatewayConfig;
pub use gateway::Gateway;
pub use state::AppState;
