use std::sync::Arc;

use crate::gateway::Gateway;

/// Shared application state, handed to every axum handler.
pub type AppState = Arc<Gateway>;
