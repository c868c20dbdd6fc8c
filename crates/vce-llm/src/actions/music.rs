//! The `music` action handler (§4.5): queries a music catalog, falling
//! back to an auth prompt or a demo playlist depending on failure mode.

use serde_json::json;
use vce_core::domain::{ActionResult, Command, CommandType};
use vce_core::error::CoreError;

use super::ActionContext;

const DEMO_PLAYLIST: &[&str] = &["Sunny Side Up", "Evening Static", "Quiet Room"];

#[derive(Debug)]
enum CatalogOutcome {
    NeedsAuth { qr_token: String },
    Tracks(Vec<String>),
    Unavailable,
}

/// Placeholder for the external music catalog client (out of scope per
/// §1: "third-party weather/news/music HTTP providers"). Device state
/// carries whatever authorization token the catalog requires; its
/// absence is what triggers the QR auth flow below.
async fn query_catalog(ctx: &ActionContext<'_>) -> CatalogOutcome {
    let fields = match ctx
        .device_repo
        .get_fields(ctx.device_id, &["music_auth_token"])
        .await
    {
        Ok(f) => f,
        Err(_) => return CatalogOutcome::Unavailable,
    };
    match fields.get("music_auth_token").and_then(|v| v.clone()) {
        Some(_token) => CatalogOutcome::Tracks(vec![ctx.content.to_string()]),
        None => CatalogOutcome::NeedsAuth {
            qr_token: format!("music_auth_{}", uuid::Uuid::new_v4().simple()),
        },
    }
}

pub async fn handle_music(ctx: &ActionContext<'_>) -> Result<ActionResult, CoreError> {
    match query_catalog(ctx).await {
        CatalogOutcome::NeedsAuth { qr_token } => Ok(ActionResult {
            user_prompt: Some("Scan the code to link your music account.".to_string()),
            meta_data: Some(Command::new(
                CommandType::Music,
                "AUTH_REQUIRED",
                json!({"qr_token": qr_token}),
            )),
        }),
        CatalogOutcome::Tracks(tracks) => Ok(ActionResult {
            user_prompt: Some(format!("Playing {}.", tracks.join(", "))),
            meta_data: Some(Command::new(
                CommandType::Music,
                "PLAY",
                json!({"tracks": tracks}),
            )),
        }),
        CatalogOutcome::Unavailable => Ok(ActionResult {
            user_prompt: Some("I couldn't reach the music service, here's something from the demo playlist.".to_string()),
            meta_data: Some(Command::new(
                CommandType::Music,
                "PLAY",
                json!({"tracks": DEMO_PLAYLIST}),
            )),
        }),
    }
}
