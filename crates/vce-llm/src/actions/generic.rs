//! The `weather`/`news`/`story`/`joke`/`chat` action handlers (§4.5):
//! none of these short-circuit the dialogue — each just carries the
//! classified content forward as `user_prompt` with an empty
//! `meta_data`, so the session goes on to stream the LLM's reply. The
//! accompanying `system_prompt` for that second-stage call is attached
//! by the intent classifier (see `system_prompt_for` in `intent.rs`),
//! not here, since `ActionResult` itself has no system-prompt field.

use vce_core::domain::ActionResult;
use vce_core::error::CoreError;

use super::ActionContext;
use vce_core::domain::IntentKind;

pub async fn handle_generic(
    _intent: IntentKind,
    ctx: &ActionContext<'_>,
) -> Result<ActionResult, CoreError> {
    Ok(ActionResult {
        user_prompt: Some(ctx.content.to_string()),
        meta_data: None,
    })
}
