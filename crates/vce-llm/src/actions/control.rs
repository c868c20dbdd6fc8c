//! The `control` action handler (§4.5): maps already-classified device
//! control content onto the closed device/action vocabulary and mutates
//! device state.

use serde::Deserialize;
use serde_json::json;
use vce_core::domain::{ActionResult, Command, CommandType};
use vce_core::error::CoreError;

use super::ActionContext;

const DEVICES: &[&str] = &[
    "light", "screen", "bluetooth", "volume", "playback", "mode", "microphone",
];
const ACTIONS: &[&str] = &[
    "on", "off", "adjust", "pause", "continue", "next", "prev", "jump", "set", "mute", "unmute",
    "record", "stop_record",
];

#[derive(Debug, Deserialize)]
struct ControlDirective {
    device: String,
    action: String,
    #[serde(default)]
    value: Option<serde_json::Value>,
}

fn is_known(device: &str, action: &str) -> bool {
    DEVICES.contains(&device) && ACTIONS.contains(&action)
}

/// A vague delta term maps to ±10 on the current volume, per §4.5.
fn resolve_volume_value(raw: &serde_json::Value) -> i32 {
    match raw {
        serde_json::Value::Number(n) => n.as_i64().unwrap_or(0) as i32,
        serde_json::Value::String(s) => match s.to_lowercase().as_str() {
            "up" | "louder" | "increase" => 10,
            "down" | "quieter" | "decrease" => -10,
            other => other.parse().unwrap_or(0),
        },
        _ => 0,
    }
}

async fn apply_one(
    ctx: &ActionContext<'_>,
    directive: &ControlDirective,
) -> Result<Option<Command>, CoreError> {
    if !is_known(&directive.device, &directive.action) {
        return Ok(None);
    }

    if directive.device == "volume" && directive.action == "adjust" {
        let delta = directive
            .value
            .as_ref()
            .map(resolve_volume_value)
            .unwrap_or(0);
        let fields = ctx
            .device_repo
            .get_fields(ctx.device_id, &["volume"])
            .await?;
        let current: i32 = fields
            .get("volume")
            .and_then(|v| v.as_ref())
            .and_then(|v| v.parse().ok())
            .unwrap_or(50);
        let next = (current + delta).clamp(0, 100);
        let mut updates = std::collections::HashMap::new();
        updates.insert("volume".to_string(), next.to_string());
        ctx.device_repo.set_fields(ctx.device_id, updates).await?;
    }

    Ok(Some(Command::new(
        CommandType::Control,
        format!("{}:{}", directive.device, directive.action),
        json!({
            "device": directive.device,
            "action": directive.action,
            "value": directive.value,
            "raw_input": ctx.content,
        }),
    )))
}

pub async fn handle_control(ctx: &ActionContext<'_>) -> Result<ActionResult, CoreError> {
    let directives: Vec<ControlDirective> = if let Ok(list) =
        serde_json::from_str::<Vec<ControlDirective>>(ctx.content)
    {
        list
    } else if let Ok(single) = serde_json::from_str::<ControlDirective>(ctx.content) {
        vec![single]
    } else {
        return Ok(ActionResult {
            user_prompt: Some("I didn't understand that control request.".to_string()),
            meta_data: None,
        });
    };

    let mut last_command = None;
    for directive in &directives {
        if let Some(cmd) = apply_one(ctx, directive).await? {
            last_command = Some(cmd);
        }
    }

    Ok(ActionResult {
        user_prompt: Some("Done.".to_string()),
        meta_data: last_command,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_device_action_pairs() {
        assert!(!is_known("toaster", "on"));
        assert!(is_known("light", "on"));
    }

    #[test]
    fn resolves_vague_volume_terms_to_plus_minus_ten() {
        assert_eq!(resolve_volume_value(&json!("up")), 10);
        assert_eq!(resolve_volume_value(&json!("down")), -10);
        assert_eq!(resolve_volume_value(&json!(5)), 5);
    }
}
