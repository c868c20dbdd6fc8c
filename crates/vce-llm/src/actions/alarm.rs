//! The `alarm` action handler (§4.5): a second LLM-free, regex-driven
//! parse of an already-classified alarm DSL line into a mutation against
//! the device's alarm collection.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;
use serde_json::json;
use std::sync::OnceLock;
use vce_core::domain::{Alarm, ActionResult, Command, CommandType, Weekday};
use vce_core::error::CoreError;

use super::ActionContext;

fn kv_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\w+)\s*=\s*([^\s]+)").unwrap())
}

fn parse_kv(line: &str) -> std::collections::HashMap<String, String> {
    kv_regex()
        .captures_iter(line)
        .map(|c| (c[1].to_lowercase(), c[2].to_string()))
        .collect()
}

fn parse_time(raw: &str) -> Option<(Option<chrono::DateTime<Utc>>, Option<NaiveTime>)> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some((Some(dt.and_utc()), None));
    }
    if let Ok(t) = NaiveTime::parse_from_str(raw, "%H:%M:%S") {
        return Some((None, Some(t)));
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some((Some(d.and_hms_opt(0, 0, 0)?.and_utc()), None));
    }
    None
}

fn parse_repeat(raw: &str) -> Vec<Weekday> {
    match raw.to_lowercase().as_str() {
        "workday" => (1..=5).filter_map(Weekday::new).collect(),
        "weekend" => [0u8, 6].iter().filter_map(|&d| Weekday::new(d)).collect(),
        "daily" => (0..=6).filter_map(Weekday::new).collect(),
        csv => csv
            .split(',')
            .filter_map(|d| d.trim().parse::<u8>().ok())
            .filter_map(Weekday::new)
            .collect(),
    }
}

/// Parses `ADD time=… [repeat=…] [label=…]`, `DEL id=…`, `LIST` against
/// the already-classified content and mutates the device's alarms.
pub async fn handle_alarm(ctx: &ActionContext<'_>) -> Result<ActionResult, CoreError> {
    let line = ctx.content.trim();
    let verb = line.split_whitespace().next().unwrap_or("").to_uppercase();
    let kv = parse_kv(line);

    match verb.as_str() {
        "ADD" => {
            let Some(time_raw) = kv.get("time") else {
                return Ok(ActionResult {
                    user_prompt: Some("I need a time to set that alarm.".to_string()),
                    meta_data: None,
                });
            };
            let Some((timestamp, time_of_day)) = parse_time(time_raw) else {
                return Ok(ActionResult {
                    user_prompt: Some("I couldn't understand that time.".to_string()),
                    meta_data: None,
                });
            };
            let label = kv.get("label").cloned();
            let id = format!("alarm_{}", uuid::Uuid::new_v4().simple());
            let alarm = if let Some(ts) = timestamp {
                Alarm::one_shot(id.clone(), ts, label.clone())
            } else {
                let repeat = kv
                    .get("repeat")
                    .map(|r| parse_repeat(r))
                    .unwrap_or_default();
                Alarm::periodic(id.clone(), time_of_day.unwrap(), repeat, label.clone())
            };
            alarm.validate().map_err(CoreError::internal)?;
            ctx.device_repo.add_alarm(ctx.device_id, alarm).await?;

            let command = Command::new(
                CommandType::Alarm,
                "ADD",
                json!({"id": id, "time": time_raw, "label": label}),
            );
            Ok(ActionResult {
                user_prompt: Some(format!("Alarm set for {time_raw}.")),
                meta_data: Some(command),
            })
        }
        "DEL" => {
            let Some(id) = kv.get("id") else {
                return Ok(ActionResult {
                    user_prompt: Some("Which alarm should I delete?".to_string()),
                    meta_data: None,
                });
            };
            ctx.device_repo.del_alarm(ctx.device_id, id).await?;
            let command = Command::new(CommandType::Alarm, "DEL", json!({"id": id}));
            Ok(ActionResult {
                user_prompt: Some("Alarm deleted.".to_string()),
                meta_data: Some(command),
            })
        }
        _ => {
            let alarms = ctx.device_repo.get_valid_alarms(ctx.device_id).await?;
            let command = Command::new(
                CommandType::Alarm,
                "LIST",
                json!({"count": alarms.len()}),
            );
            Ok(ActionResult {
                user_prompt: Some(format!("You have {} alarms set.", alarms.len())),
                meta_data: Some(command),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_presets() {
        assert_eq!(parse_repeat("workday").len(), 5);
        assert_eq!(parse_repeat("weekend").len(), 2);
        assert_eq!(parse_repeat("daily").len(), 7);
    }

    #[test]
    fn parses_csv_digits() {
        let days = parse_repeat("0,3,6");
        assert_eq!(days.len(), 3);
        assert_eq!(days[0].value(), 0);
    }

    #[test]
    fn ignores_out_of_range_digits() {
        let days = parse_repeat("0,9,3");
        assert_eq!(days.len(), 2);
    }

    #[test]
    fn kv_parsing_is_whitespace_tolerant() {
        let kv = parse_kv("ADD time = 12:30:00   label=wake up");
        assert_eq!(kv.get("time").unwrap(), "12:30:00");
    }
}
