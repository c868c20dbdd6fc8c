use async_trait::async_trait;
use std::collections::HashMap;

use crate::domain::Alarm;
use crate::error::CoreError;

/// Per-device key/value state with memory + distributed layering
/// (§4.7). Every method is declared `async` even though a pure
/// in-memory test double can answer synchronously — see the Open
/// Questions resolution recorded in this repo's design notes.
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Fetch named fields. Values are returned pre-serialized to string
    /// form (JSON for structured fields); unparseable stored values log
    /// and yield `None` rather than erroring the caller.
    async fn get_fields(
        &self,
        device_id: &str,
        fields: &[&str],
    ) -> Result<HashMap<String, Option<String>>, CoreError>;

    /// Set named fields, partitioned by [`crate::domain::field_strategy`]
    /// and executed as a single pipelined transaction per distributed
    /// tier.
    async fn set_fields(
        &self,
        device_id: &str,
        fields: HashMap<String, String>,
    ) -> Result<(), CoreError>;

    async fn add_alarm(&self, device_id: &str, alarm: Alarm) -> Result<(), CoreError>;

    async fn update_alarm(&self, device_id: &str, alarm: Alarm) -> Result<(), CoreError>;

    async fn del_alarm(&self, device_id: &str, alarm_id: &str) -> Result<(), CoreError>;

    /// Periodic alarms always included; expired one-shots filtered out.
    async fn get_valid_alarms(&self, device_id: &str) -> Result<Vec<Alarm>, CoreError>;
}
