use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a named device-state field is persisted.
///
/// Drives the repository's single-pipeline partitioning in `vce-store`:
/// `set_fields`/`get_fields` split a batch of field names by strategy and
/// issue one pipelined round-trip per distributed strategy, plus a plain
/// map mutation for `Memory` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldStrategy {
    /// Lives only in the per-repository-instance memory tier.
    Memory,
    /// One key per field in the distributed store: `device:{id}:{field}`.
    DistributedIndividual,
    /// Coalesced into `device:{id}:_state_json`.
    DistributedJson,
}

/// A day of the week, 0 = Sunday, matching the `repeat` encoding in §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub struct Weekday(u8);

impl Weekday {
    pub fn new(day: u8) -> Option<Self> {
        (day <= 6).then_some(Self(day))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl From<Weekday> for u8 {
    fn from(w: Weekday) -> Self {
        w.0
    }
}

impl TryFrom<u8> for Weekday {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Weekday::new(value).ok_or_else(|| format!("weekday out of range 0..6: {value}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmKind {
    Periodic,
    OneShot,
}

/// A device alarm. `trigger` holds either a one-shot timestamp or a
/// time-of-day depending on `kind`; the invariant (periodic needs
/// time-of-day, one-shot needs a timestamp) is enforced by
/// [`Alarm::new`] rather than by the type alone, matching the original
/// dataclass's runtime validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alarm {
    pub id: String,
    pub kind: AlarmKind,
    trigger_timestamp: Option<DateTime<Utc>>,
    trigger_time_of_day: Option<NaiveTime>,
    pub repeat: Vec<Weekday>,
    pub label: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AlarmError {
    #[error("periodic alarm requires a time-of-day trigger")]
    PeriodicNeedsTimeOfDay,
    #[error("one-shot alarm requires a timestamp trigger")]
    OneShotNeedsTimestamp,
}

impl Alarm {
    pub fn one_shot(
        id: String,
        at: DateTime<Utc>,
        label: Option<String>,
    ) -> Self {
        Self {
            id,
            kind: AlarmKind::OneShot,
            trigger_timestamp: Some(at),
            trigger_time_of_day: None,
            repeat: Vec::new(),
            label,
        }
    }

    pub fn periodic(
        id: String,
        time_of_day: NaiveTime,
        repeat: Vec<Weekday>,
        label: Option<String>,
    ) -> Self {
        Self {
            id,
            kind: AlarmKind::Periodic,
            trigger_timestamp: None,
            trigger_time_of_day: Some(time_of_day),
            repeat,
            label,
        }
    }

    pub fn validate(&self) -> Result<(), AlarmError> {
        match self.kind {
            AlarmKind::Periodic if self.trigger_time_of_day.is_none() => {
                Err(AlarmError::PeriodicNeedsTimeOfDay)
            }
            AlarmKind::OneShot if self.trigger_timestamp.is_none() => {
                Err(AlarmError::OneShotNeedsTimestamp)
            }
            _ => Ok(()),
        }
    }

    /// A one-shot alarm is expired once its trigger timestamp has passed.
    /// Periodic alarms are never expired by this check (§4.7: "retains
    /// all periodic alarms regardless of last fire").
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.kind, AlarmKind::OneShot if self.trigger_timestamp.is_some_and(|t| t <= now))
    }

    pub fn trigger_timestamp(&self) -> Option<DateTime<Utc>> {
        self.trigger_timestamp
    }

    pub fn trigger_time_of_day(&self) -> Option<NaiveTime> {
        self.trigger_time_of_day
    }
}

/// Playback/track state mirrored in the memory tier of [`DeviceState`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaybackState {
    pub playing: bool,
    pub current_track: Option<String>,
    pub shuffle: bool,
}

/// Combined per-device state, split across the memory and distributed
/// tiers per §3/§4.7. The split itself is expressed by
/// [`FieldStrategy`] in `vce-store`'s repository; this struct is the
/// value both tiers ultimately populate for callers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceState {
    pub device_id: String,

    // memory tier
    pub volume: Option<u8>,
    pub muted: Option<bool>,
    pub playback: PlaybackState,
    pub battery: Option<u8>,
    pub charging: Option<bool>,
    pub wifi_signal: Option<i32>,
    pub conversation_id: Option<String>,

    // distributed tier
    pub ip: Option<String>,
    pub firmware_version: Option<String>,
    pub connection_type: Option<String>,
    pub playlist: Vec<String>,
    pub repeat_mode: Option<String>,
    pub alarms: Vec<Alarm>,
}

impl DeviceState {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            ..Default::default()
        }
    }

    /// Alarms that are either periodic, or one-shot and not yet expired.
    pub fn valid_alarms(&self, now: DateTime<Utc>) -> Vec<&Alarm> {
        self.alarms.iter().filter(|a| !a.is_expired(now)).collect()
    }
}

/// Classifies a named `DeviceState` field by its storage tier, used by
/// the repository to route a single `set_fields`/`get_fields` call.
pub fn field_strategy(field: &str) -> FieldStrategy {
    match field {
        "volume" | "muted" | "playback" | "battery" | "charging" | "wifi_signal"
        | "conversation_id" => FieldStrategy::Memory,
        "ip" | "firmware_version" | "connection_type" | "playlist" | "repeat_mode" => {
            FieldStrategy::DistributedIndividual
        }
        "alarms" => FieldStrategy::DistributedJson,
        _ => FieldStrategy::DistributedIndividual,
    }
}
