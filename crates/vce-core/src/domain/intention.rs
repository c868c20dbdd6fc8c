use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed set of top-level intents the classifier may assign, per
/// §4.5. Unrecognized classifier output always falls back to `Chat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Weather,
    News,
    Music,
    Story,
    Joke,
    Alarm,
    Control,
    Chat,
}

impl IntentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::News => "news",
            Self::Music => "music",
            Self::Story => "story",
            Self::Joke => "joke",
            Self::Alarm => "alarm",
            Self::Control => "control",
            Self::Chat => "chat",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "weather" => Self::Weather,
            "news" => Self::News,
            "music" => Self::Music,
            "story" => Self::Story,
            "joke" => Self::Joke,
            "alarm" => Self::Alarm,
            "control" => Self::Control,
            _ => Self::Chat,
        }
    }
}

/// Result of top-level intent classification plus whatever the matching
/// action handler decided. See §4.5 and §3.
#[derive(Debug, Clone)]
pub struct Intention {
    pub intent: IntentKind,
    pub content: String,
    pub user_prompt: Option<String>,
    pub system_prompt: Option<String>,
    pub meta_data: Option<Command>,
}

impl Intention {
    pub fn chat(content: impl Into<String>) -> Self {
        Self {
            intent: IntentKind::Chat,
            content: content.into(),
            user_prompt: None,
            system_prompt: None,
            meta_data: None,
        }
    }

    /// A non-empty `meta_data` means the dialogue is short-circuited:
    /// no streaming LLM call, `user_prompt` is spoken directly.
    pub fn is_short_circuited(&self) -> bool {
        self.meta_data.is_some()
    }
}

/// What an action handler produces: either a direct reply or a
/// short-circuiting structured command (or both — `user_prompt` is
/// always what TTS speaks when present).
#[derive(Debug, Clone, Default)]
pub struct ActionResult {
    pub user_prompt: Option<String>,
    pub meta_data: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    Alarm,
    Music,
    Control,
}

/// The `{cmd, params}` payload of a [`Command`]. `params` is left as
/// loosely-typed JSON since its shape varies per `cmd` (alarm ADD/DEL/LIST,
/// control device/action/value, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandPayload {
    pub cmd: String,
    pub params: Value,
}

/// Structured control metadata carried alongside an assistant message so
/// downstream clients can act on it, per §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub protocol: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub command_type: CommandType,
    pub payload: CommandPayload,
}

impl Command {
    pub fn new(command_type: CommandType, cmd: impl Into<String>, params: Value) -> Self {
        Self {
            protocol: 1,
            timestamp: Utc::now(),
            command_type,
            payload: CommandPayload {
                cmd: cmd.into(),
                params,
            },
        }
    }
}
