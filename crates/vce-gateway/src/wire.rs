//! Client→server wire types (§6). The envelope is parsed generically;
//! `data`'s shape is interpreted per `event_type` in the session's event
//! loop rather than through one combined tagged enum, since the field
//! sets genuinely differ (e.g. `chat.update`'s nested `chat_config` vs.
//! `input_audio_buffer.append`'s bare `delta`).

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct InboundEnvelope {
    #[serde(default)]
    pub id: Option<String>,
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Deserialize, Default)]
pub struct ChatConfig {
    pub conversation_id: Option<String>,
    pub user_id: Option<String>,
    #[serde(default)]
    pub parameters: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChatUpdateData {
    #[serde(default)]
    pub chat_config: ChatConfig,
}

#[derive(Debug, Deserialize)]
pub struct AudioAppendData {
    pub delta: String,
}

#[derive(Debug, Deserialize)]
pub struct ToolOutputsData {
    pub chat_id: String,
    #[serde(default)]
    pub tool_outputs: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct MessageCreateData {
    pub role: String,
    pub content_type: String,
    pub content: String,
}
