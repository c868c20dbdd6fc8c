//! The outbound wire event union (§6) and the envelope it travels in.
//!
//! Every event a session ever pushes to its outbound queue is one
//! [`OutboundEvent`] variant; `vce-gateway` is the only crate that
//! serializes it onto the WebSocket, but the type itself lives here so
//! `vce-llm`/`vce-speech` can construct events without depending on the
//! transport crate.

use serde::{Deserialize, Serialize};

use crate::domain::Command;

/// The envelope every server→client message travels in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: String,
    pub event_type: String,
    pub detail: EventDetail,
    pub data: OutboundEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDetail {
    pub logid: String,
}

impl EventEnvelope {
    pub fn new(id: impl Into<String>, logid: impl Into<String>, data: OutboundEvent) -> Self {
        Self {
            id: id.into(),
            event_type: data.event_type().to_string(),
            detail: EventDetail { logid: logid.into() },
            data,
        }
    }
}

/// One audio delta, base64-encoded PCM or MP3 bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioDelta {
    pub delta: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// The server→client wire event union from §6. Tagged so each event
/// round-trips through JSON with its own `type` discriminant, the same
/// pattern used for the application event union this crate was modeled
/// on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    ChatCreated {
        conversation_id: String,
    },
    ChatUpdated {
        conversation_id: String,
    },
    ConversationChatCreated {
        chat_id: String,
    },
    ConversationChatInProgress {
        chat_id: String,
    },
    ConversationChatRequiresAction {
        chat_id: String,
    },
    ConversationChatCompleted {
        chat_id: String,
        command: Option<Command>,
    },
    ConversationChatCanceled {
        chat_id: String,
        error: Option<ErrorDetail>,
    },
    ConversationMessageDelta {
        chat_id: String,
        content: String,
    },
    ConversationMessageCompleted {
        chat_id: String,
        content: String,
        command: Option<Command>,
    },
    ConversationAudioTranscriptUpdate {
        text: String,
    },
    ConversationAudioTranscriptCompleted {
        text: String,
    },
    ConversationAudioTranscriptVad {
        speech_active: bool,
    },
    ConversationAudioUrl {
        content: String,
    },
    ConversationAudioDelta(AudioDelta),
    ConversationAudioCompleted,
    InputAudioBufferCompleted,
    SpeechCreated {
        request_id: String,
    },
    SpeechAudioUrl {
        content: String,
    },
    SpeechAudioUpdate(AudioDelta),
    SpeechAudioCompleted,
    TranscriptionsCreated {
        request_id: String,
    },
    TranscriptionsVad {
        speech_active: bool,
    },
    TranscriptionsMessageUpdate {
        text: String,
    },
    TranscriptionsMessageCompleted {
        text: String,
    },
    Error(ErrorDetail),
}

impl OutboundEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ChatCreated { .. } => "chat.created",
            Self::ChatUpdated { .. } => "chat.updated",
            Self::ConversationChatCreated { .. } => "conversation.chat.created",
            Self::ConversationChatInProgress { .. } => "conversation.chat.in_progress",
            Self::ConversationChatRequiresAction { .. } => "conversation.chat.requires_action",
            Self::ConversationChatCompleted { .. } => "conversation.chat.completed",
            Self::ConversationChatCanceled { .. } => "conversation.chat.canceled",
            Self::ConversationMessageDelta { .. } => "conversation.message.delta",
            Self::ConversationMessageCompleted { .. } => "conversation.message.completed",
            Self::ConversationAudioTranscriptUpdate { .. } => "conversation.audio_transcript.update",
            Self::ConversationAudioTranscriptCompleted { .. } => {
                "conversation.audio_transcript.completed"
            }
            Self::ConversationAudioTranscriptVad { .. } => "conversation.audio_transcript.vad",
            Self::ConversationAudioUrl { .. } => "conversation.audio.url",
            Self::ConversationAudioDelta(_) => "conversation.audio.delta",
            Self::ConversationAudioCompleted => "conversation.audio.completed",
            Self::InputAudioBufferCompleted => "input_audio_buffer.completed",
            Self::SpeechCreated { .. } => "speech.created",
            Self::SpeechAudioUrl { .. } => "speech.audio.url",
            Self::SpeechAudioUpdate(_) => "speech.audio.update",
            Self::SpeechAudioCompleted => "speech.audio.completed",
            Self::TranscriptionsCreated { .. } => "transcriptions.created",
            Self::TranscriptionsVad { .. } => "transcriptions.vad",
            Self::TranscriptionsMessageUpdate { .. } => "transcriptions.message.update",
            Self::TranscriptionsMessageCompleted { .. } => "transcriptions.message.completed",
            Self::Error(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips_through_json() {
        let env = EventEnvelope::new(
            "evt-1",
            "log-1",
            OutboundEvent::ConversationAudioUrl {
                content: "uid.req".to_string(),
            },
        );
        let json = serde_json::to_string(&env).unwrap();
        let back: EventEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_type, "conversation.audio.url");
        match back.data {
            OutboundEvent::ConversationAudioUrl { content } => assert_eq!(content, "uid.req"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn event_type_matches_tag() {
        let e = OutboundEvent::Error(ErrorDetail {
            code: "internal".into(),
            message: "boom".into(),
        });
        assert_eq!(e.event_type(), "error");
    }
}
