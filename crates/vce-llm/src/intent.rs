//! Two-stage intent classification and dispatch (§4.5): a single LLM
//! call assigns a top-level intent, then a registered handler decides
//! whether the dialogue short-circuits.

use std::sync::Arc;

use vce_core::domain::{IntentKind, Intention};
use vce_core::error::CoreError;
use vce_core::ports::{DeviceRepository, LlmClient};

use crate::actions::{ActionContext, ActionRegistry};

/// System prompt template used for the second-stage LLM call when the
/// handler didn't short-circuit, per intent. Generic intents get a
/// conversational framing; structured intents never reach this (they
/// short-circuit via `meta_data`).
fn system_prompt_for(intent: IntentKind, language: &str) -> String {
    match intent {
        IntentKind::Weather => format!("Answer the weather question concisely, in {language}."),
        IntentKind::News => format!("Summarize relevant recent news, in {language}."),
        IntentKind::Story => format!("Tell a short, family-friendly story, in {language}."),
        IntentKind::Joke => format!("Tell a short, clean joke, in {language}."),
        _ => format!("Have a friendly conversation, in {language}."),
    }
}

pub struct IntentClassifier {
    llm: Arc<dyn LlmClient>,
    registry: ActionRegistry,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            registry: ActionRegistry::new(),
        }
    }

    /// Classify `text`, dispatch to the matching action handler, and
    /// return the resulting [`Intention`]. A non-empty `meta_data` on the
    /// returned intention means the caller should skip the streaming LLM
    /// turn and speak `user_prompt` directly.
    pub async fn detect(
        &self,
        text: &str,
        language: &str,
        device_id: &str,
        device_repo: &dyn DeviceRepository,
    ) -> Result<Intention, CoreError> {
        let classified = self.llm.query_intention(text, language).await?;

        let ctx = ActionContext {
            content: &classified.content,
            device_id,
            language,
            device_repo,
        };
        let result = self.registry.dispatch(classified.intent, ctx).await?;

        let system_prompt = if result.meta_data.is_none() {
            Some(system_prompt_for(classified.intent, language))
        } else {
            None
        };

        Ok(Intention {
            intent: classified.intent,
            content: classified.content,
            user_prompt: result.user_prompt,
            system_prompt,
            meta_data: result.meta_data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use vce_core::domain::Alarm;
    use vce_core::ports::{ChatMessage, StreamSink};

    struct StubLlm {
        reply: String,
    }

    #[async_trait]
    impl LlmClient for StubLlm {
        async fn query(
            &self,
            _text: &str,
            _system_prompt: Option<&str>,
            _history: &[ChatMessage],
        ) -> Result<String, CoreError> {
            Ok(self.reply.clone())
        }

        async fn query_intention(&self, _text: &str, _language: &str) -> Result<Intention, CoreError> {
            Ok(Intention::chat("hello there".to_string()))
        }

        async fn query_stream(
            &self,
            _text: &str,
            _user_prompt: Option<&str>,
            _system_prompt: Option<&str>,
            _sink: StreamSink,
        ) -> Result<(), CoreError> {
            Ok(())
        }

        async fn close(&self) {}
    }

    struct StubRepo;

    #[async_trait]
    impl DeviceRepository for StubRepo {
        async fn get_fields(
            &self,
            _device_id: &str,
            _fields: &[&str],
        ) -> Result<HashMap<String, Option<String>>, CoreError> {
            Ok(HashMap::new())
        }
        async fn set_fields(
            &self,
            _device_id: &str,
            _fields: HashMap<String, String>,
        ) -> Result<(), CoreError> {
            Ok(())
        }
        async fn add_alarm(&self, _device_id: &str, _alarm: Alarm) -> Result<(), CoreError> {
            Ok(())
        }
        async fn update_alarm(&self, _device_id: &str, _alarm: Alarm) -> Result<(), CoreError> {
            Ok(())
        }
        async fn del_alarm(&self, _device_id: &str, _alarm_id: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn get_valid_alarms(&self, _device_id: &str) -> Result<Vec<Alarm>, CoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn chat_intent_never_short_circuits() {
        let classifier = IntentClassifier::new(Arc::new(StubLlm {
            reply: "chat: hello there".to_string(),
        }));
        let repo = StubRepo;
        let intention = classifier
            .detect("hi", "en", "device-1", &repo)
            .await
            .unwrap();
        assert!(!intention.is_short_circuited());
        assert!(intention.system_prompt.is_some());
    }
}
