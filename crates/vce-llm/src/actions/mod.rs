//! Per-(intent, language) action registry (§4.5): handlers are
//! registered as plain data — a prompt template plus a function pointer
//! — in a lookup table built at startup, never as a class hierarchy.

mod alarm;
mod control;
mod generic;
mod music;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use vce_core::domain::{ActionResult, IntentKind};
use vce_core::error::CoreError;
use vce_core::ports::DeviceRepository;

pub use alarm::handle_alarm;
pub use control::handle_control;
pub use generic::handle_generic;
pub use music::handle_music;

/// Context handed to every action handler: the classified content, the
/// target device, the repository, and the language the reply should be
/// composed in.
pub struct ActionContext<'a> {
    pub content: &'a str,
    pub device_id: &'a str,
    pub language: &'a str,
    pub device_repo: &'a dyn DeviceRepository,
}

pub type ActionFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ActionResult, CoreError>> + Send + 'a>>;

/// Plain function pointer, not a closure: handlers capture nothing, so a
/// bare `fn` item satisfies the higher-ranked lifetime signature without
/// the inference friction closures hit here.
pub type ActionFn = for<'a> fn(&'a ActionContext<'a>) -> ActionFuture<'a>;

fn dispatch_weather<'a>(ctx: &'a ActionContext<'a>) -> ActionFuture<'a> {
    Box::pin(generic::handle_generic(IntentKind::Weather, ctx))
}

fn dispatch_news<'a>(ctx: &'a ActionContext<'a>) -> ActionFuture<'a> {
    Box::pin(generic::handle_generic(IntentKind::News, ctx))
}

fn dispatch_story<'a>(ctx: &'a ActionContext<'a>) -> ActionFuture<'a> {
    Box::pin(generic::handle_generic(IntentKind::Story, ctx))
}

fn dispatch_joke<'a>(ctx: &'a ActionContext<'a>) -> ActionFuture<'a> {
    Box::pin(generic::handle_generic(IntentKind::Joke, ctx))
}

fn dispatch_chat<'a>(ctx: &'a ActionContext<'a>) -> ActionFuture<'a> {
    Box::pin(generic::handle_generic(IntentKind::Chat, ctx))
}

fn dispatch_alarm<'a>(ctx: &'a ActionContext<'a>) -> ActionFuture<'a> {
    Box::pin(alarm::handle_alarm(ctx))
}

fn dispatch_control<'a>(ctx: &'a ActionContext<'a>) -> ActionFuture<'a> {
    Box::pin(control::handle_control(ctx))
}

fn dispatch_music<'a>(ctx: &'a ActionContext<'a>) -> ActionFuture<'a> {
    Box::pin(music::handle_music(ctx))
}

/// Registry keyed by `(intent, language)`, falling back to the
/// language-agnostic `"*"` entry when no language-specific override is
/// registered — the data-driven analogue of subclassing per-language
/// handlers.
pub struct ActionRegistry {
    handlers: HashMap<(IntentKind, &'static str), ActionFn>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        let mut handlers: HashMap<(IntentKind, &'static str), ActionFn> = HashMap::new();
        handlers.insert((IntentKind::Alarm, "*"), dispatch_alarm);
        handlers.insert((IntentKind::Control, "*"), dispatch_control);
        handlers.insert((IntentKind::Music, "*"), dispatch_music);
        handlers.insert((IntentKind::Weather, "*"), dispatch_weather);
        handlers.insert((IntentKind::News, "*"), dispatch_news);
        handlers.insert((IntentKind::Story, "*"), dispatch_story);
        handlers.insert((IntentKind::Joke, "*"), dispatch_joke);
        handlers.insert((IntentKind::Chat, "*"), dispatch_chat);
        Self { handlers }
    }

    pub async fn dispatch(
        &self,
        intent: IntentKind,
        ctx: ActionContext<'_>,
    ) -> Result<ActionResult, CoreError> {
        let handler = self
            .handlers
            .get(&(intent, ctx.language))
            .or_else(|| self.handlers.get(&(intent, "*")))
            .copied();
        match handler {
            Some(f) => f(&ctx).await,
            None => Ok(ActionResult::default()),
        }
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
