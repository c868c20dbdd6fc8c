//! Domain types: the nouns the rest of the gateway operates on.

mod audio;
mod device;
mod intention;
mod session;

pub use audio::{AudioFrame, VadState, AUDIO_FRAME_BYTES, AUDIO_FRAME_SAMPLES};
pub use device::{
    field_strategy, Alarm, AlarmError, AlarmKind, DeviceState, FieldStrategy, PlaybackState,
    Weekday,
};
pub use intention::{ActionResult, Command, CommandPayload, CommandType, IntentKind, Intention};
pub use session::SessionId;
