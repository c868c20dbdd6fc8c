//! Domain types, port traits, and the outbound wire event union shared by
//! every adapter crate in the voice gateway.
//!
//! This crate has no I/O of its own: it defines *what* the gateway talks
//! about (sessions, audio frames, intents, device state) and the *shapes*
//! adapters must implement (`ports`), not how any of it is actually done.

pub mod domain;
pub mod error;
pub mod events;
pub mod ports;

pub use error::CoreError;
