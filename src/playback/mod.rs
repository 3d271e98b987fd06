//! Queue/playback engine
//!
//! `queue` holds the pure state machine; `engine` wraps it behind a lock,
//! validates async results against a load generation token, and announces
//! changes on the event bus.

pub mod engine;
pub mod queue;
pub mod types;

pub use engine::{Player, PlayerSnapshot};
pub use queue::QueueState;
pub use types::{Advance, AudioCommand, RepeatMode};
