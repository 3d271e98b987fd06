//! # Tonearm
//!
//! Browser-based music player service: a persisted track library, a play
//! queue, and transport control over HTTP + SSE.
//!
//! The browser is a thin view plus the audio-output collaborator (an HTML
//! audio element); all queue/playback policy lives server-side in
//! [`playback::QueueState`] and is exposed through the REST API.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod library;
pub mod playback;

pub use error::{Error, Result};
