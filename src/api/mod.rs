//! REST API implementation
//!
//! HTTP surface for the library, the play queue, uploads, and the SSE
//! event stream consumed by the browser view.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{create_router, run, AppContext};
