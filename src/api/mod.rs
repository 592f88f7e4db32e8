//! HTTP gateway for the review UI
//!
//! Provides:
//! - Session info, submit and reprocess endpoints for the review page
//! - Server-Sent Events (SSE) for session lifecycle updates
//! - Health check

pub mod errors;
pub mod server;

pub use server::{build_router, ApiServer, ApiServerConfig, AppState};
