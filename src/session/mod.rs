//! Review session lifecycle
//!
//! - `store`: concurrent registry of pending sessions
//! - `guard`: per-session deadline timer
//! - `broker`: create / await / submit / reprocess rendezvous

pub mod broker;
pub mod guard;
pub mod store;

pub use broker::{BrokerConfig, PendingReview, SessionBroker, DEFAULT_REVIEW_TIMEOUT};
pub use guard::TimeoutGuard;
pub use store::{SessionSlot, SessionStore};
