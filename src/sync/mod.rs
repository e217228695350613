//! Synchronization Module
//!
//! The façade consumers call, the observable per-key state it publishes,
//! and the message-driven refresh listener.

mod events;
mod facade;
mod state;

pub use events::{spawn_refresh_listener, PlanCreated};
pub use facade::{EntryInfo, PlanSync};
pub use state::{StateBoard, ViewState};
