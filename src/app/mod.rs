//! Orchestration: runs an action against a host and reports to the user.

pub mod action;
pub mod events;
pub mod host;
pub mod proxy;

pub use action::{ActionOutcome, ChooserAction};
pub use events::UserEvent;
pub use host::{DocumentHandle, HostBridge, HostError};
pub use proxy::EventProxy;
