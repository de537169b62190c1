//! Defines an abstraction over the event sending mechanism.

use super::events::UserEvent;
use tokio::sync::mpsc::UnboundedSender;

/// A trait that abstracts the sending of user events.
/// This is "fire-and-forget" and doesn't return a result, simplifying its use.
pub trait EventProxy: Send + Sync {
    fn send_event(&self, event: UserEvent);
}

/// Channel-backed proxy; the receiving end presents the messages.
impl EventProxy for UnboundedSender<UserEvent> {
    fn send_event(&self, event: UserEvent) {
        // The receiver may already be gone; losing a message is not fatal.
        if let Err(e) = self.send(event) {
            tracing::warn!("Failed to deliver user event: {:?}", e.0);
        }
    }
}
