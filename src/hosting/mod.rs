//! Wiring of consumers, producers and the outbox into one running host.

mod host;
mod messaging;

pub use host::{HostStats, MessagingHost};
pub use messaging::Messaging;
