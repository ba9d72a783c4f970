//! Message shapes shared by the consumer, producer and outbox flows.

mod metadata;
mod outgoing;
mod raw;

pub use metadata::{keys, Metadata};
pub use outgoing::{AnyMessage, OutgoingMessage};
pub use raw::{OutgoingRawMessage, RawMessage, TopicPartitionOffset};
