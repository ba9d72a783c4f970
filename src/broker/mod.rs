//! Broker clients that live entirely in process memory.
//!
//! Used by tests and single-process setups in place of a real broker
//! connection.

mod in_memory;

pub use in_memory::{InMemoryBroker, InMemoryConsumer, StoredMessage};
