//! Transactional outbox.
//!
//! Two independent halves share the outbox table:
//!
//! ```text
//!  capture (inside the caller's transaction)
//!  ─────────────────────────────────────────
//!  OutboxQueue::enqueue ─► PayloadDescription ─► Serialization ─► Storage ─► OutboxEntryRepository
//!        │
//!        └──► OutboxNotifier::notify  (after commit)
//!
//!  drain (background thread)
//!  ─────────────────────────
//!  OutboxListener::wait ─► OutboxDispatcher::dispatch ─► OutboxProducer ─► broker
//!                                 │
//!                                 └──► mark processed, commit unit of work
//! ```
//!
//! An entry is pending until `processed_utc` is set. A failed publish leaves
//! the entry pending for the next cycle, so delivery is at-least-once.

mod dispatcher;
mod entry;
mod in_memory;
mod middleware;
mod notification;
mod queue;
mod repository;
mod thread;

pub use dispatcher::{DispatchResult, OutboxDispatcher, OutboxProducer};
pub use entry::OutboxEntry;
pub use in_memory::{InMemoryOutboxRepository, OutboxTransaction};
pub use middleware::{
    OutboxMessageContext, OutboxPayloadDescriptionContext, OutboxPayloadDescriptionMiddleware,
    OutboxSerializationMiddleware, OutboxStorage, OutboxStorageContext, OutboxStorageMiddleware,
};
pub use notification::{NullOutboxNotifier, OutboxListener, OutboxNotification, OutboxNotifier};
pub use queue::OutboxQueue;
pub use repository::{OutboxEntryRepository, OutboxUnitOfWork, OutboxUnitOfWorkFactory};
pub use thread::{DispatcherStats, OutboxDispatcherThread};
