use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::OutboxEntry;
use crate::error::RepositoryError;

/// Capture side storage. Called inside the caller's database transaction.
pub trait OutboxEntryRepository: Send + Sync {
    fn add(&self, entries: &[OutboxEntry]) -> Result<(), RepositoryError>;
}

impl<T: OutboxEntryRepository + ?Sized> OutboxEntryRepository for Arc<T> {
    fn add(&self, entries: &[OutboxEntry]) -> Result<(), RepositoryError> {
        (**self).add(entries)
    }
}

/// One dispatch cycle's view of the outbox.
pub trait OutboxUnitOfWork {
    /// Pending entries in a stable order.
    fn unpublished_entries(&mut self) -> Result<Vec<OutboxEntry>, RepositoryError>;

    fn mark_as_processed(&mut self, message_id: Uuid, at: DateTime<Utc>)
        -> Result<(), RepositoryError>;

    /// Persist the marks made so far.
    fn commit(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// Opens units of work for the dispatcher.
pub trait OutboxUnitOfWorkFactory: Send + Sync {
    fn begin(&self) -> Result<Box<dyn OutboxUnitOfWork + '_>, RepositoryError>;
}

impl<T: OutboxUnitOfWorkFactory + ?Sized> OutboxUnitOfWorkFactory for Arc<T> {
    fn begin(&self) -> Result<Box<dyn OutboxUnitOfWork + '_>, RepositoryError> {
        (**self).begin()
    }
}
