use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{OutboxEntry, OutboxEntryRepository, OutboxUnitOfWork, OutboxUnitOfWorkFactory};
use crate::error::RepositoryError;

/// Outbox table kept in memory.
///
/// Cloning creates another handle to the same storage.
///
/// ```ignore
/// let repository = InMemoryOutboxRepository::new();
///
/// let tx = repository.begin_transaction();
/// outbox.queue(Arc::new(tx.clone()), services.clone()).enqueue_one(OrderPlaced { order_id: 7 })?;
/// tx.commit()?; // or tx.rollback()
///
/// assert_eq!(repository.pending()?.len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryOutboxRepository {
    entries: Arc<RwLock<Vec<OutboxEntry>>>,
}

impl InMemoryOutboxRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a transaction whose adds become visible on commit.
    pub fn begin_transaction(&self) -> OutboxTransaction {
        OutboxTransaction {
            entries: self.entries.clone(),
            staged: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn entries(&self) -> Result<Vec<OutboxEntry>, RepositoryError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| RepositoryError::LockPoisoned("read"))?;
        Ok(entries.clone())
    }

    pub fn pending(&self) -> Result<Vec<OutboxEntry>, RepositoryError> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|entry| !entry.is_processed())
            .collect())
    }

    pub fn get(&self, message_id: Uuid) -> Result<Option<OutboxEntry>, RepositoryError> {
        Ok(self
            .entries()?
            .into_iter()
            .find(|entry| entry.message_id == message_id))
    }

    fn append(&self, new_entries: &[OutboxEntry]) -> Result<(), RepositoryError> {
        append(&self.entries, new_entries)
    }
}

fn append(
    entries: &RwLock<Vec<OutboxEntry>>,
    new_entries: &[OutboxEntry],
) -> Result<(), RepositoryError> {
    let mut entries = entries
        .write()
        .map_err(|_| RepositoryError::LockPoisoned("write"))?;
    entries.extend(new_entries.iter().cloned());
    Ok(())
}

/// Adds without a transaction are committed immediately.
impl OutboxEntryRepository for InMemoryOutboxRepository {
    fn add(&self, entries: &[OutboxEntry]) -> Result<(), RepositoryError> {
        self.append(entries)
    }
}

/// Staged outbox writes. Cloning shares the staged entries.
#[derive(Clone)]
pub struct OutboxTransaction {
    entries: Arc<RwLock<Vec<OutboxEntry>>>,
    staged: Arc<Mutex<Vec<OutboxEntry>>>,
}

impl OutboxTransaction {
    pub fn staged(&self) -> Result<usize, RepositoryError> {
        let staged = self
            .staged
            .lock()
            .map_err(|_| RepositoryError::LockPoisoned("staged"))?;
        Ok(staged.len())
    }

    pub fn commit(self) -> Result<(), RepositoryError> {
        let staged = {
            let mut staged = self
                .staged
                .lock()
                .map_err(|_| RepositoryError::LockPoisoned("staged"))?;
            std::mem::take(&mut *staged)
        };
        append(&self.entries, &staged)
    }

    pub fn rollback(self) -> Result<(), RepositoryError> {
        self.staged
            .lock()
            .map_err(|_| RepositoryError::LockPoisoned("staged"))?
            .clear();
        Ok(())
    }
}

impl OutboxEntryRepository for OutboxTransaction {
    fn add(&self, entries: &[OutboxEntry]) -> Result<(), RepositoryError> {
        self.staged
            .lock()
            .map_err(|_| RepositoryError::LockPoisoned("staged"))?
            .extend(entries.iter().cloned());
        Ok(())
    }
}

impl OutboxUnitOfWorkFactory for InMemoryOutboxRepository {
    fn begin(&self) -> Result<Box<dyn OutboxUnitOfWork + '_>, RepositoryError> {
        Ok(Box::new(InMemoryUnitOfWork {
            entries: &self.entries,
            marks: Vec::new(),
        }))
    }
}

struct InMemoryUnitOfWork<'a> {
    entries: &'a RwLock<Vec<OutboxEntry>>,
    marks: Vec<(Uuid, DateTime<Utc>)>,
}

impl OutboxUnitOfWork for InMemoryUnitOfWork<'_> {
    fn unpublished_entries(&mut self) -> Result<Vec<OutboxEntry>, RepositoryError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| RepositoryError::LockPoisoned("read"))?;
        Ok(entries
            .iter()
            .filter(|entry| !entry.is_processed())
            .cloned()
            .collect())
    }

    fn mark_as_processed(
        &mut self,
        message_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.marks.push((message_id, at));
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| RepositoryError::LockPoisoned("write"))?;

        for (message_id, at) in &self.marks {
            let entry = entries
                .iter_mut()
                .find(|entry| entry.message_id == *message_id)
                .ok_or_else(|| RepositoryError::EntryNotFound(message_id.to_string()))?;
            entry.mark_as_processed(*at);
        }
        Ok(())
    }
}
