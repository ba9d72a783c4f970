use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A serialized message waiting in the outbox table.
///
/// Pending while `processed_utc` is `None`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEntry {
    pub message_id: Uuid,
    pub topic: String,
    pub key: Option<String>,
    pub payload: String,
    pub occurred_utc: DateTime<Utc>,
    pub processed_utc: Option<DateTime<Utc>>,
}

impl OutboxEntry {
    pub fn new(
        message_id: Uuid,
        topic: impl Into<String>,
        key: Option<String>,
        payload: impl Into<String>,
        occurred_utc: DateTime<Utc>,
    ) -> Self {
        Self {
            message_id,
            topic: topic.into(),
            key,
            payload: payload.into(),
            occurred_utc,
            processed_utc: None,
        }
    }

    pub fn is_processed(&self) -> bool {
        self.processed_utc.is_some()
    }

    /// Record the publish time. The first mark sticks; returns whether this
    /// call changed the entry.
    pub fn mark_as_processed(&mut self, at: DateTime<Utc>) -> bool {
        if self.processed_utc.is_some() {
            return false;
        }
        self.processed_utc = Some(at);
        true
    }
}
