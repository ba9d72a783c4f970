use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::Error;
use crate::message::AnyMessage;

type Describe = Arc<dyn Fn(&AnyMessage) -> Result<(String, Value), Error> + Send + Sync>;

/// Where and how one outgoing message type is published.
#[derive(Clone)]
pub struct OutgoingMessageRegistration {
    topic: String,
    message_type: String,
    describe: Describe,
}

impl OutgoingMessageRegistration {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    /// Partition key and JSON data for `message`.
    pub fn describe(&self, message: &AnyMessage) -> Result<(String, Value), Error> {
        (self.describe)(message)
    }
}

impl std::fmt::Debug for OutgoingMessageRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutgoingMessageRegistration")
            .field("topic", &self.topic)
            .field("message_type", &self.message_type)
            .finish()
    }
}

/// Outgoing message registrations keyed by the message's Rust type.
///
/// ```ignore
/// let mut registry = OutgoingMessageRegistry::new();
/// registry.register::<OrderPlaced, _>("orders", "order_placed", |e| e.order_id.to_string());
/// ```
#[derive(Clone, Debug, Default)]
pub struct OutgoingMessageRegistry {
    registrations: HashMap<TypeId, OutgoingMessageRegistration>,
}

impl OutgoingMessageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T, K>(
        &mut self,
        topic: impl Into<String>,
        message_type: impl Into<String>,
        key_selector: K,
    ) where
        T: Serialize + Any + Send + Sync,
        K: Fn(&T) -> String + Send + Sync + 'static,
    {
        let describe: Describe = Arc::new(move |message: &AnyMessage| {
            let value = message.downcast_ref::<T>().ok_or_else(|| {
                Error::UnregisteredOutgoingMessage(message.short_type_name().to_string())
            })?;
            Ok((key_selector(value), serde_json::to_value(value)?))
        });

        self.registrations.insert(
            TypeId::of::<T>(),
            OutgoingMessageRegistration {
                topic: topic.into(),
                message_type: message_type.into(),
                describe,
            },
        );
    }

    pub fn registration_for(&self, message: &AnyMessage) -> Option<&OutgoingMessageRegistration> {
        self.registrations.get(&message.message_type_id())
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}
