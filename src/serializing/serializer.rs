use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::PayloadDescriptor;
use crate::error::Error;
use crate::message::keys;

/// Turns a payload descriptor into the text stored in the outbox or sent
/// to the broker.
pub trait PayloadSerializer: Send + Sync {
    fn payload_format(&self) -> &str {
        "application/json"
    }

    fn serialize(&self, descriptor: &PayloadDescriptor) -> Result<String, Error>;
}

/// Writes the JSON envelope: `messageId`, `type`, every other header, then
/// `data`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultPayloadSerializer;

impl PayloadSerializer for DefaultPayloadSerializer {
    fn serialize(&self, descriptor: &PayloadDescriptor) -> Result<String, Error> {
        let mut envelope = Map::new();
        envelope.insert(
            keys::MESSAGE_ID.to_string(),
            Value::String(descriptor.message_id.clone()),
        );
        envelope.insert(
            keys::TYPE.to_string(),
            Value::String(descriptor.message_type.clone()),
        );

        for (key, value) in descriptor.headers.iter() {
            let reserved = [keys::MESSAGE_ID, keys::TYPE, keys::DATA]
                .iter()
                .any(|reserved| key.eq_ignore_ascii_case(reserved));
            if !reserved {
                envelope.insert(key.to_string(), Value::String(value.to_string()));
            }
        }

        envelope.insert(keys::DATA.to_string(), descriptor.data.clone());

        Ok(serde_json::to_string(&Value::Object(envelope))?)
    }
}

/// Serializer lookup by topic with a fallback default.
#[derive(Clone)]
pub struct TopicPayloadSerializerRegistry {
    default: Arc<dyn PayloadSerializer>,
    by_topic: HashMap<String, Arc<dyn PayloadSerializer>>,
}

impl Default for TopicPayloadSerializerRegistry {
    fn default() -> Self {
        Self::new(Arc::new(DefaultPayloadSerializer))
    }
}

impl TopicPayloadSerializerRegistry {
    pub fn new(default: Arc<dyn PayloadSerializer>) -> Self {
        Self {
            default,
            by_topic: HashMap::new(),
        }
    }

    pub fn set_default(&mut self, serializer: Arc<dyn PayloadSerializer>) {
        self.default = serializer;
    }

    pub fn register(&mut self, topic: impl Into<String>, serializer: Arc<dyn PayloadSerializer>) {
        self.by_topic.insert(topic.into(), serializer);
    }

    pub fn get(&self, topic: &str) -> Arc<dyn PayloadSerializer> {
        self.by_topic
            .get(topic)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}
