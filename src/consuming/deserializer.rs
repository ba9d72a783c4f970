use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::IncomingMessage;
use crate::error::Error;
use crate::message::{keys, Metadata, RawMessage};

/// Turns raw broker payloads into incoming messages.
pub trait Deserializer: Send + Sync {
    fn deserialize(&self, message: &RawMessage) -> Result<IncomingMessage, Error>;
}

/// Reads the JSON envelope `{"messageId", "type", "data", ...headers}`.
///
/// Property names are matched without regard to case. Header values that are
/// not strings (a numeric `messageId`, for example) are kept in their JSON
/// text form.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonDeserializer;

impl Deserializer for JsonDeserializer {
    fn deserialize(&self, message: &RawMessage) -> Result<IncomingMessage, Error> {
        let document: Value = serde_json::from_slice(&message.data)
            .map_err(|e| Error::Deserialization(format!("invalid JSON envelope: {}", e)))?;

        let Value::Object(properties) = document else {
            return Err(Error::Deserialization(
                "message envelope must be a JSON object".to_string(),
            ));
        };

        envelope_to_message(properties)
    }
}

fn envelope_to_message(properties: Map<String, Value>) -> Result<IncomingMessage, Error> {
    let mut metadata = Metadata::new();
    let mut data = None;

    for (name, value) in properties {
        if name.eq_ignore_ascii_case(keys::DATA) {
            data = Some(value);
        } else {
            metadata.insert(canonical_key(name), header_text(value));
        }
    }

    let data = data.ok_or_else(|| {
        Error::Deserialization(format!(
            "message envelope has no \"{}\" property",
            keys::DATA
        ))
    })?;

    Ok(IncomingMessage::new(metadata, data))
}

fn canonical_key(name: String) -> String {
    [
        keys::MESSAGE_ID,
        keys::TYPE,
        keys::CORRELATION_ID,
        keys::CAUSATION_ID,
    ]
    .into_iter()
    .find(|known| known.eq_ignore_ascii_case(&name))
    .map(str::to_string)
    .unwrap_or(name)
}

fn header_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Payload delivered in place of a message that could not be deserialized.
///
/// Register a handler for [`TransportLevelPoisonMessage::MESSAGE_TYPE`] to
/// receive these.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportLevelPoisonMessage {
    pub raw_message: String,
    pub error: String,
}

impl TransportLevelPoisonMessage {
    pub const MESSAGE_TYPE: &'static str = "transport-level-poison-message";
}

/// Wraps another deserializer and converts its failures into
/// [`TransportLevelPoisonMessage`]s instead of failing the consumer.
#[derive(Clone, Debug, Default)]
pub struct PoisonAwareDeserializer<D> {
    inner: D,
}

impl<D: Deserializer> PoisonAwareDeserializer<D> {
    pub fn new(inner: D) -> Self {
        Self { inner }
    }
}

impl<D: Deserializer> Deserializer for PoisonAwareDeserializer<D> {
    fn deserialize(&self, message: &RawMessage) -> Result<IncomingMessage, Error> {
        match self.inner.deserialize(message) {
            Ok(incoming) => Ok(incoming),
            Err(err) => {
                warn!(error = %err, "Exception thrown when creating transport level message");

                let poison = TransportLevelPoisonMessage {
                    raw_message: String::from_utf8_lossy(&message.data).into_owned(),
                    error: err.to_string(),
                };
                let metadata =
                    Metadata::new().with(keys::TYPE, TransportLevelPoisonMessage::MESSAGE_TYPE);

                Ok(IncomingMessage::new(metadata, serde_json::to_value(poison)?))
            }
        }
    }
}

impl Deserializer for Box<dyn Deserializer> {
    fn deserialize(&self, message: &RawMessage) -> Result<IncomingMessage, Error> {
        (**self).deserialize(message)
    }
}

impl<T: Deserializer + ?Sized> Deserializer for std::sync::Arc<T> {
    fn deserialize(&self, message: &RawMessage) -> Result<IncomingMessage, Error> {
        (**self).deserialize(message)
    }
}
