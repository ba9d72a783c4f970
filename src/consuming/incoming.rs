use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Error;
use crate::message::Metadata;

/// A deserialized envelope: its headers and the still-untyped `data`.
///
/// The handler registered for the message type decides which Rust type
/// `data` is read as.
#[derive(Clone, Debug, PartialEq)]
pub struct IncomingMessage {
    metadata: Metadata,
    data: Value,
}

impl IncomingMessage {
    pub fn new(metadata: Metadata, data: Value) -> Self {
        Self { metadata, data }
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn message_type(&self) -> &str {
        self.metadata.message_type().unwrap_or_default()
    }

    pub fn message_id(&self) -> &str {
        self.metadata.message_id().unwrap_or_default()
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Read `data` as `T`.
    pub fn read_data_as<T: DeserializeOwned>(&self) -> Result<T, Error> {
        T::deserialize(&self.data).map_err(|e| {
            Error::Deserialization(format!(
                "data of message type \"{}\" does not match {}: {}",
                self.message_type(),
                std::any::type_name::<T>(),
                e
            ))
        })
    }
}
