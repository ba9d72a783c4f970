use std::collections::HashMap;

/// Position of a consumed message, used to commit it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TopicPartitionOffset {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

impl TopicPartitionOffset {
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
        }
    }
}

/// A message as received from the broker, before deserialization.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawMessage {
    pub key: Option<String>,
    pub headers: HashMap<String, String>,
    pub data: Vec<u8>,
    pub position: Option<TopicPartitionOffset>,
}

impl RawMessage {
    pub fn new(key: Option<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            key,
            headers: HashMap::new(),
            data: data.into(),
            position: None,
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_position(mut self, position: TopicPartitionOffset) -> Self {
        self.position = Some(position);
        self
    }

    /// The payload as text, if valid UTF-8.
    pub fn data_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }
}

/// A fully serialized message ready for the broker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingRawMessage {
    pub topic: String,
    pub key: Option<String>,
    pub data: String,
}

impl OutgoingRawMessage {
    pub fn new(topic: impl Into<String>, key: Option<String>, data: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            key,
            data: data.into(),
        }
    }
}
