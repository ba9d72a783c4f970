use serde_json::Value;

use crate::message::Metadata;

/// Everything needed to serialize one outgoing message.
#[derive(Clone, Debug, PartialEq)]
pub struct PayloadDescriptor {
    pub message_id: String,
    pub topic: String,
    pub partition_key: String,
    pub message_type: String,
    pub data: Value,
    pub headers: Metadata,
}

impl PayloadDescriptor {
    pub fn new(
        message_id: impl Into<String>,
        topic: impl Into<String>,
        partition_key: impl Into<String>,
        message_type: impl Into<String>,
        data: Value,
        headers: Metadata,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            topic: topic.into(),
            partition_key: partition_key.into(),
            message_type: message_type.into(),
            data,
            headers,
        }
    }
}
