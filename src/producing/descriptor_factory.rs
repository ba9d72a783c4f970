use std::sync::Arc;

use super::{MessageIdGenerator, OutgoingMessageRegistry};
use crate::error::Error;
use crate::message::OutgoingMessage;
use crate::serializing::PayloadDescriptor;

/// Resolves topic, key and type of an outgoing message and fills in the
/// message, correlation and causation ids.
///
/// Missing ids default to the message id, so the first message of a causal
/// chain correlates with itself.
#[derive(Clone)]
pub struct PayloadDescriptorFactory {
    registry: Arc<OutgoingMessageRegistry>,
    message_ids: Arc<dyn MessageIdGenerator>,
}

impl PayloadDescriptorFactory {
    pub fn new(
        registry: Arc<OutgoingMessageRegistry>,
        message_ids: Arc<dyn MessageIdGenerator>,
    ) -> Self {
        Self {
            registry,
            message_ids,
        }
    }

    pub fn create(&self, outgoing: &OutgoingMessage) -> Result<PayloadDescriptor, Error> {
        let registration = self
            .registry
            .registration_for(&outgoing.message)
            .ok_or_else(|| {
                Error::UnregisteredOutgoingMessage(outgoing.message.short_type_name().to_string())
            })?;

        let message_id = outgoing
            .metadata
            .message_id()
            .map(str::to_string)
            .unwrap_or_else(|| self.message_ids.next_message_id());

        let mut headers = outgoing.metadata.clone();
        if headers.causation_id().is_none() {
            headers.set_causation_id(message_id.clone());
        }
        if headers.correlation_id().is_none() {
            headers.set_correlation_id(message_id.clone());
        }

        let (partition_key, data) = registration.describe(&outgoing.message)?;

        Ok(PayloadDescriptor::new(
            message_id,
            registration.topic(),
            partition_key,
            registration.message_type(),
            data,
            headers,
        ))
    }
}
