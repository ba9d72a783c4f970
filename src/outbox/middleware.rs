use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use super::{OutboxEntry, OutboxEntryRepository};
use crate::error::Error;
use crate::message::OutgoingMessage;
use crate::middleware::{EndOfPipeline, Middleware, MiddlewareContext, Next, RootContext};
use crate::producing::PayloadDescriptorFactory;
use crate::serializing::{PayloadDescriptor, TopicPayloadSerializerRegistry};

/// The repository an enqueue call stores into. Seeded into the root context.
#[derive(Clone)]
pub struct OutboxStorage(pub Arc<dyn OutboxEntryRepository>);

/// A batch of domain messages being enqueued.
pub struct OutboxMessageContext {
    pub messages: Vec<OutgoingMessage>,
    root: RootContext,
}

impl OutboxMessageContext {
    pub fn new(messages: Vec<OutgoingMessage>, root: RootContext) -> Self {
        Self { messages, root }
    }
}

impl MiddlewareContext for OutboxMessageContext {
    fn root(&self) -> &RootContext {
        &self.root
    }
}

pub struct OutboxPayloadDescriptionContext {
    pub descriptors: Vec<PayloadDescriptor>,
    root: RootContext,
}

impl OutboxPayloadDescriptionContext {
    pub fn new(descriptors: Vec<PayloadDescriptor>, root: RootContext) -> Self {
        Self { descriptors, root }
    }
}

impl MiddlewareContext for OutboxPayloadDescriptionContext {
    fn root(&self) -> &RootContext {
        &self.root
    }
}

pub struct OutboxStorageContext {
    pub entries: Vec<OutboxEntry>,
    root: RootContext,
}

impl OutboxStorageContext {
    pub fn new(entries: Vec<OutboxEntry>, root: RootContext) -> Self {
        Self { entries, root }
    }
}

impl MiddlewareContext for OutboxStorageContext {
    fn root(&self) -> &RootContext {
        &self.root
    }
}

pub struct OutboxPayloadDescriptionMiddleware {
    factory: PayloadDescriptorFactory,
}

impl OutboxPayloadDescriptionMiddleware {
    pub fn new(factory: PayloadDescriptorFactory) -> Self {
        Self { factory }
    }
}

impl Middleware<OutboxMessageContext> for OutboxPayloadDescriptionMiddleware {
    type Out = OutboxPayloadDescriptionContext;

    fn invoke(
        &self,
        context: OutboxMessageContext,
        next: Next<'_, OutboxPayloadDescriptionContext>,
    ) -> Result<(), Error> {
        let descriptors = context
            .messages
            .iter()
            .map(|message| self.factory.create(message))
            .collect::<Result<Vec<_>, _>>()?;

        next(OutboxPayloadDescriptionContext::new(descriptors, context.root))
    }
}

pub struct OutboxSerializationMiddleware {
    serializers: TopicPayloadSerializerRegistry,
}

impl OutboxSerializationMiddleware {
    pub fn new(serializers: TopicPayloadSerializerRegistry) -> Self {
        Self { serializers }
    }
}

impl Middleware<OutboxPayloadDescriptionContext> for OutboxSerializationMiddleware {
    type Out = OutboxStorageContext;

    fn invoke(
        &self,
        context: OutboxPayloadDescriptionContext,
        next: Next<'_, OutboxStorageContext>,
    ) -> Result<(), Error> {
        let mut entries = Vec::with_capacity(context.descriptors.len());

        for descriptor in &context.descriptors {
            let payload = self.serializers.get(&descriptor.topic).serialize(descriptor)?;
            let message_id = Uuid::parse_str(&descriptor.message_id).map_err(|e| {
                Error::InvalidConfiguration(format!(
                    "outbox message id \"{}\" is not a UUID: {}",
                    descriptor.message_id, e
                ))
            })?;

            entries.push(OutboxEntry::new(
                message_id,
                descriptor.topic.clone(),
                Some(descriptor.partition_key.clone()),
                payload,
                Utc::now(),
            ));
        }

        next(OutboxStorageContext::new(entries, context.root))
    }
}

/// Adds the entries to the [`OutboxStorage`] found in the context.
#[derive(Clone, Copy, Debug, Default)]
pub struct OutboxStorageMiddleware;

impl Middleware<OutboxStorageContext> for OutboxStorageMiddleware {
    type Out = EndOfPipeline;

    fn invoke(
        &self,
        context: OutboxStorageContext,
        _next: Next<'_, EndOfPipeline>,
    ) -> Result<(), Error> {
        let storage = context.root.require::<OutboxStorage>()?;
        storage.0.add(&context.entries)?;
        debug!(entries = context.entries.len(), "Stored outbox entries");
        Ok(())
    }
}
