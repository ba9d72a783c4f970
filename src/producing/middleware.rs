use tracing::{debug, error};

use super::{ActiveProducer, PayloadDescriptorFactory};
use crate::error::Error;
use crate::message::{OutgoingMessage, OutgoingRawMessage};
use crate::middleware::{EndOfPipeline, Middleware, MiddlewareContext, Next, RootContext};
use crate::serializing::{PayloadDescriptor, TopicPayloadSerializerRegistry};

/// An outgoing message before its payload is described.
pub struct OutgoingMessageContext {
    pub message: OutgoingMessage,
    root: RootContext,
}

impl OutgoingMessageContext {
    pub fn new(message: OutgoingMessage, root: RootContext) -> Self {
        Self { message, root }
    }
}

impl MiddlewareContext for OutgoingMessageContext {
    fn root(&self) -> &RootContext {
        &self.root
    }
}

/// A described message awaiting serialization.
pub struct PayloadDescriptorContext {
    pub descriptor: PayloadDescriptor,
    root: RootContext,
}

impl PayloadDescriptorContext {
    pub fn new(descriptor: PayloadDescriptor, root: RootContext) -> Self {
        Self { descriptor, root }
    }
}

impl MiddlewareContext for PayloadDescriptorContext {
    fn root(&self) -> &RootContext {
        &self.root
    }
}

/// A serialized message awaiting dispatch.
pub struct OutgoingRawMessageContext {
    pub message: OutgoingRawMessage,
    root: RootContext,
}

impl OutgoingRawMessageContext {
    pub fn new(message: OutgoingRawMessage, root: RootContext) -> Self {
        Self { message, root }
    }
}

impl MiddlewareContext for OutgoingRawMessageContext {
    fn root(&self) -> &RootContext {
        &self.root
    }
}

pub struct PayloadDescriptionMiddleware {
    factory: PayloadDescriptorFactory,
}

impl PayloadDescriptionMiddleware {
    pub fn new(factory: PayloadDescriptorFactory) -> Self {
        Self { factory }
    }
}

impl Middleware<OutgoingMessageContext> for PayloadDescriptionMiddleware {
    type Out = PayloadDescriptorContext;

    fn invoke(
        &self,
        context: OutgoingMessageContext,
        next: Next<'_, PayloadDescriptorContext>,
    ) -> Result<(), Error> {
        let descriptor = self.factory.create(&context.message)?;
        next(PayloadDescriptorContext::new(descriptor, context.root))
    }
}

pub struct SerializationMiddleware {
    serializers: TopicPayloadSerializerRegistry,
}

impl SerializationMiddleware {
    pub fn new(serializers: TopicPayloadSerializerRegistry) -> Self {
        Self { serializers }
    }
}

impl Middleware<PayloadDescriptorContext> for SerializationMiddleware {
    type Out = OutgoingRawMessageContext;

    fn invoke(
        &self,
        context: PayloadDescriptorContext,
        next: Next<'_, OutgoingRawMessageContext>,
    ) -> Result<(), Error> {
        let descriptor = &context.descriptor;
        let data = self.serializers.get(&descriptor.topic).serialize(descriptor)?;
        let message = OutgoingRawMessage::new(
            descriptor.topic.clone(),
            Some(descriptor.partition_key.clone()),
            data,
        );
        next(OutgoingRawMessageContext::new(message, context.root))
    }
}

/// Hands the serialized message to the broker client found in the context.
#[derive(Clone, Copy, Debug, Default)]
pub struct DispatchMiddleware;

impl Middleware<OutgoingRawMessageContext> for DispatchMiddleware {
    type Out = EndOfPipeline;

    fn invoke(
        &self,
        context: OutgoingRawMessageContext,
        _next: Next<'_, EndOfPipeline>,
    ) -> Result<(), Error> {
        let producer = context.root.require::<ActiveProducer>()?;
        let message = &context.message;

        debug!(topic = %message.topic, key = ?message.key, "Producing message");

        producer.0.produce(message).map_err(|e| {
            error!(
                topic = %message.topic,
                reason = %e.reason,
                code = %e.code,
                "Error publishing message due to: {} ({})",
                e.reason,
                e.code
            );
            Error::Produce(e)
        })
    }
}
