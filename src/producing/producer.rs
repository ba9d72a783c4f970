use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::{
    ActiveProducer, BrokerProducer, DispatchMiddleware, MessageIdGenerator,
    OutgoingMessageContext, OutgoingMessageRegistry, PayloadDescriptionMiddleware,
    PayloadDescriptorFactory, SerializationMiddleware,
};
use crate::consuming::MessageHandlerContext;
use crate::error::Error;
use crate::message::{AnyMessage, Metadata, OutgoingMessage};
use crate::middleware::{EndOfPipeline, MiddlewareBuilder, RootContext};
use crate::serializing::TopicPayloadSerializerRegistry;
use crate::services::Services;

/// Publishes single messages straight to the broker.
///
/// Each call runs payload description, serialization and dispatch:
///
/// ```text
/// OutgoingMessage ─► PayloadDescription ─► Serialization ─► Dispatch ─► broker
/// ```
///
/// ```ignore
/// producer.produce(OrderPlaced { order_id: 7 })?;
///
/// // inside a handler: correlation follows the handled message
/// producer.produce_in_context(OrderShipped { order_id: 7 }, ctx)?;
/// ```
#[derive(Clone)]
pub struct Producer {
    name: String,
    broker: Arc<dyn BrokerProducer>,
    services: Services,
    pipeline: MiddlewareBuilder<OutgoingMessageContext, EndOfPipeline>,
}

impl Producer {
    pub const DEFAULT_NAME: &'static str = "__Default Producer__";

    pub fn new(
        name: impl Into<String>,
        broker: Arc<dyn BrokerProducer>,
        registry: Arc<OutgoingMessageRegistry>,
        message_ids: Arc<dyn MessageIdGenerator>,
        serializers: TopicPayloadSerializerRegistry,
        services: Services,
    ) -> Self {
        let factory = PayloadDescriptorFactory::new(registry, message_ids);
        let pipeline = MiddlewareBuilder::<OutgoingMessageContext>::new()
            .register_instance(PayloadDescriptionMiddleware::new(factory))
            .register_instance(SerializationMiddleware::new(serializers))
            .register_instance(DispatchMiddleware);

        Self {
            name: name.into(),
            broker,
            services,
            pipeline,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn produce<T: Any + Send + Sync>(&self, message: T) -> Result<(), Error> {
        self.produce_with(message, Metadata::new())
    }

    pub fn produce_with<T: Any + Send + Sync>(
        &self,
        message: T,
        metadata: Metadata,
    ) -> Result<(), Error> {
        self.produce_outgoing(OutgoingMessage::new(AnyMessage::new(message), metadata))
    }

    pub fn produce_with_headers<T: Any + Send + Sync>(
        &self,
        message: T,
        headers: HashMap<String, String>,
    ) -> Result<(), Error> {
        self.produce_with(message, Metadata::from_headers(headers))
    }

    /// Produce a message caused by the message being handled in `context`.
    pub fn produce_in_context<T: Any + Send + Sync>(
        &self,
        message: T,
        context: &MessageHandlerContext,
    ) -> Result<(), Error> {
        self.produce_in_context_with(message, context, HashMap::new())
    }

    pub fn produce_in_context_with<T: Any + Send + Sync>(
        &self,
        message: T,
        context: &MessageHandlerContext,
        headers: HashMap<String, String>,
    ) -> Result<(), Error> {
        let mut metadata = Metadata::from_headers(headers);
        metadata.set_correlation_id(context.correlation_id());
        metadata.set_causation_id(context.message_id());
        self.produce_with(message, metadata)
    }

    fn produce_outgoing(&self, outgoing: OutgoingMessage) -> Result<(), Error> {
        let scope = Arc::new(self.services.create_scope());
        let root = RootContext::new(scope.clone());
        root.set(ActiveProducer(self.broker.clone()));

        debug!(producer = %self.name, message = outgoing.message.short_type_name(), "Produce");

        let pipeline = self.pipeline.build(&scope);
        pipeline.invoke(OutgoingMessageContext::new(outgoing, root))
    }
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer").field("name", &self.name).finish()
    }
}
