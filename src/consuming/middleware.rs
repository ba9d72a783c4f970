use std::sync::Arc;

use tracing::{debug, trace};

use super::registry::UnconfiguredInvoker;
use super::{
    Deserializer, IncomingMessage, MessageFilter, MessageHandlerContext, MessageHandlerInvoker,
    MessageHandlerRegistry, UnconfiguredMessageHandlingStrategy,
};
use crate::error::Error;
use crate::message::RawMessage;
use crate::middleware::{EndOfPipeline, Middleware, MiddlewareContext, Next, RootContext};

/// A message exactly as the broker delivered it.
pub struct IncomingRawMessageContext {
    pub message: RawMessage,
    root: RootContext,
}

impl IncomingRawMessageContext {
    pub fn new(message: RawMessage, root: RootContext) -> Self {
        Self { message, root }
    }
}

impl MiddlewareContext for IncomingRawMessageContext {
    fn root(&self) -> &RootContext {
        &self.root
    }
}

/// A deserialized envelope.
pub struct IncomingMessageContext {
    pub message: IncomingMessage,
    root: RootContext,
}

impl IncomingMessageContext {
    pub fn new(message: IncomingMessage, root: RootContext) -> Self {
        Self { message, root }
    }
}

impl MiddlewareContext for IncomingMessageContext {
    fn root(&self) -> &RootContext {
        &self.root
    }
}

/// A message paired with the handler that will receive it.
pub struct InvocationContext {
    pub message: IncomingMessage,
    pub handler: Arc<dyn MessageHandlerInvoker>,
    pub handler_context: MessageHandlerContext,
    root: RootContext,
}

impl InvocationContext {
    pub fn new(
        message: IncomingMessage,
        handler: Arc<dyn MessageHandlerInvoker>,
        handler_context: MessageHandlerContext,
        root: RootContext,
    ) -> Self {
        Self {
            message,
            handler,
            handler_context,
            root,
        }
    }
}

impl MiddlewareContext for InvocationContext {
    fn root(&self) -> &RootContext {
        &self.root
    }
}

pub struct DeserializationMiddleware {
    deserializer: Arc<dyn Deserializer>,
}

impl DeserializationMiddleware {
    pub fn new(deserializer: Arc<dyn Deserializer>) -> Self {
        Self { deserializer }
    }
}

impl Middleware<IncomingRawMessageContext> for DeserializationMiddleware {
    type Out = IncomingMessageContext;

    fn invoke(
        &self,
        context: IncomingRawMessageContext,
        next: Next<'_, IncomingMessageContext>,
    ) -> Result<(), Error> {
        let message = self.deserializer.deserialize(&context.message)?;
        next(IncomingMessageContext::new(message, context.root))
    }
}

/// Stops messages the filter rejects. A rejected message completes
/// successfully, so it is still committed.
pub struct MessageFilterMiddleware {
    filter: Arc<dyn MessageFilter>,
}

impl MessageFilterMiddleware {
    pub fn new(filter: Arc<dyn MessageFilter>) -> Self {
        Self { filter }
    }
}

impl Middleware<IncomingMessageContext> for MessageFilterMiddleware {
    type Out = IncomingMessageContext;

    fn invoke(
        &self,
        context: IncomingMessageContext,
        next: Next<'_, IncomingMessageContext>,
    ) -> Result<(), Error> {
        if !self.filter.can_accept(&context.message) {
            debug!(
                message_type = context.message.message_type(),
                message_id = context.message.message_id(),
                "Message rejected by filter"
            );
            return Ok(());
        }
        next(context)
    }
}

/// Looks up the handler for the message type and resolves it from the
/// message's scope.
pub struct MessageHandlerMiddleware {
    registry: Arc<MessageHandlerRegistry>,
    unconfigured: Option<Arc<dyn UnconfiguredMessageHandlingStrategy>>,
}

impl MessageHandlerMiddleware {
    pub fn new(
        registry: Arc<MessageHandlerRegistry>,
        unconfigured: Option<Arc<dyn UnconfiguredMessageHandlingStrategy>>,
    ) -> Self {
        Self {
            registry,
            unconfigured,
        }
    }
}

impl Middleware<IncomingMessageContext> for MessageHandlerMiddleware {
    type Out = InvocationContext;

    fn invoke(
        &self,
        context: IncomingMessageContext,
        next: Next<'_, InvocationContext>,
    ) -> Result<(), Error> {
        let message_type = context.message.message_type();
        let scope = context.scope().clone();

        let handler: Arc<dyn MessageHandlerInvoker> =
            match (self.registry.registration_for(message_type), &self.unconfigured) {
                (Some(registration), _) => registration.resolve_handler(&scope)?,
                (None, Some(strategy)) => Arc::new(UnconfiguredInvoker(strategy.clone())),
                (None, None) => {
                    return Err(Error::MissingMessageHandlerRegistration(
                        message_type.to_string(),
                    ))
                }
            };

        let handler_context = MessageHandlerContext::new(context.message.metadata().clone(), scope);
        next(InvocationContext::new(
            context.message,
            handler,
            handler_context,
            context.root,
        ))
    }
}

/// Calls the resolved handler. Always the last step.
#[derive(Clone, Copy, Debug, Default)]
pub struct InvocationMiddleware;

impl Middleware<InvocationContext> for InvocationMiddleware {
    type Out = EndOfPipeline;

    fn invoke(&self, context: InvocationContext, _next: Next<'_, EndOfPipeline>) -> Result<(), Error> {
        trace!(
            message_type = context.message.message_type(),
            message_id = context.message.message_id(),
            "Invoking handler"
        );
        context
            .handler
            .invoke(&context.message, &context.handler_context)
    }
}
