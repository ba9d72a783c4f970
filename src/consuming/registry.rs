use std::any::{type_name, Any};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;

use super::{IncomingMessage, MessageHandler, MessageHandlerContext};
use crate::error::Error;
use crate::services::Scope;

/// A resolved handler, erased over the message type it reads.
pub trait MessageHandlerInvoker: Send + Sync {
    fn invoke(&self, message: &IncomingMessage, context: &MessageHandlerContext)
        -> Result<(), Error>;
}

struct TypedInvoker<M, H: ?Sized> {
    handler: Arc<H>,
    _message: PhantomData<fn(M)>,
}

impl<M, H> MessageHandlerInvoker for TypedInvoker<M, H>
where
    M: DeserializeOwned,
    H: MessageHandler<M> + ?Sized,
{
    fn invoke(
        &self,
        message: &IncomingMessage,
        context: &MessageHandlerContext,
    ) -> Result<(), Error> {
        let instance = message.read_data_as::<M>()?;
        self.handler
            .handle(instance, context)
            .map_err(Error::handler)
    }
}

type Resolve = Arc<dyn Fn(&Scope) -> Result<Arc<dyn MessageHandlerInvoker>, Error> + Send + Sync>;

/// Binds a topic and message type name to the handler for that type.
#[derive(Clone)]
pub struct MessageRegistration {
    topic: String,
    message_type: String,
    handler_type: &'static str,
    message_instance_type: &'static str,
    resolve: Resolve,
}

impl MessageRegistration {
    fn new<M>(
        topic: String,
        message_type: String,
        handler_type: &'static str,
        resolve: Resolve,
    ) -> Result<Self, Error> {
        if topic.trim().is_empty() {
            return Err(Error::MessageRegistration(format!(
                "Topic must have a value (message type \"{}\", handler \"{}\").",
                message_type, handler_type
            )));
        }
        if message_type.trim().is_empty() {
            return Err(Error::MessageRegistration(format!(
                "Message type must have a value (topic \"{}\", handler \"{}\").",
                topic, handler_type
            )));
        }

        Ok(Self {
            topic,
            message_type,
            handler_type,
            message_instance_type: type_name::<M>(),
            resolve,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    pub fn handler_type(&self) -> &'static str {
        self.handler_type
    }

    pub fn message_instance_type(&self) -> &'static str {
        self.message_instance_type
    }

    /// Produce the handler for one message, using that message's scope.
    pub fn resolve_handler(&self, scope: &Scope) -> Result<Arc<dyn MessageHandlerInvoker>, Error> {
        (self.resolve)(scope)
    }
}

impl std::fmt::Debug for MessageRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRegistration")
            .field("topic", &self.topic)
            .field("message_type", &self.message_type)
            .field("handler_type", &self.handler_type)
            .field("message_instance_type", &self.message_instance_type)
            .finish()
    }
}

/// The handlers of one consumer, one per message type name.
///
/// ```ignore
/// let mut registry = MessageHandlerRegistry::new();
/// registry.register::<OrderPlaced, _>("orders", "order_placed", on_order_placed)?;
/// registry.register_scoped::<PaymentTaken, _, _>("payments", "payment_taken", |scope| {
///     Ok(PaymentHandler::new(scope.resolve::<UnitOfWork>()?))
/// })?;
/// ```
#[derive(Clone, Debug, Default)]
pub struct MessageHandlerRegistry {
    registrations: Vec<MessageRegistration>,
    by_type: HashMap<String, usize>,
}

impl MessageHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler instance shared by every message.
    pub fn register<M, H>(
        &mut self,
        topic: impl Into<String>,
        message_type: impl Into<String>,
        handler: H,
    ) -> Result<(), Error>
    where
        M: DeserializeOwned + 'static,
        H: MessageHandler<M> + 'static,
    {
        let invoker: Arc<dyn MessageHandlerInvoker> = Arc::new(TypedInvoker::<M, H> {
            handler: Arc::new(handler),
            _message: PhantomData,
        });
        self.add::<M>(
            topic.into(),
            message_type.into(),
            type_name::<H>(),
            Arc::new(move |_: &Scope| Ok::<_, Error>(invoker.clone())),
        )
    }

    /// Register a handler created per message from that message's scope.
    pub fn register_scoped<M, H, F>(
        &mut self,
        topic: impl Into<String>,
        message_type: impl Into<String>,
        factory: F,
    ) -> Result<(), Error>
    where
        M: DeserializeOwned + 'static,
        H: MessageHandler<M> + 'static,
        F: Fn(&Scope) -> Result<H, Error> + Send + Sync + 'static,
    {
        self.add::<M>(
            topic.into(),
            message_type.into(),
            type_name::<H>(),
            Arc::new(move |scope: &Scope| -> Result<Arc<dyn MessageHandlerInvoker>, Error> {
                let handler = factory(scope)?;
                Ok(Arc::new(TypedInvoker::<M, H> {
                    handler: Arc::new(handler),
                    _message: PhantomData,
                }))
            }),
        )
    }

    /// Register a handler resolved from the services of each message's scope.
    pub fn register_resolved<M, H>(
        &mut self,
        topic: impl Into<String>,
        message_type: impl Into<String>,
    ) -> Result<(), Error>
    where
        M: DeserializeOwned + 'static,
        H: MessageHandler<M> + Any + 'static,
    {
        self.add::<M>(
            topic.into(),
            message_type.into(),
            type_name::<H>(),
            Arc::new(|scope: &Scope| -> Result<Arc<dyn MessageHandlerInvoker>, Error> {
                let handler = scope.resolve::<H>()?;
                Ok(Arc::new(TypedInvoker::<M, H> {
                    handler,
                    _message: PhantomData,
                }))
            }),
        )
    }

    fn add<M>(
        &mut self,
        topic: String,
        message_type: String,
        handler_type: &'static str,
        resolve: Resolve,
    ) -> Result<(), Error> {
        if let Some(existing) = self.registration_for(&message_type) {
            return Err(Error::MessageRegistration(format!(
                "A handler for message type \"{}\" is already registered (\"{}\" on topic \"{}\").",
                message_type, existing.handler_type, existing.topic
            )));
        }

        let registration = MessageRegistration::new::<M>(topic, message_type, handler_type, resolve)?;
        debug!(
            topic = %registration.topic,
            message_type = %registration.message_type,
            handler = registration.handler_type,
            "Registered message handler"
        );

        self.by_type
            .insert(registration.message_type.clone(), self.registrations.len());
        self.registrations.push(registration);
        Ok(())
    }

    pub fn registration_for(&self, message_type: &str) -> Option<&MessageRegistration> {
        self.by_type
            .get(message_type)
            .and_then(|&index| self.registrations.get(index))
    }

    pub fn registrations(&self) -> &[MessageRegistration] {
        &self.registrations
    }

    /// Every topic with at least one registration, in registration order.
    pub fn subscribed_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = Vec::new();
        for registration in &self.registrations {
            if !topics.contains(&registration.topic) {
                topics.push(registration.topic.clone());
            }
        }
        topics
    }
}

/// Decides what happens to messages whose type has no registered handler.
pub trait UnconfiguredMessageHandlingStrategy: Send + Sync {
    fn handle(&self, message: &IncomingMessage, context: &MessageHandlerContext)
        -> Result<(), Error>;
}

/// Fails with `MissingMessageHandlerRegistration`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequireExplicitHandlers;

impl UnconfiguredMessageHandlingStrategy for RequireExplicitHandlers {
    fn handle(
        &self,
        message: &IncomingMessage,
        _context: &MessageHandlerContext,
    ) -> Result<(), Error> {
        Err(Error::MissingMessageHandlerRegistration(
            message.message_type().to_string(),
        ))
    }
}

/// Skips the message so it is committed without being handled.
#[derive(Clone, Copy, Debug, Default)]
pub struct IgnoreUnconfiguredMessages;

impl UnconfiguredMessageHandlingStrategy for IgnoreUnconfiguredMessages {
    fn handle(
        &self,
        message: &IncomingMessage,
        _context: &MessageHandlerContext,
    ) -> Result<(), Error> {
        debug!(
            message_type = message.message_type(),
            message_id = message.message_id(),
            "Ignoring message without a registered handler"
        );
        Ok(())
    }
}

pub(crate) struct UnconfiguredInvoker(pub(crate) Arc<dyn UnconfiguredMessageHandlingStrategy>);

impl MessageHandlerInvoker for UnconfiguredInvoker {
    fn invoke(
        &self,
        message: &IncomingMessage,
        context: &MessageHandlerContext,
    ) -> Result<(), Error> {
        self.0.handle(message, context)
    }
}
