use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;

use super::keys;
use super::settings::ClientSettings;
use super::{Configuration, ConfigurationKeys, ConfigurationSource, NamingConvention};
use crate::cancellation::CancellationToken;
use crate::consuming::{
    AcceptAll, BrokerConsumerFactory, Consumer, ConsumerErrorHandler, ConsumerFailureStrategy,
    DeserializationMiddleware, Deserializer, IncomingMessageContext, IncomingRawMessageContext,
    InvocationMiddleware, JsonDeserializer, MessageFilter, MessageFilterMiddleware,
    MessageHandler, MessageHandlerMiddleware, MessageHandlerRegistry, PoisonAwareDeserializer,
    UnconfiguredMessageHandlingStrategy,
};
use crate::error::Error;
use crate::middleware::{EndOfPipeline, Middleware, MiddlewareBuilder};
use crate::services::{Scope, Services};

type Evaluate = Arc<dyn Fn(&Error) -> ConsumerFailureStrategy + Send + Sync>;

/// Options of one consumer group.
///
/// Handler registration errors are kept until [`build`](Self::build), so the
/// options can be chained:
///
/// ```ignore
/// let consumer = ConsumerOptions::new()
///     .with_group_id("order-service")
///     .with_bootstrap_servers("localhost:9092")
///     .with_poison_message_handling()
///     .register_message_handler::<OrderPlaced, _>("orders", "order_placed", OrderPlacedHandler)
///     .with_broker_consumer_factory(broker.consumer_factory())
///     .build()?;
/// ```
pub struct ConsumerOptions {
    settings: ClientSettings,
    handlers: MessageHandlerRegistry,
    registration_error: Option<Error>,
    deserializer: Arc<dyn Deserializer>,
    poison_message_handling: bool,
    filter: Arc<dyn MessageFilter>,
    unconfigured: Option<Arc<dyn UnconfiguredMessageHandlingStrategy>>,
    evaluate: Evaluate,
    middleware: MiddlewareBuilder<IncomingMessageContext>,
    client_factory: Option<Arc<dyn BrokerConsumerFactory>>,
    read_from_beginning: bool,
    restart_delay: Duration,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsumerOptions {
    pub fn new() -> Self {
        Self {
            settings: ClientSettings::new(ConfigurationKeys::consumer()),
            handlers: MessageHandlerRegistry::new(),
            registration_error: None,
            deserializer: Arc::new(JsonDeserializer),
            poison_message_handling: false,
            filter: Arc::new(AcceptAll),
            unconfigured: None,
            evaluate: Arc::new(|_: &Error| ConsumerFailureStrategy::Default),
            middleware: MiddlewareBuilder::new(),
            client_factory: None,
            read_from_beginning: false,
            restart_delay: Consumer::DEFAULT_RESTART_DELAY,
        }
    }

    pub fn with_configuration(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.set(key, value);
        self
    }

    pub fn with_group_id(self, group_id: impl Into<String>) -> Self {
        self.with_configuration(keys::GROUP_ID, group_id)
    }

    pub fn with_bootstrap_servers(self, bootstrap_servers: impl Into<String>) -> Self {
        self.with_configuration(keys::BOOTSTRAP_SERVERS, bootstrap_servers)
    }

    pub fn with_configuration_source(mut self, source: Arc<dyn ConfigurationSource>) -> Self {
        self.settings.source(source);
        self
    }

    pub fn with_naming_convention(mut self, convention: NamingConvention) -> Self {
        self.settings.naming_convention(convention);
        self
    }

    /// Look keys up environment style, e.g. `SAMPLE_GROUP_ID` for prefix
    /// `sample`, then under each additional prefix.
    pub fn with_environment_style(mut self, prefix: Option<&str>, additional_prefixes: &[&str]) -> Self {
        self.settings.environment_style(prefix, additional_prefixes);
        self
    }

    /// Start from the beginning of each topic instead of the committed offset.
    pub fn read_from_beginning(mut self) -> Self {
        self.read_from_beginning = true;
        self
    }

    /// Register `handler` for every message of `message_type` on `topic`.
    pub fn register_message_handler<M, H>(
        mut self,
        topic: impl Into<String>,
        message_type: impl Into<String>,
        handler: H,
    ) -> Self
    where
        M: DeserializeOwned + 'static,
        H: MessageHandler<M> + 'static,
    {
        let result = self.handlers.register::<M, H>(topic, message_type, handler);
        self.keep_first_error(result)
    }

    /// Register a handler created by `factory` from each message's scope.
    pub fn register_scoped_message_handler<M, H, F>(
        mut self,
        topic: impl Into<String>,
        message_type: impl Into<String>,
        factory: F,
    ) -> Self
    where
        M: DeserializeOwned + 'static,
        H: MessageHandler<M> + 'static,
        F: Fn(&Scope) -> Result<H, Error> + Send + Sync + 'static,
    {
        let result = self
            .handlers
            .register_scoped::<M, H, F>(topic, message_type, factory);
        self.keep_first_error(result)
    }

    /// Register a handler resolved as `H` from each message's scope.
    pub fn register_resolved_message_handler<M, H>(
        mut self,
        topic: impl Into<String>,
        message_type: impl Into<String>,
    ) -> Self
    where
        M: DeserializeOwned + 'static,
        H: MessageHandler<M> + std::any::Any + 'static,
    {
        let result = self
            .handlers
            .register_resolved::<M, H>(topic, message_type);
        self.keep_first_error(result)
    }

    fn keep_first_error(mut self, result: Result<(), Error>) -> Self {
        if let Err(err) = result {
            self.registration_error.get_or_insert(err);
        }
        self
    }

    pub fn with_deserializer(mut self, deserializer: impl Deserializer + 'static) -> Self {
        self.deserializer = Arc::new(deserializer);
        self
    }

    /// Deliver envelopes that cannot be read as
    /// [`TransportLevelPoisonMessage`](crate::consuming::TransportLevelPoisonMessage)s
    /// instead of failing the consumer.
    pub fn with_poison_message_handling(mut self) -> Self {
        self.poison_message_handling = true;
        self
    }

    pub fn with_message_filter(mut self, filter: impl MessageFilter + 'static) -> Self {
        self.filter = Arc::new(filter);
        self
    }

    pub fn with_unconfigured_message_handling_strategy(
        mut self,
        strategy: impl UnconfiguredMessageHandlingStrategy + 'static,
    ) -> Self {
        self.unconfigured = Some(Arc::new(strategy));
        self
    }

    /// Decide what happens when the consume loop fails. The default stops
    /// the application.
    pub fn with_consumer_error_handler<F>(mut self, evaluate: F) -> Self
    where
        F: Fn(&Error) -> ConsumerFailureStrategy + Send + Sync + 'static,
    {
        self.evaluate = Arc::new(evaluate);
        self
    }

    /// Add a middleware that runs after the message filter and before the
    /// handler lookup.
    pub fn with_incoming_message_middleware<M>(mut self, middleware: M) -> Self
    where
        M: Middleware<IncomingMessageContext, Out = IncomingMessageContext> + 'static,
    {
        self.middleware = self.middleware.register_instance(middleware);
        self
    }

    /// Like [`with_incoming_message_middleware`](Self::with_incoming_message_middleware),
    /// creating the middleware per message from its scope.
    pub fn with_incoming_message_middleware_factory<M, F>(mut self, factory: F) -> Self
    where
        M: Middleware<IncomingMessageContext, Out = IncomingMessageContext> + 'static,
        F: Fn(&Scope) -> M + Send + Sync + 'static,
    {
        self.middleware = self.middleware.register(factory);
        self
    }

    /// Pause between a failure and the restart it triggers.
    pub fn with_restart_delay(mut self, restart_delay: Duration) -> Self {
        self.restart_delay = restart_delay;
        self
    }

    pub fn with_broker_consumer_factory(mut self, factory: Arc<dyn BrokerConsumerFactory>) -> Self {
        self.client_factory = Some(factory);
        self
    }

    pub fn build(self) -> Result<ConsumerConfiguration, Error> {
        let configuration = self.settings.build()?;
        if let Some(err) = self.registration_error {
            return Err(err);
        }
        let client_factory = self.client_factory.ok_or_else(|| {
            Error::InvalidConfiguration(
                "No broker consumer factory was registered. Use ConsumerOptions::with_broker_consumer_factory."
                    .to_string(),
            )
        })?;

        let deserializer: Arc<dyn Deserializer> = if self.poison_message_handling {
            Arc::new(PoisonAwareDeserializer::new(self.deserializer))
        } else {
            self.deserializer
        };

        let handlers = Arc::new(self.handlers);
        let pipeline = MiddlewareBuilder::<IncomingRawMessageContext>::new()
            .register_instance(DeserializationMiddleware::new(deserializer))
            .register_instance(MessageFilterMiddleware::new(self.filter))
            .append(self.middleware)
            .register_instance(MessageHandlerMiddleware::new(
                handlers.clone(),
                self.unconfigured,
            ))
            .register_instance(InvocationMiddleware);

        Ok(ConsumerConfiguration {
            topics: handlers.subscribed_topics(),
            configuration,
            handlers,
            pipeline,
            client_factory,
            read_from_beginning: self.read_from_beginning,
            restart_delay: self.restart_delay,
            evaluate: self.evaluate,
        })
    }
}

/// A validated consumer group, ready to be turned into a [`Consumer`].
#[derive(Clone)]
pub struct ConsumerConfiguration {
    configuration: Configuration,
    topics: Vec<String>,
    handlers: Arc<MessageHandlerRegistry>,
    pipeline: MiddlewareBuilder<IncomingRawMessageContext, EndOfPipeline>,
    client_factory: Arc<dyn BrokerConsumerFactory>,
    read_from_beginning: bool,
    restart_delay: Duration,
    evaluate: Evaluate,
}

impl ConsumerConfiguration {
    pub fn group_id(&self) -> &str {
        self.configuration.group_id().unwrap_or_default()
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn handlers(&self) -> &MessageHandlerRegistry {
        &self.handlers
    }

    pub fn pipeline(&self) -> &MiddlewareBuilder<IncomingRawMessageContext, EndOfPipeline> {
        &self.pipeline
    }

    pub fn consumer(&self, services: Services) -> Consumer {
        Consumer::new(
            self.configuration.clone(),
            self.client_factory.clone(),
            services,
            self.pipeline.clone(),
            self.topics.clone(),
        )
        .with_read_from_beginning(self.read_from_beginning)
        .with_restart_delay(self.restart_delay)
    }

    pub fn error_handler(&self, application_lifetime: CancellationToken) -> ConsumerErrorHandler {
        let evaluate = self.evaluate.clone();
        ConsumerErrorHandler::new(move |err: &Error| evaluate(err), application_lifetime)
    }
}

impl std::fmt::Debug for ConsumerConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerConfiguration")
            .field("configuration", &self.configuration)
            .field("topics", &self.topics)
            .field("read_from_beginning", &self.read_from_beginning)
            .finish()
    }
}
