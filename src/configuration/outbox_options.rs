use std::any::Any;
use std::sync::Arc;

use serde::Serialize;

use super::keys;
use super::settings::ClientSettings;
use super::{Configuration, ConfigurationKeys, ConfigurationSource, NamingConvention};
use crate::error::Error;
use crate::outbox::{
    NullOutboxNotifier, OutboxDispatcher, OutboxEntryRepository, OutboxListener, OutboxNotifier,
    OutboxProducer, OutboxQueue, OutboxUnitOfWorkFactory,
};
use crate::producing::{
    BrokerProducerFactory, MessageIdGenerator, OutgoingMessageRegistry, PayloadDescriptorFactory,
    UuidMessageIdGenerator,
};
use crate::serializing::{PayloadSerializer, TopicPayloadSerializerRegistry};
use crate::services::Services;

/// Options of the capture side of the outbox.
///
/// ```ignore
/// let outbox = OutboxOptions::new()
///     .register::<OrderPlaced, _>("orders", "order_placed", |e| e.order_id.to_string())
///     .with_notifier(notification.clone())
///     .build();
///
/// let queue = outbox.queue(Arc::new(tx.clone()), services.clone());
/// ```
pub struct OutboxOptions {
    outgoing_messages: OutgoingMessageRegistry,
    message_ids: Arc<dyn MessageIdGenerator>,
    serializers: TopicPayloadSerializerRegistry,
    notifier: Arc<dyn OutboxNotifier>,
}

impl Default for OutboxOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl OutboxOptions {
    pub fn new() -> Self {
        Self {
            outgoing_messages: OutgoingMessageRegistry::new(),
            message_ids: Arc::new(UuidMessageIdGenerator),
            serializers: TopicPayloadSerializerRegistry::default(),
            notifier: Arc::new(NullOutboxNotifier),
        }
    }

    pub fn register<T, K>(
        mut self,
        topic: impl Into<String>,
        message_type: impl Into<String>,
        key_selector: K,
    ) -> Self
    where
        T: Serialize + Any + Send + Sync,
        K: Fn(&T) -> String + Send + Sync + 'static,
    {
        self.outgoing_messages
            .register::<T, K>(topic, message_type, key_selector);
        self
    }

    /// Ids must parse as UUIDs to be stored in the outbox.
    pub fn with_message_id_generator(mut self, generator: impl MessageIdGenerator + 'static) -> Self {
        self.message_ids = Arc::new(generator);
        self
    }

    pub fn with_default_payload_serializer(mut self, serializer: Arc<dyn PayloadSerializer>) -> Self {
        self.serializers.set_default(serializer);
        self
    }

    pub fn with_payload_serializer(
        mut self,
        topic: impl Into<String>,
        serializer: Arc<dyn PayloadSerializer>,
    ) -> Self {
        self.serializers.register(topic, serializer);
        self
    }

    /// Without a notifier the dispatcher only picks up entries when its
    /// listener times out.
    pub fn with_notifier(mut self, notifier: Arc<dyn OutboxNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn build(self) -> OutboxConfiguration {
        OutboxConfiguration {
            descriptors: PayloadDescriptorFactory::new(
                Arc::new(self.outgoing_messages),
                self.message_ids,
            ),
            serializers: self.serializers,
            notifier: self.notifier,
        }
    }
}

/// Everything needed to open an [`OutboxQueue`] on a repository.
#[derive(Clone)]
pub struct OutboxConfiguration {
    descriptors: PayloadDescriptorFactory,
    serializers: TopicPayloadSerializerRegistry,
    notifier: Arc<dyn OutboxNotifier>,
}

impl OutboxConfiguration {
    pub fn notifier(&self) -> Arc<dyn OutboxNotifier> {
        self.notifier.clone()
    }

    /// A queue writing to `repository`, usually a transaction of the
    /// caller's unit of work.
    pub fn queue(&self, repository: Arc<dyn OutboxEntryRepository>, services: Services) -> OutboxQueue {
        OutboxQueue::new(
            repository,
            self.descriptors.clone(),
            self.serializers.clone(),
            self.notifier.clone(),
            services,
        )
    }
}

impl std::fmt::Debug for OutboxConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboxConfiguration").finish_non_exhaustive()
    }
}

/// Options of the drain side of the outbox.
pub struct OutboxProducerOptions {
    settings: ClientSettings,
    unit_of_work_factory: Option<Arc<dyn OutboxUnitOfWorkFactory>>,
    listener: Option<Arc<dyn OutboxListener>>,
    broker_factory: Option<Arc<dyn BrokerProducerFactory>>,
}

impl Default for OutboxProducerOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl OutboxProducerOptions {
    pub fn new() -> Self {
        Self {
            settings: ClientSettings::new(ConfigurationKeys::producer()),
            unit_of_work_factory: None,
            listener: None,
            broker_factory: None,
        }
    }

    pub fn with_configuration(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.set(key, value);
        self
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

    pub fn with_environment_style(mut self, prefix: Option<&str>, additional_prefixes: &[&str]) -> Self {
        self.settings.environment_style(prefix, additional_prefixes);
        self
    }

    pub fn with_unit_of_work_factory(mut self, factory: Arc<dyn OutboxUnitOfWorkFactory>) -> Self {
        self.unit_of_work_factory = Some(factory);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn OutboxListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn with_broker_producer_factory(mut self, factory: Arc<dyn BrokerProducerFactory>) -> Self {
        self.broker_factory = Some(factory);
        self
    }

    pub fn build(self) -> Result<OutboxProducerConfiguration, Error> {
        let configuration = self.settings.build()?;

        let listener = self.listener.ok_or_else(|| {
            Error::InvalidConfiguration(
                "No OutboxListener was registered. Please use with_listener on the outbox producer options."
                    .to_string(),
            )
        })?;
        let unit_of_work_factory = self.unit_of_work_factory.ok_or_else(|| {
            Error::InvalidConfiguration(
                "No OutboxUnitOfWorkFactory was registered. Please use with_unit_of_work_factory on the outbox producer options."
                    .to_string(),
            )
        })?;
        let broker_factory = self.broker_factory.ok_or_else(|| {
            Error::InvalidConfiguration(
                "No broker producer factory was registered. Please use with_broker_producer_factory on the outbox producer options."
                    .to_string(),
            )
        })?;

        Ok(OutboxProducerConfiguration {
            configuration,
            unit_of_work_factory,
            listener,
            broker_factory,
        })
    }
}

/// A validated outbox producer.
#[derive(Clone)]
pub struct OutboxProducerConfiguration {
    configuration: Configuration,
    unit_of_work_factory: Arc<dyn OutboxUnitOfWorkFactory>,
    listener: Arc<dyn OutboxListener>,
    broker_factory: Arc<dyn BrokerProducerFactory>,
}

impl OutboxProducerConfiguration {
    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn listener(&self) -> Arc<dyn OutboxListener> {
        self.listener.clone()
    }

    /// Opens the broker client and wires the dispatcher.
    pub fn dispatcher(&self, services: Services) -> Result<OutboxDispatcher, Error> {
        let broker = self.broker_factory.create(&self.configuration)?;
        Ok(OutboxDispatcher::new(
            self.unit_of_work_factory.clone(),
            OutboxProducer::new(broker, services),
        ))
    }
}

impl std::fmt::Debug for OutboxProducerConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboxProducerConfiguration")
            .field("configuration", &self.configuration)
            .finish_non_exhaustive()
    }
}
