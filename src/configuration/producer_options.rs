use std::any::Any;
use std::sync::Arc;

use serde::Serialize;

use super::keys;
use super::settings::ClientSettings;
use super::{Configuration, ConfigurationKeys, ConfigurationSource, NamingConvention};
use crate::error::Error;
use crate::producing::{
    BrokerProducerFactory, MessageIdGenerator, OutgoingMessageRegistry, UuidMessageIdGenerator,
};
use crate::serializing::{PayloadSerializer, TopicPayloadSerializerRegistry};

/// Options of a named producer.
///
/// ```ignore
/// let configuration = ProducerOptions::new()
///     .with_bootstrap_servers("localhost:9092")
///     .register::<OrderPlaced, _>("orders", "order_placed", |e| e.order_id.to_string())
///     .with_broker_producer_factory(broker.producer_factory())
///     .build()?;
/// producers.configure(Producer::DEFAULT_NAME, configuration)?;
/// ```
pub struct ProducerOptions {
    settings: ClientSettings,
    outgoing_messages: OutgoingMessageRegistry,
    message_ids: Arc<dyn MessageIdGenerator>,
    serializers: TopicPayloadSerializerRegistry,
    broker_factory: Option<Arc<dyn BrokerProducerFactory>>,
}

impl Default for ProducerOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ProducerOptions {
    pub fn new() -> Self {
        Self {
            settings: ClientSettings::new(ConfigurationKeys::producer()),
            outgoing_messages: OutgoingMessageRegistry::new(),
            message_ids: Arc::new(UuidMessageIdGenerator),
            serializers: TopicPayloadSerializerRegistry::default(),
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

    /// Publish `T` to `topic` as `message_type`, partitioned by `key_selector`.
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

    pub fn with_broker_producer_factory(mut self, factory: Arc<dyn BrokerProducerFactory>) -> Self {
        self.broker_factory = Some(factory);
        self
    }

    pub fn build(self) -> Result<ProducerConfiguration, Error> {
        let configuration = self.settings.build()?;
        let broker_factory = self.broker_factory.ok_or_else(|| {
            Error::InvalidConfiguration(
                "No broker producer factory was registered. Use ProducerOptions::with_broker_producer_factory."
                    .to_string(),
            )
        })?;

        Ok(ProducerConfiguration {
            configuration,
            broker_factory,
            outgoing_messages: Arc::new(self.outgoing_messages),
            message_ids: self.message_ids,
            serializers: self.serializers,
        })
    }
}

/// A validated producer, registered under a name in the
/// [`ProducerRegistry`](crate::producing::ProducerRegistry).
#[derive(Clone)]
pub struct ProducerConfiguration {
    pub(crate) configuration: Configuration,
    pub(crate) broker_factory: Arc<dyn BrokerProducerFactory>,
    pub(crate) outgoing_messages: Arc<OutgoingMessageRegistry>,
    pub(crate) message_ids: Arc<dyn MessageIdGenerator>,
    pub(crate) serializers: TopicPayloadSerializerRegistry,
}

impl ProducerConfiguration {
    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn outgoing_messages(&self) -> &OutgoingMessageRegistry {
        &self.outgoing_messages
    }
}

impl std::fmt::Debug for ProducerConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerConfiguration")
            .field("configuration", &self.configuration)
            .field("outgoing_messages", &self.outgoing_messages.len())
            .finish()
    }
}
