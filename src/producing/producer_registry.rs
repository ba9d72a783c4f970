use std::any::type_name;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use super::{BrokerProducer, Producer};
use crate::configuration::ProducerConfiguration;
use crate::error::Error;
use crate::services::Services;

struct ProducerFactory {
    name: String,
    configuration: ProducerConfiguration,
    broker: Mutex<Option<Arc<dyn BrokerProducer>>>,
}

impl ProducerFactory {
    fn create(&self, services: &Services) -> Result<Producer, Error> {
        let broker = self.broker()?;
        let configuration = &self.configuration;
        Ok(Producer::new(
            self.name.clone(),
            broker,
            configuration.outgoing_messages.clone(),
            configuration.message_ids.clone(),
            configuration.serializers.clone(),
            services.clone(),
        ))
    }

    /// The broker client is created on first use and shared by every
    /// producer handed out for this name.
    fn broker(&self) -> Result<Arc<dyn BrokerProducer>, Error> {
        let mut broker = self.broker.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = broker.as_ref() {
            return Ok(existing.clone());
        }

        debug!(producer = %self.name, "Creating broker producer");
        let created = self
            .configuration
            .broker_factory
            .create(&self.configuration.configuration)?;
        *broker = Some(created.clone());
        Ok(created)
    }
}

/// Named producer configurations.
///
/// ```ignore
/// let mut producers = ProducerRegistry::new();
/// producers.configure(Producer::DEFAULT_NAME, options.build()?)?;
/// producers.configure_for::<OrderService>(order_options.build()?)?;
///
/// let producer = producers.get_for::<OrderService>(&services)?.expect("configured");
/// ```
#[derive(Clone, Default)]
pub struct ProducerRegistry {
    factories: HashMap<String, Arc<ProducerFactory>>,
}

impl ProducerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name under which the producer of client type `C` is registered.
    pub fn key_name_of<C: ?Sized>() -> String {
        format!("__INTERNAL__FOR_CLIENT__{}", type_name::<C>())
    }

    pub fn configure(
        &mut self,
        name: impl Into<String>,
        configuration: ProducerConfiguration,
    ) -> Result<(), Error> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(Error::DuplicateProducer(name));
        }

        self.factories.insert(
            name.clone(),
            Arc::new(ProducerFactory {
                name,
                configuration,
                broker: Mutex::new(None),
            }),
        );
        Ok(())
    }

    /// Configure the producer used by client type `C`.
    pub fn configure_for<C: ?Sized>(
        &mut self,
        configuration: ProducerConfiguration,
    ) -> Result<(), Error> {
        self.configure(Self::key_name_of::<C>(), configuration)
    }

    /// A producer for `name`, or `None` if no such producer is configured.
    pub fn get(&self, name: &str, services: &Services) -> Result<Option<Producer>, Error> {
        self.factories
            .get(name)
            .map(|factory| factory.create(services))
            .transpose()
    }

    pub fn get_for<C: ?Sized>(&self, services: &Services) -> Result<Option<Producer>, Error> {
        self.get(&Self::key_name_of::<C>(), services)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for ProducerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerRegistry")
            .field("producers", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
