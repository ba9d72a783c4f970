use std::sync::Arc;

use tracing::info;

use super::MessagingHost;
use crate::cancellation::CancellationToken;
use crate::configuration::{
    ConsumerConfiguration, ConsumerOptions, OutboxConfiguration, OutboxOptions,
    OutboxProducerConfiguration, OutboxProducerOptions, ProducerOptions,
};
use crate::consuming::ConsumerThread;
use crate::error::Error;
use crate::outbox::{OutboxDispatcherThread, OutboxEntryRepository, OutboxQueue};
use crate::producing::{Producer, ProducerRegistry};
use crate::services::Services;

/// Collects the messaging setup of an application.
///
/// Configuration problems are reported while adding, before anything runs.
/// `start` spawns one thread per consumer plus the outbox dispatcher.
///
/// ```ignore
/// let host = Messaging::new(services)
///     .add_consumer(
///         ConsumerOptions::new()
///             .with_group_id("order-service")
///             .with_bootstrap_servers("localhost:9092")
///             .register_message_handler::<OrderPlaced, _>("orders", "order_placed", on_order_placed)
///             .with_broker_consumer_factory(broker.consumer_factory()),
///     )?
///     .add_producer(ProducerOptions::new() /* ... */)?
///     .start()?;
///
/// // ...
/// let stats = host.stop();
/// ```
pub struct Messaging {
    services: Services,
    consumers: Vec<ConsumerConfiguration>,
    producers: ProducerRegistry,
    outbox: Option<OutboxConfiguration>,
    outbox_producer: Option<OutboxProducerConfiguration>,
}

impl Messaging {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            consumers: Vec::new(),
            producers: ProducerRegistry::new(),
            outbox: None,
            outbox_producer: None,
        }
    }

    /// Add a consumer group. Group ids must be unique, ignoring case.
    pub fn add_consumer(mut self, options: ConsumerOptions) -> Result<Self, Error> {
        let consumer = options.build()?;

        let group_id = consumer.group_id();
        if self
            .consumers
            .iter()
            .any(|existing| existing.group_id().eq_ignore_ascii_case(group_id))
        {
            return Err(Error::InvalidConfiguration(format!(
                "Multiple consumers CANNOT be configured with same consumer group id \"{}\".",
                group_id
            )));
        }

        self.consumers.push(consumer);
        Ok(self)
    }

    /// Add the producer returned by [`producer`](Self::producer) without a name.
    pub fn add_producer(self, options: ProducerOptions) -> Result<Self, Error> {
        self.add_named_producer(Producer::DEFAULT_NAME, options)
    }

    pub fn add_named_producer(
        mut self,
        name: impl Into<String>,
        options: ProducerOptions,
    ) -> Result<Self, Error> {
        self.producers.configure(name, options.build()?)?;
        Ok(self)
    }

    /// Add the producer used by client type `C`.
    pub fn add_producer_for<C: ?Sized>(mut self, options: ProducerOptions) -> Result<Self, Error> {
        self.producers.configure_for::<C>(options.build()?)?;
        Ok(self)
    }

    pub fn add_outbox(mut self, options: OutboxOptions) -> Self {
        self.outbox = Some(options.build());
        self
    }

    pub fn add_outbox_producer(mut self, options: OutboxProducerOptions) -> Result<Self, Error> {
        self.outbox_producer = Some(options.build()?);
        Ok(self)
    }

    pub fn consumers(&self) -> &[ConsumerConfiguration] {
        &self.consumers
    }

    pub fn producers(&self) -> &ProducerRegistry {
        &self.producers
    }

    /// The default producer.
    pub fn producer(&self) -> Result<Option<Producer>, Error> {
        self.producers.get(Producer::DEFAULT_NAME, &self.services)
    }

    pub fn outbox_queue(&self, repository: Arc<dyn OutboxEntryRepository>) -> Result<OutboxQueue, Error> {
        outbox_queue(self.outbox.as_ref(), repository, &self.services)
    }

    /// Spawn every consumer and the outbox dispatcher.
    ///
    /// The producer registry and the outbox configuration are added to the
    /// services as singletons, so handlers can resolve them from their scope.
    pub fn start(self) -> Result<MessagingHost, Error> {
        let mut services = self.services.singleton(self.producers.clone());
        if let Some(outbox) = &self.outbox {
            services = services.singleton(outbox.clone());
        }

        let lifetime = CancellationToken::new();

        let dispatcher = match &self.outbox_producer {
            Some(outbox_producer) => Some(OutboxDispatcherThread::spawn_with_token(
                outbox_producer.listener(),
                outbox_producer.dispatcher(services.clone())?,
                lifetime.clone(),
            )),
            None => None,
        };

        let consumers = self
            .consumers
            .iter()
            .map(|consumer| {
                ConsumerThread::spawn_with_token(
                    consumer.consumer(services.clone()),
                    consumer.error_handler(lifetime.clone()),
                    lifetime.clone(),
                )
            })
            .collect::<Vec<_>>();

        info!(
            consumers = consumers.len(),
            outbox_dispatcher = dispatcher.is_some(),
            "Messaging started"
        );

        Ok(MessagingHost::new(
            lifetime,
            services,
            consumers,
            dispatcher,
            self.producers,
            self.outbox,
        ))
    }
}

pub(super) fn outbox_queue(
    outbox: Option<&OutboxConfiguration>,
    repository: Arc<dyn OutboxEntryRepository>,
    services: &Services,
) -> Result<OutboxQueue, Error> {
    let outbox = outbox.ok_or_else(|| {
        Error::InvalidConfiguration("No outbox was configured. Use Messaging::add_outbox.".to_string())
    })?;
    Ok(outbox.queue(repository, services.clone()))
}

impl std::fmt::Debug for Messaging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Messaging")
            .field("consumers", &self.consumers)
            .field("producers", &self.producers)
            .field("outbox", &self.outbox.is_some())
            .field("outbox_producer", &self.outbox_producer.is_some())
            .finish()
    }
}
