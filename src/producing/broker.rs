use std::sync::Arc;

use crate::configuration::Configuration;
use crate::error::{Error, ProduceError};
use crate::message::OutgoingRawMessage;

/// Client side of the broker used to publish serialized messages.
///
/// Shared between the producer and the outbox dispatcher, so calls may
/// arrive concurrently.
pub trait BrokerProducer: Send + Sync {
    fn produce(&self, message: &OutgoingRawMessage) -> Result<(), ProduceError>;
}

impl<T: BrokerProducer + ?Sized> BrokerProducer for Arc<T> {
    fn produce(&self, message: &OutgoingRawMessage) -> Result<(), ProduceError> {
        (**self).produce(message)
    }
}

/// The broker client a publishing pipeline dispatches to. Seeded into the
/// root context before the pipeline runs.
#[derive(Clone)]
pub struct ActiveProducer(pub Arc<dyn BrokerProducer>);

/// Creates the broker client of a producer from its resolved configuration.
pub trait BrokerProducerFactory: Send + Sync {
    fn create(&self, configuration: &Configuration) -> Result<Arc<dyn BrokerProducer>, Error>;
}

impl<F> BrokerProducerFactory for F
where
    F: Fn(&Configuration) -> Result<Arc<dyn BrokerProducer>, Error> + Send + Sync,
{
    fn create(&self, configuration: &Configuration) -> Result<Arc<dyn BrokerProducer>, Error> {
        self(configuration)
    }
}
