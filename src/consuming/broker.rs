use crate::cancellation::CancellationToken;
use crate::configuration::Configuration;
use crate::error::Error;
use crate::message::{RawMessage, TopicPartitionOffset};

/// Client side of the broker used by one consume loop.
pub trait BrokerConsumer: Send {
    /// Subscribe to `topics`. With `read_from_beginning` every assigned
    /// partition starts at its first offset instead of the committed one.
    fn subscribe(&mut self, topics: &[String], read_from_beginning: bool) -> Result<(), Error>;

    /// Wait for the next message. `Ok(None)` means nothing arrived before the
    /// client gave up waiting or `cancellation` fired.
    fn receive(&mut self, cancellation: &CancellationToken) -> Result<Option<RawMessage>, Error>;

    fn commit(&mut self, position: &TopicPartitionOffset) -> Result<(), Error>;
}

/// Opens broker consumer clients. Called again each time a consumer
/// restarts.
pub trait BrokerConsumerFactory: Send + Sync {
    fn create(&self, configuration: &Configuration) -> Result<Box<dyn BrokerConsumer>, Error>;
}

impl<F> BrokerConsumerFactory for F
where
    F: Fn(&Configuration) -> Result<Box<dyn BrokerConsumer>, Error> + Send + Sync,
{
    fn create(&self, configuration: &Configuration) -> Result<Box<dyn BrokerConsumer>, Error> {
        self(configuration)
    }
}
