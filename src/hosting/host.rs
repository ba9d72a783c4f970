use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::messaging::outbox_queue;
use crate::cancellation::CancellationToken;
use crate::configuration::OutboxConfiguration;
use crate::consuming::{ConsumerStats, ConsumerThread};
use crate::error::Error;
use crate::outbox::{DispatcherStats, OutboxDispatcherThread, OutboxEntryRepository, OutboxQueue};
use crate::producing::{Producer, ProducerRegistry};
use crate::services::Services;

/// Statistics of everything a host ran.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HostStats {
    /// Per consumer group, in the order the consumers were added.
    pub consumers: Vec<(String, ConsumerStats)>,
    pub dispatcher: Option<DispatcherStats>,
}

/// Running consumers and outbox dispatcher.
///
/// Every background thread watches the application lifetime token. It is
/// cancelled by [`stop`](Self::stop), on drop, or by a consumer whose error
/// handler chose [`ConsumerFailureStrategy::Default`](crate::consuming::ConsumerFailureStrategy::Default).
pub struct MessagingHost {
    lifetime: CancellationToken,
    services: Services,
    consumers: Vec<ConsumerThread>,
    dispatcher: Option<OutboxDispatcherThread>,
    producers: ProducerRegistry,
    outbox: Option<OutboxConfiguration>,
}

impl MessagingHost {
    pub(super) fn new(
        lifetime: CancellationToken,
        services: Services,
        consumers: Vec<ConsumerThread>,
        dispatcher: Option<OutboxDispatcherThread>,
        producers: ProducerRegistry,
        outbox: Option<OutboxConfiguration>,
    ) -> Self {
        Self {
            lifetime,
            services,
            consumers,
            dispatcher,
            producers,
            outbox,
        }
    }

    pub fn application_lifetime(&self) -> &CancellationToken {
        &self.lifetime
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// `true` once the application lifetime has been cancelled.
    pub fn is_stopping(&self) -> bool {
        self.lifetime.is_cancelled()
    }

    /// Block until the lifetime is cancelled or `timeout` passes. Returns
    /// `true` when cancelled.
    pub fn wait_for_shutdown(&self, timeout: Duration) -> bool {
        self.lifetime.wait_timeout(timeout)
    }

    pub fn producer(&self) -> Result<Option<Producer>, Error> {
        self.producers.get(Producer::DEFAULT_NAME, &self.services)
    }

    pub fn named_producer(&self, name: &str) -> Result<Option<Producer>, Error> {
        self.producers.get(name, &self.services)
    }

    pub fn producer_for<C: ?Sized>(&self) -> Result<Option<Producer>, Error> {
        self.producers.get_for::<C>(&self.services)
    }

    pub fn outbox_queue(&self, repository: Arc<dyn OutboxEntryRepository>) -> Result<OutboxQueue, Error> {
        outbox_queue(self.outbox.as_ref(), repository, &self.services)
    }

    /// Cancel the lifetime and wait for every thread to finish.
    pub fn stop(mut self) -> HostStats {
        self.lifetime.cancel();

        let consumers = std::mem::take(&mut self.consumers)
            .into_iter()
            .map(|thread| (thread.group_id().to_string(), thread.stop()))
            .collect();
        let dispatcher = self.dispatcher.take().map(OutboxDispatcherThread::stop);

        let stats = HostStats {
            consumers,
            dispatcher,
        };
        info!(?stats, "Messaging stopped");
        stats
    }
}

impl Drop for MessagingHost {
    fn drop(&mut self) {
        self.lifetime.cancel();
    }
}

impl std::fmt::Debug for MessagingHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagingHost")
            .field("consumers", &self.consumers.len())
            .field("dispatcher", &self.dispatcher.is_some())
            .field("stopping", &self.is_stopping())
            .finish()
    }
}
