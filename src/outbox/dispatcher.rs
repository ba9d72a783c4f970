use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error};

use super::{OutboxEntry, OutboxUnitOfWorkFactory};
use crate::cancellation::CancellationToken;
use crate::error::Error;
use crate::message::OutgoingRawMessage;
use crate::middleware::{EndOfPipeline, MiddlewareBuilder, RootContext};
use crate::producing::{ActiveProducer, BrokerProducer, DispatchMiddleware, OutgoingRawMessageContext};
use crate::services::Services;

/// Publishes already serialized outbox entries.
#[derive(Clone)]
pub struct OutboxProducer {
    broker: Arc<dyn BrokerProducer>,
    services: Services,
    pipeline: MiddlewareBuilder<OutgoingRawMessageContext, EndOfPipeline>,
}

impl OutboxProducer {
    pub fn new(broker: Arc<dyn BrokerProducer>, services: Services) -> Self {
        Self {
            broker,
            services,
            pipeline: MiddlewareBuilder::<OutgoingRawMessageContext>::new()
                .register_instance(DispatchMiddleware),
        }
    }

    pub fn produce(&self, entry: &OutboxEntry) -> Result<(), Error> {
        let scope = Arc::new(self.services.create_scope());
        let root = RootContext::new(scope.clone());
        root.set(ActiveProducer(self.broker.clone()));

        let message = OutgoingRawMessage::new(
            entry.topic.clone(),
            entry.key.clone(),
            entry.payload.clone(),
        );
        self.pipeline
            .build(&scope)
            .invoke(OutgoingRawMessageContext::new(message, root))
    }
}

/// Outcome of one dispatch cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchResult {
    pub published: usize,
    pub failed: usize,
}

/// Drains pending outbox entries to the broker.
///
/// Entries are published one by one in the order the unit of work returns
/// them. An entry that fails to publish or to be marked stays pending for
/// the next cycle without affecting the others. Marks are committed once at the end of the cycle, so a crash
/// mid-cycle re-publishes the whole batch.
#[derive(Clone)]
pub struct OutboxDispatcher {
    unit_of_work_factory: Arc<dyn OutboxUnitOfWorkFactory>,
    producer: OutboxProducer,
}

impl OutboxDispatcher {
    pub fn new(unit_of_work_factory: Arc<dyn OutboxUnitOfWorkFactory>, producer: OutboxProducer) -> Self {
        Self {
            unit_of_work_factory,
            producer,
        }
    }

    pub fn dispatch(&self, cancellation: &CancellationToken) -> Result<DispatchResult, Error> {
        let mut result = DispatchResult::default();
        let mut unit_of_work = self.unit_of_work_factory.begin()?;
        let entries = unit_of_work.unpublished_entries()?;

        debug!(pending = entries.len(), "Dispatching outbox entries");

        for entry in entries {
            if cancellation.is_cancelled() {
                break;
            }

            match self.producer.produce(&entry) {
                Ok(()) => match unit_of_work.mark_as_processed(entry.message_id, Utc::now()) {
                    Ok(()) => {
                        result.published += 1;
                        debug!(message_id = %entry.message_id, topic = %entry.topic, "Published outbox entry");
                    }
                    Err(err) => {
                        // Published but still pending; the next cycle publishes it again.
                        result.failed += 1;
                        error!(
                            message_id = %entry.message_id,
                            topic = %entry.topic,
                            error = %err,
                            "Failed to mark outbox entry as processed"
                        );
                    }
                },
                Err(err) => {
                    result.failed += 1;
                    error!(
                        message_id = %entry.message_id,
                        topic = %entry.topic,
                        error = %err,
                        "Failed to publish outbox entry"
                    );
                }
            }
        }

        unit_of_work.commit()?;
        Ok(result)
    }
}
