use std::any::Any;
use std::sync::Arc;

use super::{
    OutboxEntryRepository, OutboxMessageContext, OutboxNotifier, OutboxPayloadDescriptionMiddleware,
    OutboxSerializationMiddleware, OutboxStorage, OutboxStorageMiddleware,
};
use crate::error::Error;
use crate::message::{AnyMessage, Metadata, OutgoingMessage};
use crate::middleware::{EndOfPipeline, MiddlewareBuilder, RootContext};
use crate::producing::PayloadDescriptorFactory;
use crate::serializing::TopicPayloadSerializerRegistry;
use crate::services::Services;

/// Captures domain messages as outbox entries in the caller's transaction.
///
/// The queue never opens or commits a transaction; `repository` is expected
/// to write through the transaction the caller already holds.
///
/// ```ignore
/// let tx = repository.begin_transaction();
/// orders.save(&tx, &order)?;
/// let notifier = outbox.queue(Arc::new(tx.clone()), services.clone()).enqueue(vec![AnyMessage::new(OrderPlaced { .. })])?;
/// tx.commit()?;
/// notifier.notify(&token)?;
/// ```
#[derive(Clone)]
pub struct OutboxQueue {
    repository: Arc<dyn OutboxEntryRepository>,
    notifier: Arc<dyn OutboxNotifier>,
    services: Services,
    pipeline: MiddlewareBuilder<OutboxMessageContext, EndOfPipeline>,
}

impl OutboxQueue {
    pub fn new(
        repository: Arc<dyn OutboxEntryRepository>,
        descriptors: PayloadDescriptorFactory,
        serializers: TopicPayloadSerializerRegistry,
        notifier: Arc<dyn OutboxNotifier>,
        services: Services,
    ) -> Self {
        let pipeline = MiddlewareBuilder::<OutboxMessageContext>::new()
            .register_instance(OutboxPayloadDescriptionMiddleware::new(descriptors))
            .register_instance(OutboxSerializationMiddleware::new(serializers))
            .register_instance(OutboxStorageMiddleware);

        Self {
            repository,
            notifier,
            services,
            pipeline,
        }
    }

    /// Enqueue `messages` with empty headers.
    pub fn enqueue<I>(&self, messages: I) -> Result<Arc<dyn OutboxNotifier>, Error>
    where
        I: IntoIterator<Item = AnyMessage>,
    {
        self.enqueue_with(messages, Metadata::new())
    }

    /// Enqueue `messages`, each carrying a copy of `headers`. Returns the
    /// notifier to fire once the surrounding transaction has committed.
    pub fn enqueue_with<I>(
        &self,
        messages: I,
        headers: Metadata,
    ) -> Result<Arc<dyn OutboxNotifier>, Error>
    where
        I: IntoIterator<Item = AnyMessage>,
    {
        let outgoing: Vec<OutgoingMessage> = messages
            .into_iter()
            .map(|message| OutgoingMessage::new(message, headers.clone()))
            .collect();

        let scope = Arc::new(self.services.create_scope());
        let root = RootContext::new(scope.clone());
        root.set(OutboxStorage(self.repository.clone()));

        self.pipeline
            .build(&scope)
            .invoke(OutboxMessageContext::new(outgoing, root))?;

        Ok(self.notifier.clone())
    }

    /// Enqueue a single message.
    pub fn enqueue_one<T: Any + Send + Sync>(
        &self,
        message: T,
    ) -> Result<Arc<dyn OutboxNotifier>, Error> {
        self.enqueue(std::iter::once(AnyMessage::new(message)))
    }
}

impl std::fmt::Debug for OutboxQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboxQueue")
            .field("pipeline", &self.pipeline.len())
            .finish()
    }
}
