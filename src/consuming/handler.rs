use std::sync::Arc;

use crate::error::BoxError;
use crate::message::Metadata;
use crate::services::Scope;

/// What a handler knows about the message it is handling.
#[derive(Clone)]
pub struct MessageHandlerContext {
    metadata: Metadata,
    scope: Arc<Scope>,
}

impl MessageHandlerContext {
    pub fn new(metadata: Metadata, scope: Arc<Scope>) -> Self {
        Self { metadata, scope }
    }

    pub fn message_id(&self) -> &str {
        self.metadata.message_id().unwrap_or_default()
    }

    pub fn message_type(&self) -> &str {
        self.metadata.message_type().unwrap_or_default()
    }

    /// Correlation id of the handled message, or its message id when the
    /// message starts a new chain.
    pub fn correlation_id(&self) -> &str {
        self.metadata
            .correlation_id()
            .unwrap_or_else(|| self.message_id())
    }

    /// Causation id of the handled message, or its message id when unset.
    pub fn causation_id(&self) -> &str {
        self.metadata
            .causation_id()
            .unwrap_or_else(|| self.message_id())
    }

    pub fn headers(&self) -> &Metadata {
        &self.metadata
    }

    /// The resolution scope of the message being handled.
    pub fn scope(&self) -> &Arc<Scope> {
        &self.scope
    }
}

impl std::fmt::Debug for MessageHandlerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageHandlerContext")
            .field("metadata", &self.metadata)
            .field("scope", &self.scope.id())
            .finish()
    }
}

/// Handles one message type.
///
/// Implemented for closures taking the message and the context:
///
/// ```ignore
/// registry.register::<OrderPlaced, _>(
///     "orders",
///     "order_placed",
///     |event: OrderPlaced, ctx: &MessageHandlerContext| -> Result<(), BoxError> {
///         tracing::info!(order = event.order_id, correlation = ctx.correlation_id(), "order placed");
///         Ok(())
///     },
/// )?;
/// ```
pub trait MessageHandler<M>: Send + Sync {
    fn handle(&self, message: M, context: &MessageHandlerContext) -> Result<(), BoxError>;
}

impl<M, F> MessageHandler<M> for F
where
    F: Fn(M, &MessageHandlerContext) -> Result<(), BoxError> + Send + Sync,
{
    fn handle(&self, message: M, context: &MessageHandlerContext) -> Result<(), BoxError> {
        self(message, context)
    }
}
