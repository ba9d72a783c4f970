use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use super::Metadata;

/// A type-erased domain message.
///
/// Outgoing registrations are looked up by the concrete type, so the type
/// identity travels with the value.
#[derive(Clone)]
pub struct AnyMessage {
    value: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
}

impl AnyMessage {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    pub fn message_type_id(&self) -> TypeId {
        self.type_id
    }

    /// Type name without its module path, e.g. `OrderPlaced`.
    pub fn short_type_name(&self) -> &'static str {
        let base = self
            .type_name
            .split_once('<')
            .map_or(self.type_name, |(base, _)| base);
        let start = base.rfind("::").map_or(0, |i| i + 2);
        &self.type_name[start..]
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl fmt::Debug for AnyMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AnyMessage").field(&self.type_name).finish()
    }
}

/// An outgoing message together with its envelope headers.
#[derive(Clone, Debug)]
pub struct OutgoingMessage {
    pub message: AnyMessage,
    pub metadata: Metadata,
}

impl OutgoingMessage {
    pub fn new(message: AnyMessage, metadata: Metadata) -> Self {
        Self { message, metadata }
    }
}
