use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::Error;
use crate::services::Scope;

type Item = Arc<dyn Any + Send + Sync>;

/// State shared by every context derived from one root: the per-message
/// item bag and the resolution scope.
///
/// Cloning hands out another view of the same state, so an item set by an
/// early middleware is visible to every later stage.
#[derive(Clone)]
pub struct RootContext {
    scope: Arc<Scope>,
    items: Arc<Mutex<HashMap<TypeId, Item>>>,
}

impl RootContext {
    pub fn new(scope: Arc<Scope>) -> Self {
        Self {
            scope,
            items: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn scope(&self) -> &Arc<Scope> {
        &self.scope
    }

    /// Store an item, replacing any previous item of the same type.
    pub fn set<T: Any + Send + Sync>(&self, value: T) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(TypeId::of::<T>(), Arc::new(value));
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let item = self
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<T>())
            .cloned()?;
        item.downcast::<T>().ok()
    }

    /// Like [`get`](Self::get) but fails with `MissingContextItem`.
    pub fn require<T: Any + Send + Sync>(&self) -> Result<Arc<T>, Error> {
        self.get::<T>()
            .ok_or(Error::MissingContextItem(type_name::<T>()))
    }
}

/// Implemented by every stage context of a pipeline.
///
/// Reads and writes are forwarded to the shared root.
pub trait MiddlewareContext {
    fn root(&self) -> &RootContext;

    fn scope(&self) -> &Arc<Scope> {
        self.root().scope()
    }

    fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>>
    where
        Self: Sized,
    {
        self.root().get::<T>()
    }

    fn set<T: Any + Send + Sync>(&self, value: T)
    where
        Self: Sized,
    {
        self.root().set(value)
    }
}

impl MiddlewareContext for RootContext {
    fn root(&self) -> &RootContext {
        self
    }
}

/// Output type of a terminal middleware. It has no values, so a terminal
/// middleware can never call `next`.
#[derive(Debug)]
pub enum EndOfPipeline {}
