//! Service registry and per-message resolution scopes.
//!
//! `Services` is built once at startup. Every inbound message (and every
//! outbox enqueue) gets its own `Scope`: scoped services are created at most
//! once inside it and dropped together with it, so nothing scoped leaks from
//! one message into the next.
//!
//! ```ignore
//! let services = Services::new()
//!     .singleton(Clock::system())
//!     .scoped(|scope| Ok(UnitOfWork::begin(scope.resolve::<Database>()?)));
//!
//! let scope = services.create_scope();
//! let uow = scope.resolve::<UnitOfWork>()?; // same instance for the whole scope
//! drop(scope);                               // uow dropped here
//! ```

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::trace;
use uuid::Uuid;

use crate::error::Error;

type Instance = Arc<dyn Any + Send + Sync>;
type Provider = Arc<dyn Fn(&Scope) -> Result<Instance, Error> + Send + Sync>;

#[derive(Clone)]
enum Lifetime {
    Singleton(Instance),
    Scoped(Provider),
    Transient(Provider),
}

/// Registry of singleton, scoped and transient services.
///
/// Cloning is cheap; clones share the same registrations.
#[derive(Clone, Default)]
pub struct Services {
    registrations: Arc<HashMap<TypeId, Lifetime>>,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shared instance. Singletons must be thread-safe.
    pub fn singleton<T: Any + Send + Sync>(self, value: T) -> Self {
        self.singleton_arc(Arc::new(value))
    }

    /// Register an already shared instance.
    pub fn singleton_arc<T: Any + Send + Sync>(mut self, value: Arc<T>) -> Self {
        Arc::make_mut(&mut self.registrations)
            .insert(TypeId::of::<T>(), Lifetime::Singleton(value));
        self
    }

    /// Register a service created once per scope.
    pub fn scoped<T, F>(mut self, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Scope) -> Result<T, Error> + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.registrations)
            .insert(TypeId::of::<T>(), Lifetime::Scoped(erase(factory)));
        self
    }

    /// Register a service created on every resolution.
    pub fn transient<T, F>(mut self, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Scope) -> Result<T, Error> + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.registrations)
            .insert(TypeId::of::<T>(), Lifetime::Transient(erase(factory)));
        self
    }

    pub fn contains<T: Any>(&self) -> bool {
        self.registrations.contains_key(&TypeId::of::<T>())
    }

    /// Open a new resolution scope.
    pub fn create_scope(&self) -> Scope {
        let scope = Scope {
            id: Uuid::new_v4(),
            services: self.clone(),
            instances: Mutex::new(HashMap::new()),
        };
        trace!(scope = %scope.id, "Scope:Begin");
        scope
    }
}

fn erase<T, F>(factory: F) -> Provider
where
    T: Any + Send + Sync,
    F: Fn(&Scope) -> Result<T, Error> + Send + Sync + 'static,
{
    Arc::new(move |scope| factory(scope).map(|value| Arc::new(value) as Instance))
}

/// A resolution scope bracketing one unit of message processing.
pub struct Scope {
    id: Uuid,
    services: Services,
    instances: Mutex<HashMap<TypeId, Instance>>,
}

impl Scope {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Resolve a registered service.
    pub fn resolve<T: Any + Send + Sync>(&self) -> Result<Arc<T>, Error> {
        let key = TypeId::of::<T>();
        let instance = match self.services.registrations.get(&key) {
            Some(Lifetime::Singleton(instance)) => instance.clone(),
            Some(Lifetime::Transient(provider)) => provider(self)?,
            Some(Lifetime::Scoped(provider)) => {
                if let Some(existing) = self.cached(&key) {
                    existing
                } else {
                    // The provider may resolve other services, so it runs unlocked.
                    let created = provider(self)?;
                    self.instances
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .entry(key)
                        .or_insert(created)
                        .clone()
                }
            }
            None => return Err(Error::UnresolvedService(type_name::<T>())),
        };

        instance
            .downcast::<T>()
            .map_err(|_| Error::UnresolvedService(type_name::<T>()))
    }

    /// Resolve a service, returning `None` when it is not registered.
    pub fn try_resolve<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        if self.services.contains::<T>() {
            self.resolve::<T>().ok()
        } else {
            None
        }
    }

    fn cached(&self, key: &TypeId) -> Option<Instance> {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        trace!(scope = %self.id, "Scope:End");
    }
}
