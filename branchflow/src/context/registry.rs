//! Ambient dependency registry consulted when injecting handler fields.

use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A shared, type-erased dependency instance.
pub type Dependency = Arc<dyn Any + Send + Sync>;

/// Read-only lookup surface the pipeline uses to resolve injectable fields.
#[cfg_attr(test, mockall::automock)]
pub trait DependencyRegistry: Send + Sync {
    /// Looks up an instance registered under its concrete type.
    fn lookup_by_type(&self, type_id: TypeId) -> Option<Dependency>;

    /// Looks up an instance advertised under a capability.
    ///
    /// The capability id is the `TypeId` of the capability trait object
    /// (e.g. `TypeId::of::<dyn Clock>()`). The returned instance wraps an
    /// `Arc<dyn Capability>`.
    fn lookup_by_capability(&self, capability: TypeId) -> Option<Dependency>;
}

/// What an injectable field asks the registry for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKey {
    /// Exact concrete type lookup.
    Type {
        /// Type identity.
        id: TypeId,
        /// Type name for diagnostics.
        name: &'static str,
    },
    /// Capability (trait object) lookup.
    Capability {
        /// Identity of the capability trait object type.
        id: TypeId,
        /// Capability name for diagnostics.
        name: &'static str,
    },
}

impl DependencyKey {
    /// Key for the concrete type `T`.
    #[must_use]
    pub fn of_type<T: Any>() -> Self {
        Self::Type {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Key for the capability `C`, usually a `dyn Trait`.
    #[must_use]
    pub fn of_capability<C: ?Sized + 'static>() -> Self {
        Self::Capability {
            id: TypeId::of::<C>(),
            name: std::any::type_name::<C>(),
        }
    }

    /// Resolves this key against a registry.
    #[must_use]
    pub fn resolve(&self, registry: &dyn DependencyRegistry) -> Option<Dependency> {
        match *self {
            Self::Type { id, .. } => registry.lookup_by_type(id),
            Self::Capability { id, .. } => registry.lookup_by_capability(id),
        }
    }
}

impl fmt::Display for DependencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type { name, .. } => write!(f, "type {name}"),
            Self::Capability { name, .. } => write!(f, "capability {name}"),
        }
    }
}

/// In-memory registry keyed by concrete type and by capability.
#[derive(Default)]
pub struct InMemoryRegistry {
    by_type: RwLock<HashMap<TypeId, Dependency>>,
    by_capability: RwLock<HashMap<TypeId, Dependency>>,
}

impl InMemoryRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an instance under its concrete type, replacing any previous one.
    pub fn provide<T: Any + Send + Sync>(&self, instance: T) {
        self.provide_arc(Arc::new(instance));
    }

    /// Registers a shared instance under its concrete type.
    pub fn provide_arc<T: Any + Send + Sync>(&self, instance: Arc<T>) {
        self.by_type.write().insert(TypeId::of::<T>(), instance);
    }

    /// Advertises an instance under the capability `C`.
    ///
    /// ```rust,ignore
    /// registry.provide_capability::<dyn Clock>(Arc::new(SystemClock));
    /// ```
    pub fn provide_capability<C: ?Sized + Send + Sync + 'static>(&self, instance: Arc<C>) {
        self.by_capability
            .write()
            .insert(TypeId::of::<C>(), Arc::new(instance));
    }

    /// Returns the number of registered instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_type.read().len() + self.by_capability.read().len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every registration.
    pub fn clear(&self) {
        self.by_type.write().clear();
        self.by_capability.write().clear();
    }
}

impl DependencyRegistry for InMemoryRegistry {
    fn lookup_by_type(&self, type_id: TypeId) -> Option<Dependency> {
        self.by_type.read().get(&type_id).cloned()
    }

    fn lookup_by_capability(&self, capability: TypeId) -> Option<Dependency> {
        self.by_capability.read().get(&capability).cloned()
    }
}

impl fmt::Debug for InMemoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryRegistry")
            .field("type_count", &self.by_type.read().len())
            .field("capability_count", &self.by_capability.read().len())
            .finish()
    }
}
