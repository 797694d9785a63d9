//! A type-indexed service map.

use core::fmt;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::effect::{Data, Effect};

/// Immutable map from service type to service value.
///
/// Adding a service returns a new map; existing handles are unaffected.
#[derive(Clone, Default)]
pub struct Env {
    services: Arc<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Env {
    /// An environment with no services.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A copy with `service` added, replacing any service of the same type.
    #[must_use]
    pub fn with<S: Send + Sync + 'static>(&self, service: S) -> Self {
        let mut services = (*self.services).clone();
        services.insert(TypeId::of::<S>(), Arc::new(service));
        Self {
            services: Arc::new(services),
        }
    }

    /// The service of type `S`, if present.
    #[must_use]
    pub fn get<S: Send + Sync + 'static>(&self) -> Option<&S> {
        self.services
            .get(&TypeId::of::<S>())
            .and_then(|s| s.downcast_ref::<S>())
    }

    /// True if a service of type `S` is present.
    #[must_use]
    pub fn contains<S: Send + Sync + 'static>(&self) -> bool {
        self.services.contains_key(&TypeId::of::<S>())
    }

    /// Number of services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// True if there are no services.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Env")
            .field("services", &self.services.len())
            .finish()
    }
}

impl<S: Data> Effect<S> {
    /// Reads a service from the environment. A missing service is a defect.
    pub fn service() -> Self {
        Self::access(|env| match env.get::<S>() {
            Some(s) => Self::succeed(s.clone()),
            None => Self::die_message(format!(
                "service not found: {}",
                std::any::type_name::<S>()
            )),
        })
    }
}
