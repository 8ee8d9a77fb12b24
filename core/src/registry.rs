//! Declared entity type -> remote object type name.

use std::collections::HashMap;

use tracing::debug;

use crate::entity::{Entity, EntityDescriptor};
use crate::error::ConfigurationError;

#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub object_type: String,
    pub descriptor: EntityDescriptor,
}

/// Registered entity types, keyed by their fully qualified type name.
///
/// Several entity types may share one remote object type; each is a
/// different projection of the same objects.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    entries: HashMap<&'static str, RegistryEntry>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `T` to `object_type`, replacing any earlier binding of `T`.
    /// The descriptor is validated here so shape problems surface at setup.
    pub fn register<T: Entity>(&mut self, object_type: &str) -> Result<(), ConfigurationError> {
        let descriptor = T::descriptor();
        descriptor.validate()?;
        debug!(entity = descriptor.short_name(), object_type, "registering entity type");
        self.entries.insert(
            descriptor.entity(),
            RegistryEntry {
                object_type: object_type.to_string(),
                descriptor,
            },
        );
        Ok(())
    }

    /// Remote object type of `T`, or `None` when unregistered.
    pub fn resolve<T: Entity>(&self) -> Option<&str> {
        self.entry(std::any::type_name::<T>())
            .map(|entry| entry.object_type.as_str())
    }

    pub fn entry(&self, entity: &str) -> Option<&RegistryEntry> {
        self.entries.get(entity)
    }

    pub fn is_registered(&self, entity: &str) -> bool {
        self.entries.contains_key(entity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
