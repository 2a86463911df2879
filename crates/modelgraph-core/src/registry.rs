//! Type resolution boundary.
//!
//! Field types and wire payloads name classes by string. Resolution is
//! deferred to a `TypeResolver` so classes may reference each other
//! circularly and so unknown names fail inside the resolver, not the model
//! layer.

use crate::model::ModelClass;
use std::{collections::BTreeMap, sync::Arc};
use thiserror::Error as ThisError;

///
/// RegistryError
///

#[derive(Debug, ThisError)]
pub enum RegistryError {
    #[error("type '{name}' is already registered")]
    DuplicateType { name: String },

    #[error("unknown type '{name}'")]
    UnknownType { name: String },
}

///
/// TypeResolver
///

pub trait TypeResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Result<Arc<ModelClass>, RegistryError>;
}

///
/// Registry
/// Name → class table. Built once, then shared behind an `Arc`.
///

#[derive(Default)]
pub struct Registry {
    classes: BTreeMap<String, Arc<ModelClass>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a set of classes, rejecting duplicate names.
    pub fn with_classes<'a>(
        classes: impl IntoIterator<Item = &'a Arc<ModelClass>>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for class in classes {
            registry.register(class)?;
        }

        Ok(registry)
    }

    pub fn register(&mut self, class: &Arc<ModelClass>) -> Result<(), RegistryError> {
        let name = class.name();
        if self.classes.contains_key(name) {
            return Err(RegistryError::DuplicateType {
                name: name.to_string(),
            });
        }

        self.classes.insert(name.to_string(), Arc::clone(class));

        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<ModelClass>> {
        self.classes.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl TypeResolver for Registry {
    fn resolve(&self, name: &str) -> Result<Arc<ModelClass>, RegistryError> {
        self.classes
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownType {
                name: name.to_string(),
            })
    }
}

///
/// TESTS
///
