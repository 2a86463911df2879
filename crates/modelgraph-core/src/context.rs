use crate::{
    config::Config,
    error::Error,
    model::ModelClass,
    registry::TypeResolver,
};
use derive_more::Display;
use std::sync::Arc;

///
/// SourceId
///
/// Opaque token naming the party that supplied a field value.
/// Only ever compared for equality.
///

#[derive(Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SourceId(Arc<str>);

impl SourceId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SourceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

///
/// Context
///
/// Explicit replacement for ambient registry state. Passed into every
/// construction, serialization, and identity-map call.
///

#[derive(Clone)]
pub struct Context {
    resolver: Option<Arc<dyn TypeResolver>>,
    source: Option<SourceId>,
    validate_on_serialize: bool,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            resolver: None,
            source: None,
            validate_on_serialize: true,
        }
    }
}

impl Context {
    #[must_use]
    pub fn new(resolver: Arc<dyn TypeResolver>) -> Self {
        Self {
            resolver: Some(resolver),
            ..Self::default()
        }
    }

    /// Context without a resolver; model-typed fields cannot be materialized.
    #[must_use]
    pub fn detached() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_config(resolver: Arc<dyn TypeResolver>, config: &Config) -> Self {
        Self {
            resolver: Some(resolver),
            source: config.context.source.as_deref().map(SourceId::new),
            validate_on_serialize: config.serialize.validate,
        }
    }

    /// Local source identity, recorded on fields set without an explicit source.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<SourceId>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub const fn with_validation(mut self, validate_on_serialize: bool) -> Self {
        self.validate_on_serialize = validate_on_serialize;
        self
    }

    #[must_use]
    pub const fn source(&self) -> Option<&SourceId> {
        self.source.as_ref()
    }

    #[must_use]
    pub const fn validate_on_serialize(&self) -> bool {
        self.validate_on_serialize
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<ModelClass>, Error> {
        let resolver = self
            .resolver
            .as_ref()
            .ok_or_else(|| Error::RegistryNotFound {
                type_name: name.to_string(),
            })?;

        Ok(resolver.resolve(name)?)
    }
}
