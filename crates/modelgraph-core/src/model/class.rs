use crate::{
    error::Error,
    identity::{IdentifierKind, IdentityMap, generator},
    model::field::{FieldDef, FieldDefault, Primitive, ScalarType},
    value::Value,
};
use std::{fmt, sync::Arc};
use thiserror::Error as ThisError;

///
/// ClassBuildError
///

#[derive(Debug, ThisError)]
pub enum ClassBuildError {
    #[error("{class}: field '{field}' is declared twice")]
    DuplicateField { class: String, field: String },

    #[error("{class}: identifier attribute '{field}' must be a non-array string or number")]
    InvalidIdentifierType { class: String, field: String },

    #[error("{class}: identifier attribute '{field}' requires an entity class")]
    IdentifierOnModel { class: String, field: String },

    #[error(
        "{class}: field '{field}' redefined with incompatible type {received} (inherited {expected})"
    )]
    IncompatibleOverride {
        class: String,
        field: String,
        expected: String,
        received: String,
    },

    #[error("{class}: model class cannot extend entity class '{parent}'")]
    ModelExtendsEntity { class: String, parent: String },

    #[error("{class}: more than one primary identifier ('{first}', '{second}')")]
    MultiplePrimaryIdentifiers {
        class: String,
        first: String,
        second: String,
    },

    #[error("{class}: identity map can only be shared with an entity parent")]
    NoIdentityMapToShare { class: String },
}

///
/// ClassKind
///
/// Closed capability set. Every entity is also a model.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClassKind {
    Model,
    Entity,
}

///
/// ModelClass
///
/// Runtime class definition: ordered field table (inherited fields first),
/// ancestry for assignability checks, and for entities the identity map.
///

pub struct ModelClass {
    name: String,
    kind: ClassKind,
    parent: Option<Arc<Self>>,
    lineage: Vec<String>,
    fields: Vec<Arc<FieldDef>>,
    identity: Option<Arc<IdentityMap>>,
}

impl ModelClass {
    #[must_use]
    pub fn model(name: impl Into<String>) -> ModelClassBuilder {
        ModelClassBuilder::new(name.into(), ClassKind::Model)
    }

    #[must_use]
    pub fn entity(name: impl Into<String>) -> ModelClassBuilder {
        ModelClassBuilder::new(name.into(), ClassKind::Entity)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn kind(&self) -> ClassKind {
        self.kind
    }

    #[must_use]
    pub const fn is_entity(&self) -> bool {
        matches!(self.kind, ClassKind::Entity)
    }

    #[must_use]
    pub const fn parent(&self) -> Option<&Arc<Self>> {
        self.parent.as_ref()
    }

    /// True when instances of this class may be stored where `type_name` is declared.
    #[must_use]
    pub fn is_a(&self, type_name: &str) -> bool {
        self.lineage.iter().any(|name| name == type_name)
    }

    #[must_use]
    pub fn fields(&self) -> &[Arc<FieldDef>] {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Arc<FieldDef>> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub(crate) fn require_field(&self, name: &str) -> Result<&Arc<FieldDef>, Error> {
        self.field(name)
            .ok_or_else(|| Error::field_not_found(&self.name, name))
    }

    /// Identity map owned by (or shared into) this entity class.
    #[must_use]
    pub fn identity_map(&self) -> Option<&Arc<IdentityMap>> {
        self.identity.as_ref()
    }

    ///
    /// IDENTIFIER ATTRIBUTES
    ///

    pub fn identifier_attributes(&self) -> impl Iterator<Item = &Arc<FieldDef>> {
        self.fields.iter().filter(|f| f.identifier().is_some())
    }

    /// Primary first, then secondaries in declaration order.
    pub(crate) fn identifier_lookup_order(&self) -> Vec<&Arc<FieldDef>> {
        let primary = self
            .fields
            .iter()
            .filter(|f| f.identifier() == Some(IdentifierKind::Primary));
        let secondary = self
            .fields
            .iter()
            .filter(|f| f.identifier() == Some(IdentifierKind::Secondary));

        primary.chain(secondary).collect()
    }

    pub fn primary_identifier_attribute(&self) -> Result<&Arc<FieldDef>, Error> {
        self.fields
            .iter()
            .find(|f| f.identifier() == Some(IdentifierKind::Primary))
            .ok_or_else(|| Error::NoPrimaryIdentifierAttribute {
                entity: self.name.clone(),
            })
    }

    pub fn secondary_identifier_attribute(&self, name: &str) -> Result<&Arc<FieldDef>, Error> {
        self.fields
            .iter()
            .find(|f| f.name() == name && f.identifier() == Some(IdentifierKind::Secondary))
            .ok_or_else(|| Error::NoSecondaryIdentifierAttribute {
                entity: self.name.clone(),
                attribute: name.to_string(),
            })
    }
}

impl fmt::Debug for ModelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelClass")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("lineage", &self.lineage)
            .field(
                "fields",
                &self.fields.iter().map(|f| f.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

///
/// ModelClassBuilder
///
/// Collects field declarations in order. Inherited fields are copied from
/// the parent table first; a redeclared field replaces the inherited entry
/// in place when its type is compatible.
///

pub struct ModelClassBuilder {
    name: String,
    kind: ClassKind,
    parent: Option<Arc<ModelClass>>,
    share_identity_map: bool,
    fields: Vec<FieldDef>,
}

impl ModelClassBuilder {
    const fn new(name: String, kind: ClassKind) -> Self {
        Self {
            name,
            kind,
            parent: None,
            share_identity_map: false,
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn extends(mut self, parent: &Arc<ModelClass>) -> Self {
        self.parent = Some(Arc::clone(parent));
        self
    }

    /// Use the parent's identity map instead of a fresh one.
    #[must_use]
    pub const fn share_identity_map(mut self) -> Self {
        self.share_identity_map = true;
        self
    }

    #[must_use]
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn build(self) -> Result<Arc<ModelClass>, ClassBuildError> {
        let name = self.name;

        // Phase 1: inherit.
        let mut lineage = vec![name.clone()];
        let mut table: Vec<Arc<FieldDef>> = Vec::new();
        if let Some(parent) = &self.parent {
            if parent.is_entity() && self.kind == ClassKind::Model {
                return Err(ClassBuildError::ModelExtendsEntity {
                    class: name,
                    parent: parent.name.clone(),
                });
            }
            lineage.extend(parent.lineage.iter().cloned());
            table.extend(parent.fields.iter().cloned());
        }
        let inherited = table.len();

        // Phase 2: declare / override.
        for mut field in self.fields {
            check_identifier(&name, self.kind, &mut field)?;

            match table.iter().position(|f| f.name() == field.name()) {
                Some(i) if i < inherited => {
                    let existing = &table[i];
                    if !field.ty().is_compatible_override(existing.ty()) {
                        return Err(ClassBuildError::IncompatibleOverride {
                            class: name,
                            field: field.name().to_string(),
                            expected: existing.ty().to_string(),
                            received: field.ty().to_string(),
                        });
                    }
                    table[i] = Arc::new(field);
                }
                Some(_) => {
                    return Err(ClassBuildError::DuplicateField {
                        class: name,
                        field: field.name().to_string(),
                    });
                }
                None => table.push(Arc::new(field)),
            }
        }

        // Phase 3: identifier constraints.
        let mut primaries = table
            .iter()
            .filter(|f| f.identifier() == Some(IdentifierKind::Primary));
        if let (Some(first), Some(second)) = (primaries.next(), primaries.next()) {
            return Err(ClassBuildError::MultiplePrimaryIdentifiers {
                class: name,
                first: first.name().to_string(),
                second: second.name().to_string(),
            });
        }

        // Phase 4: identity map.
        let identity = match self.kind {
            ClassKind::Model => None,
            ClassKind::Entity if self.share_identity_map => {
                let shared = self
                    .parent
                    .as_ref()
                    .and_then(|p| p.identity.clone())
                    .ok_or_else(|| ClassBuildError::NoIdentityMapToShare {
                        class: name.clone(),
                    })?;
                Some(shared)
            }
            ClassKind::Entity => Some(Arc::new(IdentityMap::new())),
        };

        Ok(Arc::new(ModelClass {
            name,
            kind: self.kind,
            parent: self.parent,
            lineage,
            fields: table,
            identity,
        }))
    }
}

// Validate an identifier declaration and attach the generated default
// for string primaries without one.
fn check_identifier(
    class: &str,
    kind: ClassKind,
    field: &mut FieldDef,
) -> Result<(), ClassBuildError> {
    let Some(identifier) = field.identifier() else {
        return Ok(());
    };

    if kind != ClassKind::Entity {
        return Err(ClassBuildError::IdentifierOnModel {
            class: class.to_string(),
            field: field.name().to_string(),
        });
    }

    let ty = field.ty();
    let valid = !ty.array
        && matches!(
            ty.scalar,
            ScalarType::Primitive(Primitive::String | Primitive::Number)
        );
    if !valid {
        return Err(ClassBuildError::InvalidIdentifierType {
            class: class.to_string(),
            field: field.name().to_string(),
        });
    }

    if identifier == IdentifierKind::Primary
        && field.default().is_none()
        && ty.scalar == ScalarType::Primitive(Primitive::String)
    {
        field.set_default(FieldDefault::Producer(Arc::new(|_| {
            Value::Text(generator::generate())
        })));
    }

    Ok(())
}
