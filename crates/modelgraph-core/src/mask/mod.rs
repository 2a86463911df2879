//! Field selection trees used by partial serialize, deserialize, validate,
//! and active-field checks.


use crate::model::ModelClass;
use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeMap, btree_map};
use thiserror::Error as ThisError;

///
/// FieldMaskError
///

#[derive(Debug, ThisError)]
pub enum FieldMaskError {
    #[error("field mask must be `true` or an object, found {found}")]
    InvalidShape { found: String },

    #[error("field mask entry '{field}' must be `true` or an object")]
    InvalidEntry { field: String },
}

///
/// FieldMask
///
/// All    → everything below this point is selected.
/// Fields → only the named fields, each with its own restriction.
///
/// An empty `Fields` selects nothing.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FieldMask {
    All,
    Fields(BTreeMap<String, Self>),
}

impl Default for FieldMask {
    fn default() -> Self {
        Self::empty()
    }
}

impl FieldMask {
    #[must_use]
    pub const fn empty() -> Self {
        Self::Fields(BTreeMap::new())
    }

    /// Mask selecting each named field entirely.
    pub fn of<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self::Fields(fields.into_iter().map(|f| (f.into(), Self::All)).collect())
    }

    /// Builder-style insertion of a (possibly nested) entry.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, sub: Self) -> Self {
        self.insert(field, sub);
        self
    }

    /// Expand `All` against a class: every declared field maps to `All`.
    #[must_use]
    pub fn for_class(class: &ModelClass) -> Self {
        Self::of(class.fields().iter().map(|f| f.name().to_string()))
    }

    #[must_use]
    pub const fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// True when nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::All => false,
            Self::Fields(fields) => fields.is_empty(),
        }
    }

    #[must_use]
    pub fn includes(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Sub-mask for a field, or `None` when the field is excluded.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Self> {
        match self {
            Self::All => Some(&Self::All),
            Self::Fields(fields) => fields.get(field),
        }
    }

    /// `None` when this mask places no restriction.
    #[must_use]
    pub const fn restriction(&self) -> Option<&Self> {
        match self {
            Self::All => None,
            Self::Fields(_) => Some(self),
        }
    }

    /// Insert an entry, merging with any existing one.
    /// Inserting into `All` is a no-op since it already covers the field.
    pub fn insert(&mut self, field: impl Into<String>, sub: Self) {
        let Self::Fields(fields) = self else {
            return;
        };

        match fields.entry(field.into()) {
            btree_map::Entry::Occupied(mut entry) => entry.get_mut().union(&sub),
            btree_map::Entry::Vacant(entry) => {
                entry.insert(sub);
            }
        }
    }

    /// Merge `other` into `self` (set union, recursively).
    pub fn union(&mut self, other: &Self) {
        if self.is_all() {
            return;
        }

        match other {
            Self::All => *self = Self::All,
            Self::Fields(theirs) => {
                for (name, sub) in theirs {
                    self.insert(name.clone(), sub.clone());
                }
            }
        }
    }

    /// Union of several masks; the empty union selects nothing.
    pub fn merged<'a>(masks: impl IntoIterator<Item = &'a Self>) -> Self {
        let mut out = Self::empty();
        for mask in masks {
            out.union(mask);
        }

        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Self)> {
        let fields = match self {
            Self::All => None,
            Self::Fields(fields) => Some(fields.iter().map(|(k, v)| (k.as_str(), v))),
        };

        fields.into_iter().flatten()
    }

    ///
    /// JSON FORM
    ///

    /// Parse the plain form: `true` or a nested object of `true`/objects.
    pub fn from_json(value: &JsonValue) -> Result<Self, FieldMaskError> {
        match value {
            JsonValue::Bool(true) => Ok(Self::All),
            JsonValue::Object(map) => {
                let mut fields = BTreeMap::new();
                for (name, entry) in map {
                    let sub = match entry {
                        JsonValue::Bool(true) => Self::All,
                        JsonValue::Object(_) => Self::from_json(entry)?,
                        _ => {
                            return Err(FieldMaskError::InvalidEntry {
                                field: name.clone(),
                            });
                        }
                    };
                    fields.insert(name.clone(), sub);
                }

                Ok(Self::Fields(fields))
            }
            other => Err(FieldMaskError::InvalidShape {
                found: other.to_string(),
            }),
        }
    }

    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::All => JsonValue::Bool(true),
            Self::Fields(fields) => JsonValue::Object(
                fields
                    .iter()
                    .map(|(name, sub)| (name.clone(), sub.to_json()))
                    .collect::<Map<_, _>>(),
            ),
        }
    }
}
