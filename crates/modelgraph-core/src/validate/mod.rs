//! Validation engine.
//!
//! Walks active fields (optionally restricted by a mask) and collects
//! failed validators into a tree shaped like the instance. Nested models are
//! validated in place; an instance already on the current path is skipped.

mod tree;


pub use tree::{FailedValidator, FieldFailure, ValidationTree, ValueFailure};

use crate::{
    error::Error,
    mask::FieldMask,
    model::{FieldDef, Model},
    value::Value,
};
use serde_json::Value as JsonValue;
use std::{collections::HashSet, fmt::Debug, sync::Arc};

///
/// Validator
///
/// A named predicate over a field value. `args` is reported alongside the
/// name when the check fails.
///

pub trait Validator: Debug + Send + Sync {
    fn name(&self) -> &str;

    fn args(&self) -> Vec<JsonValue> {
        Vec::new()
    }

    fn validate(&self, value: &Value) -> bool;
}

fn failed(validators: &[Arc<dyn Validator>], value: &Value) -> Vec<FailedValidator> {
    validators
        .iter()
        .filter(|v| !v.validate(value))
        .map(|v| FailedValidator {
            name: v.name().to_string(),
            args: v.args(),
        })
        .collect()
}

impl Model {
    /// Failure tree for this instance; empty when everything passes.
    #[must_use]
    pub fn failed_validators(&self, mask: Option<&FieldMask>) -> ValidationTree {
        let mut path = HashSet::new();

        collect(self, mask, &mut path)
    }

    pub fn validate(&self, mask: Option<&FieldMask>) -> Result<(), Error> {
        let failures = self.failed_validators(mask);
        if failures.is_empty() {
            return Ok(());
        }

        Err(Error::ValidationFailed {
            entity: self.class().name().to_string(),
            failures,
        })
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.failed_validators(None).is_empty()
    }
}

// ============================================================================
// Walk
// ============================================================================

fn collect(model: &Model, mask: Option<&FieldMask>, path: &mut HashSet<usize>) -> ValidationTree {
    let mut tree = ValidationTree::default();
    if !path.insert(model.addr()) {
        return tree;
    }

    for (field, value, _) in model.active_snapshot() {
        let sub_mask = match mask.and_then(FieldMask::restriction) {
            Some(restriction) => match restriction.get(field.name()) {
                Some(sub) => Some(sub),
                None => continue,
            },
            None => None,
        };

        if let Some(failure) = check_field(&field, &value, sub_mask, path) {
            tree.insert(field.name(), failure);
        }
    }

    path.remove(&model.addr());

    tree
}

fn check_field(
    field: &FieldDef,
    value: &Value,
    mask: Option<&FieldMask>,
    path: &mut HashSet<usize>,
) -> Option<FieldFailure> {
    if field.is_optional() && value.is_nullish() {
        return None;
    }

    if let (true, Value::List(items)) = (field.is_array(), value) {
        let own = failed(field.validators(), value);
        let elements: Vec<_> = items
            .iter()
            .map(|item| {
                let failure = check_value(field.element_validators(), item, mask, path);
                (!failure.is_empty()).then_some(failure)
            })
            .collect();

        if own.is_empty() && elements.iter().all(Option::is_none) {
            return None;
        }

        return Some(FieldFailure::Array { own, elements });
    }

    let failure = check_value(field.validators(), value, mask, path);

    (!failure.is_empty()).then_some(FieldFailure::Value(failure))
}

fn check_value(
    validators: &[Arc<dyn Validator>],
    value: &Value,
    mask: Option<&FieldMask>,
    path: &mut HashSet<usize>,
) -> ValueFailure {
    let nested = match value {
        Value::Model(model) => collect(model, mask, path),
        _ => ValidationTree::default(),
    };

    ValueFailure {
        validators: failed(validators, value),
        nested,
    }
}
