use serde_json::{Map, Value as JsonValue};
use std::{collections::BTreeMap, fmt};

///
/// FailedValidator
/// Name plus the arguments the validator was configured with.
///

#[derive(Clone, Debug, PartialEq)]
pub struct FailedValidator {
    pub name: String,
    pub args: Vec<JsonValue>,
}

impl FailedValidator {
    /// `"name"`, or `["name", args...]` when the validator takes arguments.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        if self.args.is_empty() {
            return JsonValue::String(self.name.clone());
        }

        let mut out = Vec::with_capacity(self.args.len() + 1);
        out.push(JsonValue::String(self.name.clone()));
        out.extend(self.args.iter().cloned());

        JsonValue::Array(out)
    }
}

impl fmt::Display for FailedValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            write!(f, "{}", self.name)
        } else {
            let args: Vec<_> = self.args.iter().map(ToString::to_string).collect();
            write!(f, "{}({})", self.name, args.join(", "))
        }
    }
}

///
/// ValueFailure
///
/// Failures for one value: its own validators, and for model values the
/// failures inside the model.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValueFailure {
    pub validators: Vec<FailedValidator>,
    pub nested: ValidationTree,
}

impl ValueFailure {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty() && self.nested.is_empty()
    }

    /// List of failed validators, nested object, or `[list, object]` when both.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        let list = || JsonValue::Array(self.validators.iter().map(FailedValidator::to_json).collect());

        match (self.validators.is_empty(), self.nested.is_empty()) {
            (false, true) => list(),
            (true, false) => self.nested.to_json(),
            _ => JsonValue::Array(vec![list(), self.nested.to_json()]),
        }
    }
}

///
/// FieldFailure
///

#[derive(Clone, Debug, PartialEq)]
pub enum FieldFailure {
    Value(ValueFailure),
    /// `own` → whole-array validators; `elements` → one slot per element.
    Array {
        own: Vec<FailedValidator>,
        elements: Vec<Option<ValueFailure>>,
    },
}

impl FieldFailure {
    /// Arrays render as `[elements]`, or `[elements, own]` when whole-array
    /// validators failed; clean elements are `null`.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Value(failure) => failure.to_json(),
            Self::Array { own, elements } => {
                let elements = JsonValue::Array(
                    elements
                        .iter()
                        .map(|e| e.as_ref().map_or(JsonValue::Null, ValueFailure::to_json))
                        .collect(),
                );

                if own.is_empty() {
                    JsonValue::Array(vec![elements])
                } else {
                    let own = own.iter().map(FailedValidator::to_json).collect();
                    JsonValue::Array(vec![elements, JsonValue::Array(own)])
                }
            }
        }
    }
}

///
/// ValidationTree
/// Field name → failure, mirroring the instance's field structure.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationTree(BTreeMap<String, FieldFailure>);

impl ValidationTree {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldFailure> {
        self.0.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldFailure)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn insert(&mut self, field: impl Into<String>, failure: FieldFailure) {
        self.0.insert(field.into(), failure);
    }

    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        let map: Map<String, JsonValue> = self
            .0
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();

        JsonValue::Object(map)
    }
}

impl fmt::Display for ValidationTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}
