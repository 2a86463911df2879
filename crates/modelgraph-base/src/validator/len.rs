use modelgraph_core::{validate::Validator, value::Value};
use serde_json::Value as JsonValue;

// Length of text (in chars) or lists; other values have none and pass.
fn len(value: &Value) -> Option<usize> {
    match value {
        Value::Text(s) => Some(s.chars().count()),
        Value::List(items) => Some(items.len()),
        _ => None,
    }
}

///
/// NotEmpty
///

#[derive(Clone, Copy, Debug, Default)]
pub struct NotEmpty;

impl Validator for NotEmpty {
    fn name(&self) -> &str {
        "notEmpty"
    }

    fn validate(&self, value: &Value) -> bool {
        len(value).is_none_or(|len| len > 0)
    }
}

///
/// MinLength
///

#[derive(Clone, Copy, Debug)]
pub struct MinLength {
    target: usize,
}

impl MinLength {
    #[must_use]
    pub const fn new(target: usize) -> Self {
        Self { target }
    }
}

impl Validator for MinLength {
    fn name(&self) -> &str {
        "minLength"
    }

    fn args(&self) -> Vec<JsonValue> {
        vec![self.target.into()]
    }

    fn validate(&self, value: &Value) -> bool {
        len(value).is_none_or(|len| len >= self.target)
    }
}

///
/// MaxLength
///

#[derive(Clone, Copy, Debug)]
pub struct MaxLength {
    target: usize,
}

impl MaxLength {
    #[must_use]
    pub const fn new(target: usize) -> Self {
        Self { target }
    }
}

impl Validator for MaxLength {
    fn name(&self) -> &str {
        "maxLength"
    }

    fn args(&self) -> Vec<JsonValue> {
        vec![self.target.into()]
    }

    fn validate(&self, value: &Value) -> bool {
        len(value).is_none_or(|len| len <= self.target)
    }
}

///
/// TESTS
///
