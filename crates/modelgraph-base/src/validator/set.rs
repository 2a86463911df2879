use modelgraph_core::{validate::Validator, value::Value};
use serde_json::Value as JsonValue;

///
/// OneOf
/// Value must equal one of the allowed scalars.
///

#[derive(Clone, Debug)]
pub struct OneOf {
    allowed: Vec<Value>,
}

impl OneOf {
    pub fn new<T: Into<Value>>(allowed: impl IntoIterator<Item = T>) -> Self {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }
}

impl Validator for OneOf {
    fn name(&self) -> &str {
        "oneOf"
    }

    fn args(&self) -> Vec<JsonValue> {
        self.allowed
            .iter()
            .map(|v| match v {
                Value::Text(s) => JsonValue::String(s.clone()),
                Value::Number(n) => serde_json::Number::from_f64(*n)
                    .map_or(JsonValue::Null, JsonValue::Number),
                Value::Bool(b) => JsonValue::Bool(*b),
                _ => JsonValue::Null,
            })
            .collect()
    }

    fn validate(&self, value: &Value) -> bool {
        self.allowed.contains(value)
    }
}

///
/// TESTS
///
