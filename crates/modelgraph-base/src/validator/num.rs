use modelgraph_core::{validate::Validator, value::Value};
use serde_json::Value as JsonValue;

///
/// Range
/// Inclusive bounds on number values. NaN is out of every range.
///

#[derive(Clone, Copy, Debug)]
pub struct Range {
    min: f64,
    max: f64,
}

impl Range {
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

impl Validator for Range {
    fn name(&self) -> &str {
        "range"
    }

    fn args(&self) -> Vec<JsonValue> {
        vec![number(self.min), number(self.max)]
    }

    fn validate(&self, value: &Value) -> bool {
        match value {
            Value::Number(n) => *n >= self.min && *n <= self.max,
            _ => true,
        }
    }
}

fn number(n: f64) -> JsonValue {
    serde_json::Number::from_f64(n).map_or(JsonValue::Null, JsonValue::Number)
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bounds_are_inclusive() {
        let range = Range::new(1.0, 10.0);

        assert!(range.validate(&Value::Number(1.0)));
        assert!(range.validate(&Value::Number(10.0)));
        assert!(!range.validate(&Value::Number(10.5)));
        assert!(!range.validate(&Value::Number(f64::NAN)));
        assert!(range.validate(&Value::from("text")));
        assert_eq!(range.args(), vec![json!(1.0), json!(10.0)]);
    }
}
