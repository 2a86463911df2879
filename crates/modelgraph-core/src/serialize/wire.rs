//! JSON wire form.
//!
//! ```json
//! {"_type": "Movie", "_new": true, "title": "Inception",
//!  "released": {"_type": "Date", "_value": "2010-07-16T00:00:00Z"},
//!  "_undefined": ["rating"]}
//! ```

use crate::{
    serialize::WireError,
    value::{Record, Timestamp, Value},
};
use serde_json::{Map, Number, Value as JsonValue};

pub const TYPE_KEY: &str = "_type";
pub const NEW_KEY: &str = "_new";
pub const UNDEFINED_KEY: &str = "_undefined";
pub const VALUE_KEY: &str = "_value";
pub const DATE_TYPE: &str = "Date";

// Largest integer an f64 holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

// ============================================================================
// Decode
// ============================================================================

/// Decode one wire object into a record.
pub fn decode_record(json: &JsonValue) -> Result<Record, WireError> {
    let JsonValue::Object(map) = json else {
        return Err(WireError::NotAnObject {
            found: kind(json).to_string(),
        });
    };

    let mut record = Record::new();

    if let Some(tag) = map.get(TYPE_KEY) {
        let JsonValue::String(name) = tag else {
            return Err(WireError::InvalidTypeTag {
                found: tag.to_string(),
            });
        };
        record.set_type_name(Some(name.clone()));
    }

    match map.get(NEW_KEY) {
        None | Some(JsonValue::Null) => {}
        Some(JsonValue::Bool(is_new)) => record.set_new(*is_new),
        Some(other) => {
            return Err(WireError::InvalidNewFlag {
                found: other.to_string(),
            });
        }
    }

    for (name, raw) in map {
        if matches!(name.as_str(), TYPE_KEY | NEW_KEY | UNDEFINED_KEY) {
            continue;
        }
        record.insert(name.clone(), decode_value(raw)?);
    }

    if let Some(undefined) = map.get(UNDEFINED_KEY) {
        let JsonValue::Array(names) = undefined else {
            return Err(WireError::InvalidUndefinedList);
        };
        for name in names {
            let JsonValue::String(name) = name else {
                return Err(WireError::InvalidUndefinedList);
            };
            record.insert(name.clone(), Value::Undefined);
        }
    }

    Ok(record)
}

pub fn decode_value(json: &JsonValue) -> Result<Value, WireError> {
    let value = match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => n.as_f64().map_or(Value::Null, Value::Number),
        JsonValue::String(s) => Value::Text(s.clone()),
        JsonValue::Array(items) => {
            Value::List(items.iter().map(decode_value).collect::<Result<_, _>>()?)
        }
        JsonValue::Object(map) => {
            if map.get(TYPE_KEY).and_then(JsonValue::as_str) == Some(DATE_TYPE) {
                decode_date(map)?
            } else {
                Value::Record(decode_record(json)?)
            }
        }
    };

    Ok(value)
}

fn decode_date(map: &Map<String, JsonValue>) -> Result<Value, WireError> {
    let raw = map
        .get(VALUE_KEY)
        .and_then(JsonValue::as_str)
        .ok_or_else(|| WireError::InvalidDate {
            value: JsonValue::Object(map.clone()).to_string(),
            reason: "missing string _value".to_string(),
        })?;

    Timestamp::parse(raw)
        .map(Value::Date)
        .map_err(|err| WireError::InvalidDate {
            value: raw.to_string(),
            reason: err.to_string(),
        })
}

// ============================================================================
// Encode
// ============================================================================

/// Integral values within the exact f64 range keep integer form; NaN and
/// infinities have no JSON form and become `null`.
pub(crate) fn encode_number(n: f64) -> JsonValue {
    if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        #[expect(clippy::cast_possible_truncation)]
        let int = n as i64;
        return JsonValue::Number(Number::from(int));
    }

    Number::from_f64(n).map_or(JsonValue::Null, JsonValue::Number)
}

pub(crate) fn encode_date(ts: &Timestamp) -> Result<JsonValue, WireError> {
    let mut map = Map::new();
    map.insert(TYPE_KEY.to_string(), JsonValue::String(DATE_TYPE.to_string()));
    map.insert(VALUE_KEY.to_string(), JsonValue::String(ts.to_rfc3339()?));

    Ok(JsonValue::Object(map))
}

const fn kind(json: &JsonValue) -> &'static str {
    match json {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
