use crate::{
    context::Context,
    error::Error,
    identity::IdentityKey,
    model::{Model, ModelClass},
    value::Value,
};
use serde_json::{Map, Value as JsonValue};

///
/// IdentifierDescriptor
///
/// Names an entity by one identifier attribute and its value.
///

#[derive(Clone, Debug, PartialEq)]
pub struct IdentifierDescriptor {
    pub attribute: String,
    pub value: Value,
}

impl IdentifierDescriptor {
    #[must_use]
    pub fn key(&self) -> Option<IdentityKey> {
        IdentityKey::from_value(&self.value)
    }

    /// `{attribute: value}`
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        let value = match &self.value {
            Value::Text(s) => JsonValue::String(s.clone()),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map_or(JsonValue::Null, JsonValue::Number),
            _ => JsonValue::Null,
        };

        let mut map = Map::new();
        map.insert(self.attribute.clone(), value);

        JsonValue::Object(map)
    }
}

impl ModelClass {
    /// Accept a bare primitive (the primary identifier) or a single-key
    /// object naming one identifier attribute.
    pub fn normalize_identifier_descriptor(
        &self,
        input: &JsonValue,
    ) -> Result<IdentifierDescriptor, Error> {
        let (attribute, raw) = match input {
            JsonValue::String(_) | JsonValue::Number(_) => {
                (self.primary_identifier_attribute()?, input)
            }
            JsonValue::Object(map) => {
                let mut entries = map.iter();
                let (name, raw) = match (entries.next(), entries.next()) {
                    (Some(entry), None) => entry,
                    (None, _) => {
                        return Err(Error::invalid_descriptor(self.name(), "no attribute given"));
                    }
                    (Some(_), Some(_)) => {
                        return Err(Error::invalid_descriptor(
                            self.name(),
                            format!("expected one attribute, got {}", map.len()),
                        ));
                    }
                };

                let attribute = self
                    .field(name)
                    .filter(|f| f.identifier().is_some())
                    .ok_or_else(|| {
                        Error::invalid_descriptor(
                            self.name(),
                            format!("'{name}' is not an identifier attribute"),
                        )
                    })?;

                (attribute, raw)
            }
            other => {
                return Err(Error::invalid_descriptor(
                    self.name(),
                    format!("unsupported descriptor {other}"),
                ));
            }
        };

        let value = match raw {
            JsonValue::String(s) => Value::Text(s.clone()),
            JsonValue::Number(n) => n.as_f64().map_or(Value::Null, Value::Number),
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Array(_) | JsonValue::Object(_) => Value::Record(Default::default()),
        };
        let value = attribute.create_value(self.name(), &value, &Context::detached())?;
        if value.is_nullish() {
            return Err(Error::invalid_descriptor(
                self.name(),
                format!("'{}' has no value", attribute.name()),
            ));
        }

        Ok(IdentifierDescriptor {
            attribute: attribute.name().to_string(),
            value,
        })
    }

    /// Canonical live instance named by `descriptor`, if any.
    #[must_use]
    pub fn find(&self, descriptor: &IdentifierDescriptor) -> Option<Model> {
        let key = descriptor.key()?;
        let model = self.identity_map()?.lookup(&descriptor.attribute, &key)?;

        model.class().is_a(self.name()).then_some(model)
    }
}

impl Model {
    /// The primary identifier if set, else the first set secondary
    /// identifier in declaration order.
    pub fn identifier_descriptor(&self) -> Result<IdentifierDescriptor, Error> {
        let class = self.class();
        let state = self.lock_state();

        class
            .identifier_lookup_order()
            .into_iter()
            .find_map(|attr| {
                let value = state.values.get(attr.name())?;
                IdentityKey::from_value(value).map(|_| IdentifierDescriptor {
                    attribute: attr.name().to_string(),
                    value: value.clone(),
                })
            })
            .ok_or_else(|| Error::IdentifierNotSet {
                entity: class.name().to_string(),
            })
    }
}
