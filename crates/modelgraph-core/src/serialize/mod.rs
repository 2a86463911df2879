pub mod wire;


use crate::{
    context::{Context, SourceId},
    error::Error,
    mask::FieldMask,
    model::{
        Model, ModelClass,
        init::{self, InitOptions},
    },
    value::{Record, Value},
};
use serde_json::{Map, Value as JsonValue};
use std::{collections::HashSet, sync::Arc};
use thiserror::Error as ThisError;
use tracing::debug;

///
/// WireError
///

#[derive(Debug, ThisError)]
pub enum WireError {
    #[error("cannot format date: {0}")]
    DateFormat(#[from] time::error::Format),

    #[error("invalid date {value}: {reason}")]
    InvalidDate { value: String, reason: String },

    #[error("_new must be a boolean, found {found}")]
    InvalidNewFlag { found: String },

    #[error("_type must be a string, found {found}")]
    InvalidTypeTag { found: String },

    #[error("_undefined must be a list of field names")]
    InvalidUndefinedList,

    #[error("expected an object, found {found}")]
    NotAnObject { found: String },
}

///
/// SerializeOptions
///

#[derive(Clone, Debug, Default)]
pub struct SerializeOptions {
    /// Omit fields whose recorded source is this peer.
    pub target: Option<SourceId>,
    pub mask: Option<FieldMask>,
}

impl SerializeOptions {
    #[must_use]
    pub fn target(mut self, target: impl Into<SourceId>) -> Self {
        self.target = Some(target.into());
        self
    }

    #[must_use]
    pub fn mask(mut self, mask: FieldMask) -> Self {
        self.mask = Some(mask);
        self
    }
}

///
/// DeserializeOptions
///

#[derive(Clone, Debug, Default)]
pub struct DeserializeOptions {
    pub mask: Option<FieldMask>,
    /// Recorded on every field the payload sets.
    pub source: Option<SourceId>,
}

impl DeserializeOptions {
    #[must_use]
    pub fn mask(mut self, mask: FieldMask) -> Self {
        self.mask = Some(mask);
        self
    }

    #[must_use]
    pub fn source(mut self, source: impl Into<SourceId>) -> Self {
        self.source = Some(source.into());
        self
    }
}

///
/// Deserialized
///

#[derive(Debug)]
pub struct Deserialized {
    pub model: Model,
    /// Requested fields the payload did not carry.
    pub missing_fields: FieldMask,
}

// ============================================================================
// Model entry points
// ============================================================================

impl Model {
    /// Encode to the wire form. Validates first when the context asks for it.
    pub fn serialize(&self, options: &SerializeOptions, ctx: &Context) -> Result<JsonValue, Error> {
        if ctx.validate_on_serialize() {
            self.validate(options.mask.as_ref())?;
        }

        let mut encoder = Encoder {
            target: options.target.as_ref(),
            path: HashSet::new(),
        };

        encoder.model(self, options.mask.as_ref())
    }

    /// Decode a wire payload into an instance of `class` (or of the subclass
    /// its `_type` names), reusing canonical entity instances.
    pub fn deserialize(
        class: &Arc<ModelClass>,
        payload: &JsonValue,
        options: &DeserializeOptions,
        ctx: &Context,
    ) -> Result<Deserialized, Error> {
        let record = wire::decode_record(payload)?;
        Self::from_record(class, &record, options, ctx)
    }

    /// As `deserialize`, from an already decoded record.
    pub fn from_record(
        class: &Arc<ModelClass>,
        record: &Record,
        options: &DeserializeOptions,
        ctx: &Context,
    ) -> Result<Deserialized, Error> {
        let target = match record.type_name() {
            Some(name) if name != class.name() => ctx.resolve(name)?,
            _ => Arc::clone(class),
        };
        if !target.is_a(class.name()) {
            return Err(Error::type_mismatch(
                class.name(),
                "_type",
                class.name(),
                target.name(),
            ));
        }

        let init = InitOptions {
            mask: options.mask.as_ref(),
            deserialize: true,
            source: options.source.as_ref(),
        };
        let (model, missing_fields) = init::materialize(&target, record, &init, ctx)?;

        if !missing_fields.is_empty() {
            debug!(
                entity = %target.name(),
                missing = %missing_fields.to_json(),
                "payload missing requested fields"
            );
        }

        Ok(Deserialized {
            model,
            missing_fields,
        })
    }
}

// ============================================================================
// Encoder
// ============================================================================

struct Encoder<'a> {
    target: Option<&'a SourceId>,
    path: HashSet<usize>,
}

impl Encoder<'_> {
    fn model(&mut self, model: &Model, mask: Option<&FieldMask>) -> Result<JsonValue, Error> {
        if !self.path.insert(model.addr()) {
            return Ok(stub(model));
        }

        let mut out = Map::new();
        out.insert(
            wire::TYPE_KEY.to_string(),
            JsonValue::String(model.class().name().to_string()),
        );
        if model.is_new() {
            out.insert(wire::NEW_KEY.to_string(), JsonValue::Bool(true));
        }

        let mut undefined = Vec::new();
        for (field, value, source) in model.active_snapshot() {
            let sub_mask = match mask.and_then(FieldMask::restriction) {
                Some(restriction) => match restriction.get(field.name()) {
                    Some(sub) => Some(sub),
                    None => continue,
                },
                None => None,
            };
            if self.target.is_some() && source.as_ref() == self.target {
                continue;
            }

            if value.is_undefined() {
                undefined.push(JsonValue::String(field.name().to_string()));
                continue;
            }

            out.insert(field.name().to_string(), self.value(&value, sub_mask)?);
        }

        if !undefined.is_empty() {
            out.insert(wire::UNDEFINED_KEY.to_string(), JsonValue::Array(undefined));
        }

        self.path.remove(&model.addr());

        Ok(JsonValue::Object(out))
    }

    fn value(&mut self, value: &Value, mask: Option<&FieldMask>) -> Result<JsonValue, Error> {
        let json = match value {
            Value::Undefined | Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Number(n) => wire::encode_number(*n),
            Value::Text(s) => JsonValue::String(s.clone()),
            Value::Date(ts) => wire::encode_date(ts)?,
            Value::List(items) => JsonValue::Array(
                items
                    .iter()
                    .map(|item| self.value(item, mask))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Record(record) => self.record(record)?,
            Value::Model(model) => self.model(model, mask)?,
        };

        Ok(json)
    }

    fn record(&mut self, record: &Record) -> Result<JsonValue, Error> {
        let mut out = Map::new();
        if let Some(name) = record.type_name() {
            out.insert(wire::TYPE_KEY.to_string(), JsonValue::String(name.to_string()));
        }
        for (name, value) in record.iter() {
            out.insert(name.clone(), self.value(value, None)?);
        }

        Ok(JsonValue::Object(out))
    }
}

// Back-reference to an instance already being encoded: type tag plus
// identifier attributes, enough for the receiver to resolve it.
fn stub(model: &Model) -> JsonValue {
    let mut out = Map::new();
    out.insert(
        wire::TYPE_KEY.to_string(),
        JsonValue::String(model.class().name().to_string()),
    );

    let identifiers: Vec<_> = model.class().identifier_attributes().cloned().collect();
    for (field, value, _) in model.active_snapshot() {
        if !identifiers.iter().any(|f| Arc::ptr_eq(f, &field)) {
            continue;
        }
        let json = match &value {
            Value::Text(s) => JsonValue::String(s.clone()),
            Value::Number(n) => wire::encode_number(*n),
            _ => continue,
        };
        out.insert(field.name().to_string(), json);
    }

    JsonValue::Object(out)
}
