use crate::{
    context::{Context, SourceId},
    error::Error,
    identity::IdentifierKind,
    mask::FieldMask,
    model::{Model, init},
    validate::Validator,
    value::Value,
};
use std::{
    fmt::{self, Display},
    str::FromStr,
    sync::Arc,
};
use thiserror::Error as ThisError;

///
/// Primitive
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Primitive {
    String,
    Number,
    Boolean,
    Date,
    /// Any defined value, models included.
    Any,
}

impl Primitive {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "Date",
            Self::Any => "any",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "Date" => Some(Self::Date),
            "any" => Some(Self::Any),
            _ => None,
        }
    }

    const fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::Any, _)
                | (Self::String, Value::Text(_))
                | (Self::Number, Value::Number(_))
                | (Self::Boolean, Value::Bool(_))
                | (Self::Date, Value::Date(_))
        )
    }
}

///
/// ScalarType
///
/// Model references are kept by name and resolved lazily, which is what
/// lets two classes refer to each other.
///

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum ScalarType {
    Primitive(Primitive),
    Model(String),
}

impl Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(p) => write!(f, "{}", p.as_str()),
            Self::Model(name) => write!(f, "{name}"),
        }
    }
}

///
/// FieldTypeError
///

#[derive(Debug, ThisError)]
pub enum FieldTypeError {
    #[error("empty field type")]
    Empty,

    #[error("invalid field type '{0}'")]
    Invalid(String),
}

///
/// FieldType
///
/// Declared shape of a field, written `scalar`, `scalar?`, `scalar[]`, or
/// `scalar[]?`. The trailing `?` permits undefined/null.
///

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct FieldType {
    pub scalar: ScalarType,
    pub array: bool,
    pub optional: bool,
}

impl FieldType {
    #[must_use]
    pub const fn primitive(p: Primitive) -> Self {
        Self {
            scalar: ScalarType::Primitive(p),
            array: false,
            optional: false,
        }
    }

    #[must_use]
    pub fn model(name: impl Into<String>) -> Self {
        Self {
            scalar: ScalarType::Model(name.into()),
            array: false,
            optional: false,
        }
    }

    #[must_use]
    pub const fn array(mut self) -> Self {
        self.array = true;
        self
    }

    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    #[must_use]
    pub fn model_name(&self) -> Option<&str> {
        match &self.scalar {
            ScalarType::Model(name) => Some(name),
            ScalarType::Primitive(_) => None,
        }
    }

    /// An override may relax or tighten optionality, nothing else.
    #[must_use]
    pub fn is_compatible_override(&self, inherited: &Self) -> bool {
        self.scalar == inherited.scalar && self.array == inherited.array
    }
}

impl FromStr for FieldType {
    type Err = FieldTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(FieldTypeError::Empty);
        }

        let (rest, optional) = match s.strip_suffix('?') {
            Some(rest) => (rest, true),
            None => (s, false),
        };
        let (name, array) = match rest.strip_suffix("[]") {
            Some(name) => (name, true),
            None => (rest, false),
        };

        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(FieldTypeError::Invalid(s.to_string()));
        }

        let scalar = Primitive::from_name(name)
            .map_or_else(|| ScalarType::Model(name.to_string()), ScalarType::Primitive);

        Ok(Self {
            scalar,
            array,
            optional,
        })
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.scalar)?;
        if self.array {
            write!(f, "[]")?;
        }
        if self.optional {
            write!(f, "?")?;
        }

        Ok(())
    }
}

///
/// FieldDefault
///

#[derive(Clone)]
pub enum FieldDefault {
    Value(Value),
    /// Evaluated lazily against the owning instance.
    Producer(Arc<dyn Fn(&Model) -> Value + Send + Sync>),
}

impl FieldDefault {
    pub(crate) fn produce(&self, model: &Model) -> Value {
        match self {
            Self::Value(v) => v.clone(),
            Self::Producer(f) => f(model),
        }
    }
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

///
/// FieldDef
///
/// Static per-class field metadata. Built once, shared by every instance.
/// For array fields `validators` check the whole array and
/// `element_validators` check each element.
///

#[derive(Clone, Debug)]
pub struct FieldDef {
    name: String,
    ty: FieldType,
    default: Option<FieldDefault>,
    validators: Vec<Arc<dyn Validator>>,
    element_validators: Vec<Arc<dyn Validator>>,
    identifier: Option<IdentifierKind>,
}

impl FieldDef {
    #[must_use]
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
            validators: Vec::new(),
            element_validators: Vec::new(),
            identifier: None,
        }
    }

    /// Declare a field from the textual type form, e.g. `"string[]?"`.
    pub fn parse(name: impl Into<String>, ty: &str) -> Result<Self, FieldTypeError> {
        Ok(Self::new(name, ty.parse()?))
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(FieldDefault::Value(value.into()));
        self
    }

    #[must_use]
    pub fn default_with(mut self, f: impl Fn(&Model) -> Value + Send + Sync + 'static) -> Self {
        self.default = Some(FieldDefault::Producer(Arc::new(f)));
        self
    }

    #[must_use]
    pub fn validator(mut self, v: impl Validator + 'static) -> Self {
        self.validators.push(Arc::new(v));
        self
    }

    #[must_use]
    pub fn element_validator(mut self, v: impl Validator + 'static) -> Self {
        self.element_validators.push(Arc::new(v));
        self
    }

    #[must_use]
    pub const fn primary(mut self) -> Self {
        self.identifier = Some(IdentifierKind::Primary);
        self
    }

    #[must_use]
    pub const fn secondary(mut self) -> Self {
        self.identifier = Some(IdentifierKind::Secondary);
        self
    }

    pub(crate) fn set_default(&mut self, default: FieldDefault) {
        self.default = Some(default);
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn ty(&self) -> &FieldType {
        &self.ty
    }

    #[must_use]
    pub const fn is_array(&self) -> bool {
        self.ty.array
    }

    #[must_use]
    pub const fn is_optional(&self) -> bool {
        self.ty.optional
    }

    #[must_use]
    pub const fn default(&self) -> Option<&FieldDefault> {
        self.default.as_ref()
    }

    #[must_use]
    pub fn validators(&self) -> &[Arc<dyn Validator>] {
        &self.validators
    }

    #[must_use]
    pub fn element_validators(&self) -> &[Arc<dyn Validator>] {
        &self.element_validators
    }

    #[must_use]
    pub const fn identifier(&self) -> Option<IdentifierKind> {
        self.identifier
    }

    /// Coerce a raw value against this field's declared shape.
    ///
    /// Plain records for model-typed fields are materialized into instances
    /// (entities through their identity map).
    pub fn create_value(&self, owner: &str, raw: &Value, ctx: &Context) -> Result<Value, Error> {
        let coercion = Coercion {
            owner,
            mask: None,
            deserialize: false,
            source: ctx.source(),
            ctx,
        };

        self.coerce(raw, &coercion).map(|c| c.value)
    }

    pub(crate) fn coerce(&self, raw: &Value, c: &Coercion<'_>) -> Result<Coerced, Error> {
        match raw {
            Value::Undefined => return Ok(Coerced::plain(Value::Undefined)),
            Value::Null if self.ty.optional => return Ok(Coerced::plain(Value::Null)),
            _ => {}
        }

        if !self.ty.array {
            return self.coerce_scalar(raw, c);
        }

        let Value::List(items) = raw else {
            return Err(self.mismatch(c.owner, raw));
        };

        // fresh sequence; never alias the caller's list
        let mut out = Vec::with_capacity(items.len());
        let mut missing = FieldMask::empty();
        for item in items {
            let coerced = self.coerce_scalar(item, c)?;
            missing.union(&coerced.missing);
            out.push(coerced.value);
        }

        Ok(Coerced {
            value: Value::List(out),
            missing,
        })
    }

    fn coerce_scalar(&self, raw: &Value, c: &Coercion<'_>) -> Result<Coerced, Error> {
        match &self.ty.scalar {
            ScalarType::Primitive(p) if p.accepts(raw) => Ok(Coerced::plain(raw.clone())),
            ScalarType::Primitive(_) => Err(self.mismatch(c.owner, raw)),
            ScalarType::Model(declared) => match raw {
                Value::Model(model) => {
                    if model.class().is_a(declared) {
                        Ok(Coerced::plain(raw.clone()))
                    } else {
                        Err(self.mismatch(c.owner, raw))
                    }
                }
                Value::Record(record) => {
                    let target = match record.type_name() {
                        Some(name) if name != declared => c.ctx.resolve(name)?,
                        _ => c.ctx.resolve(declared)?,
                    };
                    if !target.is_a(declared) {
                        return Err(self.mismatch(c.owner, raw));
                    }

                    let options = init::InitOptions {
                        mask: c.mask,
                        deserialize: c.deserialize,
                        source: c.source,
                    };
                    let (model, missing) = init::materialize(&target, record, &options, c.ctx)?;

                    Ok(Coerced {
                        value: Value::Model(model),
                        missing,
                    })
                }
                _ => Err(self.mismatch(c.owner, raw)),
            },
        }
    }

    fn mismatch(&self, owner: &str, raw: &Value) -> Error {
        Error::type_mismatch(owner, &self.name, &self.ty, raw.kind_name())
    }
}

///
/// Coercion
/// Per-call state threaded through `FieldDef::coerce`.
///

pub(crate) struct Coercion<'a> {
    pub owner: &'a str,
    pub mask: Option<&'a FieldMask>,
    pub deserialize: bool,
    pub source: Option<&'a SourceId>,
    pub ctx: &'a Context,
}

///
/// Coerced
/// A coerced value plus the fields nested records failed to supply.
///

pub(crate) struct Coerced {
    pub value: Value,
    pub missing: FieldMask,
}

impl Coerced {
    const fn plain(value: Value) -> Self {
        Self {
            value,
            missing: FieldMask::empty(),
        }
    }
}
