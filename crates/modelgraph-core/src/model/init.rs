use crate::{
    context::{Context, SourceId},
    error::Error,
    identity::{IdentifierKind, IdentityKey},
    mask::FieldMask,
    model::{
        Model, ModelClass,
        field::{Coercion, FieldDef},
        instance::Write,
    },
    value::{Record, Value},
};
use std::sync::Arc;
use tracing::{debug, trace};

///
/// InitOptions
///

#[derive(Clone, Copy, Default)]
pub(crate) struct InitOptions<'a> {
    pub mask: Option<&'a FieldMask>,
    pub deserialize: bool,
    pub source: Option<&'a SourceId>,
}

/// Produce the instance a plain record describes.
///
/// Entities are looked up in their identity map first (primary identifier,
/// then secondaries in declaration order) so that every reference to the
/// same identity ends up on one canonical instance.
///
/// Returns the instance and the requested fields the record did not supply.
pub(crate) fn materialize(
    class: &Arc<ModelClass>,
    record: &Record,
    options: &InitOptions<'_>,
    ctx: &Context,
) -> Result<(Model, FieldMask), Error> {
    let is_new = !options.deserialize || record.is_new();

    let (model, created) = if class.identity_map().is_some() {
        find_or_register(class, record, is_new, ctx)?
    } else {
        (Model::blank(class, is_new), true)
    };

    let fresh = created && is_new;
    let missing = initialize(&model, record, options, fresh, ctx)?;

    Ok((model, missing))
}

// Returns (instance, created).
fn find_or_register(
    class: &Arc<ModelClass>,
    record: &Record,
    is_new: bool,
    ctx: &Context,
) -> Result<(Model, bool), Error> {
    let Some(map) = class.identity_map() else {
        return Ok((Model::blank(class, is_new), true));
    };

    for attr in class.identifier_lookup_order() {
        let Some(raw) = record.get(attr.name()) else {
            continue;
        };
        let value = attr.create_value(class.name(), raw, ctx)?;
        let Some(key) = IdentityKey::from_value(&value) else {
            continue;
        };

        let found = match attr.identifier() {
            Some(IdentifierKind::Primary) => {
                let (model, existed) =
                    map.lookup_or_insert_with(attr.name(), key.clone(), || {
                        Model::blank(class, is_new)
                    });
                if !existed {
                    return Ok((model, true));
                }
                model
            }
            _ => match map.lookup(attr.name(), &key) {
                Some(model) => model,
                None => continue,
            },
        };

        if !found.class().is_a(class.name()) {
            return Err(Error::type_mismatch(
                class.name(),
                attr.name(),
                class.name(),
                found.class().name(),
            ));
        }

        debug!(
            entity = %class.name(),
            attribute = %attr.name(),
            key = %key,
            "merging into canonical instance"
        );

        return Ok((found, false));
    }

    Ok((Model::blank(class, is_new), true))
}

/// Apply `record` to `model`, field by field in declaration order.
///
/// Without a mask every declared field is touched. With a mask only the
/// selected fields are; a selected field absent from the record is recorded
/// as missing and left alone unless the instance is fresh. Defaults only
/// apply to fresh instances.
pub(crate) fn initialize(
    model: &Model,
    record: &Record,
    options: &InitOptions<'_>,
    fresh: bool,
    ctx: &Context,
) -> Result<FieldMask, Error> {
    let class = Arc::clone(model.class());
    let mut missing = FieldMask::empty();
    let undefined = Value::Undefined;

    for field in class.fields() {
        let name = field.name();
        let sub_mask = match options.mask {
            Some(mask) => match mask.get(name) {
                Some(sub) => Some(sub),
                None => continue,
            },
            None => None,
        };

        let raw = if let Some(raw) = record.get(name) {
            raw
        } else {
            if options.mask.is_some() {
                missing.insert(name, FieldMask::All);
            }
            if !fresh {
                continue;
            }
            &undefined
        };

        let coercion = Coercion {
            owner: class.name(),
            mask: sub_mask,
            deserialize: options.deserialize,
            source: options.source,
            ctx,
        };
        let coerced = field.coerce(raw, &coercion)?;
        if !coerced.missing.is_empty() {
            missing.insert(name, coerced.missing);
        }

        let mut value = coerced.value;
        if fresh && value.is_undefined() {
            value = default_for(model, field, &class, ctx)?;
        }

        model.store(field, value, options.source.cloned(), Write::Untracked)?;
    }

    trace!(
        entity = %class.name(),
        fresh,
        missing = %missing.to_json(),
        "initialized instance"
    );

    Ok(missing)
}

// Optional fields without a usable default settle on null; required ones
// stay undefined.
fn default_for(
    model: &Model,
    field: &FieldDef,
    class: &ModelClass,
    ctx: &Context,
) -> Result<Value, Error> {
    let fallback = || {
        if field.is_optional() {
            Value::Null
        } else {
            Value::Undefined
        }
    };

    let Some(default) = field.default() else {
        return Ok(fallback());
    };

    let produced = default.produce(model);
    if produced.is_undefined() {
        return Ok(fallback());
    }

    field.create_value(class.name(), &produced, ctx)
}
