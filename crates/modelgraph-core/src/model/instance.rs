use crate::{
    context::{Context, SourceId},
    error::Error,
    identity::{IdentifierKind, IdentityKey},
    mask::FieldMask,
    model::{
        ModelClass,
        field::{Coercion, FieldDef},
        init::{self, InitOptions},
    },
    observe::{ModelEvent, Observers},
    value::{Record, Value},
};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

///
/// Model
///
/// Shared handle to one model or entity instance. Cloning the handle never
/// copies the instance; equality of handles is identity (`ptr_eq`).
///

#[derive(Clone)]
pub struct Model(pub(crate) Arc<ModelInner>);

pub(crate) struct ModelInner {
    pub(crate) class: Arc<ModelClass>,
    pub(crate) state: Mutex<ModelState>,
    pub(crate) observers: Observers,
}

///
/// ModelState
///
/// Invariant: every key of `values` and `sources` is also in `active`.
///

#[derive(Default)]
pub(crate) struct ModelState {
    pub(crate) values: BTreeMap<String, Value>,
    pub(crate) active: BTreeSet<String>,
    pub(crate) sources: BTreeMap<String, SourceId>,
    pub(crate) saved: BTreeMap<String, Slot>,
    pub(crate) is_new: bool,
}

///
/// Slot
/// Everything needed to put a field back exactly as it was.
///

#[derive(Clone, Debug)]
pub(crate) struct Slot {
    pub(crate) value: Value,
    pub(crate) active: bool,
    pub(crate) source: Option<SourceId>,
}

///
/// Write
///
/// Tracked   → snapshot before the first change since the last commit.
/// Untracked → initialization / deserialization; no snapshot.
/// Restore   → rollback; no snapshot, primary identifier may revert.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Write {
    Tracked,
    Untracked,
    Restore,
}

///
/// SetOptions
///

#[derive(Clone, Debug, Default)]
pub struct SetOptions {
    /// Origin tag; defaults to the context's source identity.
    pub source: Option<SourceId>,
    /// Skip the pre-change snapshot.
    pub deserialize: bool,
}

impl Model {
    /// Construct an instance from a plain record.
    ///
    /// For entities carrying an identifier already in the identity map this
    /// merges into, and returns, the canonical instance.
    pub fn new(class: &Arc<ModelClass>, record: &Record, ctx: &Context) -> Result<Self, Error> {
        let options = InitOptions {
            mask: None,
            deserialize: false,
            source: ctx.source(),
        };

        init::materialize(class, record, &options, ctx).map(|(model, _)| model)
    }

    /// Construct an instance restricted to `mask`, returning the requested
    /// fields the record did not supply.
    pub fn new_masked(
        class: &Arc<ModelClass>,
        record: &Record,
        mask: &FieldMask,
        ctx: &Context,
    ) -> Result<(Self, FieldMask), Error> {
        let options = InitOptions {
            mask: Some(mask),
            deserialize: false,
            source: ctx.source(),
        };

        init::materialize(class, record, &options, ctx)
    }

    pub(crate) fn blank(class: &Arc<ModelClass>, is_new: bool) -> Self {
        Self(Arc::new(ModelInner {
            class: Arc::clone(class),
            state: Mutex::new(ModelState {
                is_new,
                ..ModelState::default()
            }),
            observers: Observers::default(),
        }))
    }

    #[must_use]
    pub fn class(&self) -> &Arc<ModelClass> {
        &self.0.class
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn downgrade(&self) -> WeakModel {
        WeakModel(Arc::downgrade(&self.0))
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0).addr()
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, ModelState> {
        self.0.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    ///
    /// LIFECYCLE
    ///

    #[must_use]
    pub fn is_new(&self) -> bool {
        self.lock_state().is_new
    }

    /// Flip the lifecycle flag, e.g. once a persistence collaborator has stored it.
    pub fn set_new(&self, is_new: bool) {
        self.lock_state().is_new = is_new;
    }

    ///
    /// ACTIVE FIELDS
    ///

    #[must_use]
    pub fn is_active(&self, field: &str) -> bool {
        self.lock_state().active.contains(field)
    }

    /// Active field names in declaration order.
    #[must_use]
    pub fn active_fields(&self) -> Vec<String> {
        let state = self.lock_state();

        self.class()
            .fields()
            .iter()
            .map(|f| f.name())
            .filter(|name| state.active.contains(*name))
            .map(str::to_string)
            .collect()
    }

    /// True when every field selected by `mask` is active, recursively
    /// through held submodels and entities.
    #[must_use]
    pub fn fields_active(&self, mask: &FieldMask) -> bool {
        let class = Arc::clone(self.class());
        let all = FieldMask::All;
        let selected: Vec<_> = match mask {
            FieldMask::All => class.fields().iter().map(|f| (f, &all)).collect(),
            FieldMask::Fields(_) => mask
                .iter()
                .filter_map(|(name, sub)| class.field(name).map(|f| (f, sub)))
                .collect(),
        };
        if let FieldMask::Fields(fields) = mask
            && fields.keys().any(|name| class.field(name).is_none())
        {
            return false;
        }

        for (field, sub) in selected {
            let value = {
                let state = self.lock_state();
                if !state.active.contains(field.name()) {
                    return false;
                }
                state.values.get(field.name()).cloned().unwrap_or_default()
            };

            if let FieldMask::Fields(_) = sub {
                let mut held = Vec::new();
                collect_models(&value, &mut held);
                if !held.iter().all(|m| m.fields_active(sub)) {
                    return false;
                }
            }
        }

        true
    }

    ///
    /// GET / SET
    ///

    /// Current value of an active field. Array fields read as an empty list
    /// when undefined, and that list is kept so later edits are observed.
    pub fn get_field(&self, name: &str) -> Result<Value, Error> {
        let field = self.class().require_field(name)?;
        let mut state = self.lock_state();
        if !state.active.contains(name) {
            return Err(Error::FieldNotActive {
                entity: self.class().name().to_string(),
                field: name.to_string(),
            });
        }

        let value = state.values.entry(name.to_string()).or_default();
        if field.is_array() && value.is_undefined() {
            *value = Value::List(Vec::new());
        }

        Ok(value.clone())
    }

    /// Source tag recorded for a field, if any.
    #[must_use]
    pub fn source_of(&self, name: &str) -> Option<SourceId> {
        self.lock_state().sources.get(name).cloned()
    }

    /// Set a field with the context's source identity, snapshotting the
    /// previous value.
    pub fn set_field(&self, name: &str, value: impl Into<Value>, ctx: &Context) -> Result<(), Error> {
        self.set_field_with(name, value, SetOptions::default(), ctx)
    }

    pub fn set_field_with(
        &self,
        name: &str,
        value: impl Into<Value>,
        options: SetOptions,
        ctx: &Context,
    ) -> Result<(), Error> {
        let class = Arc::clone(self.class());
        let field = class.require_field(name)?;
        let source = options.source.or_else(|| ctx.source().cloned());

        let coercion = Coercion {
            owner: class.name(),
            mask: None,
            deserialize: options.deserialize,
            source: source.as_ref(),
            ctx,
        };
        let coerced = field.coerce(&value.into(), &coercion)?;

        let write = if options.deserialize {
            Write::Untracked
        } else {
            Write::Tracked
        };

        self.store(field, coerced.value, source, write)
    }

    /// Set several fields at once, snapshotting like `set_field`.
    ///
    /// Every value is coerced before any is stored, so an unknown name or a
    /// type mismatch changes nothing. An identifier conflict can still stop
    /// the store part-way; `rollback` undoes what was stored.
    pub fn assign(&self, record: &Record, ctx: &Context) -> Result<(), Error> {
        let class = Arc::clone(self.class());
        let source = ctx.source().cloned();
        let coercion = Coercion {
            owner: class.name(),
            mask: None,
            deserialize: false,
            source: source.as_ref(),
            ctx,
        };

        let mut staged = Vec::with_capacity(record.len());
        for (name, value) in record.iter() {
            let field = class.require_field(name)?;
            staged.push((field, field.coerce(value, &coercion)?.value));
        }

        for (field, value) in staged {
            self.store(field, value, source.clone(), Write::Tracked)?;
        }

        Ok(())
    }

    /// Edit an active field's value in place. Bypasses coercion, snapshots
    /// and notification; call `notify` afterwards if observers care.
    pub fn edit_field<R>(&self, name: &str, f: impl FnOnce(&mut Value) -> R) -> Result<R, Error> {
        let mut value = self.get_field(name)?;
        let out = f(&mut value);
        self.lock_state().values.insert(name.to_string(), value);

        Ok(out)
    }

    ///
    /// STORE
    ///

    pub(crate) fn store(
        &self,
        field: &FieldDef,
        value: Value,
        source: Option<SourceId>,
        write: Write,
    ) -> Result<(), Error> {
        let slot = Slot {
            value,
            active: true,
            source,
        };

        self.store_slot(field, slot, write)
    }

    pub(crate) fn store_slot(&self, field: &FieldDef, slot: Slot, write: Write) -> Result<(), Error> {
        let name = field.name();
        let source = slot.active.then(|| slot.source.clone()).flatten();
        let identity = field
            .identifier()
            .zip(self.class().identity_map().map(Arc::clone));

        if let Some((kind, map)) = identity {
            let current = self
                .lock_state()
                .values
                .get(name)
                .cloned()
                .unwrap_or_default();

            if kind == IdentifierKind::Primary
                && write != Write::Restore
                && !current.is_nullish()
                && current != slot.value
            {
                return Err(Error::PrimaryIdentifierAlreadySet {
                    entity: self.class().name().to_string(),
                    attribute: name.to_string(),
                });
            }

            let old = IdentityKey::from_value(&current);
            let new = if slot.active {
                IdentityKey::from_value(&slot.value)
            } else {
                None
            };

            map.reassign(self, name, old.as_ref(), new, || {
                self.write_slot(name, slot, write);
            })?;
        } else {
            self.write_slot(name, slot, write);
        }

        self.publish(&ModelEvent::FieldChanged {
            field: name.to_string(),
            source,
        });

        Ok(())
    }

    fn write_slot(&self, name: &str, slot: Slot, write: Write) {
        let mut state = self.lock_state();

        if write == Write::Tracked && !state.saved.contains_key(name) {
            let previous = Slot {
                value: state.values.get(name).cloned().unwrap_or_default(),
                active: state.active.contains(name),
                source: state.sources.get(name).cloned(),
            };
            state.saved.insert(name.to_string(), previous);
        }

        if slot.active {
            state.values.insert(name.to_string(), slot.value);
            state.active.insert(name.to_string());
            match slot.source {
                Some(source) => state.sources.insert(name.to_string(), source),
                None => state.sources.remove(name),
            };
        } else {
            state.values.remove(name);
            state.active.remove(name);
            state.sources.remove(name);
        }
    }

    /// Active fields in declaration order with their values and sources.
    /// Undefined arrays read as empty lists.
    pub(crate) fn active_snapshot(&self) -> Vec<(Arc<FieldDef>, Value, Option<SourceId>)> {
        let state = self.lock_state();

        self.class()
            .fields()
            .iter()
            .filter(|f| state.active.contains(f.name()))
            .map(|f| {
                let mut value = state.values.get(f.name()).cloned().unwrap_or_default();
                if f.is_array() && value.is_undefined() {
                    value = Value::List(Vec::new());
                }
                (Arc::clone(f), value, state.sources.get(f.name()).cloned())
            })
            .collect()
    }

    /// Models directly held by this instance's field values.
    pub(crate) fn held_models(&self) -> Vec<Self> {
        let state = self.lock_state();
        let mut out = Vec::new();
        for value in state.values.values() {
            collect_models(value, &mut out);
        }

        out
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("class", &self.class().name())
            .field("addr", &format_args!("{:#x}", self.addr()))
            .finish()
    }
}

/// Push every model reachable through `value` without entering the models
/// themselves.
pub(crate) fn collect_models(value: &Value, out: &mut Vec<Model>) {
    match value {
        Value::Model(m) => out.push(m.clone()),
        Value::List(items) => {
            for item in items {
                collect_models(item, out);
            }
        }
        Value::Record(record) => {
            for (_, item) in record.iter() {
                collect_models(item, out);
            }
        }
        _ => {}
    }
}

///
/// WeakModel
/// Non-owning handle; the identity map holds these.
///

#[derive(Clone)]
pub(crate) struct WeakModel(Weak<ModelInner>);

impl WeakModel {
    pub(crate) fn upgrade(&self) -> Option<Model> {
        self.0.upgrade().map(Model)
    }

    pub(crate) fn points_to(&self, model: &Model) -> bool {
        Weak::as_ptr(&self.0) == Arc::as_ptr(&model.0)
    }

    pub(crate) fn is_live(&self) -> bool {
        self.0.strong_count() > 0
    }
}
