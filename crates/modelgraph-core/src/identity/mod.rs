//! Entity identity map.
//!
//! Invariants:
//! - At most one live instance per (identifier attribute, key) in a map.
//! - Entries are weak; identity lasts while some caller holds the instance.
//!   Dead entries are swept once enough inserts have accumulated, so the
//!   map stays proportional to the live population.
//! - Lock order is map first, then instance state. The map lock is never
//!   taken while an instance lock is held.

mod descriptor;
pub mod generator;


pub use descriptor::IdentifierDescriptor;

use crate::{
    error::Error,
    model::{Model, WeakModel},
    value::Value,
};
use std::{
    collections::HashMap,
    fmt::{self, Display},
    sync::{Mutex, MutexGuard, PoisonError},
};
use tracing::{debug, trace};

///
/// IdentifierKind
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum IdentifierKind {
    Primary,
    Secondary,
}

///
/// IdentityKey
///
/// Hashable form of an identifier value. Numbers key on their bit pattern
/// with `-0.0` folded into `0.0`.
///

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum IdentityKey {
    Text(String),
    Number(u64),
}

impl IdentityKey {
    /// Key for an identifier value; `None` when the value cannot identify
    /// anything (undefined, null, or a non-scalar).
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Text(s) => Some(Self::Text(s.clone())),
            Value::Number(n) if n.is_nan() => None,
            Value::Number(n) => {
                let n = if *n == 0.0 { 0.0 } else { *n };
                Some(Self::Number(n.to_bits()))
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Text(s) => Value::Text(s.clone()),
            Self::Number(bits) => Value::Number(f64::from_bits(*bits)),
        }
    }
}

impl Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Number(bits) => write!(f, "{}", f64::from_bits(*bits)),
        }
    }
}

///
/// IdentityMap
///
/// One per entity class, or shared down a hierarchy. Indexed per identifier
/// attribute.
///

#[derive(Default)]
pub struct IdentityMap {
    entries: Mutex<Entries>,
}

// Inserts between sweeps never drop below this.
const SWEEP_INTERVAL: usize = 64;

///
/// Entries
/// attribute → key → instance, plus inserts counted since the last sweep.
///

#[derive(Default)]
struct Entries {
    indexes: HashMap<String, HashMap<IdentityKey, WeakModel>>,
    inserted: usize,
}

impl Entries {
    fn index(&mut self, attribute: &str) -> &mut HashMap<IdentityKey, WeakModel> {
        self.indexes.entry(attribute.to_string()).or_default()
    }

    fn insert(&mut self, attribute: &str, key: IdentityKey, model: &Model) {
        if self.index(attribute).insert(key, model.downgrade()).is_none() {
            self.inserted += 1;
            self.sweep_if_due();
        }
    }

    // Amortized: a sweep costs O(entries) and runs after at least half as
    // many fresh inserts.
    fn sweep_if_due(&mut self) {
        let total: usize = self.indexes.values().map(HashMap::len).sum();
        if self.inserted < SWEEP_INTERVAL || self.inserted < total / 2 {
            return;
        }

        let removed = self.remove_dead();
        self.inserted = 0;
        if removed > 0 {
            trace!(removed, "swept dead identity entries");
        }
    }

    fn remove_dead(&mut self) -> usize {
        let mut removed = 0;
        for index in self.indexes.values_mut() {
            let before = index.len();
            index.retain(|_, w| w.is_live());
            removed += before - index.len();
        }

        removed
    }
}

impl IdentityMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Canonical live instance for `attribute == key`.
    #[must_use]
    pub fn lookup(&self, attribute: &str, key: &IdentityKey) -> Option<Model> {
        self.lock()
            .indexes
            .get(attribute)
            .and_then(|index| index.get(key))
            .and_then(WeakModel::upgrade)
    }

    /// Atomically return the live instance for `attribute == key`, or
    /// register the one `make` builds. The flag reports whether it existed.
    pub(crate) fn lookup_or_insert_with(
        &self,
        attribute: &str,
        key: IdentityKey,
        make: impl FnOnce() -> Model,
    ) -> (Model, bool) {
        let mut entries = self.lock();

        if let Some(existing) = entries.index(attribute).get(&key).and_then(WeakModel::upgrade) {
            return (existing, true);
        }

        let model = make();
        trace!(entity = %model.class().name(), attribute, key = %key, "registered instance");
        entries.insert(attribute, key, &model);

        (model, false)
    }

    /// Move `owner` from `old` to `new` under `attribute`, running `write`
    /// while the map is locked so no other instance can claim `new` first.
    pub(crate) fn reassign(
        &self,
        owner: &Model,
        attribute: &str,
        old: Option<&IdentityKey>,
        new: Option<IdentityKey>,
        write: impl FnOnce(),
    ) -> Result<(), Error> {
        let mut entries = self.lock();
        let index = entries.index(attribute);

        if let Some(new) = &new
            && let Some(existing) = index.get(new).and_then(WeakModel::upgrade)
            && !existing.ptr_eq(owner)
        {
            debug!(
                entity = %owner.class().name(),
                attribute,
                key = %new,
                "identifier already claimed"
            );

            return Err(Error::DuplicateIdentifier {
                entity: owner.class().name().to_string(),
                attribute: attribute.to_string(),
                value: new.to_string(),
            });
        }

        write();

        if let Some(old) = old
            && new.as_ref() != Some(old)
            && index
                .get(old)
                .is_some_and(|w| w.points_to(owner) || !w.is_live())
        {
            index.remove(old);
        }

        if let Some(new) = new {
            entries.insert(attribute, new, owner);
        }

        Ok(())
    }

    /// Drop every entry for `model`. Returns how many were removed.
    pub fn evict(&self, model: &Model) -> usize {
        let mut entries = self.lock();
        let mut removed = 0;
        for index in entries.indexes.values_mut() {
            let before = index.len();
            index.retain(|_, w| !w.points_to(model));
            removed += before - index.len();
        }

        if removed > 0 {
            debug!(entity = %model.class().name(), removed, "evicted instance");
        }

        removed
    }

    /// Remove entries whose instances have been dropped.
    pub fn prune(&self) -> usize {
        let mut entries = self.lock();
        entries.inserted = 0;

        entries.remove_dead()
    }

    /// Live entries across all identifier attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock()
            .indexes
            .values()
            .flat_map(HashMap::values)
            .filter(|w| w.is_live())
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for IdentityMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityMap")
            .field("len", &self.len())
            .finish()
    }
}

impl Model {
    /// Remove this instance from its class's identity map.
    pub fn evict(&self) -> usize {
        self.class()
            .identity_map()
            .map_or(0, |map| map.evict(self))
    }

    /// Evict every entity reachable from this instance, itself included.
    pub fn evict_graph(&self) -> usize {
        crate::traverse::collect(self, crate::traverse::Scope::Graph)
            .iter()
            .map(Self::evict)
            .sum()
    }
}
