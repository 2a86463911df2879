//! Change tracking: snapshot on first change, commit, rollback.
//!
//! Tracking spans the instance and the plain submodels it holds. Entities
//! reached through fields track their own changes.

use crate::{
    error::Error,
    identity::IdentityKey,
    model::{
        Model, collect_models,
        instance::{Slot, Write},
    },
    traverse::{self, Scope},
};
use std::sync::Arc;
use tracing::debug;

impl Model {
    /// Drop every snapshot in this instance and its submodels.
    pub fn commit(&self) {
        traverse::for_each(self, Scope::Submodels, |model| {
            model.lock_state().saved.clear();
        });
    }

    /// Restore every snapshotted field (value, activity and source) in this
    /// instance and its submodels, then clear the snapshots.
    ///
    /// Fails with `DuplicateIdentifier`, changing nothing, when a snapshotted
    /// identifier value now belongs to another live instance.
    pub fn rollback(&self) -> Result<(), Error> {
        let models = traverse::collect(self, Scope::Submodels);
        for model in &models {
            model.check_restorable()?;
        }
        for model in &models {
            model.restore_saved()?;
        }

        Ok(())
    }

    /// True when this instance or any submodel has an uncommitted change.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        traverse::any(self, Scope::Submodels, Self::has_saved)
    }

    /// True when the field itself changed, or a submodel it holds did.
    pub fn is_field_changed(&self, name: &str) -> Result<bool, Error> {
        let class = Arc::clone(self.class());
        let field = class.require_field(name)?;

        let (direct, value) = {
            let state = self.lock_state();
            (
                state.saved.contains_key(field.name()),
                state.values.get(field.name()).cloned(),
            )
        };
        if direct {
            return Ok(true);
        }

        let mut held = Vec::new();
        if let Some(value) = &value {
            collect_models(value, &mut held);
        }

        Ok(held
            .iter()
            .filter(|m| !m.class().is_entity())
            .any(Self::is_changed))
    }

    fn has_saved(&self) -> bool {
        !self.lock_state().saved.is_empty()
    }

    // Snapshotted identifier values must still be free (or ours) in the map.
    fn check_restorable(&self) -> Result<(), Error> {
        let class = Arc::clone(self.class());
        let Some(map) = class.identity_map() else {
            return Ok(());
        };

        let claims: Vec<(String, IdentityKey)> = {
            let state = self.lock_state();
            state
                .saved
                .iter()
                .filter(|(name, slot)| {
                    slot.active && class.field(name).is_some_and(|f| f.identifier().is_some())
                })
                .filter_map(|(name, slot)| {
                    IdentityKey::from_value(&slot.value).map(|key| (name.clone(), key))
                })
                .collect()
        };

        for (attribute, key) in claims {
            if let Some(holder) = map.lookup(&attribute, &key)
                && !holder.ptr_eq(self)
            {
                return Err(Error::DuplicateIdentifier {
                    entity: class.name().to_string(),
                    attribute,
                    value: key.to_string(),
                });
            }
        }

        Ok(())
    }

    fn restore_saved(&self) -> Result<(), Error> {
        let saved: Vec<(String, Slot)> = std::mem::take(&mut self.lock_state().saved)
            .into_iter()
            .collect();
        if saved.is_empty() {
            return Ok(());
        }

        let class = Arc::clone(self.class());
        for (i, (name, slot)) in saved.iter().enumerate() {
            let result = class
                .require_field(name)
                .and_then(|field| self.store_slot(field, slot.clone(), Write::Restore));

            // unrestored snapshots go back so the change stays visible
            if let Err(err) = result {
                let mut state = self.lock_state();
                for (name, slot) in &saved[i..] {
                    state
                        .saved
                        .entry(name.clone())
                        .or_insert_with(|| slot.clone());
                }
                return Err(err);
            }
        }

        debug!(entity = %class.name(), restored = saved.len(), "rolled back");

        Ok(())
    }
}
