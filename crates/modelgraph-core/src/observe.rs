//! Per-instance publish/subscribe.
//!
//! Delivery is synchronous on the mutating thread, after the mutation and
//! with no instance lock held. Each mutation is delivered to the subscribers
//! registered at that moment.

use crate::{context::SourceId, error::Error, model::Model, model::WeakModel};
use std::{
    fmt,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

///
/// ModelEvent
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ModelEvent {
    /// A field was stored through the setter, restored by rollback, or
    /// explicitly re-notified.
    FieldChanged {
        field: String,
        source: Option<SourceId>,
    },
}

impl ModelEvent {
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::FieldChanged { field, .. } => field,
        }
    }
}

type Listener = Arc<dyn Fn(&Model, &ModelEvent) + Send + Sync>;

///
/// Observers
///

#[derive(Default)]
pub(crate) struct Observers {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Listener)>>,
}

impl Observers {
    fn lock(&self) -> MutexGuard<'_, Vec<(u64, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add(&self, listener: Listener) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().push((id, listener));

        id
    }

    fn remove(&self, id: u64) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(i, _)| *i != id);

        listeners.len() != before
    }

    fn snapshot(&self) -> Vec<Listener> {
        self.lock().iter().map(|(_, l)| Arc::clone(l)).collect()
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

///
/// Subscription
///
/// Cancellation handle returned by `Model::subscribe`. Dropping it
/// unsubscribes; `forget` keeps the listener for the instance's lifetime.
///

#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    model: WeakModel,
    id: u64,
    active: bool,
}

impl Subscription {
    /// Unsubscribe now. Returns false if the instance is gone.
    pub fn cancel(mut self) -> bool {
        self.unsubscribe()
    }

    /// Keep the listener registered without holding the handle.
    pub fn forget(mut self) {
        self.active = false;
    }

    fn unsubscribe(&mut self) -> bool {
        if !std::mem::replace(&mut self.active, false) {
            return false;
        }

        self.model
            .upgrade()
            .is_some_and(|model| model.0.observers.remove(self.id))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}

impl Model {
    /// Register `listener` for this instance's events.
    pub fn subscribe(
        &self,
        listener: impl Fn(&Self, &ModelEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.0.observers.add(Arc::new(listener));

        Subscription {
            model: self.downgrade(),
            id,
            active: true,
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.0.observers.len()
    }

    /// Re-announce a field after an edit that bypassed the setter.
    pub fn notify(&self, field: &str) -> Result<(), Error> {
        self.class().require_field(field)?;
        let source = self.source_of(field);
        self.publish(&ModelEvent::FieldChanged {
            field: field.to_string(),
            source,
        });

        Ok(())
    }

    pub(crate) fn publish(&self, event: &ModelEvent) {
        for listener in self.0.observers.snapshot() {
            listener(self, event);
        }
    }
}
