//! Observable properties with explicit change listeners.
//!
//! A view layer subscribes to the properties it renders; every mutating
//! setter publishes to the listeners synchronously, in registration order.
//! Listeners are called with no lock held, so they may set the property,
//! subscribe or unsubscribe from inside a notification.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Handle returned by [`Observable::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Listeners<T> {
    next_id: u64,
    entries: Vec<(SubscriptionId, Listener<T>)>,
}

/// A value that notifies subscribers when it changes.
///
/// A notification goes to the listeners registered when it started; one
/// added or removed meanwhile takes effect from the next notification.
pub struct Observable<T> {
    value: Mutex<T>,
    listeners: Mutex<Listeners<T>>,
}

impl<T: Clone + PartialEq> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Mutex::new(value),
            listeners: Mutex::new(Listeners {
                next_id: 0,
                entries: Vec::new(),
            }),
        }
    }

    pub fn get(&self) -> T {
        lock(&self.value).clone()
    }

    /// Store `value` and notify listeners. Returns `false` (and notifies no
    /// one) when the value is unchanged.
    pub fn set(&self, value: T) -> bool {
        if !self.replace(value.clone()) {
            return false;
        }
        self.notify(&value);
        true
    }

    /// Store `value` without notifying anyone. Returns whether it changed.
    ///
    /// Pair with [`Observable::notify`] to publish once the caller has
    /// released its own locks.
    pub fn replace(&self, value: T) -> bool {
        let mut current = lock(&self.value);
        if *current == value {
            return false;
        }
        *current = value;
        true
    }

    /// Store `value` and notify listeners even if it did not change.
    pub fn force_set(&self, value: T) {
        *lock(&self.value) = value.clone();
        self.notify(&value);
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut listeners = lock(&self.listeners);
        let id = SubscriptionId(listeners.next_id);
        listeners.next_id += 1;
        listeners.entries.push((id, Arc::new(listener)));
        id
    }

    /// Returns whether a listener was removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.entries.len();
        listeners.entries.retain(|(entry, _)| *entry != id);
        listeners.entries.len() != before
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).entries.len()
    }

    /// Call every listener with `value`, in registration order.
    pub fn notify(&self, value: &T) {
        let listeners: Vec<Listener<T>> = lock(&self.listeners)
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(value);
        }
    }
}

impl<T: Clone + PartialEq + Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("value", &*lock(&self.value))
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
