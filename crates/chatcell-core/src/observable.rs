//! Observable values for UI bindings.
//!
//! An [`Observable`] stores a value and notifies its observers synchronously
//! each time the value is set. An observer stays registered for as long as
//! the [`Subscription`] returned by [`Observable::subscribe`] is alive, so a
//! view that keeps the guard next to its widgets stops receiving updates when
//! it is torn down.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Callback<T> = Box<dyn FnMut(&T) + Send>;

struct Observers<T> {
    next_id: u64,
    entries: Vec<(u64, Callback<T>)>,
    /// Set while callbacks run outside the lock.
    notifying: bool,
    /// Ids unsubscribed while `notifying` was set.
    cancelled: Vec<u64>,
}

impl<T> Default for Observers<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
            notifying: false,
            cancelled: Vec::new(),
        }
    }
}

fn lock<T>(observers: &Mutex<Observers<T>>) -> MutexGuard<'_, Observers<T>> {
    observers.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A value holder that notifies registered observers on update.
pub struct Observable<T> {
    value: T,
    observers: Arc<Mutex<Observers<T>>>,
}

impl<T> Observable<T> {
    /// Creates an observable holding `value` with no observers.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            value,
            observers: Arc::new(Mutex::new(Observers::default())),
        }
    }

    /// Returns a reference to the current value.
    #[must_use]
    pub const fn value(&self) -> &T {
        &self.value
    }

    /// Returns a clone of the current value.
    #[must_use]
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.value.clone()
    }

    /// Stores `value`, then notifies every observer.
    pub fn set(&mut self, value: T) {
        self.value = value;
        self.notify();
    }

    /// Stores `value` and notifies only if it differs from the current one.
    ///
    /// Returns whether the value changed.
    pub fn set_if_changed(&mut self, value: T) -> bool
    where
        T: PartialEq,
    {
        if self.value == value {
            return false;
        }
        self.set(value);
        true
    }

    /// Number of live observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        lock(&self.observers).entries.len()
    }

    fn notify(&self) {
        let mut entries = {
            let mut observers = lock(&self.observers);
            observers.notifying = true;
            std::mem::take(&mut observers.entries)
        };

        for (_, callback) in &mut entries {
            callback(&self.value);
        }

        let _removed = {
            let mut observers = lock(&self.observers);
            let cancelled = std::mem::take(&mut observers.cancelled);
            let (mut kept, removed): (Vec<_>, Vec<_>) = entries
                .into_iter()
                .partition(|(id, _)| !cancelled.contains(id));
            // Observers registered by a callback were pushed onto the emptied list.
            kept.append(&mut observers.entries);
            observers.entries = kept;
            observers.notifying = false;
            removed
        };
    }
}

impl<T: 'static> Observable<T> {
    /// Registers `observer`, called with the new value after every `set`.
    ///
    /// The observer is removed when the returned guard is dropped.
    #[must_use = "dropping the subscription unregisters the observer"]
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: FnMut(&T) + Send + 'static,
    {
        let id = {
            let mut observers = lock(&self.observers);
            let id = observers.next_id;
            observers.next_id += 1;
            observers.entries.push((id, Box::new(observer)));
            id
        };

        let weak: Weak<Mutex<Observers<T>>> = Arc::downgrade(&self.observers);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                let Some(observers) = weak.upgrade() else {
                    return;
                };
                // The removed callback may own subscriptions of its own, so it
                // is dropped after the lock is released.
                let _removed = {
                    let mut observers = lock(&observers);
                    let pos = observers.entries.iter().position(|(i, _)| *i == id);
                    if pos.is_none() && observers.notifying {
                        observers.cancelled.push(id);
                    }
                    pos.map(|pos| observers.entries.remove(pos))
                };
            })),
        }
    }
}

impl<T: Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("value", &self.value)
            .field("observers", &self.observer_count())
            .finish()
    }
}

/// Guard that keeps an observer registered.
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Unregisters the observer now instead of on drop.
    pub fn cancel(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}
