#![forbid(unsafe_code)]

//! Minimal keyed publish/subscribe registry.
//!
//! # Design
//!
//! [`Notifier<K, P>`] keeps, per event key, an ordered list of callbacks
//! taking `&P`. The registry lives in shared storage (`Rc<RefCell<..>>`), so
//! cloning a `Notifier` produces another handle onto the same listeners.
//! That lets a listener subscribe or unsubscribe while a trigger is running.
//!
//! # Invariants
//!
//! 1. Listeners for a key run in registration order.
//! 2. `trigger` snapshots the listener list before invoking anything:
//!    registrations added or removed during a trigger take effect from the
//!    next trigger on.
//! 3. The registry is never borrowed while a listener runs.
//! 4. Each registration fires independently, even when the same callback
//!    is registered more than once.
//!
//! # Failure Modes
//!
//! - **Listener panic**: not caught. It unwinds through `trigger`, and the
//!   remaining listeners of that call do not run. The registry stays
//!   consistent because no borrow is held across the call.

use std::cell::RefCell;
use std::hash::Hash;
use std::rc::Rc;

use rustc_hash::FxHashMap;

/// A shareable callback. Register the same `Listener` under several keys or
/// remove it by identity with [`Notifier::off_listener`].
pub type Listener<P> = Rc<dyn Fn(&P)>;

/// Opaque token identifying one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

struct Registration<P> {
    id: ListenerId,
    callback: Listener<P>,
}

struct Registry<K, P> {
    next_id: u64,
    listeners: FxHashMap<K, Vec<Registration<P>>>,
}

/// Shared handle onto a keyed listener registry.
pub struct Notifier<K, P> {
    inner: Rc<RefCell<Registry<K, P>>>,
}

impl<K, P> Clone for Notifier<K, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<K: Eq + Hash + std::fmt::Debug, P> std::fmt::Debug for Notifier<K, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        let mut counts: Vec<_> = inner
            .listeners
            .iter()
            .map(|(k, v)| (format!("{k:?}"), v.len()))
            .collect();
        counts.sort();
        f.debug_struct("Notifier")
            .field("listeners", &counts)
            .finish()
    }
}

impl<K: Eq + Hash, P> Default for Notifier<K, P> {
    fn default() -> Self {
        Self::new()
    }
}

fn same_callback<P>(a: &Listener<P>, b: &Listener<P>) -> bool {
    // Compare data addresses only; vtable pointers are not unique.
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

impl<K: Eq + Hash, P> Notifier<K, P> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Registry {
                next_id: 0,
                listeners: FxHashMap::default(),
            })),
        }
    }

    /// Append `callback` to the listeners of `key`.
    pub fn on(&self, key: K, callback: impl Fn(&P) + 'static) -> ListenerId {
        self.on_listener(key, Rc::new(callback))
    }

    /// Append a shared callback to the listeners of `key`.
    pub fn on_listener(&self, key: K, callback: Listener<P>) -> ListenerId {
        let mut inner = self.inner.borrow_mut();
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        inner
            .listeners
            .entry(key)
            .or_default()
            .push(Registration { id, callback });
        id
    }

    /// Remove the registration `id` from `key`. Returns whether it existed.
    pub fn off(&self, key: &K, id: ListenerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let Some(list) = inner.listeners.get_mut(key) else {
            return false;
        };
        let before = list.len();
        list.retain(|r| r.id != id);
        before != list.len()
    }

    /// Remove every registration of `callback` under `key`. Returns how many
    /// were removed.
    pub fn off_listener(&self, key: &K, callback: &Listener<P>) -> usize {
        let mut inner = self.inner.borrow_mut();
        let Some(list) = inner.listeners.get_mut(key) else {
            return 0;
        };
        let before = list.len();
        list.retain(|r| !same_callback(&r.callback, callback));
        before - list.len()
    }

    /// Invoke every listener currently registered under `key`, in order.
    pub fn trigger(&self, key: &K, payload: &P) {
        let callbacks: Vec<Listener<P>> = {
            let inner = self.inner.borrow();
            match inner.listeners.get(key) {
                Some(list) => list.iter().map(|r| Rc::clone(&r.callback)).collect(),
                None => return,
            }
        };

        #[cfg(feature = "tracing")]
        tracing::trace!(listeners = callbacks.len(), "notifier trigger");

        for cb in &callbacks {
            cb(payload);
        }
    }

    /// Number of registrations under `key`.
    #[must_use]
    pub fn listener_count(&self, key: &K) -> usize {
        self.inner.borrow().listeners.get(key).map_or(0, Vec::len)
    }

    /// Drop every registration under every key.
    pub fn clear(&self) {
        self.inner.borrow_mut().listeners.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
