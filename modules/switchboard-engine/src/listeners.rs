//! Listener handles and the per-mediator registry.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use anyhow::Result;

use crate::event::{EventKey, EventName};

type Callback<C, E> = dyn Fn(&C, &E) -> Result<()>;

/// A shareable listener callback.
///
/// Identity is the shared allocation: clones of one `Listener` are equal,
/// two listeners built from identical closures are not. Keep a clone around
/// to `off` it later.
pub struct Listener<C, E> {
    callback: Rc<Callback<C, E>>,
}

impl<C, E> Listener<C, E> {
    pub fn new(callback: impl Fn(&C, &E) -> Result<()> + 'static) -> Self {
        Self {
            callback: Rc::new(callback),
        }
    }

    /// Wrap a callback that cannot fail.
    pub fn infallible(callback: impl Fn(&C, &E) + 'static) -> Self {
        Self::new(move |ctx, event| {
            callback(ctx, event);
            Ok(())
        })
    }

    pub fn call(&self, ctx: &C, event: &E) -> Result<()> {
        (self.callback)(ctx, event)
    }

    pub fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.callback, &other.callback)
    }
}

impl<C, E> Clone for Listener<C, E> {
    fn clone(&self) -> Self {
        Self {
            callback: Rc::clone(&self.callback),
        }
    }
}

impl<C, E> PartialEq for Listener<C, E> {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl<C, E> Eq for Listener<C, E> {}

impl<C, E> fmt::Debug for Listener<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", Rc::as_ptr(&self.callback) as *const ())
    }
}

struct Registration<C, E> {
    id: u64,
    listener: Listener<C, E>,
    once: bool,
}

/// A listener picked for one notification pass.
pub struct Selected<C, E> {
    pub key: EventKey<E>,
    pub listener: Listener<C, E>,
    id: u64,
    once: bool,
}

/// Event key → ordered listener registrations.
pub struct ListenerRegistry<C, E> {
    by_key: HashMap<EventKey<E>, Vec<Registration<C, E>>>,
    next_id: u64,
}

impl<C, E: EventName> ListenerRegistry<C, E> {
    pub fn new() -> Self {
        Self {
            by_key: HashMap::new(),
            next_id: 0,
        }
    }

    /// Append a registration. Duplicates are kept and each fires.
    pub fn add(&mut self, key: EventKey<E>, listener: Listener<C, E>, once: bool) {
        let id = self.next_id;
        self.next_id += 1;
        self.by_key
            .entry(key.normalize())
            .or_default()
            .push(Registration { id, listener, once });
    }

    /// Drop every registration of `listener` under `key`. Missing key or
    /// listener is a no-op.
    pub fn remove(&mut self, key: &EventKey<E>, listener: &Listener<C, E>) {
        let key = key.clone().normalize();
        self.retain(&key, |r| !r.listener.same(listener));
    }

    pub fn count(&self, key: &EventKey<E>) -> usize {
        self.by_key
            .get(&key.clone().normalize())
            .map_or(0, Vec::len)
    }

    /// Listeners to notify for `event`: exact-name registrations first, then
    /// wildcard ones, each in registration order.
    ///
    /// Selection leaves the registry untouched. One-shot registrations stay
    /// until `consume` is called for them, so a pass that stops early keeps
    /// the ones it never reached.
    pub fn select(&self, event: &E) -> Vec<Selected<C, E>> {
        let mut selected = Vec::new();
        for key in [EventKey::Named(event.clone()).normalize(), EventKey::Any] {
            let Some(registrations) = self.by_key.get(&key) else {
                continue;
            };
            selected.extend(registrations.iter().map(|r| Selected {
                key: key.clone(),
                listener: r.listener.clone(),
                id: r.id,
                once: r.once,
            }));
        }
        selected
    }

    /// Mark `selected` as delivered. Drops it if it was registered with `once`.
    pub fn consume(&mut self, selected: &Selected<C, E>) {
        if selected.once {
            self.retain(&selected.key, |r| r.id != selected.id);
        }
    }

    fn retain(&mut self, key: &EventKey<E>, keep: impl FnMut(&Registration<C, E>) -> bool) {
        if let Some(registrations) = self.by_key.get_mut(key) {
            registrations.retain(keep);
            if registrations.is_empty() {
                self.by_key.remove(key);
            }
        }
    }
}

impl<C, E: EventName> Default for ListenerRegistry<C, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, E: fmt::Debug> fmt::Debug for ListenerRegistry<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.by_key.iter().map(|(k, v)| (k, v.len())))
            .finish()
    }
}
