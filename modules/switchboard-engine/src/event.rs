//! Event names and the wildcard key.

use std::any::Any;
use std::fmt;
use std::hash::Hash;

/// Display form of the wildcard key.
pub const WILDCARD: &str = "*";

/// Anything usable as an event name: an opaque, comparable key.
///
/// String literals, `String`, and plain enums all qualify.
pub trait EventName: Clone + Eq + Hash + fmt::Debug + 'static {}

impl<T> EventName for T where T: Clone + Eq + Hash + fmt::Debug + 'static {}

/// Registration key for listeners and middleware.
///
/// The wildcard is its own variant. For string event names, `"*"` converts
/// to `Any` rather than `Named`, so a name can never shadow the wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKey<E> {
    /// Matches every dispatched event.
    Any,
    Named(E),
}

impl<E: PartialEq> EventKey<E> {
    pub fn matches(&self, event: &E) -> bool {
        match self {
            EventKey::Any => true,
            EventKey::Named(name) => name == event,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, EventKey::Any)
    }

    /// Fold a `Named("*")` string key into `Any`.
    pub fn normalize(self) -> Self
    where
        E: 'static,
    {
        match self {
            EventKey::Named(name) if name_str(&name) == Some(WILDCARD) => EventKey::Any,
            other => other,
        }
    }

    /// Parse a raw key, mapping `"*"` to the wildcard.
    pub fn parse<'a>(raw: &'a str) -> Self
    where
        E: From<&'a str>,
    {
        if raw == WILDCARD {
            EventKey::Any
        } else {
            EventKey::Named(E::from(raw))
        }
    }
}

impl<E: fmt::Debug + 'static> EventKey<E> {
    /// Human-readable form used in logs and errors.
    pub fn describe(&self) -> String {
        match self {
            EventKey::Any => WILDCARD.to_string(),
            EventKey::Named(name) => describe_event(name),
        }
    }
}

impl<E: PartialEq + 'static> From<E> for EventKey<E> {
    fn from(name: E) -> Self {
        EventKey::Named(name).normalize()
    }
}

/// The name as text when `E` is `&'static str` or `String`.
fn name_str<E: 'static>(name: &E) -> Option<&str> {
    let name = name as &dyn Any;
    if let Some(name) = name.downcast_ref::<&'static str>() {
        return Some(*name);
    }
    name.downcast_ref::<String>().map(String::as_str)
}

/// Plain text for string names, `Debug` for everything else.
pub(crate) fn describe_event<E: fmt::Debug + 'static>(event: &E) -> String {
    match name_str(event) {
        Some(name) => name.to_string(),
        None => format!("{event:?}"),
    }
}
