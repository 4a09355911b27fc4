//! Public façade: one context, its listeners, and its middleware.

use std::fmt;

use anyhow::Result;
use serde_json::Value;

use crate::engine::Engine;
use crate::error::MediatorError;
use crate::event::{EventKey, EventName};
use crate::json::{into_object, JsonObject};
use crate::listeners::{Listener, ListenerRegistry};
use crate::middleware::{MiddlewareEntry, MiddlewareInput, MiddlewareOutcome, Pipeline};
use crate::traits::{Context, Middleware};

const DEFAULT_NAME: &str = "mediator";

/// Construction-time options. Middleware cannot be added afterwards.
pub struct MediatorOptions<C: Context, E> {
    name: String,
    middlewares: Vec<MiddlewareEntry<C, E>>,
}

impl<C: Context, E: EventName> MediatorOptions<C, E> {
    pub fn new() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            middlewares: Vec::new(),
        }
    }

    /// Label used in tracing spans.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Append a closure middleware. Runs after everything registered before it.
    pub fn with_middleware<F>(mut self, key: impl Into<EventKey<E>>, handler: F) -> Self
    where
        F: Fn(&C, &MiddlewareInput<C::Patch>, &E) -> Result<MiddlewareOutcome<C::Patch>>
            + 'static,
    {
        self.middlewares.push(MiddlewareEntry::from_fn(key, handler));
        self
    }

    /// Append a middleware implemented as a type.
    pub fn with_handler(
        mut self,
        key: impl Into<EventKey<E>>,
        handler: impl Middleware<C, E> + 'static,
    ) -> Self {
        self.middlewares.push(MiddlewareEntry::new(key, handler));
        self
    }

    pub fn with_middlewares(
        mut self,
        entries: impl IntoIterator<Item = MiddlewareEntry<C, E>>,
    ) -> Self {
        self.middlewares.extend(entries);
        self
    }
}

impl<C: Context, E: EventName> Default for MediatorOptions<C, E> {
    fn default() -> Self {
        Self::new()
    }
}

/// A typed event mediator.
///
/// ```
/// use serde_json::json;
/// use switchboard_engine::{json::into_object, JsonObject, Listener, Mediator, MediatorOptions};
///
/// let initial = into_object(json!({"count": 0})).unwrap();
/// let mut mediator: Mediator<JsonObject, &str> = Mediator::new(&initial, MediatorOptions::new());
///
/// mediator.on("inc", Listener::infallible(|ctx: &JsonObject, _: &&str| {
///     assert_eq!(ctx["count"], json!(1));
/// }));
/// mediator
///     .send_with("inc", |ctx| {
///         let count = ctx["count"].as_i64().unwrap_or(0);
///         into_object(json!({"count": count + 1})).unwrap()
///     })
///     .unwrap();
///
/// assert_eq!(mediator.context()["count"], json!(1));
/// ```
pub struct Mediator<C: Context, E: EventName> {
    engine: Engine<C, E>,
    listeners: ListenerRegistry<C, E>,
}

impl<C: Context, E: EventName> Mediator<C, E> {
    /// Build a mediator owning a deep copy of `initial`.
    pub fn new(initial: &C, options: MediatorOptions<C, E>) -> Self {
        let MediatorOptions { name, middlewares } = options;
        Self {
            engine: Engine::new(initial, Pipeline::new(middlewares), name),
            listeners: ListenerRegistry::new(),
        }
    }

    /// Register `listener` under `key` (an event name or `EventKey::Any`).
    pub fn on(&mut self, key: impl Into<EventKey<E>>, listener: Listener<C, E>) {
        self.listeners.add(key.into(), listener, false);
    }

    /// Register `listener` for the next matching notification only.
    pub fn once(&mut self, key: impl Into<EventKey<E>>, listener: Listener<C, E>) {
        self.listeners.add(key.into(), listener, true);
    }

    /// Remove every registration of `listener` under `key`.
    pub fn off(&mut self, key: impl Into<EventKey<E>>, listener: &Listener<C, E>) {
        self.listeners.remove(&key.into(), listener);
    }

    /// Dispatch `event` without changing the context directly. Middleware may
    /// still produce changes.
    pub fn send(&mut self, event: impl Into<E>) -> std::result::Result<(), MediatorError> {
        let event = event.into();
        self.engine
            .dispatch(&event, None::<fn(&C) -> Result<Option<C::Patch>>>, &mut self.listeners)
    }

    /// Dispatch `event`; `modifier` computes pending changes from the snapshot.
    pub fn send_with<F>(
        &mut self,
        event: impl Into<E>,
        modifier: F,
    ) -> std::result::Result<(), MediatorError>
    where
        F: FnOnce(&C) -> C::Patch,
    {
        self.try_send_with(event, move |ctx| Ok(Some(modifier(ctx))))
    }

    /// Like `send_with`, for modifiers that can fail or produce nothing.
    pub fn try_send_with<F>(
        &mut self,
        event: impl Into<E>,
        modifier: F,
    ) -> std::result::Result<(), MediatorError>
    where
        F: FnOnce(&C) -> Result<Option<C::Patch>>,
    {
        let event = event.into();
        self.engine
            .dispatch(&event, Some(modifier), &mut self.listeners)
    }

    /// Fresh deep copy of the current context. Never shared with the engine.
    pub fn context(&self) -> C {
        self.engine.context()
    }

    pub fn listener_count(&self, key: impl Into<EventKey<E>>) -> usize {
        self.listeners.count(&key.into())
    }

    pub fn middleware_count(&self) -> usize {
        self.engine.pipeline().len()
    }

    pub fn name(&self) -> &str {
        self.engine.name()
    }
}

impl<E: EventName> Mediator<JsonObject, E> {
    /// Build from an arbitrary JSON value, which must be an object.
    pub fn from_json(
        initial: Value,
        options: MediatorOptions<JsonObject, E>,
    ) -> std::result::Result<Self, MediatorError> {
        let initial = into_object(initial)?;
        Ok(Self::new(&initial, options))
    }
}

impl<C: Context, E: EventName> fmt::Debug for Mediator<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mediator")
            .field("name", &self.engine.name())
            .field("context", &self.engine.context())
            .field("listeners", &self.listeners)
            .field("middlewares", self.engine.pipeline())
            .finish()
    }
}
