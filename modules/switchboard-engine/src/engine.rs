//! The dispatch protocol.

use anyhow::Result;
use tracing::{debug, debug_span, info, warn};

use crate::context::{deep_copy, Snapshot};
use crate::error::MediatorError;
use crate::event::{describe_event, EventName};
use crate::listeners::ListenerRegistry;
use crate::middleware::{Pipeline, PipelineResult};
use crate::traits::Context;

/// Owns the authoritative context and runs dispatches against it.
///
/// Snapshot → modify → middleware → commit → notify. The context is only
/// replaced once every selected middleware has run without cancelling.
pub struct Engine<C: Context, E: EventName> {
    context: C,
    pipeline: Pipeline<C, E>,
    name: String,
}

impl<C: Context, E: EventName> Engine<C, E> {
    pub fn new(initial: &C, pipeline: Pipeline<C, E>, name: impl Into<String>) -> Self {
        Self {
            context: deep_copy(initial),
            pipeline,
            name: name.into(),
        }
    }

    /// Fresh copy of the committed context.
    pub fn context(&self) -> C {
        deep_copy(&self.context)
    }

    pub fn pipeline(&self) -> &Pipeline<C, E> {
        &self.pipeline
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run one dispatch of `event`.
    ///
    /// Cancellation is not an error: it returns `Ok(())` with the context and
    /// listeners untouched. A failing modifier or middleware leaves the context
    /// as it was. A failing listener stops later listeners; the commit stands.
    pub fn dispatch<M>(
        &mut self,
        event: &E,
        modifier: Option<M>,
        listeners: &mut ListenerRegistry<C, E>,
    ) -> std::result::Result<(), MediatorError>
    where
        M: FnOnce(&C) -> Result<Option<C::Patch>>,
    {
        let span = debug_span!("dispatch", mediator = %self.name, event = ?event);
        let _guard = span.enter();

        let snapshot = Snapshot::capture(&self.context);

        let pending_changes = match modifier {
            Some(modify) => {
                let changes = modify(snapshot.get()).map_err(|source| {
                    warn!(error = %source, "Modifier failed");
                    MediatorError::Modifier {
                        event: describe_event(event),
                        source,
                    }
                })?;
                debug!(has_changes = changes.is_some(), "Modifier applied");
                changes
            }
            None => None,
        };

        let pending_changes = match self.pipeline.run(&snapshot, pending_changes, event)? {
            PipelineResult::Proceed(changes) => changes,
            PipelineResult::Cancelled { index } => {
                info!(middleware = index, "Dispatch cancelled");
                return Ok(());
            }
        };

        match pending_changes {
            Some(changes) => {
                let mut next = snapshot.into_inner();
                next.merge(changes);
                self.context = next;
                debug!("Context committed");
            }
            None => debug!("No pending changes, context unchanged"),
        }

        self.notify(event, listeners)
    }

    fn notify(
        &self,
        event: &E,
        listeners: &mut ListenerRegistry<C, E>,
    ) -> std::result::Result<(), MediatorError> {
        let selected = listeners.select(event);
        if selected.is_empty() {
            return Ok(());
        }

        debug!(listeners = selected.len(), "Notifying listeners");
        let committed = self.context();

        for s in selected {
            listeners.consume(&s);
            s.listener.call(&committed, event).map_err(|source| {
                warn!(key = %s.key.describe(), error = %source, "Listener failed");
                MediatorError::Listener {
                    event: describe_event(event),
                    key: s.key.describe(),
                    source,
                }
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKey;
    use crate::json::{into_object, JsonObject};
    use crate::listeners::Listener;
    use crate::middleware::{MiddlewareEntry, MiddlewareOutcome};
    use anyhow::bail;
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::rc::Rc;

    type Modify = fn(&JsonObject) -> Result<Option<JsonObject>>;

    fn object(value: Value) -> JsonObject {
        into_object(value).unwrap()
    }

    fn engine(
        entries: Vec<MiddlewareEntry<JsonObject, &'static str>>,
    ) -> Engine<JsonObject, &'static str> {
        Engine::new(&object(json!({"count": 0})), Pipeline::new(entries), "test")
    }

    #[test]
    fn no_modifier_and_no_middleware_leaves_context() {
        let mut engine = engine(vec![]);
        let mut listeners = ListenerRegistry::new();

        engine.dispatch::<Modify>(&"x", None, &mut listeners).unwrap();

        assert_eq!(engine.context(), object(json!({"count": 0})));
    }

    #[test]
    fn modifier_output_is_merged() {
        let mut engine = engine(vec![]);
        let mut listeners = ListenerRegistry::new();

        engine
            .dispatch(
                &"inc",
                Some(|ctx: &JsonObject| {
                    let count = ctx["count"].as_i64().unwrap_or(0);
                    Ok(Some(object(json!({"count": count + 1}))))
                }),
                &mut listeners,
            )
            .unwrap();

        assert_eq!(engine.context(), object(json!({"count": 1})));
    }

    #[test]
    fn failing_modifier_leaves_context_and_skips_listeners() {
        let mut engine = engine(vec![]);
        let calls = Rc::new(RefCell::new(0));
        let mut listeners = ListenerRegistry::new();
        let counter = Rc::clone(&calls);
        listeners.add(
            EventKey::Any,
            Listener::infallible(move |_, _| *counter.borrow_mut() += 1),
            false,
        );

        let err = engine
            .dispatch(
                &"inc",
                Some(|_: &JsonObject| -> Result<Option<JsonObject>> { bail!("boom") }),
                &mut listeners,
            )
            .unwrap_err();

        assert!(matches!(err, MediatorError::Modifier { .. }));
        assert_eq!(engine.context(), object(json!({"count": 0})));
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn cancelled_dispatch_keeps_once_listeners() {
        let mut engine = engine(vec![MiddlewareEntry::from_fn(
            "guarded",
            |_: &JsonObject, _: &_, _: &&'static str| Ok(MiddlewareOutcome::Cancel),
        )]);
        let calls = Rc::new(RefCell::new(0));
        let mut listeners = ListenerRegistry::new();
        let counter = Rc::clone(&calls);
        listeners.add(
            EventKey::Any,
            Listener::infallible(move |_, _| *counter.borrow_mut() += 1),
            true,
        );

        engine.dispatch::<Modify>(&"guarded", None, &mut listeners).unwrap();
        assert_eq!(*calls.borrow(), 0);

        engine.dispatch::<Modify>(&"open", None, &mut listeners).unwrap();
        engine.dispatch::<Modify>(&"open", None, &mut listeners).unwrap();
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn once_listeners_after_a_failure_stay_registered() {
        let mut engine = engine(vec![]);
        let calls = Rc::new(RefCell::new(0));
        let mut listeners = ListenerRegistry::new();
        listeners.add(
            EventKey::Named("inc"),
            Listener::new(|_, _| bail!("listener down")),
            false,
        );
        let counter = Rc::clone(&calls);
        listeners.add(
            EventKey::Any,
            Listener::infallible(move |_, _| *counter.borrow_mut() += 1),
            true,
        );

        assert!(engine.dispatch::<Modify>(&"inc", None, &mut listeners).is_err());
        assert_eq!(*calls.borrow(), 0);
        assert_eq!(listeners.count(&EventKey::Any), 1);

        engine.dispatch::<Modify>(&"other", None, &mut listeners).unwrap();
        engine.dispatch::<Modify>(&"other", None, &mut listeners).unwrap();
        assert_eq!(*calls.borrow(), 1);
        assert_eq!(listeners.count(&EventKey::Any), 0);
    }

    #[test]
    fn failing_listener_stops_later_listeners_but_keeps_commit() {
        let mut engine = engine(vec![]);
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut listeners = ListenerRegistry::new();

        let first = Rc::clone(&calls);
        listeners.add(
            EventKey::Named("inc"),
            Listener::infallible(move |_, _| first.borrow_mut().push("first")),
            false,
        );
        listeners.add(
            EventKey::Named("inc"),
            Listener::new(|_, _| bail!("listener down")),
            false,
        );
        let wildcard = Rc::clone(&calls);
        listeners.add(
            EventKey::Any,
            Listener::infallible(move |_, _| wildcard.borrow_mut().push("wildcard")),
            false,
        );

        let err = engine
            .dispatch(
                &"inc",
                Some(|_: &JsonObject| Ok(Some(object(json!({"count": 7}))))),
                &mut listeners,
            )
            .unwrap_err();

        match err {
            MediatorError::Listener { event, key, .. } => {
                assert_eq!(event, "inc");
                assert_eq!(key, "inc");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(*calls.borrow(), vec!["first"]);
        assert_eq!(engine.context(), object(json!({"count": 7})));
    }
}
