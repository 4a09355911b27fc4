//! Event scripts and the replay loop.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use switchboard_engine::json::into_object;
use switchboard_engine::{
    EventKey, JsonObject, Listener, Mediator, MediatorOptions, Middleware, MiddlewareInput,
    MiddlewareOutcome, Snapshot,
};
use tracing::{debug, info};

/// A recorded sequence of sends against one initial context.
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    pub initial: Value,
    /// Top-level keys no step may change.
    #[serde(default)]
    pub readonly: Vec<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    pub event: String,
    /// Patch merged by the step's modifier. `null` or absent sends without one.
    #[serde(default)]
    pub changes: Option<Value>,
}

impl Script {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Invalid script {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Cancels any dispatch whose pending changes touch a readonly key.
#[derive(Debug, Clone, Default)]
pub struct ReadonlyGuard {
    keys: Vec<String>,
}

impl ReadonlyGuard {
    pub fn new(keys: Vec<String>) -> Self {
        Self { keys }
    }
}

impl Middleware<JsonObject, String> for ReadonlyGuard {
    fn handle(
        &self,
        _snapshot: &Snapshot<JsonObject>,
        input: &MiddlewareInput<JsonObject>,
        event: &String,
    ) -> Result<MiddlewareOutcome<JsonObject>> {
        let Some(changes) = &input.pending_changes else {
            return Ok(MiddlewareOutcome::Pass);
        };

        match self.keys.iter().find(|key| changes.contains_key(key.as_str())) {
            Some(key) => {
                info!(%event, key = %key, "Blocked write to readonly key");
                Ok(MiddlewareOutcome::Cancel)
            }
            None => Ok(MiddlewareOutcome::Pass),
        }
    }
}

/// Outcome of a full replay.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub steps: usize,
    /// Events that reached listeners, in order.
    pub notified: Vec<String>,
    pub context: JsonObject,
}

impl Report {
    /// Steps that ended without notifying, i.e. were cancelled.
    pub fn cancelled(&self) -> usize {
        self.steps - self.notified.len()
    }
}

pub fn run_script(script: Script, name: &str) -> Result<Report> {
    let options: MediatorOptions<JsonObject, String> = MediatorOptions::new()
        .with_name(name)
        .with_handler(EventKey::Any, ReadonlyGuard::new(script.readonly));
    let mut mediator =
        Mediator::from_json(script.initial, options).context("Invalid initial context")?;

    let notified: Rc<RefCell<Vec<String>>> = Rc::default();
    let log = Rc::clone(&notified);
    mediator.on(
        EventKey::Any,
        Listener::infallible(move |ctx: &JsonObject, event: &String| {
            info!(%event, keys = ctx.len(), "Notified");
            log.borrow_mut().push(event.clone());
        }),
    );

    let steps = script.steps.len();
    for (index, step) in script.steps.into_iter().enumerate() {
        let Step { event, changes } = step;
        let changes = match changes {
            None | Some(Value::Null) => None,
            Some(value) => Some(
                into_object(value)
                    .with_context(|| format!("Step {index} ({event}): changes must be an object"))?,
            ),
        };

        debug!(index, %event, has_changes = changes.is_some(), "Replaying step");
        let label = event.clone();
        let sent = match changes {
            Some(changes) => mediator.send_with(event, move |_| changes),
            None => mediator.send(event),
        };
        sent.with_context(|| format!("Step {index} ({label}) failed"))?;
    }

    let notified = notified.borrow().clone();
    Ok(Report {
        steps,
        notified,
        context: mediator.context(),
    })
}
