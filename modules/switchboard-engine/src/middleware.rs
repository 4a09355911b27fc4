//! Ordered middleware pipeline.

use std::fmt;

use anyhow::Result;
use tracing::{trace, warn};

use crate::context::Snapshot;
use crate::error::MediatorError;
use crate::event::{describe_event, EventKey, EventName};
use crate::traits::{Context, Middleware};

/// What a middleware handler sees of the in-flight changes.
#[derive(Debug, Clone, PartialEq)]
pub struct MiddlewareInput<P> {
    /// Accumulated pending changes so far. Starts as the modifier's output.
    pub pending_changes: Option<P>,
}

/// Result of one middleware handler.
#[derive(Debug, Clone, PartialEq)]
pub enum MiddlewareOutcome<P> {
    /// Leave pending changes as they are.
    Pass,
    /// Abort the dispatch: no commit, no listeners.
    Cancel,
    /// Replace pending changes wholesale. `None` clears them.
    Apply(Option<P>),
}

impl<P> MiddlewareOutcome<P> {
    pub fn apply(changes: P) -> Self {
        MiddlewareOutcome::Apply(Some(changes))
    }

    pub fn clear() -> Self {
        MiddlewareOutcome::Apply(None)
    }

    fn label(&self) -> &'static str {
        match self {
            MiddlewareOutcome::Pass => "pass",
            MiddlewareOutcome::Cancel => "cancel",
            MiddlewareOutcome::Apply(Some(_)) => "apply",
            MiddlewareOutcome::Apply(None) => "clear",
        }
    }
}

impl<P> Default for MiddlewareOutcome<P> {
    fn default() -> Self {
        MiddlewareOutcome::Pass
    }
}

/// One registered (pattern, handler) pair.
pub struct MiddlewareEntry<C: Context, E> {
    key: EventKey<E>,
    handler: Box<dyn Middleware<C, E>>,
}

impl<C: Context, E: EventName> MiddlewareEntry<C, E> {
    pub fn new(key: impl Into<EventKey<E>>, handler: impl Middleware<C, E> + 'static) -> Self {
        Self {
            key: key.into().normalize(),
            handler: Box::new(handler),
        }
    }

    /// Wrap a plain closure.
    pub fn from_fn<F>(key: impl Into<EventKey<E>>, handler: F) -> Self
    where
        F: Fn(&C, &MiddlewareInput<C::Patch>, &E) -> Result<MiddlewareOutcome<C::Patch>>
            + 'static,
    {
        Self::new(key, handler)
    }

    pub fn key(&self) -> &EventKey<E> {
        &self.key
    }
}

impl<C: Context, E: fmt::Debug> fmt::Debug for MiddlewareEntry<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareEntry")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// How a pipeline run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineResult<P> {
    /// All selected handlers ran; commit these changes (if any).
    Proceed(Option<P>),
    /// The handler at `index` cancelled.
    Cancelled { index: usize },
}

/// Middleware fixed at construction, run in registration order.
pub struct Pipeline<C: Context, E> {
    entries: Vec<MiddlewareEntry<C, E>>,
}

impl<C: Context, E: EventName> Pipeline<C, E> {
    pub fn new(entries: Vec<MiddlewareEntry<C, E>>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every entry matching `event`, threading pending changes through.
    ///
    /// Selection is pure registration order: a wildcard entry registered
    /// before a specific one runs first. `index` in results and errors is the
    /// entry's position in the full list.
    pub fn run(
        &self,
        snapshot: &Snapshot<C>,
        pending_changes: Option<C::Patch>,
        event: &E,
    ) -> std::result::Result<PipelineResult<C::Patch>, MediatorError> {
        let mut input = MiddlewareInput { pending_changes };

        for (index, entry) in self.entries.iter().enumerate() {
            if !entry.key.matches(event) {
                continue;
            }

            let outcome = entry
                .handler
                .handle(snapshot, &input, event)
                .map_err(|source| {
                    warn!(index, error = %source, "Middleware failed");
                    MediatorError::Middleware {
                        event: describe_event(event),
                        index,
                        source,
                    }
                })?;

            trace!(index, outcome = outcome.label(), "Middleware returned");

            match outcome {
                MiddlewareOutcome::Pass => {}
                MiddlewareOutcome::Cancel => return Ok(PipelineResult::Cancelled { index }),
                MiddlewareOutcome::Apply(changes) => input.pending_changes = changes,
            }
        }

        Ok(PipelineResult::Proceed(input.pending_changes))
    }
}

impl<C: Context, E: fmt::Debug> fmt::Debug for Pipeline<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}
