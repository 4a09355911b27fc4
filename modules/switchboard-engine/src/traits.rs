//! Core traits for the mediator.

use std::fmt;

use anyhow::Result;

use crate::context::Snapshot;
use crate::middleware::{MiddlewareInput, MiddlewareOutcome};

/// A structured state value owned by a mediator.
///
/// `Clone` must yield an independent deep copy. The engine hands clones to
/// callers and assumes they never alias the authoritative value, which holds
/// for owned data (maps, vecs, strings) but not for `Rc`/`RefCell` fields.
pub trait Context: Clone + fmt::Debug + 'static {
    /// Partial context produced by modifiers and middleware.
    type Patch: Clone + fmt::Debug + 'static;

    /// Shallow-merge `patch` onto `self`.
    ///
    /// Top-level fields present in the patch overwrite, absent fields are
    /// kept, nested values are replaced wholesale (never deep-merged).
    fn merge(&mut self, patch: Self::Patch);
}

/// Intercepts a dispatch before it commits.
///
/// Every handler in one dispatch sees the same snapshot. Changes made by an
/// earlier handler are only visible through `input.pending_changes`.
pub trait Middleware<C: Context, E> {
    fn handle(
        &self,
        snapshot: &Snapshot<C>,
        input: &MiddlewareInput<C::Patch>,
        event: &E,
    ) -> Result<MiddlewareOutcome<C::Patch>>;
}

impl<C, E, F> Middleware<C, E> for F
where
    C: Context,
    F: Fn(&C, &MiddlewareInput<C::Patch>, &E) -> Result<MiddlewareOutcome<C::Patch>>,
{
    fn handle(
        &self,
        snapshot: &Snapshot<C>,
        input: &MiddlewareInput<C::Patch>,
        event: &E,
    ) -> Result<MiddlewareOutcome<C::Patch>> {
        self(snapshot.get(), input, event)
    }
}
