//! Deep copies and frozen snapshots.

use std::ops::Deref;

use crate::traits::Context;

/// Independent copy of `value`. Nothing in the result aliases the source.
pub fn deep_copy<C: Context>(value: &C) -> C {
    value.clone()
}

/// Read-only copy of the context taken at the start of a dispatch.
///
/// The modifier and every middleware of that dispatch borrow this one value.
/// There is no mutable access; committing consumes it via `into_inner`.
#[derive(Debug)]
pub struct Snapshot<C: Context> {
    value: C,
}

impl<C: Context> Snapshot<C> {
    /// Deep-copy `current` into a fresh snapshot.
    pub fn capture(current: &C) -> Self {
        Self {
            value: deep_copy(current),
        }
    }

    pub fn get(&self) -> &C {
        &self.value
    }

    /// Owned copy, leaving the snapshot intact.
    pub fn to_context(&self) -> C {
        deep_copy(&self.value)
    }

    /// Give up the snapshot as the base for a commit.
    pub(crate) fn into_inner(self) -> C {
        self.value
    }
}

impl<C: Context> Deref for Snapshot<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.value
    }
}
