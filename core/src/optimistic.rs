//! Optimistic list projection.
//!
//! [`OptimisticView`] appends tentative entries to an authoritative list
//! without copying or mutating it. The view borrows both inputs, so it is
//! rebuilt for every read and can never go stale when the base list changes.

use crate::request::{Status, SubmissionRequest};

/// Items that can be shown as a tentative, not yet confirmed entry.
pub trait Optimistic: Clone {
    /// The tentative form of this item.
    #[must_use]
    fn as_pending(&self) -> Self;
}

impl Optimistic for SubmissionRequest {
    fn as_pending(&self) -> Self {
        Self {
            status: Status::Pending,
            ..self.clone()
        }
    }
}

/// `base ++ pending` as a lazy, borrowed sequence.
#[derive(Debug)]
pub struct OptimisticView<'a, T> {
    base: &'a [T],
    pending: &'a [T],
}

impl<T> Clone for OptimisticView<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for OptimisticView<'_, T> {}

impl<'a, T: Optimistic> OptimisticView<'a, T> {
    /// Project `pending` on top of `base`.
    #[must_use]
    pub const fn new(base: &'a [T], pending: &'a [T]) -> Self {
        Self { base, pending }
    }

    /// View with no tentative entries.
    #[must_use]
    pub const fn settled(base: &'a [T]) -> Self {
        Self { base, pending: &[] }
    }

    /// Number of items in the display list.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.base.len() + self.pending.len()
    }

    /// Whether the display list is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of tentative entries.
    #[must_use]
    pub const fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Iterate the display list, tentative entries last.
    pub fn iter(&self) -> impl Iterator<Item = T> + 'a {
        self.base
            .iter()
            .cloned()
            .chain(self.pending.iter().map(Optimistic::as_pending))
    }

    /// Collect the display list.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }
}
