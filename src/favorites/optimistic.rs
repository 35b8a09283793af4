//! Local projection of membership sets for optimistic display.
//!
//! A change is applied to the view before its batch commits. The returned
//! [`PendingChange`] either confirms the committed state or, when dropped
//! unconfirmed (commit failed or the task was cancelled), restores what the
//! view showed before.
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::plan::projected_after;
use super::ReconcileError;
use crate::model::{JournalId, ListId, Membership};

#[derive(Debug, Default)]
struct Inner {
    projected: HashMap<JournalId, BTreeSet<Membership>>,
    in_flight: HashSet<JournalId>,
}

#[derive(Debug, Default)]
pub struct MembershipView {
    inner: Mutex<Inner>,
}

impl MembershipView {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the projection for a journal with a freshly read store state.
    pub fn sync(&self, journal: &JournalId, memberships: BTreeSet<Membership>) {
        self.lock().projected.insert(journal.clone(), memberships);
    }

    pub fn memberships(&self, journal: &JournalId) -> BTreeSet<Membership> {
        self.lock()
            .projected
            .get(journal)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_favorite(&self, journal: &JournalId) -> bool {
        !self.memberships(journal).is_empty()
    }

    pub fn is_in_flight(&self, journal: &JournalId) -> bool {
        self.lock().in_flight.contains(journal)
    }

    /// Show `target` right away. Fails if a change for this journal is still pending.
    pub fn begin(
        &self,
        journal: &JournalId,
        target: &BTreeSet<ListId>,
    ) -> Result<PendingChange<'_>, ReconcileError> {
        let mut inner = self.lock();
        if !inner.in_flight.insert(journal.clone()) {
            return Err(ReconcileError::InFlight(journal.clone()));
        }
        let previous = inner.projected.get(journal).cloned().unwrap_or_default();
        let projected = projected_after(&previous, target);
        inner.projected.insert(journal.clone(), projected);
        Ok(PendingChange {
            view: self,
            journal: journal.clone(),
            previous: Some(previous),
        })
    }
}

#[must_use = "dropping a pending change rolls the view back"]
#[derive(Debug)]
pub struct PendingChange<'a> {
    view: &'a MembershipView,
    journal: JournalId,
    previous: Option<BTreeSet<Membership>>,
}

impl PendingChange<'_> {
    /// Install the state the store actually committed.
    pub fn confirm(mut self, committed: BTreeSet<Membership>) {
        self.previous = None;
        let mut inner = self.view.lock();
        inner.projected.insert(self.journal.clone(), committed);
        inner.in_flight.remove(&self.journal);
    }

    pub fn rollback(self) {
        drop(self);
    }
}

impl Drop for PendingChange<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            let mut inner = self.view.lock();
            inner.projected.insert(self.journal.clone(), previous);
            inner.in_flight.remove(&self.journal);
        }
    }
}
