//! Pure reconciliation planning: which favorite records to write and which
//! to delete so a journal's stored memberships match the chosen lists.
use std::collections::{BTreeMap, BTreeSet};

use crate::model::{JournalId, ListId, Membership};
use crate::store::DocPath;

/// One stored membership record as seen by the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMembership {
    pub path: DocPath,
    pub membership: Membership,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub journal_id: JournalId,
    /// Memberships to write at their deterministic keys.
    pub add: Vec<Membership>,
    /// Existing records to delete, by exact path.
    pub remove: Vec<DocPath>,
    pub before: BTreeSet<Membership>,
    pub after: BTreeSet<Membership>,
}

impl ReconcilePlan {
    pub fn is_noop(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }

    pub fn writes(&self) -> usize {
        self.add.len() + self.remove.len()
    }
}

/// Membership set the store ends up with after reconciling `before` to `target`.
///
/// A non-empty target is taken as is. An empty target files a never-favorited
/// journal as uncategorized and fully unfavorites one that had records.
pub fn projected_after(
    before: &BTreeSet<Membership>,
    target: &BTreeSet<ListId>,
) -> BTreeSet<Membership> {
    if !target.is_empty() {
        target.iter().cloned().map(Membership::InList).collect()
    } else if before.is_empty() {
        BTreeSet::from([Membership::Uncategorized])
    } else {
        BTreeSet::new()
    }
}

pub fn plan(
    journal_id: &JournalId,
    current: &[StoredMembership],
    target: &BTreeSet<ListId>,
) -> ReconcilePlan {
    let before: BTreeSet<Membership> = current.iter().map(|r| r.membership.clone()).collect();
    let after = projected_after(&before, target);

    let mut by_membership: BTreeMap<&Membership, Vec<&DocPath>> = BTreeMap::new();
    for record in current {
        by_membership
            .entry(&record.membership)
            .or_default()
            .push(&record.path);
    }

    let mut remove = Vec::new();
    for (membership, paths) in by_membership {
        if !after.contains(membership) {
            remove.extend(paths.into_iter().cloned());
            continue;
        }
        // Kept: collapse stray duplicates onto the deterministic key.
        let canonical = membership.record_key(journal_id);
        let keep = paths
            .iter()
            .position(|p| p.id == canonical)
            .unwrap_or(0);
        remove.extend(
            paths
                .into_iter()
                .enumerate()
                .filter(|(i, _)| *i != keep)
                .map(|(_, p)| p.clone()),
        );
    }

    let add = after.difference(&before).cloned().collect();

    ReconcilePlan {
        journal_id: journal_id.clone(),
        add,
        remove,
        before,
        after,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jid() -> JournalId {
        JournalId::normalize("1234-5678/8765-4321").unwrap()
    }

    fn list(id: &str) -> ListId {
        ListId::new(id).unwrap()
    }

    fn stored(m: Membership) -> StoredMembership {
        StoredMembership {
            path: DocPath::new("owner/u/favorites", m.record_key(&jid())),
            membership: m,
        }
    }

    fn targets(ids: &[&str]) -> BTreeSet<ListId> {
        ids.iter().map(|id| list(id)).collect()
    }

    #[test]
    fn first_favorite_without_lists_is_uncategorized() {
        let p = plan(&jid(), &[], &BTreeSet::new());
        assert_eq!(p.add, vec![Membership::Uncategorized]);
        assert!(p.remove.is_empty());
        assert_eq!(p.after, BTreeSet::from([Membership::Uncategorized]));
    }

    #[test]
    fn filing_removes_uncategorized() {
        let current = vec![stored(Membership::Uncategorized)];
        let p = plan(&jid(), &current, &targets(&["reading"]));
        assert_eq!(p.add, vec![Membership::InList(list("reading"))]);
        assert_eq!(p.remove, vec![current[0].path.clone()]);
    }

    #[test]
    fn emptying_a_filed_journal_unfavorites_it() {
        let current = vec![
            stored(Membership::InList(list("a"))),
            stored(Membership::InList(list("b"))),
        ];
        let p = plan(&jid(), &current, &BTreeSet::new());
        assert!(p.add.is_empty());
        assert_eq!(p.remove.len(), 2);
        assert!(p.after.is_empty());
    }

    #[test]
    fn emptying_an_uncategorized_journal_unfavorites_it() {
        let current = vec![stored(Membership::Uncategorized)];
        let p = plan(&jid(), &current, &BTreeSet::new());
        assert!(p.add.is_empty());
        assert_eq!(p.remove.len(), 1);
        assert!(p.after.is_empty());
    }

    #[test]
    fn diff_adds_and_removes_only_changes() {
        let current = vec![
            stored(Membership::InList(list("a"))),
            stored(Membership::InList(list("b"))),
        ];
        let p = plan(&jid(), &current, &targets(&["b", "c"]));
        assert_eq!(p.add, vec![Membership::InList(list("c"))]);
        assert_eq!(p.remove, vec![current[0].path.clone()]);
        assert_eq!(p.writes(), 2);
    }

    #[test]
    fn same_target_twice_is_noop() {
        let first = plan(&jid(), &[], &targets(&["a", "b"]));
        let current: Vec<_> = first.after.iter().cloned().map(stored).collect();
        let second = plan(&jid(), &current, &targets(&["a", "b"]));
        assert!(second.is_noop());
    }

    #[test]
    fn duplicate_records_collapse_to_canonical_key() {
        let canonical = stored(Membership::Uncategorized);
        let stray = StoredMembership {
            path: DocPath::new("owner/u/favorites", "legacy-id"),
            membership: Membership::InList(list("a")),
        };
        let stray_uncat = StoredMembership {
            path: DocPath::new("owner/u/favorites", "legacy-uncat"),
            membership: Membership::Uncategorized,
        };
        let a = stored(Membership::InList(list("a")));
        let current = vec![stray.clone(), a, canonical, stray_uncat.clone()];
        let p = plan(&jid(), &current, &targets(&["a"]));
        assert!(p.add.is_empty());
        assert!(p.remove.contains(&stray.path));
        assert!(p.remove.contains(&stray_uncat.path));
        assert_eq!(p.remove.len(), 3);
    }

    #[test]
    fn projected_after_covers_all_cases() {
        let none = BTreeSet::new();
        let some = BTreeSet::from([Membership::InList(list("x"))]);
        assert_eq!(
            projected_after(&none, &BTreeSet::new()),
            BTreeSet::from([Membership::Uncategorized])
        );
        assert!(projected_after(&some, &BTreeSet::new()).is_empty());
        assert_eq!(
            projected_after(&none, &targets(&["y"])),
            BTreeSet::from([Membership::InList(list("y"))])
        );
    }
}
