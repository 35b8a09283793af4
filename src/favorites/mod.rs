//! Favorite lists and list-membership reconciliation.
//!
//! Records live under `owner/{owner}/favorites/{journalId}_{listId}` (or
//! `{journalId}_uncategorized`) and lists under `owner/{owner}/lists/{listId}`.
//! Every operation that touches more than one document goes through a single
//! [`WriteBatch`], so a failed commit leaves the store as it was.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::catalog::{AuthorityLevel, ImpactFactor, Journal};
use crate::model::{IdError, JournalId, ListId, Membership, OwnerId};
use crate::store::{
    favorites_collection, lists_collection, DocPath, Direction, Document, DocumentStore, Fields,
    Query, StoreError, WriteBatch,
};

pub mod optimistic;
pub mod plan;

pub use optimistic::{MembershipView, PendingChange};
pub use plan::{plan, ReconcilePlan, StoredMembership};

/// Documents per batch when wiping an account.
pub const DELETE_CHUNK: usize = 100;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Id(#[from] IdError),
    #[error("journal list {0} does not exist")]
    UnknownList(ListId),
    #[error("list name must be non-empty")]
    EmptyName,
    #[error("a favorites change for journal {0} is still in flight")]
    InFlight(JournalId),
}

/// Journal fields copied onto each favorite so list views need no catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalSnapshot {
    pub journal_name: String,
    pub issn: String,
    pub impact_factor: ImpactFactor,
    pub major_category: String,
    pub major_category_partition: String,
    pub authority: AuthorityLevel,
    pub open_access: bool,
    pub top: bool,
}

impl From<&Journal> for JournalSnapshot {
    fn from(j: &Journal) -> Self {
        Self {
            journal_name: j.name.clone(),
            issn: j.issn.clone(),
            impact_factor: j.impact_factor.clone(),
            major_category: j.major_category.clone(),
            major_category_partition: j.major_category_partition.clone(),
            authority: j.authority,
            open_access: j.open_access,
            top: j.top,
        }
    }
}

/// Stored shape of a favorite document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FavoriteDoc {
    journal_id: String,
    #[serde(default)]
    owner_id: Option<String>,
    /// Absent, null or empty means uncategorized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    list_id: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    snapshot: Option<JournalSnapshot>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FavoriteRecord {
    pub path: DocPath,
    pub journal_id: JournalId,
    pub membership: Membership,
    pub created_at: Option<DateTime<Utc>>,
    pub snapshot: Option<JournalSnapshot>,
}

impl FavoriteRecord {
    fn from_document(doc: &Document) -> Result<Self, String> {
        let parsed: FavoriteDoc = serde_json::from_value(Value::Object(doc.data.clone()))
            .map_err(|e| e.to_string())?;
        let journal_id = JournalId::normalize(&parsed.journal_id).map_err(|e| e.to_string())?;
        let membership = match parsed.list_id.as_deref().map(str::trim) {
            None | Some("") => Membership::Uncategorized,
            Some(id) => Membership::InList(ListId::new(id).map_err(|e| e.to_string())?),
        };
        Ok(Self {
            path: doc.path.clone(),
            journal_id,
            membership,
            created_at: parsed.created_at,
            snapshot: parsed.snapshot,
        })
    }

    fn stored(&self) -> StoredMembership {
        StoredMembership {
            path: self.path.clone(),
            membership: self.membership.clone(),
        }
    }

    fn impact(&self) -> f64 {
        self.snapshot
            .as_ref()
            .map(|s| s.impact_factor.sort_value())
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalList {
    pub id: ListId,
    pub owner: OwnerId,
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDoc {
    name: String,
    #[serde(default)]
    owner_id: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub plan: ReconcilePlan,
    pub committed: bool,
}

impl ReconcileOutcome {
    pub fn after(&self) -> &BTreeSet<Membership> {
        &self.plan.after
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteListOutcome {
    /// Membership records removed with the list.
    pub removed: usize,
    /// Journals that had no other membership and were filed as uncategorized.
    pub recategorized: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FavoritesOverview {
    pub lists: Vec<(JournalList, usize)>,
    pub uncategorized: usize,
    pub journals: usize,
}

fn to_fields<T: Serialize>(value: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Fields::new()),
    }
}

fn sort_by_impact(records: &mut [FavoriteRecord]) {
    records.sort_by(|a, b| b.impact().total_cmp(&a.impact()));
}

/// Favorites of one owner on top of a [`DocumentStore`].
#[derive(Clone)]
pub struct Favorites {
    store: Arc<dyn DocumentStore>,
    owner: OwnerId,
}

impl std::fmt::Debug for Favorites {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Favorites")
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl Favorites {
    pub fn new(store: Arc<dyn DocumentStore>, owner: OwnerId) -> Self {
        Self { store, owner }
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    fn favorite_path(&self, journal: &JournalId, membership: &Membership) -> DocPath {
        DocPath::new(
            favorites_collection(&self.owner),
            membership.record_key(journal),
        )
    }

    fn list_path(&self, id: &ListId) -> DocPath {
        DocPath::new(lists_collection(&self.owner), id.as_str())
    }

    fn favorite_fields(
        &self,
        journal: &JournalId,
        membership: &Membership,
        created_at: Option<DateTime<Utc>>,
        snapshot: Option<JournalSnapshot>,
    ) -> Result<Fields, StoreError> {
        to_fields(&FavoriteDoc {
            journal_id: journal.to_string(),
            owner_id: Some(self.owner.to_string()),
            list_id: membership.list_id().map(|l| l.to_string()),
            created_at: Some(created_at.unwrap_or_else(Utc::now)),
            snapshot,
        })
    }

    fn decode_all(docs: &[Document]) -> Vec<FavoriteRecord> {
        docs.iter()
            .filter_map(|doc| match FavoriteRecord::from_document(doc) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(path = %doc.path, %err, "ignoring unreadable favorite record");
                    None
                }
            })
            .collect()
    }

    /// Fresh read of every record this owner holds for `journal`.
    #[instrument(skip_all, fields(journal = %journal))]
    pub async fn records_for(&self, journal: &JournalId) -> Result<Vec<FavoriteRecord>, ReconcileError> {
        let docs = self
            .store
            .query(&Query::new(favorites_collection(&self.owner)).eq("journalId", journal.as_str()))
            .await?;
        Ok(Self::decode_all(&docs))
    }

    pub async fn memberships(&self, journal: &JournalId) -> Result<BTreeSet<Membership>, ReconcileError> {
        Ok(self
            .records_for(journal)
            .await?
            .into_iter()
            .map(|r| r.membership)
            .collect())
    }

    pub async fn is_favorite(&self, journal: &JournalId) -> Result<bool, ReconcileError> {
        Ok(!self.records_for(journal).await?.is_empty())
    }

    /// Make the stored memberships of `journal` match `target`, reading the
    /// current state immediately before planning.
    pub async fn reconcile(
        &self,
        journal: &Journal,
        target: &BTreeSet<ListId>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let journal_id = journal.journal_id()?;
        let current = self.records_for(&journal_id).await?;
        self.reconcile_from(journal, &current, target).await
    }

    /// Reconcile against a caller-supplied snapshot of the current records.
    /// Re-running with the same snapshot and target rewrites the same keys.
    #[instrument(skip_all, fields(owner = %self.owner, journal = %journal.name))]
    pub async fn reconcile_from(
        &self,
        journal: &Journal,
        current: &[FavoriteRecord],
        target: &BTreeSet<ListId>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let journal_id = journal.journal_id()?;
        self.ensure_lists_exist(target).await?;

        let stored: Vec<StoredMembership> = current.iter().map(FavoriteRecord::stored).collect();
        let plan = plan::plan(&journal_id, &stored, target);
        if plan.is_noop() {
            return Ok(ReconcileOutcome {
                plan,
                committed: false,
            });
        }

        let snapshot = JournalSnapshot::from(journal);
        let mut batch = WriteBatch::new();
        for membership in &plan.add {
            let fields = self.favorite_fields(&journal_id, membership, None, Some(snapshot.clone()))?;
            batch.set(self.favorite_path(&journal_id, membership), fields);
        }
        for path in &plan.remove {
            batch.delete(path.clone());
        }

        self.store.commit(batch).await?;
        info!(
            added = plan.add.len(),
            removed = plan.remove.len(),
            favorited = !plan.after.is_empty(),
            "favorites reconciled"
        );
        Ok(ReconcileOutcome {
            plan,
            committed: true,
        })
    }

    /// Apply `target` to `view` first, then commit; the view is rolled back
    /// if the commit fails.
    pub async fn reconcile_optimistic(
        &self,
        view: &MembershipView,
        journal: &Journal,
        target: &BTreeSet<ListId>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let journal_id = journal.journal_id()?;
        let pending = view.begin(&journal_id, target)?;
        match self.reconcile(journal, target).await {
            Ok(outcome) => {
                pending.confirm(outcome.plan.after.clone());
                Ok(outcome)
            }
            Err(err) => {
                warn!(%err, journal = %journal_id, "favorites change failed; view rolled back");
                pending.rollback();
                Err(err)
            }
        }
    }

    /// Favorite without filing: a never-favorited journal becomes uncategorized,
    /// an already favorited one is left alone.
    pub async fn favorite(&self, journal: &Journal) -> Result<ReconcileOutcome, ReconcileError> {
        let journal_id = journal.journal_id()?;
        let current = self.records_for(&journal_id).await?;
        if current.is_empty() {
            return self.reconcile_from(journal, &current, &BTreeSet::new()).await;
        }
        let stored: Vec<_> = current.iter().map(FavoriteRecord::stored).collect();
        let before: BTreeSet<Membership> = stored.iter().map(|s| s.membership.clone()).collect();
        Ok(ReconcileOutcome {
            plan: ReconcilePlan {
                journal_id,
                add: Vec::new(),
                remove: Vec::new(),
                after: before.clone(),
                before,
            },
            committed: false,
        })
    }

    /// Remove every record of `journal` in one batch.
    #[instrument(skip_all, fields(owner = %self.owner, journal = %journal))]
    pub async fn unfavorite(&self, journal: &JournalId) -> Result<usize, ReconcileError> {
        let current = self.records_for(journal).await?;
        if current.is_empty() {
            return Ok(0);
        }
        let mut batch = WriteBatch::new();
        for record in &current {
            batch.delete(record.path.clone());
        }
        self.store.commit(batch).await?;
        info!(removed = current.len(), "journal unfavorited");
        Ok(current.len())
    }

    async fn ensure_lists_exist(&self, ids: &BTreeSet<ListId>) -> Result<(), ReconcileError> {
        if ids.is_empty() {
            return Ok(());
        }
        let known: BTreeSet<ListId> = self.lists().await?.into_iter().map(|l| l.id).collect();
        match ids.iter().find(|id| !known.contains(*id)) {
            Some(missing) => Err(ReconcileError::UnknownList(missing.clone())),
            None => Ok(()),
        }
    }

    fn decode_list(&self, doc: &Document) -> Option<JournalList> {
        let id = ListId::new(doc.id()).ok()?;
        match serde_json::from_value::<ListDoc>(Value::Object(doc.data.clone())) {
            Ok(parsed) => Some(JournalList {
                id,
                owner: self.owner.clone(),
                name: parsed.name,
                created_at: parsed.created_at,
            }),
            Err(err) => {
                warn!(path = %doc.path, %err, "ignoring unreadable list document");
                None
            }
        }
    }

    /// Lists ordered by name.
    pub async fn lists(&self) -> Result<Vec<JournalList>, ReconcileError> {
        let docs = self
            .store
            .query(&Query::new(lists_collection(&self.owner)).order_by("name", Direction::Asc))
            .await?;
        Ok(docs.iter().filter_map(|d| self.decode_list(d)).collect())
    }

    pub async fn list(&self, id: &ListId) -> Result<Option<JournalList>, ReconcileError> {
        let doc = self.store.get(&self.list_path(id)).await?;
        Ok(doc.as_ref().and_then(|d| self.decode_list(d)))
    }

    fn list_fields(&self, name: &str, created_at: DateTime<Utc>) -> Result<Fields, StoreError> {
        to_fields(&ListDoc {
            name: name.to_string(),
            owner_id: Some(self.owner.to_string()),
            created_at: Some(created_at),
        })
    }

    #[instrument(skip_all, fields(owner = %self.owner))]
    pub async fn create_list(&self, name: &str) -> Result<JournalList, ReconcileError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ReconcileError::EmptyName);
        }
        let id = ListId::generate();
        let created_at = Utc::now();
        let mut batch = WriteBatch::new();
        batch.set(self.list_path(&id), self.list_fields(name, created_at)?);
        self.store.commit(batch).await?;
        info!(list = %id, "journal list created");
        Ok(JournalList {
            id,
            owner: self.owner.clone(),
            name: name.to_string(),
            created_at: Some(created_at),
        })
    }

    pub async fn rename_list(&self, id: &ListId, name: &str) -> Result<(), ReconcileError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ReconcileError::EmptyName);
        }
        let mut fields = Fields::new();
        fields.insert("name".into(), Value::String(name.to_string()));
        match self.store.update(&self.list_path(id), fields).await {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound(_)) => Err(ReconcileError::UnknownList(id.clone())),
            Err(err) => Err(err.into()),
        }
    }

    /// Create a list, then file `journal` into it and drop its uncategorized
    /// record in one batch. Other memberships are untouched.
    pub async fn create_list_and_add(
        &self,
        journal: &Journal,
        name: &str,
    ) -> Result<JournalList, ReconcileError> {
        let journal_id = journal.journal_id()?;
        let list = self.create_list(name).await?;

        let current = self.records_for(&journal_id).await?;
        let membership = Membership::InList(list.id.clone());
        let mut batch = WriteBatch::new();
        batch.set(
            self.favorite_path(&journal_id, &membership),
            self.favorite_fields(
                &journal_id,
                &membership,
                None,
                Some(JournalSnapshot::from(journal)),
            )?,
        );
        for record in current.iter().filter(|r| r.membership.is_uncategorized()) {
            batch.delete(record.path.clone());
        }
        self.store.commit(batch).await?;
        Ok(list)
    }

    /// Delete a list and its memberships. A journal whose only memberships
    /// were in this list is kept as a single uncategorized favorite.
    #[instrument(skip_all, fields(owner = %self.owner, list = %id))]
    pub async fn delete_list(&self, id: &ListId) -> Result<DeleteListOutcome, ReconcileError> {
        if self.list(id).await?.is_none() {
            return Err(ReconcileError::UnknownList(id.clone()));
        }
        let records = self.all_favorites().await?;

        let mut by_journal: BTreeMap<&JournalId, Vec<&FavoriteRecord>> = BTreeMap::new();
        for record in &records {
            by_journal.entry(&record.journal_id).or_default().push(record);
        }

        let target = Membership::InList(id.clone());
        let mut batch = WriteBatch::new();
        batch.delete(self.list_path(id));
        let mut outcome = DeleteListOutcome::default();

        for (journal_id, journal_records) in by_journal {
            let (in_list, others): (Vec<&FavoriteRecord>, Vec<&FavoriteRecord>) = journal_records
                .into_iter()
                .partition(|r| r.membership == target);
            if in_list.is_empty() {
                continue;
            }
            for record in &in_list {
                batch.delete(record.path.clone());
            }
            outcome.removed += in_list.len();

            if others.is_empty() {
                let created_at = in_list.iter().filter_map(|r| r.created_at).min();
                let snapshot = in_list.iter().find_map(|r| r.snapshot.clone());
                let uncategorized = Membership::Uncategorized;
                batch.merge(
                    self.favorite_path(journal_id, &uncategorized),
                    self.favorite_fields(journal_id, &uncategorized, created_at, snapshot)?,
                );
                outcome.recategorized += 1;
            }
        }

        self.store.commit(batch).await?;
        info!(
            removed = outcome.removed,
            recategorized = outcome.recategorized,
            "journal list deleted"
        );
        Ok(outcome)
    }

    pub async fn all_favorites(&self) -> Result<Vec<FavoriteRecord>, ReconcileError> {
        let docs = self
            .store
            .query(&Query::new(favorites_collection(&self.owner)))
            .await?;
        Ok(Self::decode_all(&docs))
    }

    /// Records filed under `membership`, highest impact factor first.
    pub async fn favorites_in(&self, membership: &Membership) -> Result<Vec<FavoriteRecord>, ReconcileError> {
        let mut records = match membership {
            Membership::InList(id) => {
                let docs = self
                    .store
                    .query(&Query::new(favorites_collection(&self.owner)).eq("listId", id.as_str()))
                    .await?;
                Self::decode_all(&docs)
            }
            Membership::Uncategorized => self
                .all_favorites()
                .await?
                .into_iter()
                .filter(|r| r.membership.is_uncategorized())
                .collect(),
        };
        sort_by_impact(&mut records);
        Ok(records)
    }

    /// Per-list counts, the uncategorized count and distinct favorited journals.
    pub async fn overview(&self) -> Result<FavoritesOverview, ReconcileError> {
        let lists = self.lists().await?;
        let records = self.all_favorites().await?;

        let mut counts: BTreeMap<&ListId, usize> = BTreeMap::new();
        let mut uncategorized = 0;
        for record in &records {
            match &record.membership {
                Membership::InList(id) => *counts.entry(id).or_default() += 1,
                Membership::Uncategorized => uncategorized += 1,
            }
        }
        let journals = records
            .iter()
            .map(|r| &r.journal_id)
            .collect::<BTreeSet<_>>()
            .len();
        let lists = lists
            .into_iter()
            .map(|l| {
                let n = counts.get(&l.id).copied().unwrap_or(0);
                (l, n)
            })
            .collect();
        Ok(FavoritesOverview {
            lists,
            uncategorized,
            journals,
        })
    }

    /// Remove every list and favorite of this owner, [`DELETE_CHUNK`] documents per batch.
    #[instrument(skip_all, fields(owner = %self.owner))]
    pub async fn delete_all(&self) -> Result<usize, ReconcileError> {
        let mut deleted = 0;
        for collection in [lists_collection(&self.owner), favorites_collection(&self.owner)] {
            let docs = self.store.query(&Query::new(collection.clone())).await?;
            for chunk in docs.chunks(DELETE_CHUNK) {
                let mut batch = WriteBatch::new();
                for doc in chunk {
                    batch.delete(doc.path.clone());
                }
                self.store.commit(batch).await?;
                deleted += chunk.len();
            }
            info!(%collection, "collection cleared");
        }
        Ok(deleted)
    }
}
