//! Document store contract used by the favorites layer.
//!
//! Documents live at `{collection}/{id}` where a collection is itself a path
//! such as `owner/{ownerId}/favorites`. A [`WriteBatch`] is applied
//! atomically: either every set and delete in it lands, or none does.
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

use crate::model::OwnerId;

pub mod sqlite;

pub use sqlite::SqliteStore;

pub type Fields = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("stored document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("document {0} not found")]
    NotFound(DocPath),
    #[error("invalid field name '{0}'")]
    InvalidField(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocPath {
    pub collection: String,
    pub id: String,
}

impl DocPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

pub fn lists_collection(owner: &OwnerId) -> String {
    format!("owner/{}/lists", owner)
}

pub fn favorites_collection(owner: &OwnerId) -> String {
    format!("owner/{}/favorites", owner)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: DocPath,
    pub data: Fields,
}

impl Document {
    pub fn id(&self) -> &str {
        &self.path.id
    }

    /// String field; `None` when missing, null, or not a string.
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq { field: String, value: String },
    In { field: String, values: Vec<String> },
    /// Matches documents where the field is absent or null.
    IsNull { field: String },
}

impl Filter {
    pub fn field(&self) -> &str {
        match self {
            Filter::Eq { field, .. } | Filter::In { field, .. } | Filter::IsNull { field } => {
                field
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
}

impl Query {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: None,
        }
    }

    pub fn eq(mut self, field: &str, value: impl Into<String>) -> Self {
        self.filters.push(Filter::Eq {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn one_of<I, S>(mut self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.push(Filter::In {
            field: field.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn is_null(mut self, field: &str) -> Self {
        self.filters.push(Filter::IsNull {
            field: field.to_string(),
        });
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Replace the document, or merge top-level fields into it when `merge`.
    Set {
        path: DocPath,
        data: Fields,
        merge: bool,
    },
    Delete {
        path: DocPath,
    },
}

impl WriteOp {
    pub fn path(&self) -> &DocPath {
        match self {
            WriteOp::Set { path, .. } | WriteOp::Delete { path } => path,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, path: DocPath, data: Fields) -> &mut Self {
        self.ops.push(WriteOp::Set {
            path,
            data,
            merge: false,
        });
        self
    }

    pub fn merge(&mut self, path: DocPath, data: Fields) -> &mut Self {
        self.ops.push(WriteOp::Set {
            path,
            data,
            merge: true,
        });
        self
    }

    pub fn delete(&mut self, path: DocPath) -> &mut Self {
        self.ops.push(WriteOp::Delete { path });
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl IntoIterator for WriteBatch {
    type Item = WriteOp;
    type IntoIter = std::vec::IntoIter<WriteOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

/// Field names end up inside a JSON path, so only plain identifiers pass.
pub fn check_field(field: &str) -> Result<(), StoreError> {
    let mut chars = field.chars();
    let ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidField(field.to_string()))
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError>;

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Apply every op or none.
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// Merge `fields` into an existing document; `NotFound` if it is missing.
    async fn update(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError>;

    /// Insert under a generated id and return its path.
    async fn create(&self, collection: &str, data: Fields) -> Result<DocPath, StoreError> {
        let path = DocPath::new(collection, uuid::Uuid::new_v4().simple().to_string());
        let mut batch = WriteBatch::new();
        batch.set(path.clone(), data);
        self.commit(batch).await?;
        Ok(path)
    }

    async fn delete(&self, path: &DocPath) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.delete(path.clone());
        self.commit(batch).await
    }
}
