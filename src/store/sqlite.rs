use async_trait::async_trait;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::{debug, instrument};

use super::{
    check_field, DocPath, Direction, Document, DocumentStore, Fields, Filter, Query, StoreError,
    WriteBatch, WriteOp,
};

pub type Pool = SqlitePool;

/// Document store backed by a single SQLite `documents` table holding JSON.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool,
}

pub async fn init_pool(database_url: &str) -> Result<Pool, StoreError> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the parent
/// directory exists. Leaves in-memory URLs untouched. Returns possibly-updated URL.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    // Rebuild URL, prefer sqlite:// form; `mode=rwc` creates the file on first use.
    let mut rebuilt = format!("sqlite://{}", expanded_path);
    match query_part {
        Some(q) => {
            rebuilt.push('?');
            rebuilt.push_str(q);
        }
        None => rebuilt.push_str("?mode=rwc"),
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn json_path(field: &str) -> Result<String, StoreError> {
    check_field(field)?;
    Ok(format!("$.{}", field))
}

fn row_to_document(collection: &str, row: &SqliteRow) -> Result<Document, StoreError> {
    let id: String = row.try_get("doc_id")?;
    let raw: String = row.try_get("data")?;
    let data: Fields = serde_json::from_str(&raw)?;
    Ok(Document {
        path: DocPath::new(collection, id),
        data,
    })
}

/// SQL text plus the positional binds that go with it, in order.
fn build_select(query: &Query) -> Result<(String, Vec<String>), StoreError> {
    let mut sql = String::from("SELECT doc_id, data FROM documents WHERE collection = ?");
    let mut binds = vec![query.collection.clone()];

    for filter in &query.filters {
        let path = json_path(filter.field())?;
        match filter {
            Filter::Eq { value, .. } => {
                sql.push_str(" AND json_extract(data, ?) = ?");
                binds.push(path);
                binds.push(value.clone());
            }
            Filter::In { values, .. } if values.is_empty() => {
                sql.push_str(" AND 0");
            }
            Filter::In { values, .. } => {
                let marks = vec!["?"; values.len()].join(", ");
                sql.push_str(&format!(" AND json_extract(data, ?) IN ({})", marks));
                binds.push(path);
                binds.extend(values.iter().cloned());
            }
            Filter::IsNull { .. } => {
                sql.push_str(" AND json_extract(data, ?) IS NULL");
                binds.push(path);
            }
        }
    }

    match &query.order_by {
        Some((field, direction)) => {
            let dir = match direction {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            };
            sql.push_str(&format!(
                " ORDER BY json_extract(data, ?) {}, doc_id ASC",
                dir
            ));
            binds.push(json_path(field)?);
        }
        None => sql.push_str(" ORDER BY doc_id ASC"),
    }
    Ok((sql, binds))
}

async fn fetch_data(
    tx: &mut Transaction<'_, Sqlite>,
    path: &DocPath,
) -> Result<Option<Fields>, StoreError> {
    let raw: Option<String> =
        sqlx::query_scalar("SELECT data FROM documents WHERE collection = ? AND doc_id = ?")
            .bind(&path.collection)
            .bind(&path.id)
            .fetch_optional(&mut **tx)
            .await?;
    raw.map(|r| serde_json::from_str(&r).map_err(StoreError::from))
        .transpose()
}

async fn upsert(
    tx: &mut Transaction<'_, Sqlite>,
    path: &DocPath,
    data: &Fields,
) -> Result<(), StoreError> {
    let body = serde_json::to_string(data)?;
    sqlx::query(
        "INSERT INTO documents (collection, doc_id, data) VALUES (?, ?, ?) \
         ON CONFLICT(collection, doc_id) DO UPDATE SET data = excluded.data, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(&path.collection)
    .bind(&path.id)
    .bind(body)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn apply(tx: &mut Transaction<'_, Sqlite>, op: WriteOp) -> Result<(), StoreError> {
    match op {
        WriteOp::Set {
            path,
            data,
            merge: false,
        } => upsert(tx, &path, &data).await,
        WriteOp::Set {
            path,
            data,
            merge: true,
        } => {
            let mut merged = fetch_data(tx, &path).await?.unwrap_or_default();
            merged.extend(data);
            upsert(tx, &path, &merged).await
        }
        WriteOp::Delete { path } => {
            sqlx::query("DELETE FROM documents WHERE collection = ? AND doc_id = ?")
                .bind(&path.collection)
                .bind(&path.id)
                .execute(&mut **tx)
                .await?;
            Ok(())
        }
    }
}

impl SqliteStore {
    /// Open (creating if needed) the database and bring the schema up to date.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = init_pool(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool; the caller is responsible for migrations.
    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    #[instrument(skip_all, fields(path = %path))]
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query("SELECT doc_id, data FROM documents WHERE collection = ? AND doc_id = ?")
            .bind(&path.collection)
            .bind(&path.id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_document(&path.collection, &r)).transpose()
    }

    #[instrument(skip_all, fields(collection = %query.collection))]
    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let (sql, binds) = build_select(query)?;
        let mut q: sqlx::query::Query<'_, Sqlite, SqliteArguments<'_>> = sqlx::query(&sql);
        for value in &binds {
            q = q.bind(value);
        }
        let rows = q.fetch_all(&self.pool).await?;
        let docs = rows
            .iter()
            .map(|r| row_to_document(&query.collection, r))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(matched = docs.len(), "query");
        Ok(docs)
    }

    #[instrument(skip_all, fields(ops = batch.len()))]
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for op in batch {
            apply(&mut tx, op).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip_all, fields(path = %path))]
    async fn update(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let Some(mut data) = fetch_data(&mut tx, path).await? else {
            return Err(StoreError::NotFound(path.clone()));
        };
        data.extend(fields);
        upsert(&mut tx, path, &data).await?;
        tx.commit().await?;
        Ok(())
    }
}
