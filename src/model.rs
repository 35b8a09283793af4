use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Key suffix used for the uncategorized membership document.
pub const UNCATEGORIZED: &str = "uncategorized";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("{0} must be non-empty")]
    Empty(&'static str),
    #[error("{kind} '{value}' must not contain '/'")]
    Slash { kind: &'static str, value: String },
    #[error("list id '{0}' is reserved")]
    Reserved(String),
}

fn check(kind: &'static str, value: &str) -> Result<String, IdError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(IdError::Empty(kind));
    }
    if value.contains('/') {
        return Err(IdError::Slash {
            kind,
            value: value.to_string(),
        });
    }
    Ok(value.to_string())
}

/// Owner of lists and favorites.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(value: &str) -> Result<Self, IdError> {
        check("owner id", value).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier of a named journal list.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListId(String);

impl ListId {
    pub fn new(value: &str) -> Result<Self, IdError> {
        let value = check("list id", value)?;
        if value.eq_ignore_ascii_case(UNCATEGORIZED) {
            return Err(IdError::Reserved(value));
        }
        Ok(Self(value))
    }

    /// Fresh random id for a newly created list.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Storage key for a journal: the first ISSN code of the catalog identifier.
///
/// Catalog identifiers look like `1234-5678/8765-4321`; only the part before
/// the first slash is kept so the id can be embedded in a document key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JournalId(String);

impl JournalId {
    pub fn normalize(raw: &str) -> Result<Self, IdError> {
        let first = raw.split('/').next().unwrap_or_default();
        check("journal id", first).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! display_id {
    ($($t:ty),*) => {
        $(impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        })*
    };
}

display_id!(OwnerId, ListId, JournalId);

/// Where a favorite record files a journal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "list", rename_all = "snake_case")]
pub enum Membership {
    InList(ListId),
    Uncategorized,
}

impl Membership {
    pub fn list_id(&self) -> Option<&ListId> {
        match self {
            Membership::InList(id) => Some(id),
            Membership::Uncategorized => None,
        }
    }

    pub fn is_uncategorized(&self) -> bool {
        matches!(self, Membership::Uncategorized)
    }

    /// Document key of the record holding this membership for `journal`.
    pub fn record_key(&self, journal: &JournalId) -> String {
        match self {
            Membership::InList(list) => format!("{}_{}", journal, list),
            Membership::Uncategorized => format!("{}_{}", journal, UNCATEGORIZED),
        }
    }
}

impl fmt::Display for Membership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Membership::InList(id) => write!(f, "{}", id),
            Membership::Uncategorized => f.write_str(UNCATEGORIZED),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn journal_id_keeps_first_issn() {
        let id = JournalId::normalize("1234-5678/8765-4321").unwrap();
        assert_eq!(id.as_str(), "1234-5678");
        let id = JournalId::normalize(" 0000-0001 ").unwrap();
        assert_eq!(id.as_str(), "0000-0001");
    }

    #[test]
    fn journal_id_rejects_empty() {
        assert_eq!(
            JournalId::normalize("/8765-4321").unwrap_err(),
            IdError::Empty("journal id")
        );
        assert!(JournalId::normalize("").is_err());
    }

    #[test]
    fn list_id_rejects_reserved_and_slash() {
        assert!(matches!(
            ListId::new("Uncategorized"),
            Err(IdError::Reserved(_))
        ));
        assert!(matches!(ListId::new("a/b"), Err(IdError::Slash { .. })));
        assert!(ListId::new("reading").is_ok());
    }

    #[test]
    fn record_keys_are_deterministic() {
        let j = JournalId::normalize("1111-2222/3333-4444").unwrap();
        let list = ListId::new("abc").unwrap();
        assert_eq!(Membership::InList(list).record_key(&j), "1111-2222_abc");
        assert_eq!(
            Membership::Uncategorized.record_key(&j),
            "1111-2222_uncategorized"
        );
    }

    #[test]
    fn generated_list_ids_are_valid() {
        let id = ListId::generate();
        assert!(ListId::new(id.as_str()).is_ok());
    }
}
