//!
//! fluxauth storage module
//! -----------------------
//! The authorization engine only ever reads single documents from a handful of
//! collections and deletes consumed login phrases. This module defines that
//! narrow surface as the `DocumentStore` trait so the production store driver can
//! be injected at startup, and ships `MemoryStore`, a concurrent in-memory
//! implementation used by tests and by the standalone server binary.
//!
//! Documents are plain JSON objects. Queries are expressed with `Filter`, which
//! supports exact equality, case-insensitive string equality and conjunctions.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

mod memory;

pub use memory::MemoryStore;

/// A stored document: one JSON object.
pub type Document = serde_json::Map<String, Value>;

/// Process-scoped store handle injected into each component.
pub type SharedStore = Arc<dyn DocumentStore>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("store io: {0}")]
    Io(String),
}

/// Query predicate over a single document.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals value exactly.
    Eq(String, Value),
    /// Field is a string equal to the value ignoring case. Whole-value match only.
    EqIgnoreCase(String, String),
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn eq_ignore_case(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::EqIgnoreCase(field.into(), value.into())
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And(filters)
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::Eq(field, value) => doc.get(field) == Some(value),
            Filter::EqIgnoreCase(field, value) => doc
                .get(field)
                .and_then(|v| v.as_str())
                .map(|s| s.to_lowercase() == value.to_lowercase())
                .unwrap_or(false),
            // An empty conjunction would match everything; treat it as a bad query instead.
            Filter::And(parts) => !parts.is_empty() && parts.iter().all(|f| f.matches(doc)),
        }
    }

    /// Reject filters that can never be answered sensibly.
    pub fn validate(&self) -> Result<(), StoreError> {
        match self {
            Filter::Eq(field, _) | Filter::EqIgnoreCase(field, _) if field.is_empty() => {
                Err(StoreError::InvalidQuery("empty field name".into()))
            }
            Filter::And(parts) if parts.is_empty() => Err(StoreError::InvalidQuery("empty conjunction".into())),
            Filter::And(parts) => parts.iter().try_for_each(|f| f.validate()),
            _ => Ok(()),
        }
    }
}

/// Which fields of a matching document are returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Projection {
    #[default]
    All,
    Only(Vec<String>),
}

impl Projection {
    pub fn only(fields: &[&str]) -> Self {
        Projection::Only(fields.iter().map(|f| f.to_string()).collect())
    }

    pub fn apply(&self, doc: &Document) -> Document {
        match self {
            Projection::All => doc.clone(),
            Projection::Only(fields) => doc
                .iter()
                .filter(|(k, _)| fields.iter().any(|f| f == *k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

/// Read/delete surface the engine needs from the persistent store.
///
/// Implementations must tolerate concurrent calls without external locking.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// First document in `database.collection` matching `filter`, projected.
    async fn find_one(
        &self,
        database: &str,
        collection: &str,
        filter: &Filter,
        projection: &Projection,
    ) -> Result<Option<Document>, StoreError>;

    /// Remove the first matching document and return it. A miss is `Ok(None)`.
    async fn find_one_and_delete(
        &self,
        database: &str,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError>;
}
