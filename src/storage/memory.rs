use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use super::{Document, DocumentStore, Filter, Projection, StoreError};

type CollectionKey = (String, String);

/// In-memory document store keyed by (database, collection).
///
/// Cloning shares the underlying collections. Every `find_one` and
/// `find_one_and_delete` bumps a query counter so tests can assert that a code
/// path never touched the store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<CollectionKey, Vec<Document>>>>,
    queries: Arc<AtomicUsize>,
    offline: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_one(&self, database: &str, collection: &str, doc: Document) {
        let mut map = self.collections.write();
        map.entry((database.to_string(), collection.to_string())).or_default().push(doc);
    }

    /// Insert a JSON value; non-objects are rejected.
    pub fn insert_value(&self, database: &str, collection: &str, value: Value) -> Result<(), StoreError> {
        match value {
            Value::Object(doc) => {
                self.insert_one(database, collection, doc);
                Ok(())
            }
            other => Err(StoreError::InvalidQuery(format!("document must be an object, got {}", other))),
        }
    }

    pub fn count(&self, database: &str, collection: &str) -> usize {
        self.collections
            .read()
            .get(&(database.to_string(), collection.to_string()))
            .map(|v| v.len())
            .unwrap_or(0)
    }

    /// Number of queries served (or refused) since creation.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Simulate an outage: while offline every query fails with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Seed from `{ "<database>": { "<collection>": [ {..}, .. ] } }`.
    pub fn from_json(value: &Value) -> Result<Self, StoreError> {
        let store = Self::new();
        let dbs = value
            .as_object()
            .ok_or_else(|| StoreError::InvalidQuery("seed root must be an object".into()))?;
        for (db, colls) in dbs {
            let colls = colls
                .as_object()
                .ok_or_else(|| StoreError::InvalidQuery(format!("database '{}' must map collections", db)))?;
            for (coll, docs) in colls {
                let docs = docs
                    .as_array()
                    .ok_or_else(|| StoreError::InvalidQuery(format!("collection '{}.{}' must be an array", db, coll)))?;
                for doc in docs {
                    store.insert_value(db, coll, doc.clone())?;
                }
            }
        }
        Ok(store)
    }

    pub fn load_json_file(path: &Path) -> Result<Self, StoreError> {
        let bytes = std::fs::read(path).map_err(|e| StoreError::Io(format!("{}: {}", path.display(), e)))?;
        let value: Value = serde_json::from_slice(&bytes).map_err(|e| StoreError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&value)
    }

    fn begin_query(&self, filter: &Filter) -> Result<(), StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".into()));
        }
        filter.validate()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(
        &self,
        database: &str,
        collection: &str,
        filter: &Filter,
        projection: &Projection,
    ) -> Result<Option<Document>, StoreError> {
        self.begin_query(filter)?;
        let map = self.collections.read();
        let found = map
            .get(&(database.to_string(), collection.to_string()))
            .and_then(|docs| docs.iter().find(|d| filter.matches(d)))
            .map(|d| projection.apply(d));
        debug!(target: "fluxauth::store", db = database, coll = collection, hit = found.is_some(), "find_one");
        Ok(found)
    }

    async fn find_one_and_delete(
        &self,
        database: &str,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        self.begin_query(filter)?;
        let mut map = self.collections.write();
        let removed = map
            .get_mut(&(database.to_string(), collection.to_string()))
            .and_then(|docs| {
                let idx = docs.iter().position(|d| filter.matches(d))?;
                Some(docs.remove(idx))
            });
        debug!(target: "fluxauth::store", db = database, coll = collection, removed = removed.is_some(), "find_one_and_delete");
        Ok(removed)
    }
}
