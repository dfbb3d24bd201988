//! In-memory [`DocumentStore`] implementation backed by [`DashMap`].
//!
//! Each collection keeps its documents in insertion order together with the
//! broadcast sender of its change feed. Collections are created lazily on
//! first write or first `watch`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tenantdesk_core::{Fields, Record};
use tokio::sync::broadcast;

use super::{ChangeEvent, ChangeKind, ChangeObserver, StoreError};
use crate::traits::DocumentStore;

/// Default capacity of each collection's change feed.
pub const DEFAULT_CHANGE_CAPACITY: usize = 256;

struct Collection {
    docs: Vec<Record>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl Collection {
    fn new(capacity: usize) -> Self {
        let (changes, _rx) = broadcast::channel(capacity);
        Self {
            docs: Vec::new(),
            changes,
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.docs.iter().position(|doc| doc.id == id)
    }

    fn notify(&self, collection: &str, id: &str, kind: ChangeKind) {
        // No receivers is fine: nobody is mirroring this collection.
        let _ = self.changes.send(ChangeEvent {
            collection: collection.to_string(),
            id: id.to_string(),
            kind,
        });
    }
}

/// In-memory document store.
///
/// All operations complete without awaiting; the async signatures exist to
/// satisfy [`DocumentStore`]. Writes notify the optional [`ChangeObserver`]
/// and then the collection's change feed.
pub struct MemoryDocumentStore {
    collections: DashMap<String, Collection>,
    observer: Option<Arc<dyn ChangeObserver>>,
    available: AtomicBool,
}

impl MemoryDocumentStore {
    /// Creates a new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: DashMap::new(),
            observer: None,
            available: AtomicBool::new(true),
        }
    }

    /// Attaches an observer notified after every committed write.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ChangeObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Inserts or replaces a document under its own id. Used for seeding.
    pub fn put(&self, collection: &str, record: Record) {
        let mut entry = self
            .collections
            .entry(collection.to_string())
            .or_insert_with(|| Collection::new(DEFAULT_CHANGE_CAPACITY));
        let id = record.id.clone();
        let kind = if let Some(pos) = entry.position(&id) {
            entry.docs[pos] = record;
            ChangeKind::Update
        } else {
            entry.docs.push(record);
            ChangeKind::Insert
        };
        entry.notify(collection, &id, kind);
    }

    /// Marks the store unavailable; every operation then fails with
    /// [`StoreError::Unavailable`] until it is marked available again.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Number of live change-feed receivers for `collection`.
    #[must_use]
    pub fn watcher_count(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map_or(0, |c| c.changes.receiver_count())
    }

    /// Number of documents in `collection`.
    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, |c| c.docs.len())
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store offline".to_string()))
        }
    }

    fn not_found(collection: &str, id: &str) -> StoreError {
        StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn list(&self, collection: &str) -> Result<Vec<Record>, StoreError> {
        self.check_available()?;
        Ok(self
            .collections
            .get(collection)
            .map(|c| c.docs.clone())
            .unwrap_or_default())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>, StoreError> {
        self.check_available()?;
        Ok(self.collections.get(collection).and_then(|c| {
            c.position(id).map(|pos| c.docs[pos].clone())
        }))
    }

    async fn insert(&self, collection: &str, fields: Fields) -> Result<Record, StoreError> {
        self.check_available()?;
        let record = Record::new(uuid::Uuid::new_v4().to_string(), fields);
        {
            let mut entry = self
                .collections
                .entry(collection.to_string())
                .or_insert_with(|| Collection::new(DEFAULT_CHANGE_CAPACITY));
            entry.docs.push(record.clone());
            entry.notify(collection, &record.id, ChangeKind::Insert);
        }
        if let Some(observer) = &self.observer {
            observer.on_insert(collection, &record);
        }
        Ok(record)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<Record, StoreError> {
        self.check_available()?;
        let merged = {
            let mut entry = self
                .collections
                .get_mut(collection)
                .ok_or_else(|| Self::not_found(collection, id))?;
            let pos = entry
                .position(id)
                .ok_or_else(|| Self::not_found(collection, id))?;
            entry.docs[pos].fields.extend(fields);
            let merged = entry.docs[pos].clone();
            entry.notify(collection, id, ChangeKind::Update);
            merged
        };
        if let Some(observer) = &self.observer {
            observer.on_update(collection, &merged);
        }
        Ok(merged)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.check_available()?;
        let removed = {
            let mut entry = self
                .collections
                .get_mut(collection)
                .ok_or_else(|| Self::not_found(collection, id))?;
            let pos = entry
                .position(id)
                .ok_or_else(|| Self::not_found(collection, id))?;
            let removed = entry.docs.remove(pos);
            entry.notify(collection, id, ChangeKind::Delete);
            removed
        };
        if let Some(observer) = &self.observer {
            observer.on_delete(collection, &removed);
        }
        Ok(())
    }

    fn watch(&self, collection: &str) -> broadcast::Receiver<ChangeEvent> {
        self.collections
            .entry(collection.to_string())
            .or_insert_with(|| Collection::new(DEFAULT_CHANGE_CAPACITY))
            .changes
            .subscribe()
    }
}
