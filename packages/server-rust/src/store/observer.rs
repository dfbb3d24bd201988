//! Change observer trait and composite implementation.
//!
//! Defines [`ChangeObserver`] for reacting to committed document writes in a
//! [`MemoryDocumentStore`](super::MemoryDocumentStore), and
//! [`CompositeChangeObserver`] which fans out notifications to multiple
//! observers.

use std::sync::Arc;

use tenantdesk_core::Record;

use super::ChangeKind;

/// Observer for committed document writes.
///
/// Implementations can track statistics, maintain audit trails, or perform
/// other side effects in response to data changes. Called synchronously
/// after the write is visible, so implementations must not block.
///
/// Used as `Arc<dyn ChangeObserver>`.
pub trait ChangeObserver: Send + Sync {
    /// Called after a new document is inserted.
    fn on_insert(&self, collection: &str, record: &Record);

    /// Called after a document is updated. `record` is the merged result.
    fn on_update(&self, collection: &str, record: &Record);

    /// Called after a document is deleted. `record` is the removed document.
    fn on_delete(&self, collection: &str, record: &Record);
}

/// Composite observer that fans out to multiple observers.
#[derive(Default)]
pub struct CompositeChangeObserver {
    observers: Vec<Arc<dyn ChangeObserver>>,
}

impl CompositeChangeObserver {
    /// Creates a composite observer with the given list of observers.
    #[must_use]
    pub fn new(observers: Vec<Arc<dyn ChangeObserver>>) -> Self {
        Self { observers }
    }

    /// Adds an observer after construction.
    pub fn add(&mut self, observer: Arc<dyn ChangeObserver>) {
        self.observers.push(observer);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl ChangeObserver for CompositeChangeObserver {
    fn on_insert(&self, collection: &str, record: &Record) {
        for observer in &self.observers {
            observer.on_insert(collection, record);
        }
    }

    fn on_update(&self, collection: &str, record: &Record) {
        for observer in &self.observers {
            observer.on_update(collection, record);
        }
    }

    fn on_delete(&self, collection: &str, record: &Record) {
        for observer in &self.observers {
            observer.on_delete(collection, record);
        }
    }
}

/// Counts committed writes per collection and kind as
/// `tenantdesk_store_writes_total`.
#[derive(Debug, Default)]
pub struct MetricsObserver;

impl MetricsObserver {
    fn record(collection: &str, kind: ChangeKind) {
        metrics::counter!(
            "tenantdesk_store_writes_total",
            "collection" => collection.to_string(),
            "kind" => kind.as_str(),
        )
        .increment(1);
    }
}

impl ChangeObserver for MetricsObserver {
    fn on_insert(&self, collection: &str, _record: &Record) {
        Self::record(collection, ChangeKind::Insert);
    }

    fn on_update(&self, collection: &str, _record: &Record) {
        Self::record(collection, ChangeKind::Update);
    }

    fn on_delete(&self, collection: &str, _record: &Record) {
        Self::record(collection, ChangeKind::Delete);
    }
}

/// Logs every committed write at debug level.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl ChangeObserver for TracingObserver {
    fn on_insert(&self, collection: &str, record: &Record) {
        tracing::debug!(collection, id = %record.id, "document inserted");
    }

    fn on_update(&self, collection: &str, record: &Record) {
        tracing::debug!(collection, id = %record.id, "document updated");
    }

    fn on_delete(&self, collection: &str, record: &Record) {
        tracing::debug!(collection, id = %record.id, "document deleted");
    }
}
