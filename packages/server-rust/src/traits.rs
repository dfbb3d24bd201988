use async_trait::async_trait;
use tenantdesk_core::{Fields, Record};
use tokio::sync::broadcast;

use crate::store::{ChangeEvent, StoreError};

/// Pluggable document database backend.
/// Implementations: in-memory (default, tests); hosted backends plug in here.
///
/// Used as `Arc<dyn DocumentStore>`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Load every document of a collection, in store order.
    async fn list(&self, collection: &str) -> Result<Vec<Record>, StoreError>;

    /// Load a single document by id. `Ok(None)` when it does not exist.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>, StoreError>;

    /// Create a document with a store-assigned id.
    async fn insert(&self, collection: &str, fields: Fields) -> Result<Record, StoreError>;

    /// Merge `fields` into an existing document. Fields not named are kept.
    async fn update(&self, collection: &str, id: &str, fields: Fields)
        -> Result<Record, StoreError>;

    /// Delete a single document by id.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Subscribe to the change feed of a collection.
    ///
    /// Events are hints: consumers re-read the collection instead of applying
    /// them. A lagged receiver has missed events and must re-read as well.
    fn watch(&self, collection: &str) -> broadcast::Receiver<ChangeEvent>;
}
