//! Cross-reference joiner.
//!
//! Resolves foreign-key fields of snapshot rows into embedded sub-records by
//! point lookups against related collections. Lookups run concurrently in a
//! [`JoinSet`]; dropping the future returned by
//! [`CrossReferenceJoiner::enrich`] aborts every lookup still in flight.
//!
//! A lookup that fails or times out leaves the relation absent. It is logged
//! and counted, never surfaced.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tenantdesk_core::{Fields, Record, Value};
use tokio::task::JoinSet;
use tracing::debug;

use crate::traits::DocumentStore;

/// Default upper bound for a single point lookup.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Shape of the sub-record embedded for a resolved relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    /// `{id, name, phone, email}` of a user document.
    Tenant,
    /// `{id, name, number, building}` of an apartment document.
    Apartment,
    /// The whole target document plus its id.
    Whole,
}

impl Projection {
    /// Builds the embedded map from a looked-up target document.
    #[must_use]
    pub fn project(self, target: &Record) -> Fields {
        let mut out = Fields::new();
        out.insert("id".to_string(), Value::from(target.id.as_str()));
        match self {
            Projection::Tenant => {
                let full_name = target.text("fullName").trim();
                let name = if full_name.is_empty() {
                    format!("{} {}", target.text("firstName"), target.text("lastName"))
                        .trim()
                        .to_string()
                } else {
                    full_name.to_string()
                };
                out.insert("name".to_string(), Value::from(name));
                out.insert("phone".to_string(), Value::from(target.text("phone")));
                out.insert("email".to_string(), Value::from(target.text("email")));
            }
            Projection::Apartment => {
                let name = match target.text("name") {
                    "" => "Unknown Apartment",
                    name => name,
                };
                out.insert("name".to_string(), Value::from(name));
                out.insert("number".to_string(), Value::from(target.text("number")));
                out.insert("building".to_string(), Value::from(target.text("building")));
            }
            Projection::Whole => {
                for (key, value) in &target.fields {
                    out.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
        }
        out
    }
}

/// One foreign-key field and where it points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Field of the source row holding the target id.
    pub field: String,
    /// Collection the id refers to.
    pub collection: String,
    /// Key the projected target is embedded under.
    pub embed_as: String,
    pub projection: Projection,
}

impl Relation {
    #[must_use]
    pub fn new(field: &str, collection: &str, embed_as: &str, projection: Projection) -> Self {
        Self {
            field: field.to_string(),
            collection: collection.to_string(),
            embed_as: embed_as.to_string(),
            projection,
        }
    }
}

/// Enriches rows by resolving their [`Relation`]s.
#[derive(Clone)]
pub struct CrossReferenceJoiner {
    store: Arc<dyn DocumentStore>,
    relations: Arc<[Relation]>,
    lookup_timeout: Duration,
}

impl CrossReferenceJoiner {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, relations: Vec<Relation>) -> Self {
        Self {
            store,
            relations: relations.into(),
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    #[must_use]
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// `true` when enrichment would leave rows untouched.
    #[must_use]
    pub fn is_passthrough(&self) -> bool {
        self.relations.is_empty()
    }

    /// Returns a new enriched copy of `rows`, in the same order.
    ///
    /// Completes only when every lookup has finished, failed, or timed out.
    pub async fn enrich(&self, rows: &[Record]) -> Vec<Record> {
        let mut enriched = rows.to_vec();
        if self.is_passthrough() {
            return enriched;
        }

        let mut lookups = JoinSet::new();
        for (row_idx, row) in rows.iter().enumerate() {
            for (rel_idx, relation) in self.relations.iter().enumerate() {
                let target_id = row.text(&relation.field).trim();
                if target_id.is_empty() {
                    continue;
                }
                let store = Arc::clone(&self.store);
                let collection = relation.collection.clone();
                let target_id = target_id.to_string();
                let timeout = self.lookup_timeout;
                lookups.spawn(async move {
                    let found = lookup(store.as_ref(), &collection, &target_id, timeout).await;
                    (row_idx, rel_idx, found)
                });
            }
        }

        while let Some(joined) = lookups.join_next().await {
            let Ok((row_idx, rel_idx, found)) = joined else {
                continue;
            };
            let Some(target) = found else {
                continue;
            };
            let relation = &self.relations[rel_idx];
            enriched[row_idx].fields.insert(
                relation.embed_as.clone(),
                Value::Map(relation.projection.project(&target)),
            );
        }

        enriched
    }
}

/// Point lookup with failures folded into `None`.
async fn lookup(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
    timeout: Duration,
) -> Option<Record> {
    match tokio::time::timeout(timeout, store.get(collection, id)).await {
        Ok(Ok(found)) => found,
        Ok(Err(error)) => {
            debug!(collection, id, error = %error, "relation lookup failed");
            metrics::counter!("tenantdesk_lookup_failures_total", "reason" => "error")
                .increment(1);
            None
        }
        Err(_) => {
            debug!(collection, id, ?timeout, "relation lookup timed out");
            metrics::counter!("tenantdesk_lookup_failures_total", "reason" => "timeout")
                .increment(1);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::broadcast;

    use super::*;
    use crate::store::{ChangeEvent, MemoryDocumentStore, StoreError};

    fn record(value: serde_json::Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    fn payment_relations() -> Vec<Relation> {
        vec![
            Relation::new("userId", "users", "tenant", Projection::Tenant),
            Relation::new("apartmentId", "apartments", "apartment", Projection::Apartment),
        ]
    }

    fn seeded_store() -> Arc<MemoryDocumentStore> {
        let store = Arc::new(MemoryDocumentStore::new());
        store.put(
            "users",
            record(json!({"id": "u1", "firstName": "Amina", "lastName": "Hassan",
                          "phone": "555-0101", "email": "amina@example.com"})),
        );
        store.put("apartments", record(json!({"id": "a1", "number": "2B"})));
        store
    }

    #[test]
    fn tenant_projection_prefers_full_name() {
        let user = record(json!({"id": "u1", "fullName": "Dana K", "firstName": "X"}));
        let projected = Projection::Tenant.project(&user);
        assert_eq!(projected["name"], Value::from("Dana K"));
        assert_eq!(projected["phone"], Value::from(""));
        assert_eq!(projected["id"], Value::from("u1"));
    }

    #[test]
    fn tenant_projection_trims_missing_parts() {
        let user = record(json!({"id": "u2", "lastName": "Okafor"}));
        assert_eq!(Projection::Tenant.project(&user)["name"], Value::from("Okafor"));
    }

    #[test]
    fn whole_projection_copies_fields() {
        let target = record(json!({"id": "t", "a": 1, "b": "two"}));
        let projected = Projection::Whole.project(&target);
        assert_eq!(projected.len(), 3);
        assert_eq!(projected["a"], Value::Int(1));
    }

    #[tokio::test]
    async fn enrich_embeds_projected_targets() {
        let joiner = CrossReferenceJoiner::new(seeded_store(), payment_relations());
        let rows = vec![
            record(json!({"id": "p1", "userId": "u1", "apartmentId": "a1"})),
            record(json!({"id": "p2", "userId": "ghost"})),
            record(json!({"id": "p3"})),
        ];

        let enriched = joiner.enrich(&rows).await;
        assert_eq!(enriched.len(), 3);
        assert_eq!(enriched[0].text("tenant.name"), "Amina Hassan");
        assert_eq!(enriched[0].text("tenant.email"), "amina@example.com");
        assert_eq!(enriched[0].text("apartment.name"), "Unknown Apartment");
        assert_eq!(enriched[0].text("apartment.number"), "2B");
        assert!(enriched[1].get("tenant").is_none());
        assert_eq!(enriched[2], rows[2]);
    }

    /// Store whose point lookups never finish.
    struct StalledStore;

    #[async_trait]
    impl DocumentStore for StalledStore {
        async fn list(&self, _: &str) -> Result<Vec<Record>, StoreError> {
            Ok(Vec::new())
        }
        async fn get(&self, _: &str, _: &str) -> Result<Option<Record>, StoreError> {
            std::future::pending().await
        }
        async fn insert(&self, _: &str, _: Fields) -> Result<Record, StoreError> {
            Err(StoreError::Unavailable("read-only".to_string()))
        }
        async fn update(&self, _: &str, _: &str, _: Fields) -> Result<Record, StoreError> {
            Err(StoreError::Unavailable("read-only".to_string()))
        }
        async fn delete(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("read-only".to_string()))
        }
        fn watch(&self, _: &str) -> broadcast::Receiver<ChangeEvent> {
            broadcast::channel(1).1
        }
    }

    #[tokio::test]
    async fn timed_out_lookup_leaves_relation_absent() {
        let joiner = CrossReferenceJoiner::new(Arc::new(StalledStore), payment_relations())
            .with_lookup_timeout(Duration::from_millis(20));
        let rows = vec![record(json!({"id": "p1", "userId": "u1"}))];

        let enriched = tokio::time::timeout(Duration::from_secs(2), joiner.enrich(&rows))
            .await
            .expect("enrich completes despite stalled lookups");
        assert_eq!(enriched, rows);
    }

    #[tokio::test]
    async fn failed_lookup_leaves_relation_absent() {
        let store = seeded_store();
        store.set_available(false);
        let joiner = CrossReferenceJoiner::new(store, payment_relations());
        let rows = vec![record(json!({"id": "p1", "userId": "u1", "apartmentId": "a1"}))];
        assert_eq!(joiner.enrich(&rows).await, rows);
    }

    #[tokio::test]
    async fn no_relations_is_passthrough() {
        let joiner = CrossReferenceJoiner::new(seeded_store(), Vec::new());
        assert!(joiner.is_passthrough());
        let rows = vec![record(json!({"id": "r1", "userId": "u1"}))];
        assert_eq!(joiner.enrich(&rows).await, rows);
    }
}
