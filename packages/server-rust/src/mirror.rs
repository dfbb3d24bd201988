//! Live collection mirror.
//!
//! A [`Subscription`] keeps an up-to-date, ordered copy of one collection.
//! Every change to the collection produces a complete [`CollectionSnapshot`];
//! consumers replace their state wholesale and never apply deltas. Bursts of
//! changes collapse into a single re-read.
//!
//! A failed read ends the subscription with one [`MirrorError`]. There is no
//! automatic retry.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tenantdesk_core::{normalize, Record, Value};
use thiserror::Error;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::store::{ChangeEvent, StoreError};
use crate::traits::DocumentStore;

/// Snapshots buffered per subscription before the mirror waits for the consumer.
const SNAPSHOT_BUFFER: usize = 4;

/// Terminal failure of a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MirrorError {
    #[error("failed to read collection {collection}: {source}")]
    Read {
        collection: String,
        #[source]
        source: StoreError,
    },
    #[error("change feed for collection {0} closed")]
    FeedClosed(String),
}

/// Sort direction of a [`CollectionQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

/// Ordering applied to every snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Names a collection and how its snapshots are ordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionQuery {
    pub collection: String,
    pub order_by: Option<OrderBy>,
}

impl CollectionQuery {
    /// Unordered query over `collection`: snapshots keep store order.
    #[must_use]
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            order_by: None,
        }
    }

    #[must_use]
    pub fn ascending(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction: Direction::Asc,
        });
        self
    }

    #[must_use]
    pub fn descending(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction: Direction::Desc,
        });
        self
    }

    /// Sorts `records` in place. Stable; records missing the field go last
    /// in either direction.
    pub fn sort(&self, records: &mut [Record]) {
        let Some(order) = &self.order_by else {
            return;
        };
        records.sort_by(|a, b| {
            match (a.get_path(&order.field), b.get_path(&order.field)) {
                (Some(x), Some(y)) => {
                    let ord = compare_values(x, y);
                    match order.direction {
                        Direction::Asc => ord,
                        Direction::Desc => ord.reverse(),
                    }
                }
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        });
    }
}

/// Sort key of one field value. Keys of different shapes order by rank, so
/// mixed columns still sort into a total order.
#[derive(Debug, Clone, Copy)]
enum SortKey<'a> {
    Bool(bool),
    Number(f64),
    Instant(DateTime<Utc>),
    Text(&'a str),
    Other,
}

impl SortKey<'_> {
    const fn rank(&self) -> u8 {
        match self {
            Self::Bool(_) => 0,
            Self::Number(_) => 1,
            Self::Instant(_) => 2,
            Self::Text(_) => 3,
            Self::Other => 4,
        }
    }
}

fn sort_key(value: &Value) -> SortKey<'_> {
    match value {
        Value::Bool(b) => SortKey::Bool(*b),
        Value::Int(_) | Value::Float(_) => {
            normalize::parse_amount(value).map_or(SortKey::Other, SortKey::Number)
        }
        Value::String(text) => {
            normalize::parse_instant(text).map_or(SortKey::Text(text.as_str()), SortKey::Instant)
        }
        other => normalize::to_instant(other).map_or(SortKey::Other, SortKey::Instant),
    }
}

/// Orders two field values: booleans, then numbers, then instants, then
/// other strings, then everything else. Within a shape numbers compare
/// numerically, instants chronologically and strings lexically.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    let (a, b) = (sort_key(a), sort_key(b));
    a.rank().cmp(&b.rank()).then_with(|| match (a, b) {
        (SortKey::Bool(x), SortKey::Bool(y)) => x.cmp(&y),
        (SortKey::Number(x), SortKey::Number(y)) => x.total_cmp(&y),
        (SortKey::Instant(x), SortKey::Instant(y)) => x.cmp(&y),
        (SortKey::Text(x), SortKey::Text(y)) => x.cmp(y),
        _ => Ordering::Equal,
    })
}

/// Complete state of a collection at one point in time.
#[derive(Debug, Clone)]
pub struct CollectionSnapshot {
    pub collection: String,
    /// Position of this snapshot within its subscription, starting at 1.
    pub sequence: u64,
    pub records: Arc<Vec<Record>>,
}

/// Opens subscriptions against a [`DocumentStore`].
#[derive(Clone)]
pub struct LiveCollectionMirror {
    store: Arc<dyn DocumentStore>,
}

impl LiveCollectionMirror {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Starts mirroring `query`. The first snapshot arrives as soon as the
    /// initial read completes.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn subscribe(&self, query: CollectionQuery) -> Subscription {
        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
        let cancel = CancellationToken::new();
        // Watch before the first read so no change between the two is lost.
        let changes = self.store.watch(&query.collection);
        let collection = query.collection.clone();

        tokio::spawn(run_subscription(
            Arc::clone(&self.store),
            query,
            changes,
            tx,
            cancel.clone(),
        ));

        Subscription {
            collection,
            receiver: rx,
            cancel,
        }
    }
}

/// A live view of one collection. Dropping it stops the mirror task.
pub struct Subscription {
    collection: String,
    receiver: mpsc::Receiver<Result<CollectionSnapshot, MirrorError>>,
    cancel: CancellationToken,
}

impl Subscription {
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Next snapshot or the terminal error. `None` once the subscription has
    /// ended, after an error or after [`unsubscribe`](Self::unsubscribe).
    pub async fn recv(&mut self) -> Option<Result<CollectionSnapshot, MirrorError>> {
        self.receiver.recv().await
    }

    /// Stops the mirror task. Equivalent to dropping the subscription.
    pub fn unsubscribe(self) {
        self.cancel.cancel();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

type SnapshotSender = mpsc::Sender<Result<CollectionSnapshot, MirrorError>>;

async fn run_subscription(
    store: Arc<dyn DocumentStore>,
    query: CollectionQuery,
    mut changes: broadcast::Receiver<ChangeEvent>,
    tx: SnapshotSender,
    cancel: CancellationToken,
) {
    let collection = query.collection.clone();
    let mut sequence = 0u64;
    debug!(collection = %collection, "subscription started");

    loop {
        let read = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            read = store.list(&collection) => read,
        };

        match read {
            Ok(mut records) => {
                query.sort(&mut records);
                sequence += 1;
                let snapshot = CollectionSnapshot {
                    collection: collection.clone(),
                    sequence,
                    records: Arc::new(records),
                };
                if !deliver(&tx, &cancel, Ok(snapshot)).await {
                    break;
                }
                metrics::counter!(
                    "tenantdesk_snapshots_total",
                    "collection" => collection.clone(),
                )
                .increment(1);
            }
            Err(source) => {
                warn!(collection = %collection, error = %source, "subscription read failed");
                let error = MirrorError::Read {
                    collection: collection.clone(),
                    source,
                };
                let _ = deliver(&tx, &cancel, Err(error)).await;
                break;
            }
        }

        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tx.closed() => break,
            event = changes.recv() => event,
        };
        match next {
            Ok(_) | Err(RecvError::Lagged(_)) => drain_pending(&mut changes),
            Err(RecvError::Closed) => {
                let error = MirrorError::FeedClosed(collection.clone());
                let _ = deliver(&tx, &cancel, Err(error)).await;
                break;
            }
        }
    }

    info!(collection = %collection, snapshots = sequence, "subscription ended");
}

/// Discards queued change events; the next read covers all of them.
fn drain_pending(changes: &mut broadcast::Receiver<ChangeEvent>) {
    loop {
        match changes.try_recv() {
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty | TryRecvError::Closed) => return,
        }
    }
}

/// Sends one item unless the subscription is cancelled first. Returns `false`
/// when the consumer is gone.
async fn deliver(
    tx: &SnapshotSender,
    cancel: &CancellationToken,
    item: Result<CollectionSnapshot, MirrorError>,
) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        sent = tx.send(item) => sent.is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tenantdesk_core::Fields;

    use super::*;
    use crate::store::MemoryDocumentStore;

    fn record(value: serde_json::Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    fn fields(value: serde_json::Value) -> Fields {
        match Value::from(value) {
            Value::Map(fields) => fields,
            other => panic!("expected object, got {other:?}"),
        }
    }

    async fn next_snapshot(sub: &mut Subscription) -> CollectionSnapshot {
        tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .expect("snapshot in time")
            .expect("subscription open")
            .expect("snapshot, not error")
    }

    fn ids(snapshot: &CollectionSnapshot) -> Vec<&str> {
        snapshot.records.iter().map(|r| r.id.as_str()).collect()
    }

    #[tokio::test]
    async fn initial_snapshot_then_full_replacement() {
        let store = Arc::new(MemoryDocumentStore::new());
        store.put("payments", record(json!({"id": "p1", "amount": 10})));
        let mirror = LiveCollectionMirror::new(store.clone());

        let mut sub = mirror.subscribe(CollectionQuery::new("payments"));
        let first = next_snapshot(&mut sub).await;
        assert_eq!(first.sequence, 1);
        assert_eq!(ids(&first), vec!["p1"]);

        store.put("payments", record(json!({"id": "p2", "amount": 20})));
        let second = next_snapshot(&mut sub).await;
        assert_eq!(ids(&second), vec!["p1", "p2"]);
        assert!(second.sequence > first.sequence);

        store.delete("payments", "p1").await.unwrap();
        let third = next_snapshot(&mut sub).await;
        assert_eq!(ids(&third), vec!["p2"]);
    }

    #[tokio::test]
    async fn snapshots_follow_requested_order() {
        let store = Arc::new(MemoryDocumentStore::new());
        store.put("payments", record(json!({"id": "old", "createdAt": "2024-01-01T00:00:00Z"})));
        store.put("payments", record(json!({"id": "undated"})));
        store.put("payments", record(json!({"id": "new", "createdAt": "2024-03-01T00:00:00Z"})));
        let mirror = LiveCollectionMirror::new(store.clone());

        let mut sub = mirror.subscribe(CollectionQuery::new("payments").descending("createdAt"));
        let snapshot = next_snapshot(&mut sub).await;
        assert_eq!(ids(&snapshot), vec!["new", "old", "undated"]);
    }

    #[test]
    fn ascending_order_sorts_names() {
        let query = CollectionQuery::new("apartments").ascending("name");
        let mut records = vec![
            record(json!({"id": "2", "name": "Harbor"})),
            record(json!({"id": "1", "name": "Arcadia"})),
            record(json!({"id": "3", "price": 5})),
        ];
        query.sort(&mut records);
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn write_after_subscribe_is_never_missed() {
        let store = Arc::new(MemoryDocumentStore::new());
        let mirror = LiveCollectionMirror::new(store.clone());
        let mut sub = mirror.subscribe(CollectionQuery::new("notices"));

        store.insert("notices", fields(json!({"title": "Water"}))).await.unwrap();

        // Either the first read already saw the insert, or a second snapshot follows.
        let mut latest = next_snapshot(&mut sub).await;
        if latest.records.is_empty() {
            latest = next_snapshot(&mut sub).await;
        }
        assert_eq!(latest.records.len(), 1);
    }

    #[tokio::test]
    async fn read_failure_is_terminal() {
        let store = Arc::new(MemoryDocumentStore::new());
        store.set_available(false);
        let mirror = LiveCollectionMirror::new(store.clone());

        let mut sub = mirror.subscribe(CollectionQuery::new("payments"));
        let first = tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(first, Err(MirrorError::Read { .. })));

        store.set_available(true);
        store.put("payments", record(json!({"id": "p1"})));
        let after = tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .unwrap();
        assert!(after.is_none());
    }

    #[tokio::test]
    async fn dropping_subscription_releases_change_feed() {
        let store = Arc::new(MemoryDocumentStore::new());
        let mirror = LiveCollectionMirror::new(store.clone());

        let mut sub = mirror.subscribe(CollectionQuery::new("rentals"));
        let _ = next_snapshot(&mut sub).await;
        assert_eq!(store.watcher_count("rentals"), 1);

        sub.unsubscribe();
        tokio::time::timeout(Duration::from_secs(2), async {
            while store.watcher_count("rentals") > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("mirror task stops after unsubscribe");
    }

    #[test]
    fn compare_values_handles_mixed_shapes() {
        let a = Value::from("2024-01-02");
        let b = Value::from("2024-01-10T00:00:00Z");
        assert_eq!(compare_values(&a, &b), Ordering::Less);
        assert_eq!(
            compare_values(&Value::Float(2.5), &Value::Int(3)),
            Ordering::Less
        );
        assert_eq!(compare_values(&Value::from("b"), &Value::from("a")), Ordering::Greater);
        assert_eq!(compare_values(&Value::Null, &Value::Int(1)), Ordering::Greater);
        assert_eq!(compare_values(&Value::Null, &Value::Null), Ordering::Equal);
    }

    #[test]
    fn compare_values_is_transitive_across_instants_and_text() {
        // Parsed instants and an unparseable string that once formed a cycle.
        let a = Value::from("2024-01-05T00:00:00+05:00");
        let b = Value::from("2024-01-04T23:00:00Z");
        let c = Value::from("2024-01-04T23:30x");
        assert_eq!(compare_values(&a, &b), Ordering::Less);
        assert_eq!(compare_values(&b, &c), Ordering::Less);
        assert_eq!(compare_values(&a, &c), Ordering::Less);

        let query = CollectionQuery::new("c").ascending("at");
        for order in [["a", "b", "c"], ["c", "b", "a"], ["b", "c", "a"], ["c", "a", "b"]] {
            let mut records: Vec<Record> = order
                .iter()
                .map(|id| {
                    let at = match *id {
                        "a" => &a,
                        "b" => &b,
                        _ => &c,
                    };
                    let mut fields = Fields::new();
                    fields.insert("at".to_string(), at.clone());
                    Record::new(*id, fields)
                })
                .collect();
            query.sort(&mut records);
            let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
            assert_eq!(ids, ["a", "b", "c"]);
        }
    }

    #[test]
    fn sort_keeps_shapes_grouped() {
        let query = CollectionQuery::new("c").ascending("v");
        let mut records = vec![
            record(json!({"id": "text", "v": "zebra"})),
            record(json!({"id": "num", "v": 3})),
            record(json!({"id": "flag", "v": true})),
            record(json!({"id": "when", "v": "2024-01-01"})),
            record(json!({"id": "list", "v": [1]})),
        ];
        query.sort(&mut records);
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["flag", "num", "when", "text", "list"]);
    }
}
