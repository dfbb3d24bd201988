//! Report pipeline: one live view per [`ReportDefinition`].
//!
//! A [`ReportHandle`] owns a driver task that mirrors the report's collection
//! (and `rentals`, for reports with a lease join), enriches every snapshot
//! through the [`CrossReferenceJoiner`], and republishes the filtered view on
//! a `watch` channel whenever the rows, the lease index, or the predicate
//! change.
//!
//! Each primary snapshot bumps a generation counter. Enrichment of an older
//! generation is aborted when a newer snapshot arrives, and any result that
//! still slips through is compared against the current generation and
//! dropped, so consumers only ever see complete rows of the latest snapshot.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::Serialize;
use tenantdesk_core::view::{self, ReportOutput};
use tenantdesk_core::{DateRange, FilterPredicate, LeaseIndex, Record};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::{ReportDefinition, ReportKind, RENTALS_COLLECTION};
use crate::joiner::CrossReferenceJoiner;
use crate::mirror::{CollectionQuery, CollectionSnapshot, MirrorError, Subscription};

/// Lifecycle of a report view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "status", content = "message")]
pub enum LoadingState {
    /// No enriched snapshot yet.
    Loading,
    Ready,
    /// The primary subscription failed. Terminal.
    Error(String),
}

impl LoadingState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadingState::Loading => "loading",
            LoadingState::Ready => "ready",
            LoadingState::Error(_) => "error",
        }
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadingState::Loading)
    }
}

/// Published state of a report view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportState {
    pub kind: ReportKind,
    pub loading: LoadingState,
    /// Generation of the snapshot the rows were enriched from; 0 before the first.
    pub generation: u64,
    pub predicate: FilterPredicate,
    #[serde(flatten)]
    pub output: ReportOutput,
}

struct Inner {
    definition: ReportDefinition,
    rows: Arc<Vec<Record>>,
    leases: Arc<LeaseIndex>,
    predicate: FilterPredicate,
    loading: LoadingState,
    generation: u64,
}

impl Inner {
    fn evaluate(&self, predicate: &FilterPredicate) -> ReportState {
        ReportState {
            kind: self.definition.kind,
            loading: self.loading.clone(),
            generation: self.generation,
            predicate: predicate.clone(),
            output: view::apply(&self.rows, predicate, &self.definition.schema, &self.leases),
        }
    }
}

struct Shared {
    inner: Mutex<Inner>,
    state_tx: watch::Sender<Arc<ReportState>>,
}

impl Shared {
    /// Applies `change` and republishes the view.
    fn update(&self, change: impl FnOnce(&mut Inner)) {
        let mut inner = self.inner.lock();
        change(&mut inner);
        let state = inner.evaluate(&inner.predicate);
        self.state_tx.send_replace(Arc::new(state));
    }
}

/// A live, filterable report. Dropping the handle stops its driver task,
/// its subscriptions, and any enrichment in flight.
pub struct ReportHandle {
    shared: Arc<Shared>,
    state_rx: watch::Receiver<Arc<ReportState>>,
    cancel: CancellationToken,
}

impl ReportHandle {
    /// Starts the view. Must be called from within a tokio runtime.
    #[must_use]
    pub fn open(
        definition: ReportDefinition,
        primary: Subscription,
        leases: Option<Subscription>,
        joiner: CrossReferenceJoiner,
    ) -> Self {
        let inner = Inner {
            definition,
            rows: Arc::new(Vec::new()),
            leases: Arc::new(LeaseIndex::default()),
            predicate: FilterPredicate::default(),
            loading: LoadingState::Loading,
            generation: 0,
        };
        let initial = inner.evaluate(&inner.predicate);
        let (state_tx, state_rx) = watch::channel(Arc::new(initial));
        let shared = Arc::new(Shared {
            inner: Mutex::new(inner),
            state_tx,
        });
        let cancel = CancellationToken::new();

        tokio::spawn(drive(
            Arc::clone(&shared),
            primary,
            leases,
            joiner,
            cancel.clone(),
        ));

        Self {
            shared,
            state_rx,
            cancel,
        }
    }

    /// Sets the free-text token. Blank clears it.
    pub fn set_filter_text(&self, text: impl Into<String>) {
        let text = text.into();
        self.shared.update(|inner| {
            inner.predicate.text = Some(text).filter(|t| !t.trim().is_empty());
        });
    }

    /// Sets both date bounds. `None` leaves that side open.
    pub fn set_date_range(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) {
        self.shared.update(|inner| {
            inner.predicate.date_range = DateRange::new(start, end);
        });
    }

    /// Latest published state.
    #[must_use]
    pub fn state(&self) -> Arc<ReportState> {
        Arc::clone(&self.state_rx.borrow())
    }

    /// Receiver that observes every published state.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Arc<ReportState>> {
        self.state_rx.clone()
    }

    /// Evaluates `predicate` against the current rows without touching the
    /// view's own predicate.
    #[must_use]
    pub fn query(&self, predicate: &FilterPredicate) -> ReportState {
        self.shared.inner.lock().evaluate(predicate)
    }

    /// Waits until the view has left [`LoadingState::Loading`] or `timeout`
    /// elapses. Returns whether it settled.
    pub async fn wait_until_settled(&self, timeout: Duration) -> bool {
        let mut rx = self.state_rx.clone();
        let settled = rx.wait_for(|state| !state.loading.is_loading());
        let settled_ok = matches!(tokio::time::timeout(timeout, settled).await, Ok(Ok(_)));
        settled_ok
    }

    #[must_use]
    pub fn kind(&self) -> ReportKind {
        self.shared.inner.lock().definition.kind
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stops the view. Equivalent to dropping the handle.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ReportHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// The `rentals` query a definition needs for its lease join, if any.
#[must_use]
pub fn lease_query(definition: &ReportDefinition) -> Option<CollectionQuery> {
    definition
        .joins_leases
        .then(|| CollectionQuery::new(RENTALS_COLLECTION))
}

async fn next_event(
    sub: &mut Option<Subscription>,
) -> Option<Result<CollectionSnapshot, MirrorError>> {
    match sub {
        Some(sub) => sub.recv().await,
        None => std::future::pending().await,
    }
}

async fn drive(
    shared: Arc<Shared>,
    mut primary: Subscription,
    mut leases: Option<Subscription>,
    joiner: CrossReferenceJoiner,
    cancel: CancellationToken,
) {
    let kind = shared.inner.lock().definition.kind;
    let (results_tx, mut results_rx) = mpsc::channel::<(u64, Vec<Record>)>(4);
    let mut generation = 0u64;
    let mut in_flight: Option<JoinHandle<()>> = None;
    let mut leases_open = leases.is_some();

    info!(report = %kind, "report view opened");

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,

            event = primary.recv() => match event {
                Some(Ok(snapshot)) => {
                    generation += 1;
                    if let Some(stale) = in_flight.take() {
                        stale.abort();
                    }
                    if joiner.is_passthrough() {
                        let rows = snapshot.records.as_ref().clone();
                        publish_rows(&shared, generation, rows);
                    } else {
                        let joiner = joiner.clone();
                        let tx = results_tx.clone();
                        let target = generation;
                        in_flight = Some(tokio::spawn(async move {
                            let rows = joiner.enrich(&snapshot.records).await;
                            let _ = tx.send((target, rows)).await;
                        }));
                    }
                }
                Some(Err(error)) => {
                    warn!(report = %kind, error = %error, "report subscription failed");
                    shared.update(|inner| inner.loading = LoadingState::Error(error.to_string()));
                    break;
                }
                None => break,
            },

            Some((target, rows)) = results_rx.recv() => {
                if target == generation {
                    in_flight = None;
                    publish_rows(&shared, target, rows);
                } else {
                    debug!(report = %kind, stale = target, current = generation, "discarding stale enrichment");
                    metrics::counter!("tenantdesk_stale_enrichments_total").increment(1);
                }
            }

            event = next_event(&mut leases), if leases_open => match event {
                Some(Ok(snapshot)) => {
                    let index = LeaseIndex::from_records(&snapshot.records);
                    debug!(report = %kind, apartments = index.len(), "lease index rebuilt");
                    shared.update(|inner| inner.leases = Arc::new(index));
                }
                Some(Err(error)) => {
                    warn!(report = %kind, error = %error, "lease subscription failed; keeping last lease index");
                }
                None => leases_open = false,
            },
        }
    }

    if let Some(task) = in_flight {
        task.abort();
    }
    info!(report = %kind, "report view closed");
}

fn publish_rows(shared: &Shared, generation: u64, rows: Vec<Record>) {
    shared.update(|inner| {
        inner.rows = Arc::new(rows);
        inner.generation = generation;
        inner.loading = LoadingState::Ready;
    });
}
