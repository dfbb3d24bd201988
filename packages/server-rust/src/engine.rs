//! Report engine: opens report views against a document store and keeps the
//! shared ones alive for the HTTP surface.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::catalog::{ReportDefinition, ReportKind};
use crate::config::ReportConfig;
use crate::joiner::CrossReferenceJoiner;
use crate::mirror::LiveCollectionMirror;
use crate::report::{lease_query, LoadingState, ReportHandle};
use crate::traits::DocumentStore;

pub struct ReportEngine {
    store: Arc<dyn DocumentStore>,
    mirror: LiveCollectionMirror,
    config: ReportConfig,
    shared: DashMap<ReportKind, Arc<ReportHandle>>,
}

impl ReportEngine {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, config: ReportConfig) -> Self {
        Self {
            mirror: LiveCollectionMirror::new(Arc::clone(&store)),
            store,
            config,
            shared: DashMap::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    #[must_use]
    pub fn mirror(&self) -> &LiveCollectionMirror {
        &self.mirror
    }

    /// Opens a private view of `definition`. The caller owns its lifetime.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn open(&self, definition: ReportDefinition) -> ReportHandle {
        let primary = self.mirror.subscribe(definition.query.clone());
        let leases = lease_query(&definition).map(|query| self.mirror.subscribe(query));
        let joiner =
            CrossReferenceJoiner::new(Arc::clone(&self.store), definition.relations.clone())
                .with_lookup_timeout(self.config.lookup_timeout);
        ReportHandle::open(definition, primary, leases, joiner)
    }

    /// The engine-owned view of `kind`, opened on first use. A view that was
    /// closed or whose subscription failed is replaced by a fresh one.
    #[must_use]
    pub fn shared(&self, kind: ReportKind) -> Arc<ReportHandle> {
        let mut entry = self
            .shared
            .entry(kind)
            .or_insert_with(|| Arc::new(self.open(kind.definition())));
        let stale = entry.is_closed() || matches!(entry.state().loading, LoadingState::Error(_));
        if stale {
            info!(report = %kind, "reopening report view");
            *entry = Arc::new(self.open(kind.definition()));
        }
        Arc::clone(&entry)
    }

    /// Number of engine-owned views currently open.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.shared.len()
    }

    /// Closes every engine-owned view.
    pub fn close_all(&self) {
        for entry in self.shared.iter() {
            entry.close();
        }
        self.shared.clear();
    }
}
