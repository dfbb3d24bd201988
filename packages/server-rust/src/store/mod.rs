//! Document store abstraction for the `tenantdesk` server.
//!
//! The [`DocumentStore`](crate::traits::DocumentStore) trait models the hosted
//! document database the admin console reads from: named collections of
//! records, point lookups, single-document writes, and a change feed per
//! collection. [`MemoryDocumentStore`] is the in-process implementation used
//! by the binary and by tests.
//!
//! Additionally defines [`ChangeObserver`] for reacting to committed writes
//! and [`CompositeChangeObserver`] for fan-out to multiple observers.

pub mod memory;
pub mod observer;

pub use memory::*;
pub use observer::*;

use serde::Serialize;
use thiserror::Error;

/// Errors returned by a [`DocumentStore`](crate::traits::DocumentStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The addressed document does not exist.
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },
    /// The store cannot serve requests right now.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Kind of committed write that produced a [`ChangeEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }
}

/// Notification that one document of a collection changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub collection: String,
    pub id: String,
    pub kind: ChangeKind,
}
