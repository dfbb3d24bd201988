//! Built-in report definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tenantdesk_core::ReportSchema;
use thiserror::Error;

use crate::joiner::{Projection, Relation};
use crate::mirror::CollectionQuery;

/// Collection holding lease metadata, joined by apartment name.
pub const RENTALS_COLLECTION: &str = "rentals";

/// Every report the console offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Payments,
    Occupancy,
    Rentals,
    Notices,
    Identifications,
    MaterialRequests,
    Visitors,
    Apartments,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown report: {0}")]
pub struct UnknownReport(pub String);

impl ReportKind {
    pub const ALL: [ReportKind; 8] = [
        ReportKind::Payments,
        ReportKind::Occupancy,
        ReportKind::Rentals,
        ReportKind::Notices,
        ReportKind::Identifications,
        ReportKind::MaterialRequests,
        ReportKind::Visitors,
        ReportKind::Apartments,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ReportKind::Payments => "payments",
            ReportKind::Occupancy => "occupancy",
            ReportKind::Rentals => "rentals",
            ReportKind::Notices => "notices",
            ReportKind::Identifications => "identifications",
            ReportKind::MaterialRequests => "material_requests",
            ReportKind::Visitors => "visitors",
            ReportKind::Apartments => "apartments",
        }
    }

    /// Full definition of this report.
    #[must_use]
    pub fn definition(self) -> ReportDefinition {
        match self {
            ReportKind::Payments => ReportDefinition {
                kind: self,
                query: CollectionQuery::new("payments").descending("createdAt"),
                relations: payment_relations(),
                schema: ReportSchema::payments(),
                joins_leases: true,
            },
            ReportKind::Occupancy => ReportDefinition {
                kind: self,
                query: CollectionQuery::new("payments").descending("createdAt"),
                relations: payment_relations(),
                schema: ReportSchema::occupancy(),
                joins_leases: true,
            },
            ReportKind::Rentals => ReportDefinition::plain(
                self,
                CollectionQuery::new(RENTALS_COLLECTION),
                ReportSchema::rentals(),
            ),
            ReportKind::Notices => ReportDefinition::plain(
                self,
                CollectionQuery::new("admin_notices").descending("timestamp"),
                ReportSchema::notices(),
            ),
            ReportKind::Identifications => ReportDefinition::plain(
                self,
                CollectionQuery::new("identifications").descending("submittedAt"),
                ReportSchema::identifications(),
            ),
            ReportKind::MaterialRequests => ReportDefinition::plain(
                self,
                CollectionQuery::new("material_requests").descending("createdAt"),
                ReportSchema::material_requests(),
            ),
            ReportKind::Visitors => ReportDefinition::plain(
                self,
                CollectionQuery::new("visitors"),
                ReportSchema::visitors(),
            ),
            ReportKind::Apartments => ReportDefinition::plain(
                self,
                CollectionQuery::new("apartments").ascending("name"),
                ReportSchema::apartments(),
            ),
        }
    }
}

impl FromStr for ReportKind {
    type Err = UnknownReport;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReportKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownReport(s.to_string()))
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a report reads, how it joins, and how it filters and aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDefinition {
    pub kind: ReportKind,
    pub query: CollectionQuery,
    pub relations: Vec<Relation>,
    pub schema: ReportSchema,
    /// Whether the view also mirrors `rentals` for the lease join.
    pub joins_leases: bool,
}

impl ReportDefinition {
    fn plain(kind: ReportKind, query: CollectionQuery, schema: ReportSchema) -> Self {
        Self {
            kind,
            query,
            relations: Vec::new(),
            schema,
            joins_leases: false,
        }
    }
}

fn payment_relations() -> Vec<Relation> {
    vec![
        Relation::new("userId", "users", "tenant", Projection::Tenant),
        Relation::new("apartmentId", "apartments", "apartment", Projection::Apartment),
    ]
}
