//! Approval queue vocabulary.
//!
//! Three collections hold items an administrator approves or rejects. They
//! disagree on status spelling: identifications use capitalized words, the
//! other two lowercase. [`ApprovalKind::status_value`] hides the difference.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Collections whose documents carry a reviewable `status` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalKind {
    Identifications,
    MaterialRequests,
    Visitors,
}

impl ApprovalKind {
    pub const ALL: [ApprovalKind; 3] = [
        ApprovalKind::Identifications,
        ApprovalKind::MaterialRequests,
        ApprovalKind::Visitors,
    ];

    /// Name of the backing collection.
    #[must_use]
    pub fn collection(self) -> &'static str {
        match self {
            ApprovalKind::Identifications => "identifications",
            ApprovalKind::MaterialRequests => "material_requests",
            ApprovalKind::Visitors => "visitors",
        }
    }

    /// Whether a status change also stamps `reviewedAt`.
    #[must_use]
    pub fn stamps_review_time(self) -> bool {
        !matches!(self, ApprovalKind::Visitors)
    }

    /// Status string as stored in this collection.
    #[must_use]
    pub fn status_value(self, status: ApprovalStatus) -> &'static str {
        match (self, status) {
            (ApprovalKind::Identifications, ApprovalStatus::Pending) => "Pending",
            (ApprovalKind::Identifications, ApprovalStatus::Approved) => "Approved",
            (ApprovalKind::Identifications, ApprovalStatus::Rejected) => "Rejected",
            (_, ApprovalStatus::Pending) => "pending",
            (_, ApprovalStatus::Approved) => "approved",
            (_, ApprovalStatus::Rejected) => "rejected",
        }
    }
}

impl FromStr for ApprovalKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ApprovalKind::ALL
            .into_iter()
            .find(|kind| kind.collection() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

impl fmt::Display for ApprovalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

/// Review outcome requested by the administrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl FromStr for ApprovalStatus {
    type Err = UnknownVariant;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for ApprovalStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown value: {0}")]
pub struct UnknownVariant(pub String);
