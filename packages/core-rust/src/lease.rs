//! Apartment-name keyed lease lookup.
//!
//! Lease metadata lives in the `rentals` collection and is joined onto other
//! rows by the denormalized apartment name rather than by id. Missing matches
//! are normal and render as a vacant apartment.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::normalize;
use crate::types::{Record, Value};

/// Lease metadata for one apartment.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseInfo {
    pub tenant_name: Option<String>,
    pub rent_amount: Option<f64>,
    pub lease_start: Option<DateTime<Utc>>,
    pub lease_end: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl LeaseInfo {
    /// Reads lease fields from a rental record. Malformed fields become `None`.
    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        let tenant_name = Some(record.text("tenantName").trim())
            .filter(|s| !s.is_empty())
            .map(ToString::to_string);
        Self {
            tenant_name,
            rent_amount: record.amount("rentAmount"),
            lease_start: record.timestamp("leaseStart"),
            lease_end: record.timestamp("leaseEnd"),
            is_active: matches!(record.get("isActive"), Some(Value::Bool(true))),
        }
    }

    /// Presentation-ready strings with the usual fallbacks.
    #[must_use]
    pub fn display(&self) -> LeaseDisplay {
        LeaseDisplay {
            tenant_name: self
                .tenant_name
                .clone()
                .unwrap_or_else(|| "Vacant".to_string()),
            rent_amount: self
                .rent_amount
                .map_or_else(|| "N/A".to_string(), normalize::format_currency),
            lease_start: self
                .lease_start
                .as_ref()
                .map_or_else(|| "N/A".to_string(), normalize::format_date),
            lease_end: self
                .lease_end
                .as_ref()
                .map_or_else(|| "Month-to-Month".to_string(), normalize::format_date),
            is_active: self.is_active,
        }
    }
}

/// String rendering of [`LeaseInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseDisplay {
    pub tenant_name: String,
    pub rent_amount: String,
    pub lease_start: String,
    pub lease_end: String,
    pub is_active: bool,
}

impl Default for LeaseDisplay {
    fn default() -> Self {
        LeaseInfo::default().display()
    }
}

/// Apartment name to lease lookup, rebuilt from every `rentals` snapshot.
#[derive(Debug, Clone, Default)]
pub struct LeaseIndex {
    by_apartment: HashMap<String, LeaseInfo>,
}

impl LeaseIndex {
    /// Builds the index from a rentals snapshot. Records without an apartment
    /// name are skipped; when two records share a name, the later one wins.
    #[must_use]
    pub fn from_records(records: &[Record]) -> Self {
        let mut by_apartment = HashMap::with_capacity(records.len());
        for record in records {
            let name = record.text("apartmentName");
            if name.is_empty() {
                continue;
            }
            if by_apartment
                .insert(name.to_string(), LeaseInfo::from_record(record))
                .is_some()
            {
                debug!(apartment = name, "duplicate lease record, keeping the later one");
            }
        }
        Self { by_apartment }
    }

    #[must_use]
    pub fn get(&self, apartment_name: &str) -> Option<&LeaseInfo> {
        self.by_apartment.get(apartment_name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_apartment.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_apartment.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rental(value: serde_json::Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn index_keys_by_apartment_name() {
        let index = LeaseIndex::from_records(&[
            rental(json!({"id": "r1", "apartmentName": "A1", "tenantName": "Amina",
                          "rentAmount": "450", "isActive": true})),
            rental(json!({"id": "r2", "tenantName": "Nobody"})),
        ]);
        assert_eq!(index.len(), 1);
        let lease = index.get("A1").unwrap();
        assert_eq!(lease.tenant_name.as_deref(), Some("Amina"));
        assert_eq!(lease.rent_amount, Some(450.0));
        assert!(lease.is_active);
        assert!(index.get("B2").is_none());
    }

    #[test]
    fn later_rental_with_same_name_wins() {
        let index = LeaseIndex::from_records(&[
            rental(json!({"id": "r1", "apartmentName": "A1", "tenantName": "First"})),
            rental(json!({"id": "r2", "apartmentName": "A1", "tenantName": "Second"})),
        ]);
        assert_eq!(index.get("A1").unwrap().tenant_name.as_deref(), Some("Second"));
    }

    #[test]
    fn display_falls_back_for_missing_fields() {
        let display = LeaseInfo::default().display();
        assert_eq!(display.tenant_name, "Vacant");
        assert_eq!(display.rent_amount, "N/A");
        assert_eq!(display.lease_start, "N/A");
        assert_eq!(display.lease_end, "Month-to-Month");
        assert!(!display.is_active);
    }

    #[test]
    fn display_formats_present_fields() {
        let lease = LeaseInfo::from_record(&rental(json!({
            "id": "r1",
            "apartmentName": "A1",
            "rentAmount": 1200,
            "leaseStart": "2024-03-01",
            "leaseEnd": "bogus"
        })));
        let display = lease.display();
        assert_eq!(display.rent_amount, "$1,200.00");
        assert_eq!(display.lease_start, "Mar 01, 2024");
        assert_eq!(display.lease_end, "Month-to-Month");
    }
}
