//! Filter/aggregate evaluation over enriched report rows.
//!
//! [`apply`] is a pure function of the rows, the predicate, the schema and
//! the lease index. It is cheap enough to rerun on every input change, so no
//! derived state is cached anywhere.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::lease::{LeaseDisplay, LeaseIndex, LeaseInfo};
use crate::normalize;
use crate::predicate::FilterPredicate;
use crate::schema::{GroupSpec, ReportSchema};
use crate::types::Record;

/// Result of one evaluation: the visible rows and everything derived from them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportOutput {
    pub visible_rows: Vec<Record>,
    pub aggregates: Aggregates,
}

/// Derived totals over the visible rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregates {
    /// Sum of the amount field; rows with unparseable amounts contribute zero.
    pub total: f64,
    pub groups: Vec<Group>,
    pub occupancy: Vec<Occupancy>,
}

impl Aggregates {
    /// The total as a currency string, e.g. `$1,234.50`.
    #[must_use]
    pub fn formatted_total(&self) -> String {
        normalize::format_currency(self.total)
    }
}

/// One rollup group.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub key: String,
    pub display_name: Option<String>,
    pub contacts: BTreeMap<String, String>,
    pub total: f64,
    pub count: usize,
    pub related: BTreeSet<String>,
    pub last_seen: Option<DateTime<Utc>>,
    pub lease: Option<LeaseInfo>,
}

impl Group {
    fn new(key: String) -> Self {
        Self {
            key,
            display_name: None,
            contacts: BTreeMap::new(),
            total: 0.0,
            count: 0,
            related: BTreeSet::new(),
            last_seen: None,
            lease: None,
        }
    }
}

/// Lease status of one apartment seen among the visible rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Occupancy {
    pub apartment_name: String,
    pub lease: LeaseDisplay,
}

/// Filters `rows` with `predicate` and derives the aggregates `schema` asks for.
#[must_use]
pub fn apply(
    rows: &[Record],
    predicate: &FilterPredicate,
    schema: &ReportSchema,
    leases: &LeaseIndex,
) -> ReportOutput {
    let visible_rows = filter_rows(rows, predicate, schema);

    let total = schema
        .amount_field
        .as_deref()
        .map_or(0.0, |field| sum_amounts(&visible_rows, field));
    let groups = schema.group_by.as_ref().map_or_else(Vec::new, |spec| {
        group_rows(
            &visible_rows,
            spec,
            schema.timestamp_field.as_deref(),
            schema.amount_field.as_deref(),
            leases,
        )
    });
    let occupancy = schema
        .occupancy_field
        .as_deref()
        .map_or_else(Vec::new, |field| occupancy(&visible_rows, field, leases));

    ReportOutput {
        visible_rows,
        aggregates: Aggregates {
            total,
            groups,
            occupancy,
        },
    }
}

/// Rows passing both predicate components, in input order.
#[must_use]
pub fn filter_rows(rows: &[Record], predicate: &FilterPredicate, schema: &ReportSchema) -> Vec<Record> {
    rows.iter()
        .filter(|row| {
            predicate.matches(
                row,
                &schema.searchable_fields,
                schema.timestamp_field.as_deref(),
            )
        })
        .cloned()
        .collect()
}

/// Sum of parsed amounts; unparseable or missing amounts count as zero.
#[must_use]
pub fn sum_amounts(rows: &[Record], amount_field: &str) -> f64 {
    rows.iter()
        .map(|row| row.amount(amount_field).unwrap_or(0.0))
        .sum()
}

/// Rolls rows up by identity key, newest activity first.
#[must_use]
pub fn group_rows(
    rows: &[Record],
    spec: &GroupSpec,
    timestamp_field: Option<&str>,
    amount_field: Option<&str>,
    leases: &LeaseIndex,
) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let Some(key) = row.first_text(&spec.key_fields) else {
            continue;
        };
        let index = *positions.entry(key.to_string()).or_insert_with(|| {
            groups.push(Group::new(key.to_string()));
            groups.len() - 1
        });
        let group = &mut groups[index];

        if group.display_name.is_none() {
            group.display_name = row.first_text(&spec.name_fields).map(ToString::to_string);
        }
        for contact in &spec.contact_fields {
            if !group.contacts.contains_key(&contact.name) {
                if let Some(value) = row.first_text(&contact.sources) {
                    group.contacts.insert(contact.name.clone(), value.to_string());
                }
            }
        }

        group.count += 1;
        if let Some(field) = amount_field {
            group.total += row.amount(field).unwrap_or(0.0);
        }

        if let Some(field) = spec.related_field.as_deref() {
            let related = row.text(field).trim();
            if !related.is_empty() {
                group.related.insert(related.to_string());
                if let Some(lease) = leases.get(related) {
                    group.lease = Some(lease.clone());
                }
            }
        }

        if let Some(ts) = timestamp_field.and_then(|field| row.timestamp(field)) {
            if group.last_seen.map_or(true, |seen| ts > seen) {
                group.last_seen = Some(ts);
            }
        }
    }

    if let Some(fallback) = &spec.fallback_name {
        for group in groups.iter_mut().filter(|g| g.display_name.is_none()) {
            group.display_name = Some(fallback.clone());
        }
    }

    // Stable sort keeps first-seen order among equal timestamps.
    groups.sort_by(|a, b| match (a.last_seen, b.last_seen) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    groups
}

/// Distinct apartment names among `rows`, sorted, with their lease status.
#[must_use]
pub fn occupancy(rows: &[Record], apartment_field: &str, leases: &LeaseIndex) -> Vec<Occupancy> {
    let names: BTreeSet<&str> = rows
        .iter()
        .map(|row| row.text(apartment_field).trim())
        .filter(|name| !name.is_empty())
        .collect();

    names
        .into_iter()
        .map(|name| Occupancy {
            apartment_name: name.to_string(),
            lease: leases
                .get(name)
                .map_or_else(LeaseDisplay::default, LeaseInfo::display),
        })
        .collect()
}
