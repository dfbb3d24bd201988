use serde::{Deserialize, Serialize};

/// Group name shown when a tenant has no name on record.
pub const UNKNOWN_TENANT: &str = "Unknown Tenant";

/// Describes how a report reads its rows: which fields are searchable, which
/// field carries the row's timestamp, which carries the amount, and how rows
/// roll up into groups.
///
/// Field names are dotted paths resolved with [`Record::get_path`](crate::Record::get_path),
/// so joined sub-records (`tenant.name`) are addressable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSchema {
    /// Fields matched by the free-text filter.
    pub searchable_fields: Vec<String>,
    /// Field matched by the date-range filter.
    pub timestamp_field: Option<String>,
    /// Field summed into the report total.
    pub amount_field: Option<String>,
    /// Group-by rollup, if the report has one.
    pub group_by: Option<GroupSpec>,
    /// Field naming the apartment a row belongs to, used for the occupancy
    /// rollup and the lease join.
    pub occupancy_field: Option<String>,
}

impl ReportSchema {
    /// A schema with only searchable fields and a timestamp.
    #[must_use]
    pub fn listing(searchable: &[&str], timestamp_field: &str) -> Self {
        Self {
            searchable_fields: owned(searchable),
            timestamp_field: Some(timestamp_field.to_string()),
            amount_field: None,
            group_by: None,
            occupancy_field: None,
        }
    }

    #[must_use]
    pub fn with_amount(mut self, field: &str) -> Self {
        self.amount_field = Some(field.to_string());
        self
    }

    #[must_use]
    pub fn with_group_by(mut self, group_by: GroupSpec) -> Self {
        self.group_by = Some(group_by);
        self
    }

    #[must_use]
    pub fn with_occupancy(mut self, field: &str) -> Self {
        self.occupancy_field = Some(field.to_string());
        self
    }

    /// Payments joined with tenant and apartment, rolled up per tenant.
    #[must_use]
    pub fn payments() -> Self {
        Self::listing(
            &["apartment.name", "tenant.name", "tenant.phone", "tenant.email"],
            "createdAt",
        )
        .with_amount("amount")
        .with_group_by(GroupSpec {
            key_fields: owned(&["tenant.id", "userId", "fullName"]),
            name_fields: owned(&["tenant.name", "fullName"]),
            contact_fields: vec![
                ContactField::new("phone", &["tenant.phone", "phone"]),
                ContactField::new("email", &["tenant.email", "email"]),
            ],
            related_field: Some("apartment.name".to_string()),
            fallback_name: Some(UNKNOWN_TENANT.to_string()),
        })
        .with_occupancy("apartment.name")
    }

    /// Apartments seen in payments, with their lease status.
    #[must_use]
    pub fn occupancy() -> Self {
        Self::listing(&["apartment.name"], "createdAt")
            .with_amount("amount")
            .with_occupancy("apartment.name")
    }

    /// Rental agreements, rolled up per renter.
    #[must_use]
    pub fn rentals() -> Self {
        Self::listing(
            &[
                "apartmentName",
                "userName",
                "userId",
                "paymentNumber",
                "paymentReference",
            ],
            "createdAt",
        )
        .with_amount("totalAmount")
        .with_group_by(GroupSpec {
            key_fields: owned(&["userId", "userName"]),
            name_fields: owned(&["userName"]),
            contact_fields: Vec::new(),
            related_field: Some("apartmentName".to_string()),
            fallback_name: Some(UNKNOWN_TENANT.to_string()),
        })
    }

    #[must_use]
    pub fn notices() -> Self {
        Self::listing(&["title", "message", "postedBy"], "timestamp")
    }

    #[must_use]
    pub fn identifications() -> Self {
        Self::listing(
            &[
                "responsibleName",
                "apartmentName",
                "responsibleIdNumber",
                "responsiblePhone",
            ],
            "submittedAt",
        )
    }

    #[must_use]
    pub fn material_requests() -> Self {
        Self::listing(&["name", "description"], "createdAt")
    }

    #[must_use]
    pub fn visitors() -> Self {
        Self::listing(&["visitor_name", "apartment_name", "visit_reason"], "check_in")
    }

    #[must_use]
    pub fn apartments() -> Self {
        Self::listing(&["name", "location", "details", "status"], "createdAt").with_amount("price")
    }
}

/// Group-by rollup configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSpec {
    /// Candidate identity fields, in preference order. The first non-blank one
    /// keys the group; rows with none are left out of the rollup.
    pub key_fields: Vec<String>,
    /// Candidate display-name fields, in preference order.
    pub name_fields: Vec<String>,
    /// Contact details carried onto each group.
    pub contact_fields: Vec<ContactField>,
    /// Related-entity name collected into each group's distinct set.
    pub related_field: Option<String>,
    /// Display name for groups where no name field is filled.
    #[serde(default)]
    pub fallback_name: Option<String>,
}

/// One contact detail of a group, read from the first non-blank source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactField {
    /// Name the detail is exposed under (`phone`, `email`).
    pub name: String,
    /// Candidate source fields, in preference order.
    pub sources: Vec<String>,
}

impl ContactField {
    #[must_use]
    pub fn new(name: &str, sources: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            sources: owned(sources),
        }
    }
}

fn owned(fields: &[&str]) -> Vec<String> {
    fields.iter().map(ToString::to_string).collect()
}
