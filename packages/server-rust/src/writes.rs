//! Administrator write operations.
//!
//! Writes are pessimistic: each call returns only after the store confirmed
//! it, and a failure leaves nothing to roll back. Open report views pick up
//! the change through their own subscriptions.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tenantdesk_core::{ApprovalKind, ApprovalStatus, Fields, Record, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::store::StoreError;
use crate::traits::DocumentStore;

/// Collections the console may delete from.
pub const DELETABLE_COLLECTIONS: [&str; 2] = ["apartments", "visitors"];

const APARTMENTS: &str = "apartments";
const NOTICES: &str = "admin_notices";

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

/// Every problem found in a submitted draft.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", join_messages(.errors))]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    fn single(field: &'static str, message: &'static str) -> Self {
        Self {
            errors: vec![FieldError { field, message }],
        }
    }
}

fn join_messages(errors: &[FieldError]) -> String {
    let messages: Vec<&str> = errors.iter().map(|e| e.message).collect();
    messages.join("; ")
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Collects field errors while a draft is checked.
#[derive(Default)]
struct Checker {
    errors: Vec<FieldError>,
}

impl Checker {
    fn require(&mut self, ok: bool, field: &'static str, message: &'static str) {
        if !ok {
            self.errors.push(FieldError { field, message });
        }
    }

    fn finish(self) -> Result<(), ValidationError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                errors: self.errors,
            })
        }
    }
}

/// Reads a form number strictly: the whole (trimmed) string must parse.
fn parse_number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        #[allow(clippy::cast_precision_loss)]
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn now_stamp() -> Value {
    Value::Timestamp(Utc::now())
}

/// Apartment form as submitted. Numbers may arrive as numbers or strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApartmentDraft {
    pub name: String,
    pub location: String,
    pub price: Option<Value>,
    pub bedrooms: Option<Value>,
    pub bathrooms: Option<Value>,
    pub size: Option<Value>,
    pub status: Option<String>,
    pub details: Option<String>,
    pub image: Option<String>,
}

impl ApartmentDraft {
    fn check_common(&self, checker: &mut Checker) -> Option<f64> {
        checker.require(!self.name.trim().is_empty(), "name", "Apartment name is required");
        checker.require(!self.location.trim().is_empty(), "location", "Location is required");
        let price = parse_number(self.price.as_ref()).filter(|p| *p > 0.0);
        checker.require(price.is_some(), "price", "Valid price is required");
        price
    }

    fn status(&self) -> String {
        self.status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("available")
            .to_string()
    }

    fn details(&self) -> String {
        self.details.clone().unwrap_or_default()
    }

    /// Fields of a new apartment document, or every validation failure.
    fn to_new_fields(&self) -> Result<Fields, ValidationError> {
        let mut checker = Checker::default();
        let price = self.check_common(&mut checker);
        let bedrooms = parse_number(self.bedrooms.as_ref()).filter(|n| *n >= 0.0);
        checker.require(bedrooms.is_some(), "bedrooms", "Enter bedrooms");
        let bathrooms = parse_number(self.bathrooms.as_ref()).filter(|n| *n >= 0.0);
        checker.require(bathrooms.is_some(), "bathrooms", "Enter bathrooms");
        let size = parse_number(self.size.as_ref()).filter(|n| *n > 0.0);
        checker.require(size.is_some(), "size", "Enter apartment size");
        checker.finish()?;

        let mut fields = Fields::new();
        fields.insert("name".to_string(), Value::from(self.name.as_str()));
        fields.insert("location".to_string(), Value::from(self.location.as_str()));
        fields.insert("price".to_string(), Value::from(price.unwrap_or_default()));
        fields.insert("bedrooms".to_string(), Value::from(bedrooms.unwrap_or_default()));
        fields.insert("bathrooms".to_string(), Value::from(bathrooms.unwrap_or_default()));
        fields.insert("size".to_string(), Value::from(size.unwrap_or_default()));
        fields.insert("status".to_string(), Value::from(self.status()));
        fields.insert("details".to_string(), Value::from(self.details()));
        fields.insert(
            "image".to_string(),
            self.image.clone().map_or(Value::Null, Value::from),
        );
        fields.insert("createdAt".to_string(), now_stamp());
        Ok(fields)
    }

    /// Fields written by an edit. Room counts, size and image are untouched.
    fn to_update_fields(&self) -> Result<Fields, ValidationError> {
        let mut checker = Checker::default();
        let price = self.check_common(&mut checker);
        checker.finish()?;

        let mut fields = Fields::new();
        fields.insert("name".to_string(), Value::from(self.name.as_str()));
        fields.insert("location".to_string(), Value::from(self.location.as_str()));
        fields.insert("price".to_string(), Value::from(price.unwrap_or_default()));
        fields.insert("details".to_string(), Value::from(self.details()));
        fields.insert("status".to_string(), Value::from(self.status()));
        Ok(fields)
    }
}

/// Resident notice as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NoticeDraft {
    pub title: String,
    pub message: String,
    /// Ids of the apartments the notice targets.
    pub target_apartments: Vec<String>,
}

impl NoticeDraft {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() || self.message.trim().is_empty() {
            return Err(ValidationError::single(
                "title",
                "Please fill in both title and message fields",
            ));
        }
        if self.target_apartments.is_empty() {
            return Err(ValidationError::single(
                "targetApartments",
                "Please select at least one apartment",
            ));
        }
        Ok(())
    }
}

/// Performs every administrator write against the store.
#[derive(Clone)]
pub struct WriteService {
    store: Arc<dyn DocumentStore>,
}

impl WriteService {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Sets the review status of an approval-queue item, stamping
    /// `reviewedAt` where the queue records it.
    ///
    /// # Errors
    ///
    /// [`WriteError::Store`] when the item does not exist or the store fails.
    pub async fn update_status(
        &self,
        kind: ApprovalKind,
        id: &str,
        status: ApprovalStatus,
    ) -> Result<Record, WriteError> {
        let mut fields = Fields::new();
        fields.insert("status".to_string(), Value::from(kind.status_value(status)));
        if kind.stamps_review_time() {
            let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
            fields.insert("reviewedAt".to_string(), Value::from(stamp));
        }
        let result = self.store.update(kind.collection(), id, fields).await;
        record_outcome("update_status", kind.collection(), id, &result);
        Ok(result?)
    }

    /// Deletes one document from a collection that allows deletes.
    ///
    /// # Errors
    ///
    /// [`WriteError::Validation`] for collections outside
    /// [`DELETABLE_COLLECTIONS`], [`WriteError::Store`] otherwise.
    pub async fn delete_record(&self, collection: &str, id: &str) -> Result<(), WriteError> {
        if !DELETABLE_COLLECTIONS.contains(&collection) {
            return Err(ValidationError::single(
                "collection",
                "Records in this collection cannot be deleted",
            )
            .into());
        }
        let result = self.store.delete(collection, id).await;
        record_outcome("delete_record", collection, id, &result);
        Ok(result?)
    }

    /// Creates an apartment listing.
    ///
    /// # Errors
    ///
    /// [`WriteError::Validation`] listing every invalid field, or
    /// [`WriteError::Store`].
    pub async fn create_apartment(&self, draft: &ApartmentDraft) -> Result<Record, WriteError> {
        let fields = draft.to_new_fields()?;
        let result = self.store.insert(APARTMENTS, fields).await;
        let id = result.as_ref().map_or("", |r| r.id.as_str()).to_string();
        record_outcome("create_apartment", APARTMENTS, &id, &result);
        Ok(result?)
    }

    /// Edits an apartment listing.
    ///
    /// # Errors
    ///
    /// [`WriteError::Validation`] listing every invalid field, or
    /// [`WriteError::Store`] when the apartment does not exist.
    pub async fn update_apartment(
        &self,
        id: &str,
        draft: &ApartmentDraft,
    ) -> Result<Record, WriteError> {
        let fields = draft.to_update_fields()?;
        let result = self.store.update(APARTMENTS, id, fields).await;
        record_outcome("update_apartment", APARTMENTS, id, &result);
        Ok(result?)
    }

    /// Posts a notice. A selection covering every apartment is stored as
    /// `"All"`.
    ///
    /// # Errors
    ///
    /// [`WriteError::Validation`] for blank text or an empty selection,
    /// [`WriteError::Store`] when listing apartments or inserting fails.
    pub async fn post_notice(&self, draft: &NoticeDraft) -> Result<Record, WriteError> {
        draft.validate()?;

        let apartments = self.store.list(APARTMENTS).await?;
        let selected: HashSet<&str> = draft.target_apartments.iter().map(String::as_str).collect();
        let covers_all = !apartments.is_empty()
            && apartments.iter().all(|apt| selected.contains(apt.id.as_str()));
        let target = if covers_all {
            Value::from("All")
        } else {
            Value::Array(
                draft
                    .target_apartments
                    .iter()
                    .map(|id| Value::from(id.as_str()))
                    .collect(),
            )
        };

        let mut fields = Fields::new();
        fields.insert("title".to_string(), Value::from(draft.title.trim()));
        fields.insert("message".to_string(), Value::from(draft.message.trim()));
        fields.insert("timestamp".to_string(), now_stamp());
        fields.insert("postedBy".to_string(), Value::from("Admin"));
        fields.insert("targetApartments".to_string(), target);

        let result = self.store.insert(NOTICES, fields).await;
        let id = result.as_ref().map_or("", |r| r.id.as_str()).to_string();
        record_outcome("post_notice", NOTICES, &id, &result);
        Ok(result?)
    }
}

fn record_outcome<T>(op: &'static str, collection: &str, id: &str, result: &Result<T, StoreError>) {
    let outcome = match result {
        Ok(_) => {
            info!(op, collection, id, "write committed");
            "ok"
        }
        Err(error) => {
            warn!(op, collection, id, error = %error, "write failed");
            "error"
        }
    };
    metrics::counter!("tenantdesk_writes_total", "op" => op, "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::MemoryDocumentStore;

    fn record(value: serde_json::Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    fn service() -> (Arc<MemoryDocumentStore>, WriteService) {
        let store = Arc::new(MemoryDocumentStore::new());
        (store.clone(), WriteService::new(store))
    }

    fn draft(value: serde_json::Value) -> ApartmentDraft {
        serde_json::from_value(value).unwrap()
    }

    fn messages(err: WriteError) -> Vec<&'static str> {
        match err {
            WriteError::Validation(v) => v.errors.iter().map(|e| e.message).collect(),
            WriteError::Store(e) => panic!("expected validation error, got {e}"),
        }
    }

    #[tokio::test]
    async fn identification_status_is_capitalized_and_stamped() {
        let (store, writes) = service();
        store.put("identifications", record(json!({"id": "i1", "status": "Pending"})));

        let updated = writes
            .update_status(ApprovalKind::Identifications, "i1", ApprovalStatus::Approved)
            .await
            .unwrap();
        assert_eq!(updated.text("status"), "Approved");
        assert!(updated.timestamp("reviewedAt").is_some());
    }

    #[tokio::test]
    async fn visitor_status_is_lowercase_without_stamp() {
        let (store, writes) = service();
        store.put("visitors", record(json!({"id": "v1"})));

        let updated = writes
            .update_status(ApprovalKind::Visitors, "v1", ApprovalStatus::Rejected)
            .await
            .unwrap();
        assert_eq!(updated.text("status"), "rejected");
        assert!(updated.get("reviewedAt").is_none());
    }

    #[tokio::test]
    async fn status_update_of_missing_item_fails_once() {
        let (_store, writes) = service();
        let err = writes
            .update_status(ApprovalKind::MaterialRequests, "nope", ApprovalStatus::Approved)
            .await
            .unwrap_err();
        assert!(matches!(err, WriteError::Store(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn delete_respects_allowlist() {
        let (store, writes) = service();
        store.put("apartments", record(json!({"id": "a1"})));
        store.put("payments", record(json!({"id": "p1"})));

        writes.delete_record("apartments", "a1").await.unwrap();
        assert_eq!(store.len("apartments"), 0);

        let err = writes.delete_record("payments", "p1").await.unwrap_err();
        assert!(matches!(err, WriteError::Validation(_)));
        assert_eq!(store.len("payments"), 1);
    }

    #[tokio::test]
    async fn create_apartment_normalizes_numbers_and_defaults() {
        let (store, writes) = service();
        let created = writes
            .create_apartment(&draft(json!({
                "name": "Sunset 2", "location": "Hodan", "price": "450",
                "bedrooms": "0", "bathrooms": 1, "size": "72.5", "status": ""
            })))
            .await
            .unwrap();

        assert_eq!(created.amount("price"), Some(450.0));
        assert_eq!(created.amount("bedrooms"), Some(0.0));
        assert_eq!(created.amount("size"), Some(72.5));
        assert_eq!(created.text("status"), "available");
        assert_eq!(created.get("image"), Some(&Value::Null));
        assert!(created.timestamp("createdAt").is_some());
        assert_eq!(store.len("apartments"), 1);
    }

    #[tokio::test]
    async fn create_apartment_reports_every_invalid_field() {
        let (store, writes) = service();
        let err = writes
            .create_apartment(&draft(json!({
                "name": "  ", "location": "Hodan", "price": "0",
                "bedrooms": "-1", "size": "12abc"
            })))
            .await
            .unwrap_err();

        assert_eq!(
            messages(err),
            vec![
                "Apartment name is required",
                "Valid price is required",
                "Enter bedrooms",
                "Enter bathrooms",
                "Enter apartment size",
            ]
        );
        assert_eq!(store.len("apartments"), 0);
    }

    #[tokio::test]
    async fn update_apartment_writes_listing_fields_only() {
        let (store, writes) = service();
        store.put(
            "apartments",
            record(json!({"id": "a1", "name": "Old", "bedrooms": 3, "status": "occupied"})),
        );
        let updated = writes
            .update_apartment(
                "a1",
                &draft(json!({"name": "New", "location": "Hodan", "price": 500})),
            )
            .await
            .unwrap();

        assert_eq!(updated.text("name"), "New");
        assert_eq!(updated.text("status"), "available");
        assert_eq!(updated.text("details"), "");
        assert_eq!(updated.amount("bedrooms"), Some(3.0));
    }

    #[tokio::test]
    async fn update_apartment_validates_before_writing() {
        let (_store, writes) = service();
        let err = writes
            .update_apartment("a1", &draft(json!({"name": "x", "location": ""})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Location is required; Valid price is required");
        assert_eq!(messages(err), vec!["Location is required", "Valid price is required"]);
    }

    #[test]
    fn validation_error_displays_joined_messages() {
        let single = ValidationError::single("title", "Title is required");
        assert_eq!(single.to_string(), "Title is required");
        let none = ValidationError { errors: Vec::new() };
        assert_eq!(none.to_string(), "");
        let err: &dyn std::error::Error = &single;
        assert!(err.source().is_none());
    }

    #[tokio::test]
    async fn notice_covering_every_apartment_targets_all() {
        let (store, writes) = service();
        store.put("apartments", record(json!({"id": "a1"})));
        store.put("apartments", record(json!({"id": "a2"})));

        let all = writes
            .post_notice(&NoticeDraft {
                title: " Water ".to_string(),
                message: "Off at noon".to_string(),
                target_apartments: vec!["a2".to_string(), "a1".to_string()],
            })
            .await
            .unwrap();
        assert_eq!(all.text("targetApartments"), "All");
        assert_eq!(all.text("title"), "Water");
        assert_eq!(all.text("postedBy"), "Admin");

        let some = writes
            .post_notice(&NoticeDraft {
                title: "Lift".to_string(),
                message: "Repair".to_string(),
                target_apartments: vec!["a1".to_string()],
            })
            .await
            .unwrap();
        assert_eq!(
            some.get("targetApartments"),
            Some(&Value::Array(vec![Value::from("a1")]))
        );
        assert_eq!(store.len("admin_notices"), 2);
    }

    #[tokio::test]
    async fn notice_validation_messages() {
        let (_store, writes) = service();
        let blank = writes
            .post_notice(&NoticeDraft {
                title: "t".to_string(),
                message: "  ".to_string(),
                target_apartments: vec!["a1".to_string()],
            })
            .await
            .unwrap_err();
        assert_eq!(messages(blank), vec!["Please fill in both title and message fields"]);

        let untargeted = writes
            .post_notice(&NoticeDraft {
                title: "t".to_string(),
                message: "m".to_string(),
                target_apartments: Vec::new(),
            })
            .await
            .unwrap_err();
        assert_eq!(messages(untargeted), vec!["Please select at least one apartment"]);
    }
}
