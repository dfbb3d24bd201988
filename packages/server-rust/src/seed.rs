//! Demo data for the in-memory store, so a fresh server has something to
//! report on.

use chrono::{Duration, Utc};
use tenantdesk_core::{Fields, Record, Value};
use tracing::info;

use crate::store::MemoryDocumentStore;

fn doc(id: &str, fields: &[(&str, Value)]) -> Record {
    let fields: Fields = fields
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect();
    Record::new(id, fields)
}

fn days_ago(days: i64) -> Value {
    Value::Timestamp(Utc::now() - Duration::days(days))
}

fn s(text: &str) -> Value {
    Value::from(text)
}

/// Loads the demo dataset. Returns the number of documents written.
pub fn load_demo(store: &MemoryDocumentStore) -> usize {
    let documents: Vec<(&str, Record)> = vec![
        ("users", doc("u1", &[
            ("fullName", s("Amina Warsame")),
            ("phone", s("+252 61 555 0101")),
            ("email", s("amina@example.com")),
        ])),
        ("users", doc("u2", &[
            ("firstName", s("Yusuf")),
            ("lastName", s("Farah")),
            ("phone", s("+252 61 555 0102")),
            ("email", s("yusuf@example.com")),
        ])),
        ("apartments", doc("a1", &[
            ("name", s("Sunrise 1A")),
            ("location", s("Hodan")),
            ("price", Value::Float(450.0)),
            ("bedrooms", Value::Int(2)),
            ("bathrooms", Value::Int(1)),
            ("size", Value::Int(80)),
            ("status", s("occupied")),
            ("details", s("Corner unit with balcony")),
            ("createdAt", days_ago(120)),
        ])),
        ("apartments", doc("a2", &[
            ("name", s("Sunrise 2B")),
            ("location", s("Hodan")),
            ("price", Value::Float(520.0)),
            ("bedrooms", Value::Int(3)),
            ("bathrooms", Value::Int(2)),
            ("size", Value::Int(110)),
            ("status", s("occupied")),
            ("details", s("")),
            ("createdAt", days_ago(110)),
        ])),
        ("apartments", doc("a3", &[
            ("name", s("Garden 3C")),
            ("location", s("Wadajir")),
            ("price", Value::Float(380.0)),
            ("bedrooms", Value::Int(1)),
            ("bathrooms", Value::Int(1)),
            ("size", Value::Int(55)),
            ("status", s("available")),
            ("details", s("Ground floor")),
            ("createdAt", days_ago(30)),
        ])),
        ("payments", doc("p1", &[
            ("userId", s("u1")),
            ("apartmentId", s("a1")),
            ("amount", Value::Float(450.0)),
            ("createdAt", days_ago(40)),
        ])),
        ("payments", doc("p2", &[
            ("userId", s("u1")),
            ("apartmentId", s("a1")),
            ("amount", s("450")),
            ("createdAt", days_ago(10)),
        ])),
        ("payments", doc("p3", &[
            ("userId", s("u2")),
            ("apartmentId", s("a2")),
            ("amount", Value::Float(520.0)),
            ("createdAt", days_ago(5)),
        ])),
        ("rentals", doc("r1", &[
            ("apartmentName", s("Sunrise 1A")),
            ("userName", s("Amina Warsame")),
            ("userId", s("u1")),
            ("tenantName", s("Amina Warsame")),
            ("rentAmount", Value::Float(450.0)),
            ("totalAmount", Value::Float(2700.0)),
            ("leaseStart", days_ago(120)),
            ("leaseEnd", Value::Timestamp(Utc::now() + Duration::days(245))),
            ("isActive", Value::Bool(true)),
            ("paymentNumber", s("PN-1001")),
            ("paymentReference", s("EVC-88213")),
            ("createdAt", days_ago(120)),
        ])),
        ("rentals", doc("r2", &[
            ("apartmentName", s("Sunrise 2B")),
            ("userName", s("Yusuf Farah")),
            ("userId", s("u2")),
            ("tenantName", s("Yusuf Farah")),
            ("rentAmount", Value::Float(520.0)),
            ("totalAmount", Value::Float(1040.0)),
            ("leaseStart", days_ago(60)),
            ("isActive", Value::Bool(true)),
            ("paymentNumber", s("PN-1002")),
            ("paymentReference", s("EVC-90117")),
            ("createdAt", days_ago(60)),
        ])),
        ("admin_notices", doc("n1", &[
            ("title", s("Water maintenance")),
            ("message", s("Water will be off on Saturday from 9 to 12.")),
            ("postedBy", s("Admin")),
            ("targetApartments", s("All")),
            ("timestamp", days_ago(3)),
        ])),
        ("identifications", doc("i1", &[
            ("responsibleName", s("Amina Warsame")),
            ("apartmentName", s("Sunrise 1A")),
            ("responsibleIdNumber", s("SO-4471902")),
            ("responsiblePhone", s("+252 61 555 0101")),
            ("responsibleWorkPlace", s("Hormuud")),
            ("status", s("Pending")),
            ("submittedAt", days_ago(2)),
        ])),
        ("material_requests", doc("m1", &[
            ("name", s("Kitchen tap")),
            ("description", s("Tap in Sunrise 2B is leaking")),
            ("status", s("pending")),
            ("createdAt", days_ago(1)),
        ])),
        ("visitors", doc("v1", &[
            ("visitor_name", s("Hodan Ali")),
            ("apartment_name", s("Sunrise 1A")),
            ("visit_reason", s("Family visit")),
            ("status", s("pending")),
            ("check_in", days_ago(0)),
        ])),
    ];

    let count = documents.len();
    for (collection, record) in documents {
        store.put(collection, record);
    }
    info!(documents = count, "demo data loaded");
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_covers_every_report_collection() {
        let store = MemoryDocumentStore::new();
        let count = load_demo(&store);
        assert_eq!(count, 14);
        for collection in [
            "users",
            "apartments",
            "payments",
            "rentals",
            "admin_notices",
            "identifications",
            "material_requests",
            "visitors",
        ] {
            assert!(store.len(collection) > 0, "{collection} is empty");
        }
    }
}
