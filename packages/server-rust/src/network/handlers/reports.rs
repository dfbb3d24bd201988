//! Report queries over the engine's shared views.
//!
//! Each request evaluates its own predicate against the shared view's rows,
//! so concurrent callers with different filters never disturb each other.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tenantdesk_core::normalize::parse_date;
use tenantdesk_core::{DateRange, FilterPredicate, Group, Occupancy, Record};
use tracing::debug;

use super::{ApiError, AppState};
use crate::catalog::ReportKind;
use crate::report::{LoadingState, ReportState};

/// `?q=&start=YYYY-MM-DD&end=YYYY-MM-DD`; blank values are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReportParams {
    pub q: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl ReportParams {
    fn predicate(&self) -> Result<FilterPredicate, ApiError> {
        let text = non_blank(self.q.as_deref()).map(ToString::to_string);
        let start = date_param("start", self.start.as_deref())?;
        let end = date_param("end", self.end.as_deref())?;
        Ok(FilterPredicate::new(text, DateRange::new(start, end)))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn date_param(name: &str, value: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    non_blank(value)
        .map(|raw| {
            parse_date(raw).ok_or_else(|| {
                ApiError::BadRequest(format!("{name} must be a date in YYYY-MM-DD form"))
            })
        })
        .transpose()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub kind: ReportKind,
    pub loading: LoadingState,
    pub generation: u64,
    pub total: f64,
    pub total_formatted: String,
    pub rows: Vec<Record>,
    pub groups: Vec<Group>,
    pub occupancy: Vec<Occupancy>,
}

impl From<ReportState> for ReportResponse {
    fn from(state: ReportState) -> Self {
        let aggregates = state.output.aggregates;
        Self {
            kind: state.kind,
            loading: state.loading,
            generation: state.generation,
            total: aggregates.total,
            total_formatted: aggregates.formatted_total(),
            rows: state.output.visible_rows,
            groups: aggregates.groups,
            occupancy: aggregates.occupancy,
        }
    }
}

/// `GET /api/reports/{kind}`
///
/// Opens the shared view on first use and waits briefly for its first
/// snapshot; a view still loading after that answers with `loading` state.
/// A view whose subscription failed answers 503.
pub async fn report_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<ReportParams>,
) -> Result<Json<ReportResponse>, ApiError> {
    let kind: ReportKind = kind.parse()?;
    let predicate = params.predicate()?;

    let view = state.engine.shared(kind);
    if !view.wait_until_settled(state.engine.config().ready_timeout).await {
        debug!(report = %kind, "report still loading");
    }
    let report = view.query(&predicate);
    if let LoadingState::Error(message) = &report.loading {
        return Err(ApiError::Unavailable(message.clone()));
    }
    Ok(Json(report.into()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use serde_json::json;

    use super::*;
    use crate::network::handlers::test_support;
    use crate::store::MemoryDocumentStore;

    fn record(value: serde_json::Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    fn params(q: &str, start: &str, end: &str) -> Query<ReportParams> {
        Query(ReportParams {
            q: Some(q.to_string()),
            start: Some(start.to_string()),
            end: Some(end.to_string()),
        })
    }

    #[tokio::test]
    async fn payments_report_joins_filters_and_totals() {
        let store = Arc::new(MemoryDocumentStore::new());
        store.put("users", record(json!({"id": "u1", "fullName": "Ann Lee"})));
        store.put("apartments", record(json!({"id": "a1", "name": "A"})));
        store.put("apartments", record(json!({"id": "a2", "name": "B"})));
        store.put(
            "payments",
            record(json!({"id": "p1", "userId": "u1", "apartmentId": "a1",
                "amount": "100", "createdAt": "2024-03-01T10:00:00Z"})),
        );
        store.put(
            "payments",
            record(json!({"id": "p2", "userId": "u1", "apartmentId": "a2",
                "amount": 0.5, "createdAt": "2024-03-02T10:00:00Z"})),
        );
        store.put(
            "rentals",
            record(json!({"id": "r1", "apartmentName": "A", "tenantName": "Ann Lee",
                "isActive": true})),
        );
        let state = test_support::state(store);

        let all = report_handler(
            State(state.clone()),
            Path("payments".to_string()),
            params("", "", ""),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(all.loading, LoadingState::Ready);
        assert_eq!(all.rows.len(), 2);
        assert!((all.total - 100.5).abs() < f64::EPSILON);
        assert_eq!(all.total_formatted, "$100.50");
        assert_eq!(all.groups.len(), 1);
        assert_eq!(all.groups[0].count, 2);

        // The lease index arrives on its own subscription.
        let mut rx = state.engine.shared(ReportKind::Payments).watch();
        tokio::time::timeout(
            std::time::Duration::from_secs(2),
            rx.wait_for(|s| {
                s.output
                    .aggregates
                    .occupancy
                    .iter()
                    .any(|o| o.lease.tenant_name == "Ann Lee")
            }),
        )
        .await
        .unwrap()
        .unwrap();

        let march_first = report_handler(
            State(state),
            Path("payments".to_string()),
            params("ann", "2024-03-01", "2024-03-01"),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(march_first.rows.len(), 1);
        assert!((march_first.total - 100.0).abs() < f64::EPSILON);
        assert_eq!(march_first.occupancy[0].apartment_name, "A");
        assert_eq!(march_first.occupancy[0].lease.tenant_name, "Ann Lee");
    }

    #[tokio::test]
    async fn unknown_report_is_not_found() {
        let state = test_support::state(Arc::new(MemoryDocumentStore::new()));
        let err = report_handler(State(state), Path("ledger".to_string()), params("", "", ""))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn failed_view_is_unavailable() {
        let store = Arc::new(MemoryDocumentStore::new());
        store.set_available(false);
        let state = test_support::state(store);
        let err = report_handler(State(state), Path("visitors".to_string()), params("", "", ""))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn malformed_date_is_bad_request() {
        let state = test_support::state(Arc::new(MemoryDocumentStore::new()));
        let err = report_handler(
            State(state),
            Path("notices".to_string()),
            params("", "03/01/2024", ""),
        )
        .await
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
