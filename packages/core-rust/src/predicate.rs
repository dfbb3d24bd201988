//! User-supplied report filter: free-text token plus inclusive date range.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::normalize;
use crate::types::Record;

/// Inclusive calendar-date range. Either bound may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    #[must_use]
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// `true` when neither bound is set.
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// `ts` is on or after the start day and on or before the end day, the
    /// end day included through its last instant.
    #[must_use]
    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        let after_start = self
            .start
            .map_or(true, |start| *ts >= normalize::start_of_day(start));
        let before_end = self
            .end
            .map_or(true, |end| *ts < normalize::end_of_day_exclusive(end));
        after_start && before_end
    }
}

/// The current filter of a report view.
///
/// Both components are optional; an absent component matches every row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterPredicate {
    /// Free-text token, matched case-insensitively as a substring.
    pub text: Option<String>,
    /// Date range matched against the report's timestamp field.
    pub date_range: DateRange,
}

impl FilterPredicate {
    #[must_use]
    pub fn new(text: Option<String>, date_range: DateRange) -> Self {
        Self { text, date_range }
    }

    /// Predicate with only a text component.
    #[must_use]
    pub fn text(token: impl Into<String>) -> Self {
        Self {
            text: Some(token.into()),
            date_range: DateRange::default(),
        }
    }

    /// Predicate with only a date component.
    #[must_use]
    pub fn dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self {
            text: None,
            date_range: DateRange::new(start, end),
        }
    }

    /// Normalized search token: trimmed and lowercased, `None` when blank.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
    }

    /// Text component: passes when the token is blank or any searchable
    /// field contains it.
    #[must_use]
    pub fn matches_text(&self, row: &Record, searchable_fields: &[String]) -> bool {
        match self.token() {
            None => true,
            Some(token) => searchable_fields
                .iter()
                .any(|field| row.text(field).to_lowercase().contains(&token)),
        }
    }

    /// Date component: passes when no bound is set, when the row has no
    /// parseable timestamp, or when the timestamp lies within the range.
    #[must_use]
    pub fn matches_date(&self, row: &Record, timestamp_field: Option<&str>) -> bool {
        if self.date_range.is_unbounded() {
            return true;
        }
        match timestamp_field.and_then(|field| row.timestamp(field)) {
            Some(ts) => self.date_range.contains(&ts),
            None => true,
        }
    }

    /// Both components together.
    #[must_use]
    pub fn matches(
        &self,
        row: &Record,
        searchable_fields: &[String],
        timestamp_field: Option<&str>,
    ) -> bool {
        self.matches_text(row, searchable_fields) && self.matches_date(row, timestamp_field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Fields, Value};

    fn row(fields: &[(&str, Value)]) -> Record {
        let fields: Fields = fields
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect();
        Record::new("r", fields)
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn searchable() -> Vec<String> {
        vec!["apt".to_string(), "name".to_string()]
    }

    #[test]
    fn blank_token_passes_everything() {
        let r = row(&[("apt", Value::from("X"))]);
        assert!(FilterPredicate::default().matches_text(&r, &searchable()));
        assert!(FilterPredicate::text("   ").matches_text(&r, &searchable()));
    }

    #[test]
    fn token_matches_any_field_case_insensitively() {
        let r = row(&[("apt", Value::from("Block X")), ("name", Value::from("Amina"))]);
        assert!(FilterPredicate::text("x").matches_text(&r, &searchable()));
        assert!(FilterPredicate::text(" AMI ").matches_text(&r, &searchable()));
        assert!(!FilterPredicate::text("z").matches_text(&r, &searchable()));
    }

    #[test]
    fn non_string_fields_never_match() {
        let r = row(&[("apt", Value::Int(12))]);
        assert!(!FilterPredicate::text("12").matches_text(&r, &searchable()));
    }

    #[test]
    fn end_bound_includes_whole_day() {
        let predicate = FilterPredicate::dates(None, Some(day(2024, 1, 5)));
        let late = row(&[("ts", Value::from("2024-01-05T23:59:59"))]);
        let next = row(&[("ts", Value::from("2024-01-06T00:00:01"))]);
        assert!(predicate.matches_date(&late, Some("ts")));
        assert!(!predicate.matches_date(&next, Some("ts")));
    }

    #[test]
    fn start_bound_is_inclusive_from_midnight() {
        let predicate = FilterPredicate::dates(Some(day(2024, 1, 5)), None);
        let midnight = row(&[("ts", Value::from("2024-01-05T00:00:00Z"))]);
        let before = row(&[("ts", Value::from("2024-01-04T23:59:59Z"))]);
        assert!(predicate.matches_date(&midnight, Some("ts")));
        assert!(!predicate.matches_date(&before, Some("ts")));
    }

    #[test]
    fn unparseable_timestamp_passes_date_filter() {
        let predicate = FilterPredicate::dates(Some(day(2024, 1, 5)), Some(day(2024, 1, 6)));
        let garbage = row(&[("ts", Value::from("not a date"))]);
        let missing = row(&[]);
        assert!(predicate.matches_date(&garbage, Some("ts")));
        assert!(predicate.matches_date(&missing, Some("ts")));
        assert!(predicate.matches_date(&missing, None));
    }

    #[test]
    fn both_components_must_pass() {
        let predicate = FilterPredicate::new(
            Some("x".to_string()),
            DateRange::new(Some(day(2024, 1, 1)), None),
        );
        let old = row(&[("apt", Value::from("X")), ("ts", Value::from("2023-12-31"))]);
        let new = row(&[("apt", Value::from("X")), ("ts", Value::from("2024-01-02"))]);
        assert!(!predicate.matches(&old, &searchable(), Some("ts")));
        assert!(predicate.matches(&new, &searchable(), Some("ts")));
    }
}
