//! `tenantdesk` core: record model, normalization, report schemas, and the
//! pure filter/aggregate view.

pub mod lease;
pub mod normalize;
pub mod predicate;
pub mod schema;
pub mod status;
pub mod types;
pub mod view;

pub use lease::{LeaseDisplay, LeaseIndex, LeaseInfo};
pub use predicate::{DateRange, FilterPredicate};
pub use schema::{ContactField, GroupSpec, ReportSchema};
pub use status::{ApprovalKind, ApprovalStatus};
pub use types::{Fields, Record, Value};
pub use view::{Aggregates, Group, Occupancy, ReportOutput};

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
