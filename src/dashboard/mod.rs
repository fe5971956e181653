//! Dashboard module
//!
//! Turns the loaded sales data into KPI cards, charts and tables for the
//! selected filters, and serves the dashboard page.

mod aggregation;
mod cards;
mod charts;
mod filters;
mod handlers;
mod receivables;
mod report;
mod tables;

pub use aggregation::aggregate;
pub use filters::{Aggregation, FilterSpec, Selection};
pub use handlers::{get_dashboard_page, update_dashboard_filters};
pub use report::DashboardReport;
