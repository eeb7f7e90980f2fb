//! HTTP API handlers for careview-dash

pub mod buildinfo;
pub mod cancellations;
pub mod contacts;
pub mod dashboard;
pub mod health;
pub mod kpi;
pub mod params;
pub mod reconcile;

pub use buildinfo::get_build_info;
pub use cancellations::get_cancellations;
pub use contacts::{analyze_contacts, format_phones};
pub use dashboard::{get_dashboard, list_businesses};
pub use health::health_routes;
pub use kpi::score_kpis;
pub use reconcile::post_reconcile;
