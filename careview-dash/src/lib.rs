//! careview-dash library - appointment reconciliation dashboard service
//!
//! Pulls appointments from Microsoft Bookings and Airtable, reconciles them
//! by fuzzy client name, and serves summary views as JSON.

use axum::Router;
use careview_common::TomlConfig;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod api;
pub mod error;
pub mod models;
pub mod services;

pub use error::{ApiError, ApiResult};

use services::{AirtableClient, CancellationTracker, FetchError, GraphClient, RecordSource};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration (defaults for request parameters)
    pub config: Arc<TomlConfig>,
    /// Source A: Microsoft Bookings
    pub bookings: Arc<dyn RecordSource>,
    /// Source B: Airtable
    pub airtable: Arc<dyn RecordSource>,
    /// Appointment snapshots for cancellation detection
    pub cancellations: Arc<CancellationTracker>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Create new application state around explicit sources
    pub fn new(
        config: TomlConfig,
        bookings: Arc<dyn RecordSource>,
        airtable: Arc<dyn RecordSource>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            bookings,
            airtable,
            cancellations: Arc::new(CancellationTracker::new()),
            startup_time: Utc::now(),
        }
    }

    /// Build the HTTP clients described by the configuration
    pub fn from_config(config: TomlConfig) -> Result<Self, FetchError> {
        let offset = config.display.utc_offset_minutes;
        let bookings = Arc::new(GraphClient::new(&config.graph)?);
        let airtable = Arc::new(AirtableClient::new(&config.airtable, offset)?);
        Ok(Self::new(config, bookings, airtable))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let api = Router::new()
        .route("/api/buildinfo", get(api::get_build_info))
        .route("/api/businesses", get(api::list_businesses))
        .route("/api/dashboard", get(api::get_dashboard))
        .route("/api/reconcile", post(api::post_reconcile))
        .route("/api/phone/format", post(api::format_phones))
        .route("/api/contacts/analyze", post(api::analyze_contacts))
        .route("/api/kpi/scores", post(api::score_kpis))
        .route("/api/cancellations", get(api::get_cancellations));

    Router::new()
        .merge(api)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
