//! Reconciliation over caller-supplied records

use axum::{extract::State, Json};
use careview_common::config::ClaimPolicy;
use serde::{Deserialize, Serialize};

use super::params::DashboardParams;
use crate::error::{ApiError, ApiResult};
use crate::models::{Record, ReconciliationReport};
use crate::services::analytics::{self, Analytics};
use crate::services::reconcile;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ReconcileRequest {
    /// Source A records (normally Bookings)
    pub source_a: Vec<Record>,
    /// Source B records (normally Airtable)
    pub source_b: Vec<Record>,
    pub threshold: Option<u8>,
    pub tolerance_hours: Option<i64>,
    pub same_day: Option<bool>,
    pub claim_policy: Option<ClaimPolicy>,
}

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    #[serde(flatten)]
    pub report: ReconciliationReport,
    pub analytics: Analytics,
}

/// POST /api/reconcile
pub async fn post_reconcile(
    State(state): State<AppState>,
    Json(request): Json<ReconcileRequest>,
) -> ApiResult<Json<ReconcileResponse>> {
    if request.source_a.is_empty() && request.source_b.is_empty() {
        return Err(ApiError::BadRequest("no records supplied".to_string()));
    }

    let params = DashboardParams {
        threshold: request.threshold,
        tolerance_hours: request.tolerance_hours,
        same_day: request.same_day,
        claim_policy: request.claim_policy,
        ..DashboardParams::default()
    };
    let config = params.reconcile_config(&state.config)?;

    let report = reconcile(request.source_a, request.source_b, &config);
    let analytics = analytics::compute(&report.merged, state.config.display.utc_offset_minutes);

    Ok(Json(ReconcileResponse { report, analytics }))
}
