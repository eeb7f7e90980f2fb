//! Cancellation detection endpoint

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Serialize;

use super::params::DashboardParams;
use crate::error::ApiResult;
use crate::services::cancellation_tracker::CancellationReport;
use crate::services::dashboard::snapshot_key;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CancellationsResponse {
    /// `None` when the fetch was partial and no comparison was made
    pub report: Option<CancellationReport>,
    pub warnings: Vec<String>,
}

/// GET /api/cancellations
///
/// Compares the current Bookings listing for the window with the one seen on
/// the previous call. A partial fetch leaves the stored snapshot untouched,
/// since missing pages would read as cancellations.
pub async fn get_cancellations(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> ApiResult<Json<CancellationsResponse>> {
    let window = params.window(&state.config)?;
    let batch = state.bookings.fetch(&window).await;

    if !batch.warnings.is_empty() {
        tracing::warn!(warnings = batch.warnings.len(), "Skipping cancellation comparison on partial data");
        return Ok(Json(CancellationsResponse {
            report: None,
            warnings: batch.warnings,
        }));
    }

    let key = snapshot_key(&window);
    let report = state.cancellations.observe(&key, batch.records).await;

    Ok(Json(CancellationsResponse {
        report: Some(report),
        warnings: Vec::new(),
    }))
}
