//! Dashboard and business directory endpoints

use axum::{
    extract::{Query, State},
    Json,
};

use super::params::DashboardParams;
use crate::error::ApiResult;
use crate::services::dashboard::{build_dashboard, group_businesses, BusinessGroup, DashboardData};
use crate::AppState;

/// GET /api/dashboard
///
/// Fetches both sources, reconciles them and returns the merged table with
/// analytics. Upstream trouble shows up in `warnings`, not as an error status.
pub async fn get_dashboard(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> ApiResult<Json<DashboardData>> {
    let window = params.window(&state.config)?;
    let reconcile = params.reconcile_config(&state.config)?;

    let data = build_dashboard(
        state.bookings.as_ref(),
        state.airtable.as_ref(),
        &window,
        &reconcile,
    )
    .await;

    Ok(Json(data))
}

/// GET /api/businesses
///
/// Bookings businesses grouped by two-letter name prefix.
pub async fn list_businesses(State(state): State<AppState>) -> ApiResult<Json<Vec<BusinessGroup>>> {
    let units = state.bookings.business_units().await?;
    tracing::debug!(count = units.len(), "Listed businesses");
    Ok(Json(group_businesses(units)))
}
