//! Leader performance scoring endpoint

use axum::{extract::State, Json};
use careview_common::config::KpiWeights;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::services::airtable_client::AirtableRecord;
use crate::services::kpi::{score_leaders, KpiEntry, KpiFilter, LeaderScore};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct KpiRequest {
    /// Rows of the daily KPI report table, as Airtable returns them
    pub records: Vec<AirtableRecord>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub leader: Option<String>,
    pub site: Option<String>,
    /// Overrides `[kpi.weights]`
    pub weights: Option<KpiWeights>,
}

#[derive(Debug, Serialize)]
pub struct KpiResponse {
    /// Reports left after filtering
    pub entries: usize,
    pub scores: Vec<LeaderScore>,
}

/// POST /api/kpi/scores
pub async fn score_kpis(
    State(state): State<AppState>,
    Json(request): Json<KpiRequest>,
) -> ApiResult<Json<KpiResponse>> {
    let weights = request
        .weights
        .unwrap_or_else(|| state.config.kpi.weights.clone());
    if weights.total().is_none() {
        return Err(ApiError::BadRequest(
            "weights must be non-negative with a positive sum".to_string(),
        ));
    }

    if let (Some(start), Some(end)) = (request.start, request.end) {
        if start > end {
            return Err(ApiError::BadRequest(format!(
                "start ({}) is after end ({})",
                start, end
            )));
        }
    }

    let filter = KpiFilter {
        start: request.start,
        end: request.end,
        leader: request.leader,
        site: request.site,
    };
    let fields = &state.config.kpi.fields;
    let entries: Vec<KpiEntry> = request
        .records
        .iter()
        .map(|rec| KpiEntry::from_airtable(rec, fields))
        .filter(|entry| filter.accepts(entry))
        .collect();

    let scores = score_leaders(&entries, &weights);

    Ok(Json(KpiResponse {
        entries: entries.len(),
        scores,
    }))
}
