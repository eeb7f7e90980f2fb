//! Phone formatting and contact duplicate detection endpoints

use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ApiError, ApiResult};
use crate::models::{Contact, ContactReport};
use crate::services::contact_dedup::{self, DedupOptions};
use crate::services::phone_formatter::{format_batch, status_counts, FormattedPhone};

#[derive(Debug, Deserialize)]
pub struct PhoneFormatRequest {
    pub numbers: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PhoneFormatResponse {
    pub results: Vec<FormattedPhone>,
    pub status_counts: BTreeMap<String, usize>,
}

/// POST /api/phone/format
pub async fn format_phones(Json(request): Json<PhoneFormatRequest>) -> Json<PhoneFormatResponse> {
    let results = format_batch(request.numbers.as_slice());
    let status_counts = status_counts(&results);
    Json(PhoneFormatResponse {
        results,
        status_counts,
    })
}

#[derive(Debug, Deserialize)]
pub struct ContactsRequest {
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub options: DedupOptions,
}

/// POST /api/contacts/analyze
pub async fn analyze_contacts(Json(request): Json<ContactsRequest>) -> ApiResult<Json<ContactReport>> {
    if request.options.fuzzy_threshold > 100 {
        return Err(ApiError::BadRequest(format!(
            "fuzzy_threshold must be 0-100, got {}",
            request.options.fuzzy_threshold
        )));
    }

    Ok(Json(contact_dedup::analyze_contacts(
        &request.contacts,
        &request.options,
    )))
}
