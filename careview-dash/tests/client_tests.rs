//! Integration tests for the upstream HTTP clients
//!
//! Each test starts a local axum server on 127.0.0.1:0 that imitates the
//! Graph or Airtable pagination scheme, then points a real client at it.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use careview_common::config::{AirtableConfig, GraphConfig};
use careview_dash::models::{AppointmentStatus, SourceTag};
use careview_dash::services::source::{FetchError, FetchWindow, RecordSource};
use careview_dash::services::{AirtableClient, GraphClient};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Mock server behaviour knobs
#[derive(Clone)]
struct Mock {
    base: String,
    fail_second_page: bool,
    /// Number of initial requests answered with 503
    flaky_first: usize,
    hits: Arc<AtomicUsize>,
}

async fn spawn(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn authorized(headers: &HeaderMap, token: &str) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", token))
        .unwrap_or(false)
}

fn january() -> FetchWindow {
    FetchWindow {
        start: "2024-01-01".parse().unwrap(),
        end: "2024-01-31".parse().unwrap(),
        business: None,
        utc_offset_minutes: 0,
    }
}

// =============================================================================
// Graph mock
// =============================================================================

async fn graph_businesses(headers: HeaderMap) -> Response {
    if !authorized(&headers, "graph-token") {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({
        "value": [
            {"id": "north@clinic.test", "displayName": "North Clinic"},
            {"id": "south@clinic.test", "displayName": "South Clinic"}
        ]
    }))
    .into_response()
}

async fn graph_appointments(
    State(mock): State<Mock>,
    Path(business): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers, "graph-token") {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if business.starts_with("south") {
        return Json(json!({"value": [
            {"id": "s1", "customerName": "Sam Lee",
             "startDateTime": {"dateTime": "2024-01-08T09:00:00.0000000", "timeZone": "UTC"}}
        ]}))
        .into_response();
    }

    Json(json!({
        "value": [
            {"id": "n1", "customerName": "Jane Doe",
             "startDateTime": {"dateTime": "2024-01-05T10:00:00.0000000", "timeZone": "UTC"},
             "endDateTime": {"dateTime": "2024-01-05T10:30:00.0000000", "timeZone": "UTC"}},
            {"id": "n-old", "customerName": "Old Visit",
             "startDateTime": {"dateTime": "2023-12-01T10:00:00.0000000", "timeZone": "UTC"}}
        ],
        "@odata.nextLink": format!("{}/next-page", mock.base)
    }))
    .into_response()
}

async fn graph_next_page(State(mock): State<Mock>, headers: HeaderMap) -> Response {
    if !authorized(&headers, "graph-token") {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if mock.fail_second_page {
        return (StatusCode::INTERNAL_SERVER_ERROR, "page store offline").into_response();
    }
    Json(json!({"value": [
        {"id": "n2", "customerName": "Ana Ruiz", "cancelledDateTime": "2024-01-02T00:00:00Z",
         "startDateTime": {"dateTime": "2024-01-06T10:00:00.0000000", "timeZone": "UTC"}},
        {"customers": "not-a-list"}
    ]}))
    .into_response()
}

async fn graph_client(fail_second_page: bool) -> GraphClient {
    // Bind first so the mock knows its own address for nextLink
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base = format!("http://{}/v1.0", addr);

    let mock = Mock {
        base: base.clone(),
        fail_second_page,
        flaky_first: 0,
        hits: Arc::new(AtomicUsize::new(0)),
    };
    let router = Router::new()
        .route("/v1.0/solutions/bookingBusinesses", get(graph_businesses))
        .route(
            "/v1.0/solutions/bookingBusinesses/:business/appointments",
            get(graph_appointments),
        )
        .route("/v1.0/next-page", get(graph_next_page))
        .with_state(mock);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let config = GraphConfig {
        base_url: base,
        access_token: Some("graph-token".to_string()),
        ..GraphConfig::default()
    };
    GraphClient::new(&config).unwrap()
}

#[tokio::test]
async fn test_graph_follows_next_link() {
    let client = graph_client(false).await;

    let outcome = client.fetch_appointments("north@clinic.test").await.unwrap();
    assert_eq!(outcome.pages_fetched, 2);
    assert_eq!(outcome.items.len(), 4);
    assert!(!outcome.is_partial());
}

#[tokio::test]
async fn test_graph_batch_normalizes_and_filters() {
    let client = graph_client(false).await;

    let batch = client.fetch(&january()).await;
    assert_eq!(batch.source, SourceTag::Bookings);
    assert!(batch.warnings.is_empty());

    let ids: Vec<&str> = batch.records.iter().map(|r| r.id.as_str()).collect();
    // n-old is outside January; the malformed item is rejected
    assert_eq!(ids, vec!["n1", "n2", "s1"]);
    assert_eq!(batch.rejected.len(), 1);
    assert_eq!(batch.records[0].business.as_deref(), Some("North Clinic"));
    assert_eq!(batch.records[0].duration_minutes, Some(30.0));
    assert_eq!(batch.records[1].status, AppointmentStatus::Cancelled);
}

#[tokio::test]
async fn test_graph_business_filter() {
    let client = graph_client(false).await;

    let window = FetchWindow {
        business: Some("south clinic".to_string()),
        ..january()
    };
    let batch = client.fetch(&window).await;
    let ids: Vec<&str> = batch.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["s1"]);
}

#[tokio::test]
async fn test_graph_partial_page_keeps_first_page() {
    let client = graph_client(true).await;

    let outcome = client.fetch_appointments("north@clinic.test").await.unwrap();
    assert_eq!(outcome.pages_fetched, 1);
    assert_eq!(outcome.items.len(), 2);
    assert!(outcome.is_partial());

    let batch = client.fetch(&january()).await;
    assert_eq!(batch.warnings.len(), 1);
    assert!(batch.warnings[0].starts_with("North Clinic"));
    let ids: Vec<&str> = batch.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["n1", "s1"]);
}

#[tokio::test]
async fn test_graph_bad_token() {
    let addr = spawn(Router::new().route("/v1.0/solutions/bookingBusinesses", get(graph_businesses))).await;
    let config = GraphConfig {
        base_url: format!("http://{}/v1.0", addr),
        access_token: Some("wrong".to_string()),
        ..GraphConfig::default()
    };
    let client = GraphClient::new(&config).unwrap();

    assert!(matches!(client.list_businesses().await, Err(FetchError::Unauthorized(_))));

    let batch = client.fetch(&january()).await;
    assert!(batch.records.is_empty());
    assert_eq!(batch.warnings.len(), 1);
}

#[tokio::test]
async fn test_graph_business_units() {
    let client = graph_client(false).await;
    let units = client.business_units().await.unwrap();
    assert_eq!(units.len(), 2);
    assert_eq!(units[0].name, "North Clinic");
}

async fn graph_looping_page(State(base): State<String>, headers: HeaderMap) -> Response {
    if !authorized(&headers, "graph-token") {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({
        "value": [{"id": "loop-1", "customerName": "Jane Doe"}],
        "@odata.nextLink": format!("{}/loop", base)
    }))
    .into_response()
}

async fn graph_foreign_link(headers: HeaderMap) -> Response {
    if !authorized(&headers, "graph-token") {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({
        "value": [{"id": "f-1", "customerName": "Jane Doe"}],
        "@odata.nextLink": "http://203.0.113.7/collect"
    }))
    .into_response()
}

/// Graph mock whose appointment pages return hostile nextLinks
async fn hostile_graph_client() -> GraphClient {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base = format!("http://{}/v1.0", addr);

    let router = Router::new()
        .route(
            "/v1.0/solutions/bookingBusinesses/loop@clinic.test/appointments",
            get(graph_looping_page),
        )
        .route("/v1.0/loop", get(graph_looping_page))
        .route(
            "/v1.0/solutions/bookingBusinesses/foreign@clinic.test/appointments",
            get(graph_foreign_link),
        )
        .with_state(base.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let config = GraphConfig {
        base_url: base,
        access_token: Some("graph-token".to_string()),
        ..GraphConfig::default()
    };
    GraphClient::new(&config).unwrap()
}

#[tokio::test]
async fn test_graph_repeated_next_link_stops() {
    let client = hostile_graph_client().await;

    let outcome = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        client.fetch_appointments("loop@clinic.test"),
    )
    .await
    .expect("pagination should terminate")
    .unwrap();

    // Appointments page, then /loop once; the second /loop link is refused
    assert_eq!(outcome.pages_fetched, 2);
    assert!(outcome.is_partial());
    assert!(outcome.warnings[0].contains("repeats"));
}

#[tokio::test]
async fn test_graph_foreign_next_link_refused() {
    let client = hostile_graph_client().await;

    let outcome = client.fetch_appointments("foreign@clinic.test").await.unwrap();
    assert_eq!(outcome.pages_fetched, 1);
    assert_eq!(outcome.items.len(), 1);
    assert!(outcome.warnings[0].contains("leaves"));
}

// =============================================================================
// Airtable mock
// =============================================================================

async fn airtable_table(
    State(mock): State<Mock>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers, "air-key") {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let hit = mock.hits.fetch_add(1, Ordering::SeqCst);
    if hit < mock.flaky_first {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    match query.get("offset").map(String::as_str) {
        None => Json(json!({
            "records": [
                {"id": "rec1", "createdTime": "2024-01-01T00:00:00.000Z",
                 "fields": {"Client": "Jane Doe", "Date_of_Service": "2024-01-05", "Status": "Completed", "Site": "North Clinic"}},
                {"id": "rec2", "fields": {"Client": "No Date"}}
            ],
            "offset": "page2"
        }))
        .into_response(),
        Some("page2") if mock.fail_second_page => {
            (StatusCode::INTERNAL_SERVER_ERROR, "unavailable").into_response()
        }
        Some("page2") => Json(json!({
            "records": [
                {"id": "rec3", "fields": {"Client": "Sam Lee", "Date_of_Service": "2024-01-09T14:00:00.000Z", "Status": "no show"}},
                {"fields": {"Client": "Missing Id"}}
            ]
        }))
        .into_response(),
        Some(_) => StatusCode::UNPROCESSABLE_ENTITY.into_response(),
    }
}

async fn airtable_client(fail_second_page: bool, flaky_first: usize) -> (AirtableClient, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let mock = Mock {
        base: String::new(),
        fail_second_page,
        flaky_first,
        hits: hits.clone(),
    };
    let addr = spawn(
        Router::new()
            .route("/v0/appBase/Visits", get(airtable_table))
            .with_state(mock),
    )
    .await;

    let config = AirtableConfig {
        api_url: format!("http://{}/v0", addr),
        api_key: Some("air-key".to_string()),
        base_id: Some("appBase".to_string()),
        table: Some("Visits".to_string()),
        retry_attempts: 3,
        retry_base_ms: 10,
        ..AirtableConfig::default()
    };
    (AirtableClient::new(&config, 0).unwrap(), hits)
}

#[tokio::test]
async fn test_airtable_offset_pagination() {
    let (client, hits) = airtable_client(false, 0).await;

    let outcome = client.fetch_records().await.unwrap();
    assert_eq!(outcome.pages_fetched, 2);
    assert_eq!(outcome.items.len(), 4);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_airtable_batch_normalizes() {
    let (client, _) = airtable_client(false, 0).await;

    let batch = client.fetch(&january()).await;
    let ids: Vec<&str> = batch.records.iter().map(|r| r.id.as_str()).collect();
    // Undated rec2 passes the window so it can be reported downstream
    assert_eq!(ids, vec!["rec1", "rec2", "rec3"]);
    assert_eq!(batch.records[0].status, AppointmentStatus::Completed);
    assert_eq!(batch.records[2].status, AppointmentStatus::NoShow);
    assert!(batch.records[1].timestamp.is_none());
    assert_eq!(batch.rejected.len(), 1);
}

#[tokio::test]
async fn test_airtable_retries_transient_failures() {
    let (client, hits) = airtable_client(false, 2).await;

    let outcome = client.fetch_records().await.unwrap();
    assert_eq!(outcome.pages_fetched, 2);
    // Two 503s, then page one, then page two
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_airtable_gives_up_after_retry_budget() {
    let (client, hits) = airtable_client(false, 10).await;

    let result = client.fetch_records().await;
    assert!(matches!(result, Err(FetchError::ApiError(503, _))));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_airtable_partial_page_keeps_first_page() {
    let (client, hits) = airtable_client(true, 0).await;

    let outcome = client.fetch_records().await.unwrap();
    assert_eq!(outcome.pages_fetched, 1);
    assert_eq!(outcome.items.len(), 2);
    assert!(outcome.is_partial());
    // Page two was retried before giving up
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}
