//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use pipeline::PipelineConfig;
use store::{
    IngredientId, InMemoryStore, InventoryItem, InventoryItemId, InventorySnapshot,
    InventorySnapshotLine, LocationId, Money, ReorderPolicy, SnapshotId, TenantId,
    TheoreticalUsageDaily, VendorId, VendorItem,
};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup_with_store() -> (axum::Router, InMemoryStore) {
    let store = InMemoryStore::new();
    let state = api::create_state(store.clone(), PipelineConfig::default());
    let app = api::create_app(Arc::clone(&state), get_metrics_handle());
    (app, store)
}

fn setup() -> axum::Router {
    setup_with_store().0
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, d).unwrap()
}

/// One stocked item with a week of usage, two counts, and a reorder policy.
async fn seed_location(store: &InMemoryStore) -> (TenantId, LocationId) {
    let tenant = TenantId::new();
    let location = LocationId::new();
    let ingredient = IngredientId::new();
    let item = InventoryItemId::new();

    store
        .add_inventory_item(InventoryItem {
            id: item,
            tenant_id: tenant,
            location_id: location,
            ingredient_id: ingredient,
            name: "House Vodka 1L".to_string(),
            container_type: "bottle".to_string(),
            container_size_oz: 33.8,
            active: true,
        })
        .await;
    store
        .seed_theoretical_usage(
            (1..=7)
                .map(|d| TheoreticalUsageDaily {
                    tenant_id: tenant,
                    location_id: location,
                    usage_date: date(3, d),
                    ingredient_id: ingredient,
                    usage_oz: 4.0,
                })
                .collect(),
        )
        .await;
    for (day, remaining) in [(1, 60.0), (7, 30.0)] {
        store
            .record_snapshot(InventorySnapshot {
                id: SnapshotId::new(),
                tenant_id: tenant,
                location_id: location,
                count_date: date(3, day),
                lines: vec![InventorySnapshotLine {
                    inventory_item_id: item,
                    actual_remaining_oz: remaining,
                }],
            })
            .await;
    }
    store
        .set_reorder_policy(ReorderPolicy {
            tenant_id: tenant,
            location_id: location,
            inventory_item_id: item,
            reorder_point_oz: 40.0,
            par_level_oz: 100.0,
            lead_time_days: 2,
            safety_buffer_days: 1,
        })
        .await;
    store
        .add_vendor_item(VendorItem {
            vendor_id: VendorId::new(),
            inventory_item_id: item,
            vendor_sku: "VOD-1L".to_string(),
            unit_size_oz: 33.8,
            unit_price: Money::from_cents(1599),
            lead_time_days: None,
            preferred: false,
        })
        .await;

    (tenant, location)
}

#[tokio::test]
async fn test_health_check() {
    let response = setup().oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_usage_job_returns_summary() {
    let (app, store) = setup_with_store();

    let response = app
        .oneshot(post_json(
            "/jobs/usage",
            serde_json::json!({ "from": "2024-03-01", "to": "2024-03-07" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "completed");
    assert_eq!(json["summary"]["rowsUpserted"], 0);
    assert!(json["jobRunId"].is_string());
    assert_eq!(store.job_runs().await.len(), 1);
}

#[tokio::test]
async fn test_inverted_usage_range_is_bad_request() {
    let (app, store) = setup_with_store();

    let response = app
        .oneshot(post_json(
            "/jobs/usage",
            serde_json::json!({ "from": "2024-03-07", "to": "2024-03-01" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("after"));
    assert!(store.job_runs().await.is_empty());
}

#[tokio::test]
async fn test_missing_run_date_is_rejected() {
    let response = setup()
        .oneshot(post_json("/jobs/forecast", serde_json::json!({})))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_forecast_variance_reorder_chain() {
    let (app, store) = setup_with_store();
    let (tenant, location) = seed_location(&store).await;
    let scope = serde_json::json!({ "tenantId": tenant, "locationId": location });

    let mut forecast = scope.clone();
    forecast["runDate"] = serde_json::json!("2024-03-08");
    let response = app
        .clone()
        .oneshot(post_json("/jobs/forecast", forecast))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["summary"]["rowsWritten"], 14);

    let response = app
        .clone()
        .oneshot(post_json("/jobs/variance", scope.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["summary"]["flagsInserted"], 1);

    let mut reorder = scope.clone();
    reorder["runDate"] = serde_json::json!("2024-03-08");
    let response = app
        .clone()
        .oneshot(post_json("/jobs/reorder", reorder))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["summary"]["ordersDrafted"], 1);
    assert_eq!(json["summary"]["linesDrafted"], 1);
}

#[tokio::test]
async fn test_get_job_run() {
    let (app, _store) = setup_with_store();

    let response = app
        .clone()
        .oneshot(post_json("/jobs/variance", serde_json::json!({})))
        .await
        .unwrap();
    let job_run_id = body_json(response).await["jobRunId"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .oneshot(get(&format!("/job-runs/{job_run_id}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["jobName"], "variance_reconciliation");
    assert_eq!(json["status"], "completed");
    assert!(json["finishedAt"].is_string());
}

#[tokio::test]
async fn test_unknown_job_run_is_not_found() {
    let response = setup()
        .oneshot(get(&format!("/job-runs/{}", uuid::Uuid::new_v4())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_job_run_id_is_bad_request() {
    let response = setup().oneshot(get("/job-runs/not-a-uuid")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _store) = setup_with_store();

    app.clone()
        .oneshot(post_json("/jobs/variance", serde_json::json!({})))
        .await
        .unwrap();
    let response = app.oneshot(get("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("pipeline_job_runs_total"));
}
