use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::Utc;
use tower::ServiceExt;

use publisher_api::{create_routes, AppState};
use publisher_domain::AnalyticsRepository;
use publisher_scheduler::{
    AnalyticsService, PublishScheduler, RetryPolicy, SchedulerSettings,
};
use publisher_testing_utils::{
    MemoryAnalyticsRepository, MemoryPublishTaskRepository, MemoryTimeIndex, PublishTaskBuilder,
    StubPublishExecutor,
};

struct TestContext {
    app: axum::Router,
    task_repo: Arc<MemoryPublishTaskRepository>,
    analytics_repo: Arc<MemoryAnalyticsRepository>,
}

fn make_app() -> TestContext {
    let task_repo = Arc::new(MemoryPublishTaskRepository::new());
    let time_index = Arc::new(MemoryTimeIndex::new());
    let analytics_repo = Arc::new(MemoryAnalyticsRepository::new());
    let analytics = Arc::new(AnalyticsService::new(analytics_repo.clone()));

    let settings = SchedulerSettings {
        poll_interval: Duration::from_millis(50),
        executor_timeout: Duration::from_secs(5),
        retry_policy: RetryPolicy::fixed(Duration::from_secs(300)),
        max_retries: None,
        reconcile_interval: Duration::from_secs(3600),
        stuck_task_threshold: Duration::from_secs(600),
        index_staleness: Duration::from_secs(120),
    };

    let scheduler = Arc::new(
        PublishScheduler::new(
            task_repo.clone(),
            time_index,
            Arc::new(StubPublishExecutor::succeeding()),
            settings,
        )
        .with_analytics(analytics.clone()),
    );

    let state = AppState {
        scheduler,
        analytics,
        metrics_handle: None,
    };

    TestContext {
        app: create_routes(state),
        task_repo,
        analytics_repo,
    }
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_schedule_endpoint_returns_created_task() {
    let ctx = make_app();
    let due = (Utc::now() + chrono::Duration::hours(1)).to_rfc3339();

    let response = ctx
        .app
        .oneshot(json_request(
            "POST",
            "/api/publish/schedule",
            serde_json::json!({
                "content_id": "c1",
                "platform_id": 1,
                "scheduled_time": due,
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "scheduled");
    assert_eq!(body["data"]["content_id"], "c1");
    assert_eq!(ctx.task_repo.count(), 1);
}

#[tokio::test]
async fn test_schedule_endpoint_rejects_past_time() {
    let ctx = make_app();
    let past = (Utc::now() - chrono::Duration::hours(1)).to_rfc3339();

    let response = ctx
        .app
        .oneshot(json_request(
            "POST",
            "/api/publish/schedule",
            serde_json::json!({
                "content_id": "c1",
                "platform_id": 1,
                "scheduled_time": past,
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"]["type"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_schedule_endpoint_rejects_empty_content_id() {
    let ctx = make_app();
    let due = (Utc::now() + chrono::Duration::hours(1)).to_rfc3339();

    let response = ctx
        .app
        .oneshot(json_request(
            "POST",
            "/api/publish/schedule",
            serde_json::json!({
                "content_id": "",
                "platform_id": 1,
                "scheduled_time": due,
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_unknown_task_returns_404() {
    let ctx = make_app();

    let response = ctx
        .app
        .oneshot(empty_request("GET", "/api/publish/tasks/pub_missing"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response_json(response).await;
    assert_eq!(body["error"]["type"], "TASK_NOT_FOUND");
}

#[tokio::test]
async fn test_cancel_processing_task_returns_conflict() {
    let ctx = make_app();
    let task = PublishTaskBuilder::new()
        .with_id("pub_busy")
        .processing_since(Utc::now())
        .build();
    ctx.task_repo.put(task);

    let response = ctx
        .app
        .oneshot(empty_request("POST", "/api/publish/tasks/pub_busy/cancel"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = response_json(response).await;
    assert_eq!(body["error"]["type"], "INVALID_TASK_STATE");
}

#[tokio::test]
async fn test_list_endpoint_filters_and_paginates() {
    let ctx = make_app();
    let now = Utc::now();
    for i in 0..5 {
        ctx.task_repo.put(
            PublishTaskBuilder::new()
                .with_id(&format!("pub_t{i}"))
                .with_scheduled_time(now + chrono::Duration::minutes(i))
                .build(),
        );
    }

    let response = ctx
        .app
        .oneshot(empty_request(
            "GET",
            "/api/publish/tasks?status=scheduled&order_by=scheduled_time&order_dir=ASC&page=1&limit=2",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["pagination"]["total"], 5);
    assert_eq!(body["data"]["pagination"]["total_pages"], 3);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["items"][0]["id"], "pub_t0");
}

#[tokio::test]
async fn test_list_endpoint_rejects_unknown_status() {
    let ctx = make_app();

    let response = ctx
        .app
        .oneshot(empty_request("GET", "/api/publish/tasks?status=sideways"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_retry_failed_task_via_api() {
    let ctx = make_app();
    ctx.task_repo.put(
        PublishTaskBuilder::new()
            .with_id("pub_failed")
            .failed("platform unavailable")
            .build(),
    );

    let response = ctx
        .app
        .oneshot(empty_request("POST", "/api/publish/tasks/pub_failed/retry"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], "scheduled");
    assert_eq!(body["data"]["retry_count"], 1);
}

#[tokio::test]
async fn test_scheduler_stats_endpoint() {
    let ctx = make_app();

    let response = ctx
        .app
        .oneshot(empty_request("GET", "/api/publish/scheduler/stats"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["is_running"], false);
    assert_eq!(body["data"]["poll_interval_ms"], 50);
}

#[tokio::test]
async fn test_task_stats_roundtrip() {
    let ctx = make_app();
    let task = PublishTaskBuilder::new().with_id("pub_tracked").build();
    ctx.analytics_repo.track_publish_result(&task).await.unwrap();

    let response = ctx
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/publish/tasks/pub_tracked/stats",
            serde_json::json!({
                "views": 1000, "likes": 50, "comments": 30, "shares": 9, "collects": 4
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx
        .app
        .oneshot(empty_request("GET", "/api/publish/tasks/pub_tracked/stats"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["views"], 1000);
    assert_eq!(body["data"]["engagement_rate"], 8.9);
}

#[tokio::test]
async fn test_health_endpoint() {
    let ctx = make_app();

    let response = ctx
        .app
        .oneshot(empty_request("GET", "/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], "ok");
}
