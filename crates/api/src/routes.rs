use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use publisher_scheduler::{AnalyticsService, PublishScheduler};

use crate::handlers::{
    health::health_check,
    metrics::render_metrics,
    publish::{
        cancel_schedule, get_task, get_task_stats, list_tasks, overall_analytics,
        schedule_publish, scheduler_stats, start_scheduler, stop_scheduler, update_task_stats,
        retry_task,
    },
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<PublishScheduler>,
    pub analytics: Arc<AnalyticsService>,
    pub metrics_handle: Option<PrometheusHandle>,
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // 健康检查与指标
        .route("/health", get(health_check))
        .route("/metrics", get(render_metrics))
        // 发布调度API
        .route("/api/publish/schedule", post(schedule_publish))
        .route("/api/publish/tasks", get(list_tasks))
        .route("/api/publish/tasks/{id}", get(get_task))
        .route("/api/publish/tasks/{id}/cancel", post(cancel_schedule))
        .route("/api/publish/tasks/{id}/retry", post(retry_task))
        // 发布效果统计API
        .route(
            "/api/publish/tasks/{id}/stats",
            get(get_task_stats).post(update_task_stats),
        )
        .route("/api/publish/analytics/overview", get(overall_analytics))
        // 调度器运维API
        .route("/api/publish/scheduler/start", post(start_scheduler))
        .route("/api/publish/scheduler/stop", post(stop_scheduler))
        .route("/api/publish/scheduler/stats", get(scheduler_stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
