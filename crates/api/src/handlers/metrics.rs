use axum::extract::State;
use axum::http::StatusCode;

use crate::routes::AppState;

/// 渲染Prometheus文本格式指标
pub async fn render_metrics(State(state): State<AppState>) -> (StatusCode, String) {
    match &state.metrics_handle {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "指标导出未启用\n".to_string()),
    }
}
