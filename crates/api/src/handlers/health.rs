use axum::extract::State;
use serde_json::json;

use crate::{error::ApiResult, response::success, routes::AppState};

/// 健康检查
pub async fn health_check(
    State(state): State<AppState>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let stats = state.scheduler.stats();
    Ok(success(json!({
        "status": "ok",
        "scheduler_running": stats.is_running,
        "version": env!("CARGO_PKG_VERSION"),
    })))
}
