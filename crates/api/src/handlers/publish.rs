use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

use publisher_domain::{
    MetricsUpdate, OrderDir, PublishTaskStatus, SchedulePublishRequest, TaskFilter, TaskOrderBy,
};

use crate::{
    error::{ApiError, ApiResult},
    response::{created, success, ApiResponse},
    routes::AppState,
};

/// 发布调度请求体
#[derive(Debug, Deserialize, Validate)]
pub struct SchedulePublishBody {
    #[validate(length(min = 1, message = "content_id不能为空"))]
    pub content_id: String,
    #[validate(range(min = 1, message = "platform_id必须为正整数"))]
    pub platform_id: i64,
    pub platform_account_id: Option<i64>,
    #[validate(length(min = 1, message = "scheduled_time不能为空"))]
    pub scheduled_time: String,
    pub timezone: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl From<SchedulePublishBody> for SchedulePublishRequest {
    fn from(body: SchedulePublishBody) -> Self {
        Self {
            content_id: body.content_id,
            platform_id: body.platform_id,
            platform_account_id: body.platform_account_id,
            scheduled_time: body.scheduled_time,
            timezone: body.timezone,
            metadata: body.metadata,
        }
    }
}

/// 任务列表查询参数
#[derive(Debug, Deserialize)]
pub struct TaskQueryParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub platform_id: Option<i64>,
    pub order_by: Option<String>,
    pub order_dir: Option<String>,
}

impl TaskQueryParams {
    fn into_filter(self) -> ApiResult<TaskFilter> {
        let status = match self.status.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(
                PublishTaskStatus::parse(raw)
                    .ok_or_else(|| ApiError::BadRequest(format!("未知的任务状态: {raw}")))?,
            ),
        };

        Ok(TaskFilter {
            status,
            platform_id: self.platform_id,
            page: self.page.unwrap_or(1).max(1),
            limit: self.limit.unwrap_or(20).clamp(1, 100),
            order_by: TaskOrderBy::parse_or_default(self.order_by.as_deref().unwrap_or("")),
            order_dir: OrderDir::parse_or_default(self.order_dir.as_deref().unwrap_or("")),
        })
    }
}

/// 效果统计时间范围
#[derive(Debug, Deserialize)]
pub struct AnalyticsRangeParams {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// 安排内容发布
pub async fn schedule_publish(
    State(state): State<AppState>,
    Json(body): Json<SchedulePublishBody>,
) -> ApiResult<impl axum::response::IntoResponse> {
    body.validate()?;
    let task = state.scheduler.schedule_publish(body.into()).await?;
    Ok(created(task))
}

/// 获取发布任务详情
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let task = state.scheduler.get_task(&id).await?;
    Ok(success(task))
}

/// 获取发布任务列表
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(params): Query<TaskQueryParams>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let filter = params.into_filter()?;
    let page = state.scheduler.list_tasks(&filter).await?;
    Ok(success(page))
}

/// 取消发布计划
pub async fn cancel_schedule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let task = state.scheduler.cancel_schedule(&id).await?;
    Ok(success(task))
}

/// 重试失败的发布任务
pub async fn retry_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let task = state.scheduler.retry_task(&id).await?;
    Ok(success(task))
}

/// 启动调度器，幂等
pub async fn start_scheduler(
    State(state): State<AppState>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let started = state.scheduler.clone().start();
    let message = if started {
        "调度器已启动"
    } else {
        "调度器已在运行中"
    };
    Ok(ApiResponse::success_empty_with_message(message.to_string()))
}

/// 停止调度器，幂等
pub async fn stop_scheduler(
    State(state): State<AppState>,
) -> ApiResult<impl axum::response::IntoResponse> {
    state.scheduler.stop().await;
    Ok(ApiResponse::success_empty_with_message(
        "调度器已停止".to_string(),
    ))
}

/// 调度器运行状态
pub async fn scheduler_stats(
    State(state): State<AppState>,
) -> ApiResult<impl axum::response::IntoResponse> {
    Ok(success(state.scheduler.stats()))
}

/// 单个任务的发布效果
pub async fn get_task_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let summary = state
        .analytics
        .get_engagement(&id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(success(summary))
}

/// 回填平台侧采集到的指标
pub async fn update_task_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(metrics): Json<MetricsUpdate>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let record = state
        .analytics
        .update_metrics(&id, &metrics)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(success(record))
}

/// 跨任务的发布效果汇总
pub async fn overall_analytics(
    State(state): State<AppState>,
    Query(range): Query<AnalyticsRangeParams>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let stats = state
        .analytics
        .overall_stats(range.start, range.end)
        .await?;
    Ok(success(stats))
}
