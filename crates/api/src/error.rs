use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use publisher_domain::PublishError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("调度器错误: {0}")]
    Publish(#[from] PublishError),

    #[error("验证错误: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("未找到资源")]
    NotFound,

    #[error("请求参数错误: {0}")]
    BadRequest(String),

    #[error("内部服务器错误: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message, error_type) = match &self {
            ApiError::Publish(PublishError::Validation(msg)) => (
                StatusCode::BAD_REQUEST,
                format!("参数校验失败: {msg}"),
                "VALIDATION_ERROR",
            ),
            ApiError::Publish(PublishError::TaskNotFound { id }) => (
                StatusCode::NOT_FOUND,
                format!("发布任务 {id} 不存在"),
                "TASK_NOT_FOUND",
            ),
            ApiError::Publish(PublishError::InvalidState {
                id,
                status,
                operation,
            }) => (
                StatusCode::CONFLICT,
                format!("任务 {id} 当前状态 {status} 不允许执行 {operation} 操作"),
                "INVALID_TASK_STATE",
            ),
            ApiError::Publish(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "系统内部错误".to_string(),
                "INTERNAL_ERROR",
            ),
            ApiError::Validation(errors) => {
                let details: Vec<String> = errors
                    .field_errors()
                    .iter()
                    .map(|(field, errors)| {
                        let messages: Vec<String> = errors
                            .iter()
                            .map(|e| {
                                e.message
                                    .as_ref()
                                    .map(|m| m.to_string())
                                    .unwrap_or_else(|| "验证失败".to_string())
                            })
                            .collect();
                        format!("{}: {}", field, messages.join(", "))
                    })
                    .collect();
                (
                    StatusCode::BAD_REQUEST,
                    format!("请求参数验证失败: {}", details.join("; ")),
                    "VALIDATION_ERROR",
                )
            }
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                "请求的资源不存在".to_string(),
                "NOT_FOUND",
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                format!("请求参数错误: {msg}"),
                "BAD_REQUEST",
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("系统内部错误: {msg}"),
                "INTERNAL_ERROR",
            ),
        };

        let body = Json(json!({
            "error": {
                "message": error_message,
                "type": error_type,
                "code": status.as_u16(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use publisher_domain::PublishTaskStatus;

    #[test]
    fn test_validation_error_maps_to_400() {
        let error = ApiError::Publish(PublishError::validation("scheduled_time必须晚于当前时间"));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let error = ApiError::Publish(PublishError::task_not_found("pub_x"));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = ApiError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_invalid_state_maps_to_409() {
        let error = ApiError::Publish(PublishError::invalid_state(
            "pub_x",
            PublishTaskStatus::Processing,
            "cancel",
        ));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_store_errors_map_to_500() {
        let error = ApiError::Publish(PublishError::database("connection refused"));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let error = ApiError::Publish(PublishError::time_index("MOVED"));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_bad_request_maps_to_400() {
        let error = ApiError::BadRequest("未知的任务状态".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
