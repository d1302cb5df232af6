use thiserror::Error;

use crate::entities::PublishTaskStatus;

#[derive(Error, Debug, Clone)]
pub enum PublishError {
    #[error("参数校验失败: {0}")]
    Validation(String),
    #[error("发布任务不存在: id={id}")]
    TaskNotFound { id: String },
    #[error("任务 {id} 当前状态 {status} 不允许执行 {operation} 操作")]
    InvalidState {
        id: String,
        status: PublishTaskStatus,
        operation: &'static str,
    },
    #[error("发布执行失败: {0}")]
    Execution(String),
    #[error("数据库操作失败: {0}")]
    Database(String),
    #[error("时间索引操作失败: {0}")]
    TimeIndex(String),
    #[error("数据序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("操作超时: {0}")]
    Timeout(String),
    #[error("系统内部错误: {0}")]
    Internal(String),
}

pub type PublishResult<T> = Result<T, PublishError>;

impl PublishError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }
    pub fn task_not_found<S: Into<String>>(id: S) -> Self {
        Self::TaskNotFound { id: id.into() }
    }
    pub fn invalid_state<S: Into<String>>(
        id: S,
        status: PublishTaskStatus,
        operation: &'static str,
    ) -> Self {
        Self::InvalidState {
            id: id.into(),
            status,
            operation,
        }
    }
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }
    pub fn time_index<S: Into<String>>(msg: S) -> Self {
        Self::TimeIndex(msg.into())
    }
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// 存储层错误可以等待下一个轮询周期重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PublishError::Database(_) | PublishError::TimeIndex(_) | PublishError::Timeout(_)
        )
    }
}

impl From<sqlx::Error> for PublishError {
    fn from(err: sqlx::Error) -> Self {
        PublishError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for PublishError {
    fn from(err: serde_json::Error) -> Self {
        PublishError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for PublishError {
    fn from(err: anyhow::Error) -> Self {
        PublishError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PublishError::task_not_found("pub_abc");
        assert_eq!(err.to_string(), "发布任务不存在: id=pub_abc");

        let err = PublishError::invalid_state("pub_abc", PublishTaskStatus::Processing, "cancel");
        assert!(err.to_string().contains("processing"));
        assert!(err.to_string().contains("cancel"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(PublishError::database("connection reset").is_retryable());
        assert!(PublishError::time_index("MOVED").is_retryable());
        assert!(!PublishError::validation("bad input").is_retryable());
        assert!(!PublishError::task_not_found("x").is_retryable());
    }
}
