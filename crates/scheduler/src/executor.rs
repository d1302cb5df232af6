use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use publisher_domain::{PublishError, PublishOutcome, PublishResult, PublishTask};

pub use publisher_domain::PublishExecutor;

/// 模拟执行器，用于开发环境和端到端演练
///
/// 固定延迟后返回合成的发布地址
pub struct SimulatedPublishExecutor {
    latency: Duration,
}

impl SimulatedPublishExecutor {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

impl Default for SimulatedPublishExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl PublishExecutor for SimulatedPublishExecutor {
    async fn execute(&self, task: &PublishTask) -> PublishResult<PublishOutcome> {
        info!(
            task_id = %task.id,
            platform_id = task.platform_id,
            "执行发布（模拟）"
        );

        tokio::time::sleep(self.latency).await;

        Ok(PublishOutcome::Success {
            published_url: format!("https://platform.com/post/{}", task.id),
        })
    }
}

/// 发布网关的响应体
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GatewayReply {
    success: bool,
    published_url: Option<String>,
    error_message: Option<String>,
}

/// 通过HTTP发布网关执行发布
///
/// 把任务的内容和平台信息POST给网关，网关负责平台侧的具体调用
pub struct HttpPublishExecutor {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPublishExecutor {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }

    fn outcome_from_reply(reply: GatewayReply) -> PublishOutcome {
        if reply.success {
            match reply.published_url {
                Some(published_url) if !published_url.is_empty() => {
                    PublishOutcome::Success { published_url }
                }
                _ => PublishOutcome::Failure {
                    error_message: "发布网关声明成功但未返回发布地址".to_string(),
                },
            }
        } else {
            PublishOutcome::Failure {
                error_message: reply
                    .error_message
                    .unwrap_or_else(|| "发布网关未说明失败原因".to_string()),
            }
        }
    }
}

#[async_trait]
impl PublishExecutor for HttpPublishExecutor {
    async fn execute(&self, task: &PublishTask) -> PublishResult<PublishOutcome> {
        info!(
            task_id = %task.id,
            platform_id = task.platform_id,
            endpoint = %self.endpoint,
            "执行发布（HTTP网关）"
        );

        let payload = json!({
            "taskId": task.id,
            "contentId": task.content_id,
            "platformId": task.platform_id,
            "platformAccountId": task.platform_account_id,
            "metadata": task.metadata,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PublishError::Execution(format!("发布网关请求失败: {e}")))?;

        if !response.status().is_success() {
            return Ok(PublishOutcome::Failure {
                error_message: format!("发布网关返回状态码 {}", response.status().as_u16()),
            });
        }

        let reply: GatewayReply = response
            .json()
            .await
            .map_err(|e| PublishError::Execution(format!("解析发布网关响应失败: {e}")))?;

        Ok(Self::outcome_from_reply(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_simulated_executor_returns_url_with_task_id() {
        let executor = SimulatedPublishExecutor::new(Duration::from_millis(1));
        let task = PublishTask::new(
            "c1".to_string(),
            1,
            None,
            Utc::now() + chrono::Duration::minutes(5),
            None,
            None,
        );

        let outcome = executor.execute(&task).await.unwrap();
        match outcome {
            PublishOutcome::Success { published_url } => {
                assert!(published_url.contains(&task.id));
            }
            PublishOutcome::Failure { .. } => panic!("simulated executor should succeed"),
        }
    }

    #[test]
    fn test_gateway_reply_mapping() {
        let outcome = HttpPublishExecutor::outcome_from_reply(GatewayReply {
            success: true,
            published_url: Some("https://platform.com/post/1".to_string()),
            error_message: None,
        });
        assert_eq!(
            outcome,
            PublishOutcome::Success {
                published_url: "https://platform.com/post/1".to_string()
            }
        );

        let outcome = HttpPublishExecutor::outcome_from_reply(GatewayReply {
            success: false,
            published_url: None,
            error_message: Some("账号未授权".to_string()),
        });
        assert!(matches!(outcome, PublishOutcome::Failure { .. }));

        // 成功但缺少发布地址按失败处理
        let outcome = HttpPublishExecutor::outcome_from_reply(GatewayReply {
            success: true,
            published_url: None,
            error_message: None,
        });
        assert!(matches!(outcome, PublishOutcome::Failure { .. }));
    }

    #[test]
    fn test_gateway_reply_deserializes_camel_case() {
        let reply: GatewayReply = serde_json::from_str(
            r#"{"success": true, "publishedUrl": "https://platform.com/post/9"}"#,
        )
        .unwrap();
        assert!(reply.success);
        assert_eq!(
            reply.published_url.as_deref(),
            Some("https://platform.com/post/9")
        );
        assert!(reply.error_message.is_none());
    }
}
