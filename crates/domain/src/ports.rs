//! 外部协作方端口

use async_trait::async_trait;

use crate::entities::{PublishOutcome, PublishTask};
use crate::errors::PublishResult;

/// 发布执行器抽象，由平台适配层实现
///
/// 对调度器的契约：总是返回成功或失败结果，不无限挂起（调度器侧
/// 仍会施加超时），并且同一任务失败后重新调用是幂等安全的
#[async_trait]
pub trait PublishExecutor: Send + Sync {
    async fn execute(&self, task: &PublishTask) -> PublishResult<PublishOutcome>;
}
