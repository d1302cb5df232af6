//! 领域仓储抽象
//!
//! 定义数据访问的抽象接口，遵循依赖倒置原则。
//! 所有状态迁移接口均为条件更新语义：只有当前状态与前置状态一致时才会写入，
//! 返回`None`表示任务不存在或状态已被其他参与者改变。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::{
    AnalyticsRecord, MetricsUpdate, OverallStats, PublishOutcome, PublishTask, TaskFilter,
};
use crate::errors::PublishResult;

/// 发布任务仓储抽象（持久存储，状态的唯一事实来源）
#[async_trait]
pub trait PublishTaskRepository: Send + Sync {
    async fn create(&self, task: &PublishTask) -> PublishResult<PublishTask>;

    async fn get_by_id(&self, id: &str) -> PublishResult<Option<PublishTask>>;

    /// 按条件分页查询，返回当前页数据和满足条件的总数
    async fn list(&self, filter: &TaskFilter) -> PublishResult<(Vec<PublishTask>, i64)>;

    /// 认领到期任务：scheduled -> processing，同时记录claimed_at。
    /// 条件更新是并发安全的唯一保证，两个轮询器不会认领同一个任务
    async fn claim_due(&self, id: &str, now: DateTime<Utc>)
        -> PublishResult<Option<PublishTask>>;

    /// 写入执行结果：processing -> completed/failed，一次更新完成
    async fn complete(
        &self,
        id: &str,
        outcome: &PublishOutcome,
    ) -> PublishResult<Option<PublishTask>>;

    /// 取消任务：仅scheduled -> cancelled
    async fn cancel(&self, id: &str) -> PublishResult<Option<PublishTask>>;

    /// 重试任务：仅failed -> scheduled，重试次数+1并清空错误信息
    async fn reschedule_retry(
        &self,
        id: &str,
        new_time: DateTime<Utc>,
    ) -> PublishResult<Option<PublishTask>>;

    /// 回收卡死任务：claimed_at早于阈值的processing任务回到scheduled
    async fn release_stuck(&self, older_than: DateTime<Utc>)
        -> PublishResult<Vec<PublishTask>>;

    /// 全部scheduled任务，用于时间索引修复
    async fn get_scheduled(&self) -> PublishResult<Vec<PublishTask>>;
}

/// 时间索引抽象
///
/// 有序结构，支持"到期任务"范围查询和按任务ID删除。
/// 索引只是性能优化的缓存，与持久存储不一致时以持久存储为准
#[async_trait]
pub trait TimeIndex: Send + Sync {
    async fn insert(&self, task_id: &str, due_at: DateTime<Utc>) -> PublishResult<()>;

    async fn remove(&self, task_id: &str) -> PublishResult<()>;

    /// 所有score <= now的任务ID，按到期时间升序
    async fn due_task_ids(&self, now: DateTime<Utc>) -> PublishResult<Vec<String>>;

    async fn contains(&self, task_id: &str) -> PublishResult<bool>;

    /// 全部索引条目，用于对账扫描清理与持久状态不一致的成员
    async fn entries(&self) -> PublishResult<Vec<(String, DateTime<Utc>)>>;
}

/// 发布效果跟踪仓储抽象
#[async_trait]
pub trait AnalyticsRepository: Send + Sync {
    /// 为已发布任务建立跟踪记录，重复调用只刷新last_tracked_at
    async fn track_publish_result(&self, task: &PublishTask) -> PublishResult<AnalyticsRecord>;

    async fn update_metrics(
        &self,
        task_id: &str,
        metrics: &MetricsUpdate,
    ) -> PublishResult<Option<AnalyticsRecord>>;

    async fn get_by_task_id(&self, task_id: &str) -> PublishResult<Option<AnalyticsRecord>>;

    async fn overall_stats(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> PublishResult<OverallStats>;
}
