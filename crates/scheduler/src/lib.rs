//! 发布调度核心
//!
//! 拥有轮询循环、状态迁移和发布执行编排。持久存储的条件更新是
//! 并发正确性的唯一保证，时间索引只作为"到期任务"查询的缓存。

pub mod analytics;
pub mod executor;
pub mod reconciler;
pub mod retry;
pub mod scheduler;

pub use analytics::{AnalyticsService, EngagementSummary};
pub use executor::{HttpPublishExecutor, PublishExecutor, SimulatedPublishExecutor};
pub use reconciler::{ReconcileReport, ReconciliationService};
pub use retry::{RetryPolicy, RetryStrategy};
pub use scheduler::{PublishScheduler, SchedulerSettings, SchedulerStats};
