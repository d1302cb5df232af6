use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use publisher_domain::{PublishResult, PublishTaskRepository, PublishTaskStatus, TimeIndex};

/// 一次对账扫描的结果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// 回到scheduled状态的卡死任务数
    pub stuck_requeued: usize,
    /// 补齐的缺失索引条目数
    pub index_restored: usize,
    /// 清理的失效索引条目数
    pub index_purged: usize,
}

/// 对账扫描
///
/// 两项兜底工作：
/// 1. 卡死任务回收——claimed_at早于阈值的processing任务说明进程在
///    认领和写结果之间崩溃过，放回scheduled重新调度
/// 2. 索引修复——以持久存储为准，补齐缺失的索引条目，清理持久状态
///    已不是scheduled的索引成员
pub struct ReconciliationService {
    task_repo: Arc<dyn PublishTaskRepository>,
    time_index: Arc<dyn TimeIndex>,
    stuck_threshold: Duration,
    index_staleness: Duration,
}

impl ReconciliationService {
    pub fn new(
        task_repo: Arc<dyn PublishTaskRepository>,
        time_index: Arc<dyn TimeIndex>,
        stuck_threshold: Duration,
        index_staleness: Duration,
    ) -> Self {
        Self {
            task_repo,
            time_index,
            stuck_threshold,
            index_staleness,
        }
    }

    pub async fn run_once(&self) -> PublishResult<ReconcileReport> {
        let stuck_requeued = self.requeue_stuck_tasks().await?;
        let (index_restored, index_purged) = self.repair_time_index().await?;

        let report = ReconcileReport {
            stuck_requeued,
            index_restored,
            index_purged,
        };

        if report.stuck_requeued > 0 || report.index_restored > 0 || report.index_purged > 0 {
            info!(
                stuck_requeued = report.stuck_requeued,
                index_restored = report.index_restored,
                index_purged = report.index_purged,
                "对账扫描完成"
            );
        } else {
            debug!("对账扫描完成，无需修复");
        }

        Ok(report)
    }

    /// 回收卡死任务
    async fn requeue_stuck_tasks(&self) -> PublishResult<usize> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.stuck_threshold)
                .unwrap_or_else(|_| chrono::Duration::seconds(600));

        let released = self.task_repo.release_stuck(cutoff).await?;

        for task in &released {
            warn!(
                task_id = %task.id,
                scheduled_time = %task.scheduled_time.to_rfc3339(),
                "回收卡死任务，重新进入调度队列"
            );
            if let Err(e) = self
                .time_index
                .insert(&task.id, task.scheduled_time)
                .await
            {
                warn!(task_id = %task.id, "回收任务写入时间索引失败: {e}");
            }
        }

        if !released.is_empty() {
            counter!("publisher_stuck_tasks_requeued_total").increment(released.len() as u64);
        }

        Ok(released.len())
    }

    /// 索引修复：持久存储是事实来源
    async fn repair_time_index(&self) -> PublishResult<(usize, usize)> {
        let staleness = chrono::Duration::from_std(self.index_staleness)
            .unwrap_or_else(|_| chrono::Duration::seconds(120));
        let stale_before = Utc::now() - staleness;

        // 补齐缺失条目，只处理已经稳定一段时间的任务，
        // 避免与进行中的schedule写入竞争
        let mut restored = 0;
        for task in self.task_repo.get_scheduled().await? {
            if task.updated_at > stale_before {
                continue;
            }
            if !self.time_index.contains(&task.id).await? {
                warn!(task_id = %task.id, "发现缺失的时间索引条目，补齐");
                self.time_index
                    .insert(&task.id, task.scheduled_time)
                    .await?;
                restored += 1;
            }
        }

        // 清理持久状态已不是scheduled的索引成员
        let mut purged = 0;
        for (task_id, _due_at) in self.time_index.entries().await? {
            let keep = matches!(
                self.task_repo.get_by_id(&task_id).await?,
                Some(task) if task.status == PublishTaskStatus::Scheduled
            );
            if !keep {
                debug!(task_id = %task_id, "清理失效的时间索引条目");
                self.time_index.remove(&task_id).await?;
                purged += 1;
            }
        }

        Ok((restored, purged))
    }
}
