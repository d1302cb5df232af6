use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use publisher_domain::{
    AnalyticsRecord, AnalyticsRepository, MetricsUpdate, OverallStats, PublishResult, PublishTask,
};

/// 单个任务的互动情况摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementSummary {
    pub task_id: String,
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub collects: i64,
    pub engagement_rate: f64,
    pub last_tracked_at: DateTime<Utc>,
}

/// 发布效果跟踪服务
///
/// 调度器在任务成功发布后调用`track_publish_result`建立跟踪记录，
/// 之后由外部采集方通过`update_metrics`持续回填平台侧指标。
/// 跟踪与调度正确性无关，失败只记录日志
pub struct AnalyticsService {
    repo: Arc<dyn AnalyticsRepository>,
}

impl AnalyticsService {
    pub fn new(repo: Arc<dyn AnalyticsRepository>) -> Self {
        Self { repo }
    }

    pub async fn track_publish_result(&self, task: &PublishTask) -> PublishResult<AnalyticsRecord> {
        let record = self.repo.track_publish_result(task).await?;
        info!(
            task_id = %task.id,
            platform_id = task.platform_id,
            "已建立发布效果跟踪记录"
        );
        Ok(record)
    }

    pub async fn update_metrics(
        &self,
        task_id: &str,
        metrics: &MetricsUpdate,
    ) -> PublishResult<Option<AnalyticsRecord>> {
        let updated = self.repo.update_metrics(task_id, metrics).await?;
        if updated.is_some() {
            debug!(task_id, views = metrics.views, "发布效果指标已更新");
        }
        Ok(updated)
    }

    pub async fn get_engagement(&self, task_id: &str) -> PublishResult<Option<EngagementSummary>> {
        let record = self.repo.get_by_task_id(task_id).await?;
        Ok(record.map(|r| EngagementSummary {
            engagement_rate: r.engagement_rate(),
            task_id: r.task_id,
            views: r.current_views,
            likes: r.current_likes,
            comments: r.current_comments,
            shares: r.current_shares,
            collects: r.current_collects,
            last_tracked_at: r.last_tracked_at,
        }))
    }

    pub async fn overall_stats(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> PublishResult<OverallStats> {
        self.repo.overall_stats(start, end).await
    }
}
