use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;

use publisher_domain::{
    AnalyticsRecord, AnalyticsRepository, MetricsUpdate, OverallStats, PublishResult, PublishTask,
};

const RECORD_COLUMNS: &str = "task_id, platform_id, content_id, published_at, current_views, \
     current_likes, current_comments, current_shares, current_collects, tracking_count, \
     last_tracked_at";

/// 发布效果跟踪的Postgres仓储
pub struct PostgresAnalyticsRepository {
    pool: PgPool,
}

impl PostgresAnalyticsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: &sqlx::postgres::PgRow) -> PublishResult<AnalyticsRecord> {
        Ok(AnalyticsRecord {
            task_id: row.try_get("task_id")?,
            platform_id: row.try_get("platform_id")?,
            content_id: row.try_get("content_id")?,
            published_at: row.try_get("published_at")?,
            current_views: row.try_get("current_views")?,
            current_likes: row.try_get("current_likes")?,
            current_comments: row.try_get("current_comments")?,
            current_shares: row.try_get("current_shares")?,
            current_collects: row.try_get("current_collects")?,
            tracking_count: row.try_get("tracking_count")?,
            last_tracked_at: row.try_get("last_tracked_at")?,
        })
    }
}

#[async_trait]
impl AnalyticsRepository for PostgresAnalyticsRepository {
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    async fn track_publish_result(&self, task: &PublishTask) -> PublishResult<AnalyticsRecord> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO publish_analytics (task_id, platform_id, content_id, published_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (task_id) DO UPDATE SET last_tracked_at = CURRENT_TIMESTAMP
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(&task.id)
        .bind(task.platform_id)
        .bind(&task.content_id)
        .bind(task.published_at)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_record(&row)
    }

    #[instrument(skip(self, metrics), fields(task_id = %task_id))]
    async fn update_metrics(
        &self,
        task_id: &str,
        metrics: &MetricsUpdate,
    ) -> PublishResult<Option<AnalyticsRecord>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE publish_analytics
            SET current_views = $2, current_likes = $3, current_comments = $4,
                current_shares = $5, current_collects = $6,
                tracking_count = tracking_count + 1, last_tracked_at = CURRENT_TIMESTAMP
            WHERE task_id = $1
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(task_id)
        .bind(metrics.views)
        .bind(metrics.likes)
        .bind(metrics.comments)
        .bind(metrics.shares)
        .bind(metrics.collects)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    #[instrument(skip(self), fields(task_id = %task_id))]
    async fn get_by_task_id(&self, task_id: &str) -> PublishResult<Option<AnalyticsRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM publish_analytics WHERE task_id = $1"
        ))
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    #[instrument(skip(self))]
    async fn overall_stats(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> PublishResult<OverallStats> {
        let mut where_clauses = Vec::new();
        let mut param_count = 1;
        if start.is_some() {
            where_clauses.push(format!("published_at >= ${param_count}"));
            param_count += 1;
        }
        if end.is_some() {
            where_clauses.push(format!("published_at <= ${param_count}"));
        }
        let where_clause = if where_clauses.is_empty() {
            "1=1".to_string()
        } else {
            where_clauses.join(" AND ")
        };

        let sql = format!(
            r#"
            SELECT
                COUNT(*) AS total_published,
                COALESCE(SUM(current_views), 0)::BIGINT AS total_views,
                COALESCE(SUM(current_likes), 0)::BIGINT AS total_likes,
                COALESCE(SUM(current_comments), 0)::BIGINT AS total_comments,
                COALESCE(SUM(current_shares), 0)::BIGINT AS total_shares,
                COALESCE(AVG(current_views), 0)::FLOAT8 AS avg_views,
                COALESCE(AVG(current_likes), 0)::FLOAT8 AS avg_likes,
                COALESCE(AVG(current_comments), 0)::FLOAT8 AS avg_comments
            FROM publish_analytics
            WHERE {where_clause}
            "#
        );

        let mut query = sqlx::query(&sql);
        if let Some(start) = start {
            query = query.bind(start);
        }
        if let Some(end) = end {
            query = query.bind(end);
        }
        let row = query.fetch_one(&self.pool).await?;

        Ok(OverallStats {
            total_published: row.try_get("total_published")?,
            total_views: row.try_get("total_views")?,
            total_likes: row.try_get("total_likes")?,
            total_comments: row.try_get("total_comments")?,
            total_shares: row.try_get("total_shares")?,
            avg_views: row.try_get("avg_views")?,
            avg_likes: row.try_get("avg_likes")?,
            avg_comments: row.try_get("avg_comments")?,
        })
    }
}
