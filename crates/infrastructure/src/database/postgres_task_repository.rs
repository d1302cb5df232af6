use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

use publisher_domain::{
    PublishOutcome, PublishResult, PublishTask, PublishTaskRepository, PublishTaskStatus,
    TaskFilter,
};

const TASK_COLUMNS: &str = "id, content_id, platform_id, platform_account_id, status, \
     scheduled_time, timezone, retry_count, published_url, error_message, published_at, \
     claimed_at, metadata, created_at, updated_at";

/// 发布任务的Postgres仓储
///
/// 所有状态迁移都是带前置状态条件的单条UPDATE，并发正确性由
/// 数据库的行级原子性保证
pub struct PostgresPublishTaskRepository {
    pool: PgPool,
}

impl PostgresPublishTaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_task(row: &sqlx::postgres::PgRow) -> PublishResult<PublishTask> {
        Ok(PublishTask {
            id: row.try_get("id")?,
            content_id: row.try_get("content_id")?,
            platform_id: row.try_get("platform_id")?,
            platform_account_id: row.try_get("platform_account_id")?,
            status: row.try_get("status")?,
            scheduled_time: row.try_get("scheduled_time")?,
            timezone: row.try_get("timezone")?,
            retry_count: row.try_get("retry_count")?,
            published_url: row.try_get("published_url")?,
            error_message: row.try_get("error_message")?,
            published_at: row.try_get("published_at")?,
            claimed_at: row.try_get("claimed_at")?,
            metadata: row.try_get("metadata")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

enum ListParam {
    Status(&'static str),
    Platform(i64),
}

#[async_trait]
impl PublishTaskRepository for PostgresPublishTaskRepository {
    #[instrument(skip(self, task), fields(task_id = %task.id, content_id = %task.content_id))]
    async fn create(&self, task: &PublishTask) -> PublishResult<PublishTask> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO publish_tasks (
                id, content_id, platform_id, platform_account_id, status,
                scheduled_time, timezone, retry_count, metadata, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(&task.id)
        .bind(&task.content_id)
        .bind(task.platform_id)
        .bind(task.platform_account_id)
        .bind(task.status)
        .bind(task.scheduled_time)
        .bind(&task.timezone)
        .bind(task.retry_count)
        .bind(&task.metadata)
        .bind(task.created_at)
        .bind(task.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_task(&row)
    }

    #[instrument(skip(self), fields(task_id = %id))]
    async fn get_by_id(&self, id: &str) -> PublishResult<Option<PublishTask>> {
        let row = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM publish_tasks WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_task).transpose()
    }

    #[instrument(skip(self, filter))]
    async fn list(&self, filter: &TaskFilter) -> PublishResult<(Vec<PublishTask>, i64)> {
        let mut where_clauses = Vec::new();
        let mut params = Vec::new();
        let mut param_count = 1;

        if let Some(status) = filter.status {
            where_clauses.push(format!("status = ${param_count}"));
            params.push(ListParam::Status(status.as_str()));
            param_count += 1;
        }
        if let Some(platform_id) = filter.platform_id {
            where_clauses.push(format!("platform_id = ${param_count}"));
            params.push(ListParam::Platform(platform_id));
            param_count += 1;
        }

        let where_clause = if where_clauses.is_empty() {
            "1=1".to_string()
        } else {
            where_clauses.join(" AND ")
        };

        let count_sql = format!("SELECT COUNT(*) FROM publish_tasks WHERE {where_clause}");
        let mut count_query = sqlx::query(&count_sql);
        for param in &params {
            count_query = match param {
                ListParam::Status(s) => count_query.bind(*s),
                ListParam::Platform(p) => count_query.bind(*p),
            };
        }
        let total: i64 = count_query.fetch_one(&self.pool).await?.try_get(0)?;

        // 排序字段和方向来自白名单枚举，不会把调用方输入拼进SQL
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM publish_tasks WHERE {where_clause} \
             ORDER BY {} {} LIMIT ${} OFFSET ${}",
            filter.order_by.column(),
            filter.order_dir.sql(),
            param_count,
            param_count + 1,
        );
        let mut query = sqlx::query(&sql);
        for param in &params {
            query = match param {
                ListParam::Status(s) => query.bind(*s),
                ListParam::Platform(p) => query.bind(*p),
            };
        }
        query = query.bind(filter.limit).bind(filter.offset());

        let rows = query.fetch_all(&self.pool).await?;
        let tasks = rows
            .iter()
            .map(Self::row_to_task)
            .collect::<PublishResult<Vec<_>>>()?;

        debug!(total, returned = tasks.len(), "查询发布任务列表");
        Ok((tasks, total))
    }

    #[instrument(skip(self), fields(task_id = %id))]
    async fn claim_due(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> PublishResult<Option<PublishTask>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE publish_tasks
            SET status = 'processing', claimed_at = $2, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = 'scheduled'
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_task).transpose()
    }

    #[instrument(skip(self, outcome), fields(task_id = %id))]
    async fn complete(
        &self,
        id: &str,
        outcome: &PublishOutcome,
    ) -> PublishResult<Option<PublishTask>> {
        let (status, published_url, error_message, published_at) = match outcome {
            PublishOutcome::Success { published_url } => (
                PublishTaskStatus::Completed,
                Some(published_url.as_str()),
                None,
                Some(Utc::now()),
            ),
            PublishOutcome::Failure { error_message } => (
                PublishTaskStatus::Failed,
                None,
                Some(error_message.as_str()),
                None,
            ),
        };

        let row = sqlx::query(&format!(
            r#"
            UPDATE publish_tasks
            SET status = $2, published_url = $3, error_message = $4,
                published_at = $5, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = 'processing'
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .bind(published_url)
        .bind(error_message)
        .bind(published_at)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_task).transpose()
    }

    #[instrument(skip(self), fields(task_id = %id))]
    async fn cancel(&self, id: &str) -> PublishResult<Option<PublishTask>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE publish_tasks
            SET status = 'cancelled', updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = 'scheduled'
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_task).transpose()
    }

    #[instrument(skip(self), fields(task_id = %id))]
    async fn reschedule_retry(
        &self,
        id: &str,
        new_time: DateTime<Utc>,
    ) -> PublishResult<Option<PublishTask>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE publish_tasks
            SET status = 'scheduled', scheduled_time = $2, retry_count = retry_count + 1,
                error_message = NULL, claimed_at = NULL, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = 'failed'
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(new_time)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_task).transpose()
    }

    #[instrument(skip(self))]
    async fn release_stuck(
        &self,
        older_than: DateTime<Utc>,
    ) -> PublishResult<Vec<PublishTask>> {
        let rows = sqlx::query(&format!(
            r#"
            UPDATE publish_tasks
            SET status = 'scheduled', claimed_at = NULL, updated_at = CURRENT_TIMESTAMP
            WHERE status = 'processing' AND claimed_at < $1
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(older_than)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_task).collect()
    }

    #[instrument(skip(self))]
    async fn get_scheduled(&self) -> PublishResult<Vec<PublishTask>> {
        let rows = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM publish_tasks WHERE status = 'scheduled'"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_task).collect()
    }
}
