use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 发布任务默认时区（仅用于展示，所有比较均使用UTC时间戳）
pub const DEFAULT_TIMEZONE: &str = "Asia/Shanghai";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishTask {
    pub id: String,
    pub content_id: String,
    pub platform_id: i64,
    pub platform_account_id: Option<i64>,
    pub status: PublishTaskStatus, // scheduled / processing / completed / failed / cancelled
    pub scheduled_time: DateTime<Utc>,
    pub timezone: String,
    pub retry_count: i32,
    pub published_url: Option<String>,
    pub error_message: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// 轮询器认领任务的时间，用于卡死任务回收
    pub claimed_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PublishTaskStatus {
    #[serde(rename = "scheduled")]
    Scheduled,
    #[serde(rename = "processing")]
    Processing,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl PublishTaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishTaskStatus::Scheduled => "scheduled",
            PublishTaskStatus::Processing => "processing",
            PublishTaskStatus::Completed => "completed",
            PublishTaskStatus::Failed => "failed",
            PublishTaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(PublishTaskStatus::Scheduled),
            "processing" => Some(PublishTaskStatus::Processing),
            "completed" => Some(PublishTaskStatus::Completed),
            "failed" => Some(PublishTaskStatus::Failed),
            "cancelled" => Some(PublishTaskStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for PublishTaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl sqlx::Type<sqlx::Postgres> for PublishTaskStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for PublishTaskStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        PublishTaskStatus::parse(s).ok_or_else(|| format!("Invalid publish task status: {s}").into())
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for PublishTaskStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

/// 发布调度请求
///
/// `scheduled_time` 保留原始字符串，由调度器负责解析和校验，
/// 解析失败作为校验错误返回而不是反序列化错误
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulePublishRequest {
    pub content_id: String,
    pub platform_id: i64,
    pub platform_account_id: Option<i64>,
    pub scheduled_time: String,
    pub timezone: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// 发布执行结果，成功与失败字段互斥
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PublishOutcome {
    Success { published_url: String },
    Failure { error_message: String },
}

impl PublishOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PublishOutcome::Success { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskOrderBy {
    ScheduledTime,
    CreatedAt,
    Status,
}

impl TaskOrderBy {
    /// 解析排序字段，非法值回退到默认的scheduled_time
    pub fn parse_or_default(s: &str) -> Self {
        match s {
            "created_at" => TaskOrderBy::CreatedAt,
            "status" => TaskOrderBy::Status,
            _ => TaskOrderBy::ScheduledTime,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            TaskOrderBy::ScheduledTime => "scheduled_time",
            TaskOrderBy::CreatedAt => "created_at",
            TaskOrderBy::Status => "status",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderDir {
    Asc,
    Desc,
}

impl OrderDir {
    pub fn parse_or_default(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "DESC" => OrderDir::Desc,
            _ => OrderDir::Asc,
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            OrderDir::Asc => "ASC",
            OrderDir::Desc => "DESC",
        }
    }
}

/// 任务列表查询条件
#[derive(Debug, Clone)]
pub struct TaskFilter {
    pub status: Option<PublishTaskStatus>,
    pub platform_id: Option<i64>,
    pub page: i64,
    pub limit: i64,
    pub order_by: TaskOrderBy,
    pub order_dir: OrderDir,
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self {
            status: None,
            platform_id: None,
            page: 1,
            limit: 20,
            order_by: TaskOrderBy::ScheduledTime,
            order_dir: OrderDir::Asc,
        }
    }
}

impl TaskFilter {
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.limit
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let total_pages = if limit > 0 {
            (total + limit - 1) / limit
        } else {
            0
        };
        Self {
            page,
            limit,
            total,
            total_pages,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPage {
    pub items: Vec<PublishTask>,
    pub pagination: Pagination,
}

impl PublishTask {
    /// 基于校验通过的请求构造新任务，状态为scheduled
    pub fn new(
        content_id: String,
        platform_id: i64,
        platform_account_id: Option<i64>,
        scheduled_time: DateTime<Utc>,
        timezone: Option<String>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Self::generate_id(),
            content_id,
            platform_id,
            platform_account_id,
            status: PublishTaskStatus::Scheduled,
            scheduled_time,
            timezone: timezone.unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
            retry_count: 0,
            published_url: None,
            error_message: None,
            published_at: None,
            claimed_at: None,
            metadata: metadata.unwrap_or_else(|| serde_json::json!({})),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn generate_id() -> String {
        format!("pub_{}", Uuid::new_v4().simple())
    }

    pub fn is_live(&self) -> bool {
        matches!(
            self.status,
            PublishTaskStatus::Scheduled | PublishTaskStatus::Processing
        )
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_live()
    }

    pub fn is_cancellable(&self) -> bool {
        matches!(self.status, PublishTaskStatus::Scheduled)
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.status, PublishTaskStatus::Failed)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, PublishTaskStatus::Scheduled) && self.scheduled_time <= now
    }

    pub fn entity_description(&self) -> String {
        format!(
            "发布任务 '{}' (内容: {}, 平台: {})",
            self.id, self.content_id, self.platform_id
        )
    }
}

/// 发布效果跟踪记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsRecord {
    pub task_id: String,
    pub platform_id: i64,
    pub content_id: String,
    pub published_at: Option<DateTime<Utc>>,
    pub current_views: i64,
    pub current_likes: i64,
    pub current_comments: i64,
    pub current_shares: i64,
    pub current_collects: i64,
    pub tracking_count: i32,
    pub last_tracked_at: DateTime<Utc>,
}

impl AnalyticsRecord {
    /// 互动率 = (点赞+评论+分享) / 播放量 * 100，无播放量时为0
    pub fn engagement_rate(&self) -> f64 {
        if self.current_views > 0 {
            let engaged =
                (self.current_likes + self.current_comments + self.current_shares) as f64;
            (engaged / self.current_views as f64 * 100.0 * 100.0).round() / 100.0
        } else {
            0.0
        }
    }
}

/// 一次指标采集的增量数据
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsUpdate {
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub collects: i64,
}

/// 跨任务的汇总统计
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverallStats {
    pub total_published: i64,
    pub total_views: i64,
    pub total_likes: i64,
    pub total_comments: i64,
    pub total_shares: i64,
    pub avg_views: f64,
    pub avg_likes: f64,
    pub avg_comments: f64,
}
