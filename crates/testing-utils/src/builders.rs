//! Test data builders for creating test entities

use chrono::{DateTime, Duration, Utc};

use publisher_domain::{PublishTask, PublishTaskStatus};

/// Builder for creating test PublishTask entities with sensible defaults
pub struct PublishTaskBuilder {
    task: PublishTask,
}

impl PublishTaskBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            task: PublishTask {
                id: PublishTask::generate_id(),
                content_id: "content-1".to_string(),
                platform_id: 1,
                platform_account_id: None,
                status: PublishTaskStatus::Scheduled,
                scheduled_time: now + Duration::hours(1),
                timezone: "Asia/Shanghai".to_string(),
                retry_count: 0,
                published_url: None,
                error_message: None,
                published_at: None,
                claimed_at: None,
                metadata: serde_json::json!({}),
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.task.id = id.to_string();
        self
    }

    pub fn with_content_id(mut self, content_id: &str) -> Self {
        self.task.content_id = content_id.to_string();
        self
    }

    pub fn with_platform_id(mut self, platform_id: i64) -> Self {
        self.task.platform_id = platform_id;
        self
    }

    pub fn with_status(mut self, status: PublishTaskStatus) -> Self {
        self.task.status = status;
        self
    }

    pub fn with_scheduled_time(mut self, scheduled_time: DateTime<Utc>) -> Self {
        self.task.scheduled_time = scheduled_time;
        self
    }

    pub fn with_retry_count(mut self, retry_count: i32) -> Self {
        self.task.retry_count = retry_count;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.task.metadata = metadata;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.task.created_at = created_at;
        self.task.updated_at = created_at;
        self
    }

    /// A task that became due in the past, ready to be claimed
    pub fn due(mut self) -> Self {
        self.task.scheduled_time = Utc::now() - Duration::seconds(5);
        self
    }

    pub fn failed(mut self, error_message: &str) -> Self {
        self.task.status = PublishTaskStatus::Failed;
        self.task.error_message = Some(error_message.to_string());
        self
    }

    /// A task claimed at the given instant, for stuck-task scenarios
    pub fn processing_since(mut self, claimed_at: DateTime<Utc>) -> Self {
        self.task.status = PublishTaskStatus::Processing;
        self.task.claimed_at = Some(claimed_at);
        self
    }

    pub fn build(self) -> PublishTask {
        self.task
    }
}

impl Default for PublishTaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}
