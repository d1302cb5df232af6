//! Mock implementations for all repository and service ports
//!
//! In-memory implementations guarded by a single mutex, so the conditional
//! state transitions keep the same atomicity the real stores provide.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use publisher_domain::{
    AnalyticsRecord, AnalyticsRepository, MetricsUpdate, OverallStats, PublishExecutor,
    PublishOutcome, PublishResult, PublishTask, PublishTaskRepository, PublishTaskStatus,
    TaskFilter, TaskOrderBy, TimeIndex,
};

/// Mock implementation of PublishTaskRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MemoryPublishTaskRepository {
    tasks: Arc<Mutex<HashMap<String, PublishTask>>>,
}

impl MemoryPublishTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: Vec<PublishTask>) -> Self {
        let map = tasks.into_iter().map(|t| (t.id.clone(), t)).collect();
        Self {
            tasks: Arc::new(Mutex::new(map)),
        }
    }

    pub fn count(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    /// Overwrite a task unconditionally, for arranging test states
    pub fn put(&self, task: PublishTask) {
        self.tasks.lock().unwrap().insert(task.id.clone(), task);
    }
}

#[async_trait]
impl PublishTaskRepository for MemoryPublishTaskRepository {
    async fn create(&self, task: &PublishTask) -> PublishResult<PublishTask> {
        let mut tasks = self.tasks.lock().unwrap();
        tasks.insert(task.id.clone(), task.clone());
        Ok(task.clone())
    }

    async fn get_by_id(&self, id: &str) -> PublishResult<Option<PublishTask>> {
        let tasks = self.tasks.lock().unwrap();
        Ok(tasks.get(id).cloned())
    }

    async fn list(&self, filter: &TaskFilter) -> PublishResult<(Vec<PublishTask>, i64)> {
        let tasks = self.tasks.lock().unwrap();
        let mut filtered: Vec<PublishTask> = tasks
            .values()
            .filter(|t| filter.status.map_or(true, |s| t.status == s))
            .filter(|t| filter.platform_id.map_or(true, |p| t.platform_id == p))
            .cloned()
            .collect();

        filtered.sort_by(|a, b| {
            let ord = match filter.order_by {
                TaskOrderBy::ScheduledTime => a.scheduled_time.cmp(&b.scheduled_time),
                TaskOrderBy::CreatedAt => a.created_at.cmp(&b.created_at),
                TaskOrderBy::Status => a.status.as_str().cmp(b.status.as_str()),
            };
            match filter.order_dir {
                publisher_domain::OrderDir::Asc => ord,
                publisher_domain::OrderDir::Desc => ord.reverse(),
            }
        });

        let total = filtered.len() as i64;
        let items = filtered
            .into_iter()
            .skip(filter.offset().max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect();

        Ok((items, total))
    }

    async fn claim_due(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> PublishResult<Option<PublishTask>> {
        let mut tasks = self.tasks.lock().unwrap();
        match tasks.get_mut(id) {
            Some(task) if task.status == PublishTaskStatus::Scheduled => {
                task.status = PublishTaskStatus::Processing;
                task.claimed_at = Some(now);
                task.updated_at = now;
                Ok(Some(task.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn complete(
        &self,
        id: &str,
        outcome: &PublishOutcome,
    ) -> PublishResult<Option<PublishTask>> {
        let mut tasks = self.tasks.lock().unwrap();
        match tasks.get_mut(id) {
            Some(task) if task.status == PublishTaskStatus::Processing => {
                let now = Utc::now();
                match outcome {
                    PublishOutcome::Success { published_url } => {
                        task.status = PublishTaskStatus::Completed;
                        task.published_url = Some(published_url.clone());
                        task.error_message = None;
                        task.published_at = Some(now);
                    }
                    PublishOutcome::Failure { error_message } => {
                        task.status = PublishTaskStatus::Failed;
                        task.error_message = Some(error_message.clone());
                        task.published_url = None;
                    }
                }
                task.updated_at = now;
                Ok(Some(task.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn cancel(&self, id: &str) -> PublishResult<Option<PublishTask>> {
        let mut tasks = self.tasks.lock().unwrap();
        match tasks.get_mut(id) {
            Some(task) if task.status == PublishTaskStatus::Scheduled => {
                task.status = PublishTaskStatus::Cancelled;
                task.updated_at = Utc::now();
                Ok(Some(task.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn reschedule_retry(
        &self,
        id: &str,
        new_time: DateTime<Utc>,
    ) -> PublishResult<Option<PublishTask>> {
        let mut tasks = self.tasks.lock().unwrap();
        match tasks.get_mut(id) {
            Some(task) if task.status == PublishTaskStatus::Failed => {
                task.status = PublishTaskStatus::Scheduled;
                task.scheduled_time = new_time;
                task.retry_count += 1;
                task.error_message = None;
                task.claimed_at = None;
                task.updated_at = Utc::now();
                Ok(Some(task.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn release_stuck(
        &self,
        older_than: DateTime<Utc>,
    ) -> PublishResult<Vec<PublishTask>> {
        let mut tasks = self.tasks.lock().unwrap();
        let mut released = Vec::new();
        for task in tasks.values_mut() {
            let stuck = task.status == PublishTaskStatus::Processing
                && task.claimed_at.is_some_and(|claimed| claimed < older_than);
            if stuck {
                task.status = PublishTaskStatus::Scheduled;
                task.claimed_at = None;
                task.updated_at = Utc::now();
                released.push(task.clone());
            }
        }
        Ok(released)
    }

    async fn get_scheduled(&self) -> PublishResult<Vec<PublishTask>> {
        let tasks = self.tasks.lock().unwrap();
        Ok(tasks
            .values()
            .filter(|t| t.status == PublishTaskStatus::Scheduled)
            .cloned()
            .collect())
    }
}

/// Mock implementation of TimeIndex for testing
#[derive(Debug, Clone, Default)]
pub struct MemoryTimeIndex {
    entries: Arc<Mutex<HashMap<String, DateTime<Utc>>>>,
}

impl MemoryTimeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TimeIndex for MemoryTimeIndex {
    async fn insert(&self, task_id: &str, due_at: DateTime<Utc>) -> PublishResult<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(task_id.to_string(), due_at);
        Ok(())
    }

    async fn remove(&self, task_id: &str) -> PublishResult<()> {
        self.entries.lock().unwrap().remove(task_id);
        Ok(())
    }

    async fn due_task_ids(&self, now: DateTime<Utc>) -> PublishResult<Vec<String>> {
        let entries = self.entries.lock().unwrap();
        let mut due: Vec<(String, DateTime<Utc>)> = entries
            .iter()
            .filter(|(_, due_at)| **due_at <= now)
            .map(|(id, due_at)| (id.clone(), *due_at))
            .collect();
        due.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        Ok(due.into_iter().map(|(id, _)| id).collect())
    }

    async fn contains(&self, task_id: &str) -> PublishResult<bool> {
        Ok(self.entries.lock().unwrap().contains_key(task_id))
    }

    async fn entries(&self) -> PublishResult<Vec<(String, DateTime<Utc>)>> {
        let entries = self.entries.lock().unwrap();
        let mut all: Vec<(String, DateTime<Utc>)> =
            entries.iter().map(|(id, t)| (id.clone(), *t)).collect();
        all.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        Ok(all)
    }
}

/// Mock implementation of AnalyticsRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MemoryAnalyticsRepository {
    records: Arc<Mutex<HashMap<String, AnalyticsRecord>>>,
}

impl MemoryAnalyticsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl AnalyticsRepository for MemoryAnalyticsRepository {
    async fn track_publish_result(&self, task: &PublishTask) -> PublishResult<AnalyticsRecord> {
        let mut records = self.records.lock().unwrap();
        let now = Utc::now();
        let record = records
            .entry(task.id.clone())
            .and_modify(|r| r.last_tracked_at = now)
            .or_insert_with(|| AnalyticsRecord {
                task_id: task.id.clone(),
                platform_id: task.platform_id,
                content_id: task.content_id.clone(),
                published_at: task.published_at,
                current_views: 0,
                current_likes: 0,
                current_comments: 0,
                current_shares: 0,
                current_collects: 0,
                tracking_count: 0,
                last_tracked_at: now,
            });
        Ok(record.clone())
    }

    async fn update_metrics(
        &self,
        task_id: &str,
        metrics: &MetricsUpdate,
    ) -> PublishResult<Option<AnalyticsRecord>> {
        let mut records = self.records.lock().unwrap();
        match records.get_mut(task_id) {
            Some(record) => {
                record.current_views = metrics.views;
                record.current_likes = metrics.likes;
                record.current_comments = metrics.comments;
                record.current_shares = metrics.shares;
                record.current_collects = metrics.collects;
                record.tracking_count += 1;
                record.last_tracked_at = Utc::now();
                Ok(Some(record.clone()))
            }
            None => Ok(None),
        }
    }

    async fn get_by_task_id(&self, task_id: &str) -> PublishResult<Option<AnalyticsRecord>> {
        Ok(self.records.lock().unwrap().get(task_id).cloned())
    }

    async fn overall_stats(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> PublishResult<OverallStats> {
        let records = self.records.lock().unwrap();
        let in_range: Vec<&AnalyticsRecord> = records
            .values()
            .filter(|r| match (r.published_at, start) {
                (Some(p), Some(s)) => p >= s,
                (None, Some(_)) => false,
                _ => true,
            })
            .filter(|r| match (r.published_at, end) {
                (Some(p), Some(e)) => p <= e,
                (None, Some(_)) => false,
                _ => true,
            })
            .collect();

        let total = in_range.len() as i64;
        let mut stats = OverallStats {
            total_published: total,
            ..OverallStats::default()
        };
        for r in &in_range {
            stats.total_views += r.current_views;
            stats.total_likes += r.current_likes;
            stats.total_comments += r.current_comments;
            stats.total_shares += r.current_shares;
        }
        if total > 0 {
            stats.avg_views = stats.total_views as f64 / total as f64;
            stats.avg_likes = stats.total_likes as f64 / total as f64;
            stats.avg_comments = stats.total_comments as f64 / total as f64;
        }
        Ok(stats)
    }
}

/// How a stub executor responds to execute calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubBehavior {
    /// Always resolve with a synthetic published URL
    Succeed,
    /// Always resolve with a failure reason
    Fail,
    /// Never resolve; exercises the scheduler-side timeout
    Hang,
}

/// Stub executor with a programmable behavior and an invocation counter
pub struct StubPublishExecutor {
    behavior: StubBehavior,
    latency: Duration,
    invocations: AtomicUsize,
}

impl StubPublishExecutor {
    pub fn succeeding() -> Self {
        Self::new(StubBehavior::Succeed)
    }

    pub fn failing() -> Self {
        Self::new(StubBehavior::Fail)
    }

    pub fn hanging() -> Self {
        Self::new(StubBehavior::Hang)
    }

    pub fn new(behavior: StubBehavior) -> Self {
        Self {
            behavior,
            latency: Duration::ZERO,
            invocations: AtomicUsize::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PublishExecutor for StubPublishExecutor {
    async fn execute(&self, task: &PublishTask) -> PublishResult<PublishOutcome> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match self.behavior {
            StubBehavior::Succeed => Ok(PublishOutcome::Success {
                published_url: format!("https://platform.com/post/{}", task.id),
            }),
            StubBehavior::Fail => Ok(PublishOutcome::Failure {
                error_message: "platform rejected the publish request".to_string(),
            }),
            StubBehavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}
