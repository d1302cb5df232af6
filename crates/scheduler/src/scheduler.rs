use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use publisher_domain::{
    PublishError, PublishOutcome, PublishResult, PublishTask, PublishTaskRepository,
    SchedulePublishRequest, TaskFilter, TaskPage, TimeIndex,
};

use crate::analytics::AnalyticsService;
use crate::executor::PublishExecutor;
use crate::reconciler::ReconciliationService;
use crate::retry::RetryPolicy;

/// 调度器运行参数
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub poll_interval: Duration,
    pub executor_timeout: Duration,
    pub retry_policy: RetryPolicy,
    /// 显式重试次数上限，None表示不限制
    pub max_retries: Option<i32>,
    pub reconcile_interval: Duration,
    pub stuck_task_threshold: Duration,
    /// 索引修复只处理这个时长之前更新的scheduled任务
    pub index_staleness: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            executor_timeout: Duration::from_secs(30),
            retry_policy: RetryPolicy::default(),
            max_retries: None,
            reconcile_interval: Duration::from_secs(60),
            stuck_task_threshold: Duration::from_secs(600),
            index_staleness: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub is_running: bool,
    pub poll_interval_ms: u64,
}

struct SchedulerRuntime {
    shutdown_tx: broadcast::Sender<()>,
    poll_handle: JoinHandle<()>,
    reconcile_handle: JoinHandle<()>,
}

/// 发布调度器
///
/// 独占自己的生命周期：`start`/`stop`控制后台轮询，重复`start`是
/// 幂等空操作（记录警告）。所有状态迁移都通过仓储的条件更新完成，
/// HTTP触发的操作与轮询循环并发执行时不需要额外的进程内锁
pub struct PublishScheduler {
    task_repo: Arc<dyn PublishTaskRepository>,
    time_index: Arc<dyn TimeIndex>,
    executor: Arc<dyn PublishExecutor>,
    analytics: Option<Arc<AnalyticsService>>,
    settings: SchedulerSettings,
    running: AtomicBool,
    runtime: Mutex<Option<SchedulerRuntime>>,
}

impl PublishScheduler {
    pub fn new(
        task_repo: Arc<dyn PublishTaskRepository>,
        time_index: Arc<dyn TimeIndex>,
        executor: Arc<dyn PublishExecutor>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            task_repo,
            time_index,
            executor,
            analytics: None,
            settings,
            running: AtomicBool::new(false),
            runtime: Mutex::new(None),
        }
    }

    /// 挂接发布效果跟踪，成功发布后自动建立跟踪记录
    pub fn with_analytics(mut self, analytics: Arc<AnalyticsService>) -> Self {
        self.analytics = Some(analytics);
        self
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// 安排一次发布
    ///
    /// 校验失败在任何写入之前返回。持久写入成功后索引写入失败不回滚，
    /// 由索引修复扫描补齐，持久存储是唯一事实来源
    pub async fn schedule_publish(
        &self,
        request: SchedulePublishRequest,
    ) -> PublishResult<PublishTask> {
        let scheduled_time = Self::validate_request(&request)?;

        let task = PublishTask::new(
            request.content_id,
            request.platform_id,
            request.platform_account_id,
            scheduled_time,
            request.timezone,
            request.metadata,
        );

        let created = self.task_repo.create(&task).await?;

        if let Err(e) = self
            .time_index
            .insert(&created.id, created.scheduled_time)
            .await
        {
            warn!(
                task_id = %created.id,
                "任务写入时间索引失败，等待索引修复扫描补齐: {e}"
            );
        }

        counter!("publisher_tasks_scheduled_total").increment(1);
        info!(
            task_id = %created.id,
            content_id = %created.content_id,
            platform_id = created.platform_id,
            scheduled_time = %created.scheduled_time.to_rfc3339(),
            "发布任务已安排"
        );

        Ok(created)
    }

    /// 取消调度，仅scheduled状态的任务可取消
    pub async fn cancel_schedule(&self, task_id: &str) -> PublishResult<PublishTask> {
        match self.task_repo.cancel(task_id).await? {
            Some(task) => {
                if let Err(e) = self.time_index.remove(task_id).await {
                    warn!(task_id, "取消任务后移除时间索引失败: {e}");
                }
                counter!("publisher_tasks_cancelled_total").increment(1);
                info!(task_id, "发布任务已取消");
                Ok(task)
            }
            None => Err(self.not_found_or_invalid(task_id, "cancel").await),
        }
    }

    /// 重试失败的任务：按重试策略计算新的调度时间，重试次数+1
    pub async fn retry_task(&self, task_id: &str) -> PublishResult<PublishTask> {
        let current = self
            .task_repo
            .get_by_id(task_id)
            .await?
            .ok_or_else(|| PublishError::task_not_found(task_id))?;

        if !current.is_retryable() {
            return Err(PublishError::invalid_state(
                task_id,
                current.status,
                "retry",
            ));
        }

        if let Some(cap) = self.settings.max_retries {
            if current.retry_count >= cap {
                warn!(task_id, retry_count = current.retry_count, "任务已达到重试上限");
                return Err(PublishError::invalid_state(
                    task_id,
                    current.status,
                    "retry",
                ));
            }
        }

        let new_time = self
            .settings
            .retry_policy
            .next_retry_time(current.retry_count, Utc::now());

        // 条件更新仍然以failed为前置状态，读取和写入之间的竞争在这里兜底
        match self.task_repo.reschedule_retry(task_id, new_time).await? {
            Some(task) => {
                if let Err(e) = self.time_index.insert(task_id, new_time).await {
                    warn!(task_id, "重试任务写入时间索引失败: {e}");
                }
                counter!("publisher_tasks_retried_total").increment(1);
                info!(
                    task_id,
                    retry_count = task.retry_count,
                    new_scheduled_time = %new_time.to_rfc3339(),
                    "发布任务已安排重试"
                );
                Ok(task)
            }
            None => Err(self.not_found_or_invalid(task_id, "retry").await),
        }
    }

    pub async fn get_task(&self, task_id: &str) -> PublishResult<PublishTask> {
        self.task_repo
            .get_by_id(task_id)
            .await?
            .ok_or_else(|| PublishError::task_not_found(task_id))
    }

    pub async fn list_tasks(&self, filter: &TaskFilter) -> PublishResult<TaskPage> {
        let (items, total) = self.task_repo.list(filter).await?;
        Ok(TaskPage {
            items,
            pagination: publisher_domain::Pagination::new(filter.page, filter.limit, total),
        })
    }

    /// 启动后台轮询和对账循环，启动时立即执行一次到期处理
    ///
    /// 重复启动是幂等空操作，返回false并记录警告
    pub fn start(self: Arc<Self>) -> bool {
        let mut runtime = self.runtime.lock().unwrap();
        if self.running.load(Ordering::SeqCst) {
            warn!("发布调度器已在运行中");
            return false;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        let poll_handle = {
            let scheduler = Arc::clone(&self);
            let shutdown_rx = shutdown_tx.subscribe();
            tokio::spawn(async move {
                scheduler.run_poll_loop(shutdown_rx).await;
            })
        };

        let reconcile_handle = {
            let scheduler = Arc::clone(&self);
            let shutdown_rx = shutdown_tx.subscribe();
            tokio::spawn(async move {
                scheduler.run_reconcile_loop(shutdown_rx).await;
            })
        };

        *runtime = Some(SchedulerRuntime {
            shutdown_tx,
            poll_handle,
            reconcile_handle,
        });
        self.running.store(true, Ordering::SeqCst);

        info!(
            poll_interval_ms = self.settings.poll_interval.as_millis() as u64,
            "发布调度器已启动"
        );
        true
    }

    /// 停止后台循环；已经派发给执行器的任务允许执行完毕
    pub async fn stop(&self) {
        let runtime = { self.runtime.lock().unwrap().take() };

        match runtime {
            Some(runtime) => {
                let _ = runtime.shutdown_tx.send(());
                let _ = runtime.poll_handle.await;
                let _ = runtime.reconcile_handle.await;
                self.running.store(false, Ordering::SeqCst);
                info!("发布调度器已停止");
            }
            None => {
                warn!("发布调度器未在运行");
            }
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            is_running: self.running.load(Ordering::SeqCst),
            poll_interval_ms: self.settings.poll_interval.as_millis() as u64,
        }
    }

    /// 处理当前所有到期任务，返回实际认领并执行的数量
    ///
    /// 索引或认领阶段的存储错误会提前结束本轮，任务仍然保留在
    /// scheduled状态等待下个周期；单个任务的执行失败不影响其余任务
    pub async fn process_due_tasks(&self) -> PublishResult<usize> {
        let started = std::time::Instant::now();
        let due_ids = self.time_index.due_task_ids(Utc::now()).await?;

        if due_ids.is_empty() {
            return Ok(0);
        }

        info!("处理 {} 个到期发布任务", due_ids.len());

        let mut processed = 0;
        for task_id in due_ids {
            match self.task_repo.claim_due(&task_id, Utc::now()).await {
                Ok(Some(task)) => {
                    // 认领成功立即移除索引条目，防止下个周期重复认领
                    if let Err(e) = self.time_index.remove(&task_id).await {
                        warn!(task_id = %task_id, "移除时间索引条目失败: {e}");
                    }
                    self.execute_claimed(task).await;
                    processed += 1;
                }
                Ok(None) => {
                    // 竞争失败或任务已被取消，索引条目已经过期
                    debug!(task_id = %task_id, "任务不在scheduled状态，跳过认领");
                    if let Err(e) = self.time_index.remove(&task_id).await {
                        warn!(task_id = %task_id, "移除过期索引条目失败: {e}");
                    }
                }
                Err(e) => {
                    error!(task_id = %task_id, "认领任务失败，本轮提前结束: {e}");
                    return Err(e);
                }
            }
        }

        histogram!("publisher_poll_duration_seconds").record(started.elapsed().as_secs_f64());
        Ok(processed)
    }

    /// 调用执行器并写回结果，永不向轮询循环抛出错误
    async fn execute_claimed(&self, task: PublishTask) {
        let started = std::time::Instant::now();
        let timeout = self.settings.executor_timeout;

        let outcome = match tokio::time::timeout(timeout, self.executor.execute(&task)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => PublishOutcome::Failure {
                error_message: e.to_string(),
            },
            Err(_) => PublishOutcome::Failure {
                error_message: format!("发布执行超过{}秒未返回", timeout.as_secs()),
            },
        };

        histogram!("publisher_execution_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match self.task_repo.complete(&task.id, &outcome).await {
            Ok(Some(updated)) => match &outcome {
                PublishOutcome::Success { published_url } => {
                    counter!("publisher_publish_success_total").increment(1);
                    info!(
                        task_id = %updated.id,
                        published_url = %published_url,
                        "发布任务执行成功"
                    );
                    if let Some(analytics) = &self.analytics {
                        // 效果跟踪失败不影响任务本身
                        if let Err(e) = analytics.track_publish_result(&updated).await {
                            warn!(task_id = %updated.id, "建立发布效果跟踪失败: {e}");
                        }
                    }
                }
                PublishOutcome::Failure { error_message } => {
                    counter!("publisher_publish_failure_total").increment(1);
                    warn!(
                        task_id = %updated.id,
                        error_message = %error_message,
                        "发布任务执行失败"
                    );
                }
            },
            Ok(None) => {
                warn!(task_id = %task.id, "写入执行结果时任务已不在processing状态");
            }
            Err(e) => {
                // 结果写入失败会留下processing状态的任务，由卡死任务回收兜底
                error!(task_id = %task.id, "记录执行结果失败: {e}");
            }
        }
    }

    async fn run_poll_loop(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(self.settings.poll_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.process_due_tasks().await {
                        error!("处理到期任务失败: {e}");
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("轮询循环收到关闭信号");
                    break;
                }
            }
        }
    }

    async fn run_reconcile_loop(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        let reconciler = ReconciliationService::new(
            Arc::clone(&self.task_repo),
            Arc::clone(&self.time_index),
            self.settings.stuck_task_threshold,
            self.settings.index_staleness,
        );
        let mut interval = tokio::time::interval(self.settings.reconcile_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = reconciler.run_once().await {
                        error!("对账扫描失败: {e}");
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("对账循环收到关闭信号");
                    break;
                }
            }
        }
    }

    /// 把条件更新未命中映射为"不存在"或"状态不合法"
    async fn not_found_or_invalid(&self, task_id: &str, operation: &'static str) -> PublishError {
        match self.task_repo.get_by_id(task_id).await {
            Ok(Some(task)) => PublishError::invalid_state(task_id, task.status, operation),
            Ok(None) => PublishError::task_not_found(task_id),
            Err(e) => e,
        }
    }

    /// 调度请求校验，任何写入之前完成
    fn validate_request(request: &SchedulePublishRequest) -> PublishResult<DateTime<Utc>> {
        if request.content_id.trim().is_empty() {
            return Err(PublishError::validation("content_id不能为空"));
        }
        if request.platform_id <= 0 {
            return Err(PublishError::validation("platform_id必须为正整数"));
        }
        if request.scheduled_time.trim().is_empty() {
            return Err(PublishError::validation("scheduled_time不能为空"));
        }

        let scheduled_time = Self::parse_scheduled_time(&request.scheduled_time)?;

        if scheduled_time <= Utc::now() {
            return Err(PublishError::validation("scheduled_time必须晚于当前时间"));
        }

        Ok(scheduled_time)
    }

    /// 支持RFC 3339和"YYYY-MM-DD HH:MM:SS"（按UTC解释）两种格式
    fn parse_scheduled_time(raw: &str) -> PublishResult<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
            return Ok(naive.and_utc());
        }
        Err(PublishError::validation(format!(
            "无法解析scheduled_time: {raw}"
        )))
    }
}
