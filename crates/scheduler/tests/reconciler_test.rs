use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use publisher_domain::{PublishTaskRepository, PublishTaskStatus, TimeIndex};
use publisher_scheduler::ReconciliationService;
use publisher_testing_utils::{MemoryPublishTaskRepository, MemoryTimeIndex, PublishTaskBuilder};

fn make_reconciler(
    stuck_threshold: Duration,
    index_staleness: Duration,
) -> (
    ReconciliationService,
    Arc<MemoryPublishTaskRepository>,
    Arc<MemoryTimeIndex>,
) {
    let task_repo = Arc::new(MemoryPublishTaskRepository::new());
    let time_index = Arc::new(MemoryTimeIndex::new());
    let reconciler = ReconciliationService::new(
        task_repo.clone(),
        time_index.clone(),
        stuck_threshold,
        index_staleness,
    );
    (reconciler, task_repo, time_index)
}

#[tokio::test]
async fn test_stuck_processing_task_requeued() {
    let (reconciler, task_repo, time_index) =
        make_reconciler(Duration::from_secs(600), Duration::from_secs(0));

    // 认领后20分钟仍未写结果，超过10分钟阈值
    let stuck = PublishTaskBuilder::new()
        .with_id("pub_stuck")
        .processing_since(Utc::now() - chrono::Duration::minutes(20))
        .build();
    task_repo.put(stuck);

    let report = reconciler.run_once().await.unwrap();
    assert_eq!(report.stuck_requeued, 1);

    let restored = task_repo.get_by_id("pub_stuck").await.unwrap().unwrap();
    assert_eq!(restored.status, PublishTaskStatus::Scheduled);
    assert!(restored.claimed_at.is_none());
    assert!(time_index.contains("pub_stuck").await.unwrap());
}

#[tokio::test]
async fn test_fresh_processing_task_left_alone() {
    let (reconciler, task_repo, _) =
        make_reconciler(Duration::from_secs(600), Duration::from_secs(0));

    let fresh = PublishTaskBuilder::new()
        .with_id("pub_fresh")
        .processing_since(Utc::now() - chrono::Duration::minutes(2))
        .build();
    task_repo.put(fresh);

    let report = reconciler.run_once().await.unwrap();
    assert_eq!(report.stuck_requeued, 0);

    let stored = task_repo.get_by_id("pub_fresh").await.unwrap().unwrap();
    assert_eq!(stored.status, PublishTaskStatus::Processing);
}

#[tokio::test]
async fn test_missing_index_entry_restored_for_stale_task() {
    let (reconciler, task_repo, time_index) =
        make_reconciler(Duration::from_secs(600), Duration::from_secs(60));

    // 持久存储中存在但索引丢失的任务（如索引写入失败）
    let lost = PublishTaskBuilder::new()
        .with_id("pub_lost")
        .with_created_at(Utc::now() - chrono::Duration::minutes(10))
        .build();
    task_repo.put(lost.clone());
    assert!(!time_index.contains("pub_lost").await.unwrap());

    let report = reconciler.run_once().await.unwrap();
    assert_eq!(report.index_restored, 1);
    assert!(time_index.contains("pub_lost").await.unwrap());
}

#[tokio::test]
async fn test_recently_written_task_not_repaired_yet() {
    let (reconciler, task_repo, time_index) =
        make_reconciler(Duration::from_secs(600), Duration::from_secs(60));

    // 刚写入的任务可能索引写入还在进行中，修复扫描先跳过
    let recent = PublishTaskBuilder::new().with_id("pub_recent").build();
    task_repo.put(recent);

    let report = reconciler.run_once().await.unwrap();
    assert_eq!(report.index_restored, 0);
    assert!(!time_index.contains("pub_recent").await.unwrap());
}

#[tokio::test]
async fn test_dead_index_entries_purged() {
    let (reconciler, task_repo, time_index) =
        make_reconciler(Duration::from_secs(600), Duration::from_secs(0));

    // 已取消任务的索引残留
    let cancelled = PublishTaskBuilder::new()
        .with_id("pub_cancelled")
        .with_status(PublishTaskStatus::Cancelled)
        .build();
    task_repo.put(cancelled);
    time_index
        .insert("pub_cancelled", Utc::now() + chrono::Duration::hours(1))
        .await
        .unwrap();
    // 持久存储中完全不存在的索引成员
    time_index
        .insert("pub_ghost", Utc::now() + chrono::Duration::hours(1))
        .await
        .unwrap();

    let report = reconciler.run_once().await.unwrap();
    assert_eq!(report.index_purged, 2);
    assert!(time_index.is_empty());
}

#[tokio::test]
async fn test_healthy_state_requires_no_repair() {
    let (reconciler, task_repo, time_index) =
        make_reconciler(Duration::from_secs(600), Duration::from_secs(0));

    let task = PublishTaskBuilder::new()
        .with_id("pub_ok")
        .with_created_at(Utc::now() - chrono::Duration::minutes(5))
        .build();
    task_repo.put(task.clone());
    time_index
        .insert("pub_ok", task.scheduled_time)
        .await
        .unwrap();

    let report = reconciler.run_once().await.unwrap();
    assert_eq!(report.stuck_requeued, 0);
    assert_eq!(report.index_restored, 0);
    assert_eq!(report.index_purged, 0);
    assert!(time_index.contains("pub_ok").await.unwrap());
}
