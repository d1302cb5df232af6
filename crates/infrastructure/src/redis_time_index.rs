use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

use publisher_domain::{PublishError, PublishResult, TimeIndex};

/// 基于Redis sorted set的时间索引
///
/// 成员是任务ID，score是调度时间的毫秒时间戳，
/// "到期任务"即ZRANGEBYSCORE -inf now的结果。
/// 索引只是缓存，与持久存储不一致时由对账扫描修复
pub struct RedisTimeIndex {
    conn: ConnectionManager,
    key: String,
}

impl RedisTimeIndex {
    pub async fn new(url: &str, key: String) -> PublishResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| PublishError::time_index(format!("创建Redis客户端失败: {e}")))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| PublishError::time_index(format!("连接Redis失败: {e}")))?;

        let index = Self { conn, key };
        index.ping().await?;
        debug!(key = %index.key, "时间索引已连接Redis");

        Ok(index)
    }

    async fn ping(&self) -> PublishResult<()> {
        let mut conn = self.conn.clone();
        let response: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| PublishError::time_index(format!("Redis PING失败: {e}")))?;
        if response != "PONG" {
            return Err(PublishError::time_index(format!(
                "Redis PING返回异常: {response}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl TimeIndex for RedisTimeIndex {
    async fn insert(&self, task_id: &str, due_at: DateTime<Utc>) -> PublishResult<()> {
        let mut conn = self.conn.clone();
        let score = due_at.timestamp_millis();
        let _: () = conn
            .zadd(&self.key, task_id, score)
            .await
            .map_err(|e| PublishError::time_index(format!("ZADD失败: {e}")))?;
        Ok(())
    }

    async fn remove(&self, task_id: &str) -> PublishResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .zrem(&self.key, task_id)
            .await
            .map_err(|e| PublishError::time_index(format!("ZREM失败: {e}")))?;
        Ok(())
    }

    async fn due_task_ids(&self, now: DateTime<Utc>) -> PublishResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn
            .zrangebyscore(&self.key, "-inf", now.timestamp_millis())
            .await
            .map_err(|e| PublishError::time_index(format!("ZRANGEBYSCORE失败: {e}")))?;
        Ok(ids)
    }

    async fn contains(&self, task_id: &str) -> PublishResult<bool> {
        let mut conn = self.conn.clone();
        let score: Option<f64> = conn
            .zscore(&self.key, task_id)
            .await
            .map_err(|e| PublishError::time_index(format!("ZSCORE失败: {e}")))?;
        Ok(score.is_some())
    }

    async fn entries(&self) -> PublishResult<Vec<(String, DateTime<Utc>)>> {
        let mut conn = self.conn.clone();
        let raw: Vec<(String, f64)> = conn
            .zrange_withscores(&self.key, 0, -1)
            .await
            .map_err(|e| PublishError::time_index(format!("ZRANGE失败: {e}")))?;

        Ok(raw
            .into_iter()
            .filter_map(|(id, score)| {
                DateTime::<Utc>::from_timestamp_millis(score as i64).map(|t| (id, t))
            })
            .collect())
    }
}
