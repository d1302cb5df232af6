//! 基础设施层：Postgres仓储、Redis时间索引与指标导出

pub mod database;
pub mod observability;
pub mod redis_time_index;

pub use database::{
    DatabaseManager, PostgresAnalyticsRepository, PostgresPublishTaskRepository,
};
pub use observability::init_metrics;
pub use redis_time_index::RedisTimeIndex;
