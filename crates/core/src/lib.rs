//! 发布调度系统的基础设施无关核心：配置与日志初始化

pub mod config;
pub mod logging;

pub use config::{ApiConfig, AppConfig, DatabaseConfig, RedisConfig, SchedulerConfig};
pub use logging::init_logging;
