//! 发布调度领域层
//!
//! 定义发布任务实体、统一错误类型以及数据访问的抽象接口

pub mod entities;
pub mod errors;
pub mod ports;
pub mod repositories;

pub use entities::*;
pub use errors::{PublishError, PublishResult};
pub use ports::PublishExecutor;
pub use repositories::{AnalyticsRepository, PublishTaskRepository, TimeIndex};
