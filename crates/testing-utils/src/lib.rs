//! Shared testing utilities for the publish scheduler workspace
//!
//! Provides in-memory implementations of every domain port plus test data
//! builders, so unit and scenario tests run without Postgres or Redis.

pub mod builders;
pub mod mocks;

pub use builders::PublishTaskBuilder;
pub use mocks::{
    MemoryAnalyticsRepository, MemoryPublishTaskRepository, MemoryTimeIndex, StubBehavior,
    StubPublishExecutor,
};
