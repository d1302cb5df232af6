//! 系统配置
//!
//! 加载顺序：默认值 -> TOML配置文件 -> 环境变量覆盖（前缀PUBLISHER_）

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub scheduler: SchedulerConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
}

impl DatabaseConfig {
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            anyhow::bail!("数据库URL不能为空");
        }
        if self.max_connections == 0 {
            anyhow::bail!("数据库最大连接数必须大于0");
        }
        if self.min_connections > self.max_connections {
            anyhow::bail!("数据库最小连接数不能大于最大连接数");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    /// 时间索引使用的sorted set键名
    pub schedule_key: String,
}

impl RedisConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
            anyhow::bail!("Redis URL必须以redis://或rediss://开头");
        }
        if self.schedule_key.is_empty() {
            anyhow::bail!("时间索引键名不能为空");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub poll_interval_seconds: u64,
    pub executor_timeout_seconds: u64,
    /// 发布网关地址；缺省使用模拟执行器
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_gateway_url: Option<String>,
    /// 重试延迟策略："fixed" 或 "exponential"
    pub retry_strategy: String,
    pub retry_base_delay_seconds: u64,
    pub retry_backoff_multiplier: f64,
    pub retry_max_delay_seconds: u64,
    /// 重试延迟的随机抖动范围（0.0-1.0）
    pub retry_jitter_factor: f64,
    /// 显式重试次数上限，缺省不限制
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<i32>,
    pub reconcile_interval_seconds: u64,
    pub stuck_task_threshold_seconds: u64,
    /// 索引修复只处理这个时长之前创建的scheduled任务，避免与进行中的写入竞争
    pub index_staleness_seconds: u64,
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_seconds == 0 {
            anyhow::bail!("轮询间隔必须大于0秒");
        }
        if self.executor_timeout_seconds == 0 {
            anyhow::bail!("执行超时必须大于0秒");
        }
        if let Some(url) = &self.publish_gateway_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("发布网关地址必须以http://或https://开头");
            }
        }
        if !matches!(self.retry_strategy.as_str(), "fixed" | "exponential") {
            anyhow::bail!("不支持的重试策略: {}", self.retry_strategy);
        }
        if self.retry_base_delay_seconds == 0 {
            anyhow::bail!("重试基础延迟必须大于0秒");
        }
        if !(0.0..=1.0).contains(&self.retry_jitter_factor) {
            anyhow::bail!("重试抖动范围必须在0.0-1.0之间");
        }
        if self.stuck_task_threshold_seconds == 0 {
            anyhow::bail!("卡死任务阈值必须大于0秒");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub cors_enabled: bool,
    pub cors_origins: Vec<String>,
    pub request_timeout_seconds: u64,
}

impl ApiConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bind_address.parse::<std::net::SocketAddr>().is_err() {
            anyhow::bail!("无效的API绑定地址: {}", self.bind_address);
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost/publisher".to_string(),
                max_connections: 10,
                min_connections: 1,
                connection_timeout_seconds: 30,
                idle_timeout_seconds: 600,
            },
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
                schedule_key: "publish:schedule".to_string(),
            },
            scheduler: SchedulerConfig {
                enabled: true,
                poll_interval_seconds: 60,
                executor_timeout_seconds: 30,
                publish_gateway_url: None,
                retry_strategy: "fixed".to_string(),
                retry_base_delay_seconds: 300,
                retry_backoff_multiplier: 2.0,
                retry_max_delay_seconds: 3600,
                retry_jitter_factor: 0.0,
                max_retries: None,
                reconcile_interval_seconds: 60,
                stuck_task_threshold_seconds: 600,
                index_staleness_seconds: 120,
            },
            api: ApiConfig {
                enabled: true,
                bind_address: "0.0.0.0:8080".to_string(),
                cors_enabled: true,
                cors_origins: vec!["*".to_string()],
                request_timeout_seconds: 30,
            },
        }
    }
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// `config_path`为None时依次尝试默认路径，都不存在则使用内置默认值
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = AppConfig::default();
        let mut builder = ConfigBuilder::builder()
            .add_source(config::File::from_str(
                &toml::to_string(&defaults).context("序列化默认配置失败")?,
                FileFormat::Toml,
            ));

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = [
                "config/publisher.toml",
                "publisher.toml",
                "/etc/publisher/config.toml",
            ];
            for path in &default_paths {
                if Path::new(path).exists() {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                    break;
                }
            }
        }

        // 环境变量覆盖（前缀PUBLISHER_），优先级最高
        builder = builder.add_source(
            Environment::with_prefix("PUBLISHER")
                .separator("_")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    /// 从TOML字符串加载配置
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn validate(&self) -> Result<()> {
        self.database.validate().context("数据库配置验证失败")?;
        self.redis.validate().context("Redis配置验证失败")?;
        self.scheduler.validate().context("调度器配置验证失败")?;
        self.api.validate().context("API配置验证失败")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
