use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

use publisher_domain::{PublishError, PublishResult};

/// 重试延迟策略
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryStrategy {
    /// 固定延迟，与重试次数无关
    Fixed,
    /// 指数退避
    Exponential { multiplier: f64 },
}

/// 重试策略配置
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub strategy: RetryStrategy,
    /// 基础重试延迟
    pub base_delay: Duration,
    /// 指数退避的延迟上限
    pub max_delay: Duration,
    /// 延迟的随机抖动范围（0.0-1.0）
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            strategy: RetryStrategy::Fixed,
            base_delay: Duration::from_secs(300), // 5分钟
            max_delay: Duration::from_secs(3600), // 1小时
            jitter_factor: 0.0,
        }
    }
}

impl RetryPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            strategy: RetryStrategy::Fixed,
            base_delay: delay,
            ..Self::default()
        }
    }

    pub fn exponential(base: Duration, multiplier: f64, max: Duration) -> Self {
        Self {
            strategy: RetryStrategy::Exponential { multiplier },
            base_delay: base,
            max_delay: max,
            jitter_factor: 0.0,
        }
    }

    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor;
        self
    }

    /// 从配置字段构造策略
    pub fn from_config(
        strategy: &str,
        base_delay_seconds: u64,
        multiplier: f64,
        max_delay_seconds: u64,
        jitter_factor: f64,
    ) -> PublishResult<Self> {
        let strategy = match strategy {
            "fixed" => RetryStrategy::Fixed,
            "exponential" => RetryStrategy::Exponential { multiplier },
            other => {
                return Err(PublishError::config(format!("不支持的重试策略: {other}")));
            }
        };
        if !(0.0..=1.0).contains(&jitter_factor) {
            return Err(PublishError::config("重试抖动范围必须在0.0-1.0之间"));
        }

        Ok(Self {
            strategy,
            base_delay: Duration::from_secs(base_delay_seconds),
            max_delay: Duration::from_secs(max_delay_seconds),
            jitter_factor,
        })
    }

    /// 计算第`retry_count`次重试的延迟
    pub fn next_delay(&self, retry_count: i32) -> Duration {
        let raw = match self.strategy {
            RetryStrategy::Fixed => self.base_delay,
            RetryStrategy::Exponential { multiplier } => {
                let factor = multiplier.powi(retry_count.max(0));
                let secs = self.base_delay.as_secs_f64() * factor;
                Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
            }
        };

        if self.jitter_factor > 0.0 {
            let mut rng = rand::rng();
            let jitter = rng.random_range(-self.jitter_factor..=self.jitter_factor);
            let secs = (raw.as_secs_f64() * (1.0 + jitter)).max(0.0);
            Duration::from_secs_f64(secs)
        } else {
            raw
        }
    }

    /// 下次重试的绝对时间
    pub fn next_retry_time(&self, retry_count: i32, now: DateTime<Utc>) -> DateTime<Utc> {
        let delay = self.next_delay(retry_count);
        now + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::seconds(300))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_delay_ignores_retry_count() {
        let policy = RetryPolicy::fixed(Duration::from_secs(300));
        assert_eq!(policy.next_delay(0), Duration::from_secs(300));
        assert_eq!(policy.next_delay(7), Duration::from_secs(300));
    }

    #[test]
    fn test_exponential_delay_grows_and_caps() {
        let policy = RetryPolicy::exponential(
            Duration::from_secs(60),
            2.0,
            Duration::from_secs(600),
        );
        assert_eq!(policy.next_delay(0), Duration::from_secs(60));
        assert_eq!(policy.next_delay(1), Duration::from_secs(120));
        assert_eq!(policy.next_delay(2), Duration::from_secs(240));
        // 60 * 2^4 = 960 > 600，应该封顶
        assert_eq!(policy.next_delay(4), Duration::from_secs(600));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy::fixed(Duration::from_secs(100)).with_jitter(0.1);
        for _ in 0..50 {
            let delay = policy.next_delay(0).as_secs_f64();
            assert!((90.0..=110.0).contains(&delay), "delay {delay} out of range");
        }
    }

    #[test]
    fn test_next_retry_time_is_in_future() {
        let policy = RetryPolicy::default();
        let now = Utc::now();
        let next = policy.next_retry_time(3, now);
        assert_eq!((next - now).num_seconds(), 300);
    }

    #[test]
    fn test_from_config_rejects_unknown_strategy() {
        assert!(RetryPolicy::from_config("random", 60, 2.0, 600, 0.0).is_err());
        assert!(RetryPolicy::from_config("fixed", 60, 2.0, 600, 2.0).is_err());

        let policy = RetryPolicy::from_config("exponential", 60, 3.0, 600, 0.1).unwrap();
        assert_eq!(
            policy.strategy,
            RetryStrategy::Exponential { multiplier: 3.0 }
        );
    }
}
