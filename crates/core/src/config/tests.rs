use super::*;

#[test]
fn test_default_config_is_valid() {
    let config = AppConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.scheduler.poll_interval_seconds, 60);
    assert_eq!(config.scheduler.retry_base_delay_seconds, 300);
    assert_eq!(config.scheduler.retry_strategy, "fixed");
    assert!(config.scheduler.max_retries.is_none());
    assert_eq!(config.redis.schedule_key, "publish:schedule");
}

#[test]
fn test_from_toml_overrides() {
    let toml_str = r#"
        [database]
        url = "postgresql://db.internal/publisher"
        max_connections = 20
        min_connections = 2
        connection_timeout_seconds = 10
        idle_timeout_seconds = 300

        [redis]
        url = "redis://cache.internal:6379"
        schedule_key = "publish:schedule"

        [scheduler]
        enabled = true
        poll_interval_seconds = 5
        executor_timeout_seconds = 15
        retry_strategy = "exponential"
        retry_base_delay_seconds = 60
        retry_backoff_multiplier = 2.0
        retry_max_delay_seconds = 1800
        retry_jitter_factor = 0.1
        max_retries = 5
        reconcile_interval_seconds = 30
        stuck_task_threshold_seconds = 300
        index_staleness_seconds = 60

        [api]
        enabled = true
        bind_address = "127.0.0.1:9090"
        cors_enabled = false
        cors_origins = []
        request_timeout_seconds = 10
    "#;

    let config = AppConfig::from_toml(toml_str).unwrap();
    assert_eq!(config.database.max_connections, 20);
    assert_eq!(config.scheduler.poll_interval_seconds, 5);
    assert_eq!(config.scheduler.retry_strategy, "exponential");
    assert_eq!(config.scheduler.max_retries, Some(5));
    assert_eq!(config.api.bind_address, "127.0.0.1:9090");
}

#[test]
fn test_bad_gateway_url_rejected() {
    let mut config = AppConfig::default();
    config.scheduler.publish_gateway_url = Some("ftp://gateway".to_string());
    assert!(config.validate().is_err());

    config.scheduler.publish_gateway_url = Some("http://localhost:9000/publish".to_string());
    assert!(config.validate().is_ok());
}

#[test]
fn test_invalid_retry_strategy_rejected() {
    let mut config = AppConfig::default();
    config.scheduler.retry_strategy = "random".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_zero_poll_interval_rejected() {
    let mut config = AppConfig::default();
    config.scheduler.poll_interval_seconds = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_bad_bind_address_rejected() {
    let mut config = AppConfig::default();
    config.api.bind_address = "not-an-address".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_bad_redis_url_rejected() {
    let mut config = AppConfig::default();
    config.redis.url = "http://localhost".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_toml_roundtrip() {
    let config = AppConfig::default();
    let toml_str = config.to_toml().unwrap();
    let parsed = AppConfig::from_toml(&toml_str).unwrap();
    assert_eq!(parsed.database.url, config.database.url);
    assert_eq!(
        parsed.scheduler.stuck_task_threshold_seconds,
        config.scheduler.stuck_task_threshold_seconds
    );
}

#[test]
fn test_jitter_factor_bounds() {
    let mut config = AppConfig::default();
    config.scheduler.retry_jitter_factor = 1.5;
    assert!(config.validate().is_err());
    config.scheduler.retry_jitter_factor = 0.3;
    assert!(config.validate().is_ok());
}
