//! test_utils 模块的集成测试

use keylock_shared::test_utils::*;

#[test]
fn test_lock_settings_shorten_retry_delay() {
    let settings = test_lock_settings();
    assert_eq!(settings.retry_delay_ms, 50);
    assert_eq!(settings.ttl_ms, 300_000);
    assert_eq!(settings.timeout_ms, 30_000);
}

#[test]
fn test_unique_resource_name() {
    let a = unique_resource_name("orders");
    let b = unique_resource_name("orders");

    assert!(a.starts_with("orders-"));
    assert_ne!(a, b);
}

#[test]
fn test_redis_config_has_url() {
    let config = test_redis_config();
    assert!(config.url.starts_with("redis://"));
}
