//! 测试工具模块
//!
//! 提供集成测试所需的配置辅助函数和测试数据生成器。

use uuid::Uuid;

use crate::config::{LockSettings, RedisConfig};

/// 创建测试用 Redis 配置
///
/// 优先使用 REDIS_URL 环境变量，否则使用本地 1 号库，避免污染默认库
pub fn test_redis_config() -> RedisConfig {
    RedisConfig {
        url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379/1".to_string()),
    }
}

/// 创建测试用锁参数
///
/// 重试间隔缩短到 50ms，使竞争类测试在百毫秒级完成
pub fn test_lock_settings() -> LockSettings {
    LockSettings {
        retry_delay_ms: 50,
        ..Default::default()
    }
}

/// 生成唯一的资源名
///
/// 并行测试共用同一个 Redis 时，每个用例使用独立的锁 key
pub fn unique_resource_name(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}
