//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Redis 配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
        }
    }
}

/// 锁参数配置
///
/// 时间类字段统一以毫秒表示，便于在 TOML 和环境变量中书写。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LockSettings {
    /// 锁的有效期
    pub ttl_ms: u64,
    /// 判定持有者失效前允许的时钟漂移
    pub ttl_drift_ms: u64,
    /// 获取锁的最长等待时间
    pub timeout_ms: u64,
    /// 重试退避的基准间隔，实际等待为 [retry_delay, 2 * retry_delay)
    pub retry_delay_ms: u64,
    /// 严格所有权模式：接管使用 CAS，释放使用比较删除
    pub strict_ownership: bool,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            ttl_ms: 5 * 60 * 1000,
            ttl_drift_ms: 100,
            timeout_ms: 30 * 1000,
            retry_delay_ms: 1000,
            strict_ownership: false,
        }
    }
}

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// 日志输出格式：json（结构化）或 pretty（人类可读）
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl ObservabilityConfig {
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub redis: RedisConfig,
    pub lock: LockSettings,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（KEYLOCK_ 前缀，双下划线分隔层级，如 KEYLOCK_LOCK__TTL_MS -> lock.ttl_ms）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("KEYLOCK_ENV").unwrap_or_else(|_| "development".to_string());

        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env.clone())?
            .add_source(File::from(Path::new(&config_dir).join("default.toml")).required(false))
            .add_source(
                File::from(Path::new(&config_dir).join(format!("{}.toml", env))).required(false),
            )
            .add_source(
                File::from(Path::new(&config_dir).join(format!("{}.toml", service_name)))
                    .required(false),
            )
            // 字段名本身含下划线（ttl_ms），因此层级分隔符使用双下划线
            .add_source(
                Environment::with_prefix("KEYLOCK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}
