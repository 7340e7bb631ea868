//! 统一可观测性模块
//!
//! 所有入口通过单一函数初始化日志，确保一致的字段命名和输出格式。
//! 指标通过 `metrics` 门面上报，是否安装导出器由宿主进程决定。

pub mod tracing;

use ::tracing::info;
use anyhow::Result;

use crate::config::ObservabilityConfig;

/// 可观测性资源守卫
///
/// 保持与进程同生命周期，Drop 时记录关闭日志。
pub struct ObservabilityGuard {
    service_name: String,
}

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        info!(service = %self.service_name, "Shutting down observability...");
    }
}

/// 统一初始化可观测性
///
/// # Example
///
/// ```ignore
/// use keylock_shared::{config::AppConfig, observability};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = AppConfig::load("keylock")?;
///     let _guard = observability::init(&config.service_name, &config.observability)?;
///     Ok(())
/// }
/// ```
pub fn init(service_name: &str, config: &ObservabilityConfig) -> Result<ObservabilityGuard> {
    tracing::init(config)?;

    info!(
        service = %service_name,
        log_level = %config.log_level,
        log_format = %config.log_format,
        "Observability initialized"
    );

    Ok(ObservabilityGuard {
        service_name: service_name.to_string(),
    })
}
