//! 锁命令行工具
//!
//! 获取指定资源的锁，持有一段时间（或直到收到 Ctrl-C）后释放。
//!
//! ```text
//! keylock <name> [hold_ms]
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use keylock::{AcquireOptions, LockConfig, LockManager};
use keylock_shared::{config::AppConfig, observability};
use tokio::signal;
use tracing::{info, warn};

const SERVICE_NAME: &str = "keylock";

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "keylock")]
#[command(about = "获取资源锁，持有一段时间后释放", long_about = None)]
#[command(version)]
struct Args {
    /// 资源名，锁键为 `<name>.lock`
    name: String,

    /// 持有时长（毫秒）
    #[arg(default_value_t = 1000)]
    hold_ms: u64,
}

impl Args {
    fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = AppConfig::load(SERVICE_NAME).unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig {
            service_name: SERVICE_NAME.to_string(),
            ..AppConfig::default()
        }
    });
    let _guard = observability::init(&config.service_name, &config.observability)?;

    info!(environment = %config.environment, "Configuration loaded");

    let manager = LockManager::connect(&config.redis, LockConfig::from(&config.lock))
        .await
        .context("failed to connect to Redis")?;

    let mut handle = manager.acquire(&args.name, AcquireOptions::new()).await?;
    info!(
        name = %handle.name(),
        expires_at = ?handle.expires_at_utc(),
        hold_ms = args.hold_ms,
        "Lock held"
    );

    tokio::select! {
        _ = tokio::time::sleep(args.hold()) => {}
        _ = signal::ctrl_c() => {
            warn!("Interrupted, releasing lock early");
        }
    }

    let released = handle.release().await;
    manager.shutdown().await?;
    released?;

    info!(name = %args.name, "Lock released");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use clap::error::ErrorKind;

    #[test]
    fn test_args_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_hold_defaults_to_one_second() {
        let args = Args::try_parse_from(["keylock", "orders"]).unwrap();
        assert_eq!(args.name, "orders");
        assert_eq!(args.hold(), Duration::from_millis(1000));
    }

    #[test]
    fn test_explicit_hold() {
        let args = Args::try_parse_from(["keylock", "orders", "250"]).unwrap();
        assert_eq!(args.hold(), Duration::from_millis(250));
    }

    #[test]
    fn test_help_is_not_a_resource_name() {
        let err = Args::try_parse_from(["keylock", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_rejects_bad_input() {
        let missing = Args::try_parse_from(["keylock"]).unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::MissingRequiredArgument);

        let bad_hold = Args::try_parse_from(["keylock", "orders", "soon"]).unwrap_err();
        assert_eq!(bad_hold.kind(), ErrorKind::ValueValidation);

        let extra = Args::try_parse_from(["keylock", "orders", "10", "20"]).unwrap_err();
        assert_eq!(extra.kind(), ErrorKind::UnknownArgument);

        let flag = Args::try_parse_from(["keylock", "--bogus"]).unwrap_err();
        assert_eq!(flag.kind(), ErrorKind::UnknownArgument);
    }
}
