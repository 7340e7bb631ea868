//! 分布式锁管理器
//!
//! 在只有 SET/GET 语义的共享存储上实现互斥锁。锁记录是一个过期时间戳，
//! 持有者崩溃后，其他进程在记录过期后通过"读取-写回比较"接管。

use std::sync::Arc;
use std::time::Duration;

use keylock_shared::config::{LockSettings, RedisConfig};
use tracing::{debug, info, instrument, warn};

use super::backoff::{Deadline, duration_ms, jittered_delay, now_ms};
use super::lock_handle::LockHandle;
use super::lock_key;
use crate::error::{LockError, Result};
use crate::store::{LockStore, RedisStore};

/// 锁配置
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// 锁的有效期
    pub ttl: Duration,
    /// 时钟漂移容忍度，记录过期超过该值才允许接管
    pub ttl_drift: Duration,
    /// 获取锁的最长等待时间
    pub timeout: Duration,
    /// 退避基准间隔
    pub retry_delay: Duration,
    /// 接管使用 compare-and-set、释放使用比较删除
    pub strict_ownership: bool,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5 * 60),
            ttl_drift: Duration::from_millis(100),
            timeout: Duration::from_secs(30),
            retry_delay: Duration::from_secs(1),
            strict_ownership: false,
        }
    }
}

impl From<&LockSettings> for LockConfig {
    fn from(settings: &LockSettings) -> Self {
        Self {
            ttl: Duration::from_millis(settings.ttl_ms),
            ttl_drift: Duration::from_millis(settings.ttl_drift_ms),
            timeout: Duration::from_millis(settings.timeout_ms),
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
            strict_ownership: settings.strict_ownership,
        }
    }
}

/// 单次调用的参数覆盖，未设置的字段使用 [`LockConfig`] 中的值
#[derive(Debug, Clone, Default)]
pub struct AcquireOptions {
    pub ttl: Option<Duration>,
    pub timeout: Option<Duration>,
    pub retry_delay: Option<Duration>,
}

impl AcquireOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = Some(retry_delay);
        self
    }
}

/// 一次获取请求合并后的参数
struct Attempt<'a> {
    name: &'a str,
    lock_key: String,
    ttl: Duration,
    started_at: i64,
}

/// 分布式锁管理器
///
/// 持有存储连接，可通过 `Arc` 在多个任务间共享；自身不保存任何锁状态。
pub struct LockManager {
    store: Arc<dyn LockStore>,
    config: LockConfig,
}

impl LockManager {
    /// 创建锁管理器
    pub fn new(store: Arc<dyn LockStore>, config: LockConfig) -> Self {
        Self { store, config }
    }

    /// 使用默认配置创建锁管理器
    pub fn with_defaults(store: Arc<dyn LockStore>) -> Self {
        Self::new(store, LockConfig::default())
    }

    /// 连接 Redis 并创建锁管理器
    pub async fn connect(redis: &RedisConfig, config: LockConfig) -> Result<Self> {
        let store = RedisStore::open(redis).await?;
        Ok(Self::new(Arc::new(store), config))
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// 获取锁
    ///
    /// 反复尝试直到成功或超过 timeout。每次尝试前检查已用时间，
    /// 因此实际等待可能超出 timeout 一次尝试加一次退避的时长。
    #[instrument(skip(self, options), fields(strict = self.config.strict_ownership))]
    pub async fn acquire(&self, name: &str, options: AcquireOptions) -> Result<LockHandle> {
        if name.is_empty() {
            return Err(LockError::InvalidName);
        }

        let timeout = options.timeout.unwrap_or(self.config.timeout);
        let retry_delay = options.retry_delay.unwrap_or(self.config.retry_delay);
        let deadline = Deadline::new(now_ms(), timeout);
        let attempt = Attempt {
            name,
            lock_key: lock_key(name),
            ttl: options.ttl.unwrap_or(self.config.ttl),
            started_at: deadline.start_ms(),
        };

        let mut retries: u32 = 0;
        loop {
            let now = now_ms();
            if deadline.is_exceeded(now) {
                debug!(
                    name = %name,
                    retries,
                    timeout_ms = duration_ms(timeout),
                    "Timed out waiting for lock"
                );
                metrics::counter!("keylock_acquire_total", "outcome" => "timeout").increment(1);
                return Err(LockError::Timeout {
                    name: name.to_string(),
                    timeout,
                });
            }

            if let Some(handle) = self.attempt(&attempt, now).await? {
                let waited = now_ms().saturating_sub(deadline.start_ms());
                metrics::counter!("keylock_acquire_total", "outcome" => "acquired").increment(1);
                metrics::histogram!("keylock_acquire_wait_seconds").record(waited as f64 / 1000.0);
                debug!(
                    name = %name,
                    retries,
                    expires_at = handle.expires_at(),
                    "Lock acquired"
                );
                return Ok(handle);
            }

            let delay = jittered_delay(retry_delay);
            debug!(
                name = %name,
                retries,
                delay_ms = duration_ms(delay),
                "Lock not acquired, retrying"
            );
            tokio::time::sleep(delay).await;
            retries += 1;
        }
    }

    /// 尝试获取锁，不重试
    ///
    /// 锁被占用时立即返回 None，不会阻塞等待，也不检查 timeout。
    #[instrument(skip(self, options), fields(strict = self.config.strict_ownership))]
    pub async fn try_acquire(
        &self,
        name: &str,
        options: AcquireOptions,
    ) -> Result<Option<LockHandle>> {
        if name.is_empty() {
            return Err(LockError::InvalidName);
        }

        let now = now_ms();
        let attempt = Attempt {
            name,
            lock_key: lock_key(name),
            ttl: options.ttl.unwrap_or(self.config.ttl),
            started_at: now,
        };
        self.attempt(&attempt, now).await
    }

    /// 关闭底层存储连接
    pub async fn shutdown(&self) -> Result<()> {
        self.store.close().await?;
        info!("Lock manager shut down");
        Ok(())
    }

    /// 单次尝试：原子占位，失败则检查记录是否过期并尝试接管
    async fn attempt(&self, attempt: &Attempt<'_>, now: i64) -> Result<Option<LockHandle>> {
        let expires = now.saturating_add(duration_ms(attempt.ttl));
        let expires_value = expires.to_string();

        if self
            .store
            .set_if_absent(&attempt.lock_key, &expires_value)
            .await?
        {
            return Ok(Some(self.handle(attempt, expires)));
        }

        let Some(current) = self.store.get(&attempt.lock_key).await? else {
            // 在 SET NX 与 GET 之间被释放，下一轮重新占位
            return Ok(None);
        };

        let current_expiry = match current.parse::<i64>() {
            Ok(value) => value,
            Err(_) => {
                warn!(
                    key = %attempt.lock_key,
                    value = %current,
                    "Lock record is not a timestamp, treating it as held"
                );
                return Ok(None);
            }
        };

        if now.saturating_sub(current_expiry) <= duration_ms(self.config.ttl_drift) {
            return Ok(None);
        }

        if self
            .take_over(&attempt.lock_key, &current, &expires_value)
            .await?
        {
            info!(
                key = %attempt.lock_key,
                stale_expiry = current_expiry,
                expires_at = expires,
                "Took over expired lock"
            );
            return Ok(Some(self.handle(attempt, expires)));
        }

        Ok(None)
    }

    /// 接管过期锁
    ///
    /// 默认使用 GETSET：写入无条件发生，只有旧值与刚读到的值一致才算接管成功。
    /// 不一致时写入已经落地，可能覆盖了并发赢家的记录，这是已知竞态；
    /// 严格模式改用 compare-and-set，不一致时不写入。
    async fn take_over(&self, lock_key: &str, current: &str, expires: &str) -> Result<bool> {
        let won = if self.config.strict_ownership {
            self.store.compare_and_set(lock_key, current, expires).await?
        } else {
            let previous = self.store.get_and_set(lock_key, expires).await?;
            previous.as_deref() == Some(current)
        };

        let outcome = if won { "won" } else { "lost" };
        metrics::counter!("keylock_takeover_total", "outcome" => outcome).increment(1);
        if !won {
            debug!(key = %lock_key, "Lock was claimed by another process during takeover");
        }
        Ok(won)
    }

    fn handle(&self, attempt: &Attempt<'_>, expires: i64) -> LockHandle {
        LockHandle::new(
            attempt.name.to_string(),
            attempt.started_at,
            expires,
            self.config.strict_ownership,
            self.store.clone(),
        )
    }
}
