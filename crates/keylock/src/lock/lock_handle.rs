//! 锁句柄：持有期内的状态与显式释放

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use super::backoff::now_ms;
use super::lock_key;
use crate::error::{LockError, Result};
use crate::store::LockStore;

/// 锁句柄
///
/// 成功获取锁后由 [`LockManager`](super::LockManager) 创建，归调用方独占。
/// 释放或过期后句柄在逻辑上失效，但各访问方法仍可使用。
///
/// ## 注意事项
///
/// Drop 无法执行异步操作，未释放的句柄只会记录警告，
/// 锁记录要等 TTL 过期后由其他进程接管。
pub struct LockHandle {
    name: String,
    acquired_at: i64,
    expires_at: i64,
    released: bool,
    strict_ownership: bool,
    store: Arc<dyn LockStore>,
}

impl LockHandle {
    pub(crate) fn new(
        name: String,
        acquired_at: i64,
        expires_at: i64,
        strict_ownership: bool,
        store: Arc<dyn LockStore>,
    ) -> Self {
        Self {
            name,
            acquired_at,
            expires_at,
            released: false,
            strict_ownership,
            store,
        }
    }

    /// 受保护的资源名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 存储中的锁 key
    pub fn key(&self) -> String {
        lock_key(&self.name)
    }

    /// 开始获取锁的时间（Unix 毫秒）
    pub fn acquired_at(&self) -> i64 {
        self.acquired_at
    }

    /// 写入存储的过期时间戳（Unix 毫秒）
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.expires_at)
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn is_expired(&self) -> bool {
        now_ms().saturating_sub(self.expires_at) > 0
    }

    /// 显式释放锁
    ///
    /// 先检查过期，再检查重复释放。过期的锁可能已被其他进程接管，
    /// 此时删除 key 会破坏对方的锁，因此拒绝释放。
    #[instrument(skip(self), fields(name = %self.name, expires_at = self.expires_at))]
    pub async fn release(&mut self) -> Result<()> {
        if self.is_expired() {
            metrics::counter!("keylock_release_total", "outcome" => "expired").increment(1);
            return Err(LockError::Expired {
                name: self.name.clone(),
            });
        }

        if self.released {
            metrics::counter!("keylock_release_total", "outcome" => "already_unlocked")
                .increment(1);
            return Err(LockError::AlreadyUnlocked {
                name: self.name.clone(),
            });
        }

        self.released = true;
        let lock_key = self.key();

        if self.strict_ownership {
            let deleted = self
                .store
                .delete_if_equals(&lock_key, &self.expires_at.to_string())
                .await?;
            if !deleted {
                // 记录已不属于本句柄，保留对方的锁
                warn!(
                    key = %lock_key,
                    "Lock record was already removed or replaced by another holder"
                );
            }
        } else {
            self.store.delete(&lock_key).await?;
        }

        metrics::counter!("keylock_release_total", "outcome" => "released").increment(1);
        debug!(key = %lock_key, "Lock released");
        Ok(())
    }
}

impl fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockHandle")
            .field("name", &self.name)
            .field("acquired_at", &self.acquired_at)
            .field("expires_at", &self.expires_at)
            .field("released", &self.released)
            .field("strict_ownership", &self.strict_ownership)
            .finish_non_exhaustive()
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        if !self.released && !self.is_expired() {
            warn!(
                name = %self.name,
                expires_at = self.expires_at,
                "LockHandle dropped without explicit release - lock will lapse after its TTL"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn handle(store: Arc<MemoryStore>, expires_at: i64, strict_ownership: bool) -> LockHandle {
        LockHandle::new(
            "orders".to_string(),
            now_ms(),
            expires_at,
            strict_ownership,
            store,
        )
    }

    #[tokio::test]
    async fn test_release_deletes_key() {
        let store = Arc::new(MemoryStore::new());
        let expires_at = now_ms() + 60_000;
        store.insert("orders.lock", expires_at.to_string());

        let mut lock = handle(store.clone(), expires_at, false);
        lock.release().await.unwrap();

        assert!(lock.is_released());
        assert!(store.snapshot("orders.lock").is_none());
    }

    #[tokio::test]
    async fn test_double_release_rejected() {
        let store = Arc::new(MemoryStore::new());
        let mut lock = handle(store, now_ms() + 60_000, false);

        lock.release().await.unwrap();
        let err = lock.release().await.unwrap_err();

        assert!(matches!(err, LockError::AlreadyUnlocked { ref name } if name == "orders"));
    }

    #[tokio::test]
    async fn test_expired_release_keeps_key() {
        let store = Arc::new(MemoryStore::new());
        store.insert("orders.lock", "someone-else");

        let mut lock = handle(store.clone(), now_ms() - 1, false);
        let err = lock.release().await.unwrap_err();

        assert!(matches!(err, LockError::Expired { ref name } if name == "orders"));
        assert!(!lock.is_released());
        assert_eq!(store.snapshot("orders.lock").as_deref(), Some("someone-else"));
    }

    #[tokio::test]
    async fn test_unconditional_release_removes_foreign_record() {
        // 默认模式不校验记录归属
        let store = Arc::new(MemoryStore::new());
        store.insert("orders.lock", "1");

        let mut lock = handle(store.clone(), now_ms() + 60_000, false);
        lock.release().await.unwrap();

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_strict_release_keeps_foreign_record() {
        let store = Arc::new(MemoryStore::new());
        store.insert("orders.lock", "1");

        let mut lock = handle(store.clone(), now_ms() + 60_000, true);
        lock.release().await.unwrap();

        assert!(lock.is_released());
        assert_eq!(store.snapshot("orders.lock").as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_release_store_failure_propagates() {
        let store = Arc::new(MemoryStore::new());
        store.close().await.unwrap();

        let mut lock = handle(store, now_ms() + 60_000, false);
        let err = lock.release().await.unwrap_err();

        assert_eq!(err.code(), "STORE_ERROR");
        // 已经标记为释放，不允许再次尝试删除
        assert!(lock.is_released());
    }

    #[test]
    fn test_accessors() {
        let store = Arc::new(MemoryStore::new());
        let lock = handle(store, 1_700_000_000_000, false);

        assert_eq!(lock.name(), "orders");
        assert_eq!(lock.key(), "orders.lock");
        assert_eq!(lock.expires_at(), 1_700_000_000_000);
        assert_eq!(
            lock.expires_at_utc().map(|t| t.timestamp_millis()),
            Some(1_700_000_000_000)
        );
        assert!(lock.is_expired());
        assert!(format!("{:?}", lock).contains("orders"));
    }
}
