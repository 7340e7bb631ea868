//! Redis 锁存储
//!
//! 持有一个多路复用连接，`open` 建立、`close` 释放，不使用进程级单例。

use async_trait::async_trait;
use keylock_shared::config::RedisConfig;
use parking_lot::Mutex;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, Script};
use tracing::{debug, info, instrument};

use super::{LockStore, StoreResult};
use crate::error::StoreError;

/// 当前值等于 ARGV[1] 时写入 ARGV[2]
const COMPARE_AND_SET_SCRIPT: &str = r#"
    if redis.call("get", KEYS[1]) == ARGV[1] then
        redis.call("set", KEYS[1], ARGV[2])
        return 1
    else
        return 0
    end
"#;

/// 当前值等于 ARGV[1] 时删除
const DELETE_IF_EQUALS_SCRIPT: &str = r#"
    if redis.call("get", KEYS[1]) == ARGV[1] then
        return redis.call("del", KEYS[1])
    else
        return 0
    end
"#;

/// Redis 锁存储
pub struct RedisStore {
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl RedisStore {
    /// 连接 Redis
    pub async fn open(config: &RedisConfig) -> StoreResult<Self> {
        let client = Client::open(config.url.as_str())?;
        let conn = client.get_multiplexed_async_connection().await?;
        info!("Redis lock store connected");
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// 健康检查
    pub async fn health_check(&self) -> StoreResult<()> {
        let mut conn = self.conn()?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(StoreError::from)
    }

    /// 取出连接副本，多路复用连接的克隆共享同一底层连接
    fn conn(&self) -> StoreResult<MultiplexedConnection> {
        self.conn.lock().clone().ok_or(StoreError::Closed)
    }
}

#[async_trait]
impl LockStore for RedisStore {
    #[instrument(skip(self, value))]
    async fn set_if_absent(&self, key: &str, value: &str) -> StoreResult<bool> {
        let mut conn = self.conn()?;

        // SET NX 成功时返回 "OK"，失败时返回 nil
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .query_async(&mut conn)
            .await?;

        Ok(result.is_some())
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn()?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    #[instrument(skip(self, value))]
    async fn get_and_set(&self, key: &str, value: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn()?;
        let previous: Option<String> = redis::cmd("GETSET")
            .arg(key)
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(previous)
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let _: () = conn.del(key).await?;
        Ok(())
    }

    #[instrument(skip(self, value))]
    async fn compare_and_set(&self, key: &str, expected: &str, value: &str) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let result: i32 = Script::new(COMPARE_AND_SET_SCRIPT)
            .key(key)
            .arg(expected)
            .arg(value)
            .invoke_async(&mut conn)
            .await?;
        Ok(result == 1)
    }

    #[instrument(skip(self))]
    async fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let result: i32 = Script::new(DELETE_IF_EQUALS_SCRIPT)
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await?;
        Ok(result > 0)
    }

    async fn close(&self) -> StoreResult<()> {
        // 丢弃最后一个连接句柄即断开；其余克隆在进行中的命令结束后随之释放
        if self.conn.lock().take().is_some() {
            debug!("Redis lock store closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripts_touch_single_key() {
        for script in [COMPARE_AND_SET_SCRIPT, DELETE_IF_EQUALS_SCRIPT] {
            assert!(script.contains("KEYS[1]"));
            assert!(!script.contains("KEYS[2]"));
        }
    }

    #[tokio::test]
    async fn test_open_rejects_invalid_url() {
        let config = RedisConfig {
            url: "not-a-redis-url".to_string(),
        };
        assert!(RedisStore::open(&config).await.is_err());
    }
}
