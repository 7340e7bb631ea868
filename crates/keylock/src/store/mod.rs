//! 存储适配器
//!
//! 锁算法只依赖单 key 原子操作：不存在才写入、读取、读旧写新、删除。
//! 另外提供两个加固原语（比较后写入、比较后删除），供严格所有权模式使用。
//!
//! - [`RedisStore`]: 生产环境后端，基于 SET NX / GET / GETSET / DEL 与 Lua 脚本
//! - [`MemoryStore`]: 进程内后端，用于单进程多任务协调和测试

mod memory_store;
mod redis_store;

use async_trait::async_trait;

use crate::error::StoreError;

pub use self::memory_store::MemoryStore;
pub use self::redis_store::RedisStore;

/// 存储层结果类型别名
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// 锁存储接口
///
/// 每个方法对单个 key 原子执行；方法之间不保证原子性。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LockStore: Send + Sync {
    /// key 不存在时写入，返回是否写入成功
    async fn set_if_absent(&self, key: &str, value: &str) -> StoreResult<bool>;

    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// 无条件写入并返回被覆盖的旧值
    async fn get_and_set(&self, key: &str, value: &str) -> StoreResult<Option<String>>;

    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// 仅当当前值等于 `expected` 时写入 `value`
    async fn compare_and_set(&self, key: &str, expected: &str, value: &str) -> StoreResult<bool>;

    /// 仅当当前值等于 `expected` 时删除
    async fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool>;

    /// 关闭底层连接，之后的操作返回 [`StoreError::Closed`]
    async fn close(&self) -> StoreResult<()>;
}
