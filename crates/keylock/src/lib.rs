//! 基于键值存储的分布式互斥锁
//!
//! 多个独立进程通过约定单个 key 的状态协调对同名资源的独占访问。
//! 存储只需提供单 key 原子的 SET NX / GET / GETSET / DEL。
//!
//! ## 模块结构
//!
//! - `lock`: 锁管理器、锁句柄、退避与截止时间
//! - `store`: 存储适配器接口及 Redis、内存实现
//! - `error`: 错误类型定义

pub mod error;
pub mod lock;
pub mod store;

pub use error::{LockError, Result, StoreError};
pub use lock::{AcquireOptions, LockConfig, LockHandle, LockManager, lock_key};
pub use store::{LockStore, MemoryStore, RedisStore, StoreResult};
