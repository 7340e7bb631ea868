//! 分布式锁模块
//!
//! 基于共享键值存储的互斥锁：锁记录是写在 `{name}.lock` 下的过期时间戳。
//!
//! ## 设计要点
//!
//! - **原子占位**: key 不存在时直接写入即获得锁
//! - **过期接管**: 记录过期（超过漂移容忍度）后，通过读取-写回比较接管
//! - **抖动退避**: 竞争失败后在 [retry_delay, 2 * retry_delay) 内随机等待
//! - **显式释放**: 过期或重复释放会返回错误，而不是静默删除 key
//!
//! ## 使用示例
//!
//! ```ignore
//! let manager = LockManager::new(store, LockConfig::default());
//!
//! let mut handle = manager.acquire("orders", AcquireOptions::new()).await?;
//! do_critical_work().await?;
//! handle.release().await?;
//! ```

mod backoff;
mod lock_handle;
mod lock_manager;

pub use backoff::{Deadline, jittered_delay};
pub use lock_handle::LockHandle;
pub use lock_manager::{AcquireOptions, LockConfig, LockManager};

/// 锁记录在存储中的 key
pub fn lock_key(name: &str) -> String {
    format!("{}.lock", name)
}
