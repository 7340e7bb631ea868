//! 锁错误类型
//!
//! 三类锁错误互不相交，均携带资源名；存储层错误原样透传。

use std::time::Duration;
use thiserror::Error;

/// 存储适配器错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis 错误: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("存储连接已关闭")]
    Closed,
}

/// 锁错误类型
#[derive(Debug, Error)]
pub enum LockError {
    /// 在 timeout 内未能获取锁，调用方可调整超时后重试
    #[error("获取锁超时: name={name}, timeout={}ms", .timeout.as_millis())]
    Timeout { name: String, timeout: Duration },

    /// 锁的 TTL 已过，持有方无法确认自己仍是唯一持有者
    #[error("锁已过期，拒绝释放: name={name}")]
    Expired { name: String },

    /// 重复释放，属于调用方缺陷
    #[error("锁已释放，拒绝重复释放: name={name}")]
    AlreadyUnlocked { name: String },

    #[error("资源名不能为空")]
    InvalidName,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, LockError>;

impl LockError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "LOCK_TIMEOUT",
            Self::Expired { .. } => "LOCK_EXPIRED",
            Self::AlreadyUnlocked { .. } => "LOCK_ALREADY_UNLOCKED",
            Self::InvalidName => "INVALID_NAME",
            Self::Store(_) => "STORE_ERROR",
        }
    }

    /// 出错的资源名，存储层错误与参数错误没有资源名
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Timeout { name, .. } | Self::Expired { name } | Self::AlreadyUnlocked { name } => {
                Some(name.as_str())
            }
            Self::InvalidName | Self::Store(_) => None,
        }
    }
}
