//! 进程内锁存储
//!
//! 以互斥锁保护的 HashMap 模拟单 key 原子语义。同一进程内的多个任务
//! 可以共享一个 `Arc<MemoryStore>` 协调互斥；测试中用作确定性的后端。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{LockStore, StoreResult};
use crate::error::StoreError;

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取当前值，不经过锁协议
    pub fn snapshot(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    /// 直接写入，绕过锁协议（用于运维修复和测试构造场景）
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.lock().insert(key.into(), value.into());
    }

    /// 直接删除，绕过锁协议
    pub fn remove(&self, key: &str) -> Option<String> {
        self.entries.lock().remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl LockStore for MemoryStore {
    async fn set_if_absent(&self, key: &str, value: &str) -> StoreResult<bool> {
        self.ensure_open()?;
        let mut entries = self.entries.lock();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.ensure_open()?;
        Ok(self.snapshot(key))
    }

    async fn get_and_set(&self, key: &str, value: &str) -> StoreResult<Option<String>> {
        self.ensure_open()?;
        Ok(self.entries.lock().insert(key.to_string(), value.to_string()))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.ensure_open()?;
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn compare_and_set(&self, key: &str, expected: &str, value: &str) -> StoreResult<bool> {
        self.ensure_open()?;
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(current) if current == expected => {
                *current = value.to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool> {
        self.ensure_open()?;
        let mut entries = self.entries.lock();
        if entries.get(key).is_some_and(|current| current == expected) {
            entries.remove(key);
            return Ok(true);
        }
        Ok(false)
    }

    async fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
