//! 共享库
//!
//! 包含锁服务与命令行共用的配置加载、日志初始化和测试辅助代码。

pub mod config;
pub mod observability;
pub mod test_utils;
