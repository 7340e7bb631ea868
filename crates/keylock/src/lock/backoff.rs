//! 退避与截止时间
//!
//! 锁记录中的时间戳是 Unix 毫秒，跨进程比较只能使用墙上时钟，
//! 因此这里统一以 i64 毫秒计算，而不是 `Instant`。

use std::time::Duration;

use chrono::Utc;
use rand::Rng;

/// 当前墙上时钟（Unix 毫秒）
pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Duration 转毫秒，超出 i64 范围时饱和
pub(crate) fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// 带抖动的退避间隔：在 [base, 2 * base) 内均匀取值
///
/// 抖动用于错开同时竞争同一把锁的进程，避免重试风暴。
pub fn jittered_delay(base: Duration) -> Duration {
    let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
    if base_ms == 0 {
        return base;
    }
    let jitter = rand::rng().random_range(0..base_ms);
    Duration::from_millis(base_ms.saturating_add(jitter))
}

/// 获取锁的截止时间
///
/// 起点在首次尝试时确定，之后每次重试都与同一起点比较。
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start_ms: i64,
    timeout: Duration,
}

impl Deadline {
    pub fn new(start_ms: i64, timeout: Duration) -> Self {
        Self { start_ms, timeout }
    }

    pub fn start_ms(&self) -> i64 {
        self.start_ms
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 已用时间严格大于 timeout 时视为超时；timeout 为 0 时任何时刻都已超时
    pub fn is_exceeded(&self, now_ms: i64) -> bool {
        self.timeout.is_zero() || now_ms.saturating_sub(self.start_ms) > duration_ms(self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jittered_delay_bounds() {
        let base = Duration::from_millis(50);
        for _ in 0..200 {
            let delay = jittered_delay(base);
            assert!(delay >= base);
            assert!(delay < base * 2);
        }
    }

    #[test]
    fn test_jittered_delay_zero_base() {
        assert_eq!(jittered_delay(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_deadline_is_exclusive_at_boundary() {
        let deadline = Deadline::new(1_000, Duration::from_millis(10));

        assert!(!deadline.is_exceeded(1_000));
        // 恰好等于 timeout 不算超时
        assert!(!deadline.is_exceeded(1_010));
        assert!(deadline.is_exceeded(1_011));
    }

    #[test]
    fn test_zero_timeout_is_always_exceeded() {
        let deadline = Deadline::new(1_000, Duration::ZERO);
        assert!(deadline.is_exceeded(1_000));
    }

    #[test]
    fn test_duration_ms_saturates() {
        assert_eq!(duration_ms(Duration::from_millis(300_000)), 300_000);
        assert_eq!(duration_ms(Duration::MAX), i64::MAX);
    }
}
