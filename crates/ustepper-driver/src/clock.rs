//! 时钟抽象
//!
//! 调度器和 supervisor 只通过 [`Clock`] 读取时间，测试中用 [`ManualClock`]
//! 精确控制时间推进，不依赖真实定时器。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 单调时钟
///
/// 返回自某个固定起点以来的时间。起点本身没有意义，只有差值有意义。
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

/// 系统单调时钟（以创建时刻为起点）
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// 手动时钟（测试用）
///
/// 克隆共享同一时间。
///
/// ```rust
/// use ustepper_driver::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// let view = clock.clone();
/// clock.advance(Duration::from_millis(50));
/// assert_eq!(view.now(), Duration::from_millis(50));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    micros: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.micros
            .fetch_add(by.as_micros() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, at: Duration) {
        self.micros.store(at.as_micros() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.micros.load(Ordering::SeqCst))
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let mut last = clock.now();
        for _ in 0..100 {
            let now = clock.now();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);

        clock.advance(Duration::from_millis(3));
        clock.advance(Duration::from_micros(500));
        assert_eq!(clock.now(), Duration::from_micros(3500));

        clock.set(Duration::from_secs(10));
        assert_eq!(clock.clone().now(), Duration::from_secs(10));
    }
}
