//! 链路指标
//!
//! 原子计数器，IO 线程写入，任何线程都可以无锁读取。
//! 丢帧、解析失败这类不向上传播的错误只在这里留下痕迹。

use std::sync::atomic::{AtomicU64, Ordering};

/// 链路实时指标
///
/// # 使用示例
///
/// ```rust
/// use ustepper_driver::StepperMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = StepperMetrics::new();
/// metrics.rx_frames_total.fetch_add(1, Ordering::Relaxed);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.rx_frames_total, 1);
/// ```
#[derive(Debug, Default)]
pub struct StepperMetrics {
    /// 成功交给传输层的帧数
    pub tx_frames_total: AtomicU64,

    /// 未连接时被丢弃的帧数
    pub tx_dropped: AtomicU64,

    /// 收到的总帧数（包括无法解析的）
    pub rx_frames_total: AtomicU64,

    /// 已识别标签但负载无效的帧数
    pub rx_malformed: AtomicU64,

    /// 未识别标签的帧数
    pub rx_unknown: AtomicU64,

    /// supervisor 发起的重连次数
    pub reconnect_attempts: AtomicU64,

    /// 传输层报告的错误次数
    pub transport_errors: AtomicU64,
}

impl StepperMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取所有计数器的当前值
    ///
    /// 不同计数器之间可能有微小的时间差。
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tx_frames_total: self.tx_frames_total.load(Ordering::Relaxed),
            tx_dropped: self.tx_dropped.load(Ordering::Relaxed),
            rx_frames_total: self.rx_frames_total.load(Ordering::Relaxed),
            rx_malformed: self.rx_malformed.load(Ordering::Relaxed),
            rx_unknown: self.rx_unknown.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        self.tx_frames_total.store(0, Ordering::Relaxed);
        self.tx_dropped.store(0, Ordering::Relaxed);
        self.rx_frames_total.store(0, Ordering::Relaxed);
        self.rx_malformed.store(0, Ordering::Relaxed);
        self.rx_unknown.store(0, Ordering::Relaxed);
        self.reconnect_attempts.store(0, Ordering::Relaxed);
        self.transport_errors.store(0, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub tx_frames_total: u64,
    pub tx_dropped: u64,
    pub rx_frames_total: u64,
    pub rx_malformed: u64,
    pub rx_unknown: u64,
    pub reconnect_attempts: u64,
    pub transport_errors: u64,
}

impl MetricsSnapshot {
    /// 有效帧率（百分比）
    ///
    /// 返回 0.0 到 100.0 之间的值。如果 `rx_frames_total` 为 0，返回 0.0。
    pub fn valid_frame_rate(&self) -> f64 {
        if self.rx_frames_total == 0 {
            return 0.0;
        }
        let valid = self
            .rx_frames_total
            .saturating_sub(self.rx_malformed + self.rx_unknown);
        (valid as f64 / self.rx_frames_total as f64) * 100.0
    }

    /// 丢帧率（百分比）
    pub fn drop_rate(&self) -> f64 {
        let attempted = self.tx_frames_total + self.tx_dropped;
        if attempted == 0 {
            return 0.0;
        }
        (self.tx_dropped as f64 / attempted as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_metrics_default() {
        let snapshot = StepperMetrics::new().snapshot();
        assert_eq!(snapshot, MetricsSnapshot::default());
    }

    #[test]
    fn test_metrics_reset() {
        let metrics = StepperMetrics::new();
        metrics.rx_frames_total.fetch_add(100, Ordering::Relaxed);
        metrics.tx_dropped.fetch_add(3, Ordering::Relaxed);
        assert_eq!(metrics.snapshot().rx_frames_total, 100);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_rates() {
        let snapshot = MetricsSnapshot {
            rx_frames_total: 100,
            rx_malformed: 5,
            rx_unknown: 5,
            tx_frames_total: 75,
            tx_dropped: 25,
            ..Default::default()
        };
        assert_eq!(snapshot.valid_frame_rate(), 90.0);
        assert_eq!(snapshot.drop_rate(), 25.0);
        assert_eq!(MetricsSnapshot::default().valid_frame_rate(), 0.0);
        assert_eq!(MetricsSnapshot::default().drop_rate(), 0.0);
    }

    #[test]
    fn test_metrics_concurrent_increment() {
        let metrics = Arc::new(StepperMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = metrics.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        StepperMetrics::incr(&metrics.tx_frames_total);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.snapshot().tx_frames_total, 4000);
    }
}
