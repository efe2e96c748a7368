//! 运动意图输入
//!
//! 外部输入源（摇杆、键盘、脚本）只暴露"是否激活"和"偏转比例"，
//! 由调度器按周期采样，输入本身可以以任意频率变化。

use arc_swap::ArcSwap;
use std::sync::Arc;

/// 输入偏转比例，各分量在 `[-1, 1]`
///
/// 只有 `x` 参与速度推导。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Ratio {
    pub x: f64,
    pub y: f64,
}

impl Ratio {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// 运动意图输入源
pub trait IntentSource: Send {
    fn is_active(&self) -> bool;
    fn ratio(&self) -> Ratio;
}

/// 采样后的运动意图
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionIntent {
    pub active: bool,
    pub ratio_x: f64,
}

impl MotionIntent {
    /// 从输入源采样，`ratio_x` 截断到 `[-1, 1]`，非有限值视为 0
    pub fn sample(source: &(impl IntentSource + ?Sized)) -> Self {
        let x = source.ratio().x;
        Self {
            active: source.is_active(),
            ratio_x: if x.is_finite() { x.clamp(-1.0, 1.0) } else { 0.0 },
        }
    }

    /// 推导速度：激活时为 `ratio_x × max_velocity`，否则为 0
    pub fn velocity(&self, max_velocity: f64) -> f64 {
        if self.active {
            self.ratio_x * max_velocity
        } else {
            0.0
        }
    }
}

/// 无输入（始终不激活）
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIntent;

impl IntentSource for NoIntent {
    fn is_active(&self) -> bool {
        false
    }

    fn ratio(&self) -> Ratio {
        Ratio::default()
    }
}

/// 线程安全的共享输入
///
/// 克隆共享同一状态：一端交给驱动，另一端由输入线程写入。
///
/// ```rust
/// use ustepper_driver::{IntentSource, SharedIntent};
///
/// let intent = SharedIntent::new();
/// let writer = intent.clone();
/// writer.set(true, 0.5);
/// assert!(intent.is_active());
/// assert_eq!(intent.ratio().x, 0.5);
///
/// writer.release();
/// assert!(!intent.is_active());
/// ```
#[derive(Debug, Clone)]
pub struct SharedIntent {
    inner: Arc<ArcSwap<MotionIntent>>,
}

impl SharedIntent {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(MotionIntent::default())),
        }
    }

    /// 设置激活状态和横向比例
    pub fn set(&self, active: bool, ratio_x: f64) {
        self.inner.store(Arc::new(MotionIntent { active, ratio_x }));
    }

    /// 松开输入（比例归零）
    pub fn release(&self) {
        self.set(false, 0.0);
    }

    pub fn load(&self) -> MotionIntent {
        **self.inner.load()
    }
}

impl Default for SharedIntent {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentSource for SharedIntent {
    fn is_active(&self) -> bool {
        self.inner.load().active
    }

    fn ratio(&self) -> Ratio {
        Ratio::new(self.inner.load().ratio_x, 0.0)
    }
}

impl<S: IntentSource + ?Sized> IntentSource for Box<S> {
    fn is_active(&self) -> bool {
        (**self).is_active()
    }

    fn ratio(&self) -> Ratio {
        (**self).ratio()
    }
}
