//! 单位换算
//!
//! 在物理量（角度、RPM）与设备原始量（微步、原始速度）之间换算。
//! 所有函数都是纯函数，对有限输入全域有定义；调用者负责保证输入有限。
//!
//! # 示例
//!
//! ```rust
//! use ustepper_protocol::units::Mechanics;
//!
//! let mech = Mechanics::default(); // 200 全步 × 256 微步
//! assert_eq!(mech.steps_per_revolution(), 51_200);
//! assert_eq!(mech.degrees_to_raw_steps(90.0), 12_800);
//! assert_eq!(mech.raw_steps_to_degrees(25_600), 180.0);
//! ```

/// 每圈角度
pub const DEGREES_PER_REVOLUTION: f64 = 360.0;

/// 默认每圈全步数（1.8° 步进电机）
pub const DEFAULT_FULL_STEPS_PER_REV: u32 = 200;

/// 默认细分数
pub const DEFAULT_MICROSTEPS: u32 = 256;

/// 机械常数
///
/// 决定原始步数与角度之间的比例。固件端使用相同的常数，
/// 两端不一致时位置显示会按比例偏移。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Mechanics {
    /// 每圈全步数（F）
    pub full_steps_per_rev: u32,
    /// 每全步的微步数（M）
    pub microsteps: u32,
}

impl Default for Mechanics {
    fn default() -> Self {
        Self {
            full_steps_per_rev: DEFAULT_FULL_STEPS_PER_REV,
            microsteps: DEFAULT_MICROSTEPS,
        }
    }
}

impl Mechanics {
    pub const fn new(full_steps_per_rev: u32, microsteps: u32) -> Self {
        Self {
            full_steps_per_rev,
            microsteps,
        }
    }

    /// 每圈微步数（F·M）
    #[inline]
    pub const fn steps_per_revolution(&self) -> i64 {
        self.full_steps_per_rev as i64 * self.microsteps as i64
    }

    /// 角度 → 原始步数
    ///
    /// 舍入方式为四舍五入（远离零），与 `f64::round` 一致。
    #[inline]
    pub fn degrees_to_raw_steps(&self, deg: f64) -> i64 {
        (deg * self.steps_per_revolution() as f64 / DEGREES_PER_REVOLUTION).round() as i64
    }

    /// 原始步数 → 角度（不舍入）
    #[inline]
    pub fn raw_steps_to_degrees(&self, steps: i64) -> f64 {
        steps as f64 / self.steps_per_revolution() as f64 * DEGREES_PER_REVOLUTION
    }

    /// 原始步数 → 微步圈数（steps / M）
    #[inline]
    pub fn raw_steps_to_microstep_turns(&self, steps: i64) -> f64 {
        steps as f64 / self.microsteps as f64
    }

    /// RPM → 设备原始速度（rpm · F / 60）
    #[inline]
    pub fn velocity_rpm_to_raw(&self, rpm: f64) -> f64 {
        rpm * self.full_steps_per_rev as f64 / 60.0
    }

    /// 设备原始速度 → RPM（v / F · 60）
    #[inline]
    pub fn raw_to_rpm(&self, raw: f64) -> f64 {
        raw / self.full_steps_per_rev as f64 * 60.0
    }

    /// 加速度换算，与速度使用相同的比例
    #[inline]
    pub fn accel_rpm_to_raw(&self, rpm_per_s: f64) -> f64 {
        self.velocity_rpm_to_raw(rpm_per_s)
    }

    #[inline]
    pub fn raw_to_accel_rpm(&self, raw: f64) -> f64 {
        self.raw_to_rpm(raw)
    }

    /// 将绝对原始步数折算到一圈内 `[0, F·M)`
    #[inline]
    pub fn wrap_raw_steps(&self, steps: i64) -> i64 {
        steps.rem_euclid(self.steps_per_revolution())
    }
}

/// 将绝对角度折算到 `[0, 360)`
///
/// 对负数同样有效（欧几里得取模）。
pub fn wrap_degrees(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(DEGREES_PER_REVOLUTION);
    // 极小的负数在浮点下可能得到 360.0
    if wrapped >= DEGREES_PER_REVOLUTION {
        0.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mechanics() {
        let mech = Mechanics::default();
        assert_eq!(mech.full_steps_per_rev, 200);
        assert_eq!(mech.microsteps, 256);
        assert_eq!(mech.steps_per_revolution(), 51_200);
    }

    #[test]
    fn test_degrees_to_raw_steps() {
        let mech = Mechanics::default();
        assert_eq!(mech.degrees_to_raw_steps(0.0), 0);
        assert_eq!(mech.degrees_to_raw_steps(360.0), 51_200);
        assert_eq!(mech.degrees_to_raw_steps(-90.0), -12_800);
        assert_eq!(mech.degrees_to_raw_steps(725.0), 103_111);
    }

    #[test]
    fn test_degrees_to_raw_steps_rounds_half_away_from_zero() {
        // 1 步 = 360/400 = 0.9°，半步 = 0.45°
        let mech = Mechanics::new(400, 1);
        assert_eq!(mech.degrees_to_raw_steps(0.45), 1);
        assert_eq!(mech.degrees_to_raw_steps(-0.45), -1);
        assert_eq!(mech.degrees_to_raw_steps(0.44), 0);
    }

    #[test]
    fn test_raw_steps_to_degrees() {
        let mech = Mechanics::default();
        assert_eq!(mech.raw_steps_to_degrees(51_200), 360.0);
        assert_eq!(mech.raw_steps_to_degrees(-25_600), -180.0);
        assert_eq!(mech.raw_steps_to_degrees(0), 0.0);
    }

    #[test]
    fn test_raw_steps_to_microstep_turns() {
        let mech = Mechanics::default();
        assert_eq!(mech.raw_steps_to_microstep_turns(512), 2.0);
        assert_eq!(mech.raw_steps_to_microstep_turns(128), 0.5);
    }

    #[test]
    fn test_velocity_conversions() {
        let mech = Mechanics::default();
        // 60 RPM = 1 rev/s = 200 全步/s
        assert_eq!(mech.velocity_rpm_to_raw(60.0), 200.0);
        assert_eq!(mech.raw_to_rpm(200.0), 60.0);
        assert_eq!(mech.raw_to_rpm(mech.velocity_rpm_to_raw(37.5)), 37.5);
        assert_eq!(mech.accel_rpm_to_raw(30.0), 100.0);
        assert_eq!(mech.raw_to_accel_rpm(100.0), 30.0);
    }

    #[test]
    fn test_wrap_degrees() {
        assert_eq!(wrap_degrees(725.0), 5.0);
        assert_eq!(wrap_degrees(360.0), 0.0);
        assert_eq!(wrap_degrees(-90.0), 270.0);
        assert_eq!(wrap_degrees(-1e-20), 0.0);
    }

    #[test]
    fn test_wrap_raw_steps() {
        let mech = Mechanics::default();
        assert_eq!(mech.wrap_raw_steps(51_200), 0);
        assert_eq!(mech.wrap_raw_steps(51_201), 1);
        assert_eq!(mech.wrap_raw_steps(-1), 51_199);
    }
}
