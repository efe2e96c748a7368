//! 连接辅助

use anyhow::{Context, Result};
use std::time::Duration;
use ustepper_sdk::{Stepper, StepperBuilder, StepperConfig};

/// 等待首帧配置的超时
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// 连接控制器并等待配置（之后才能可靠地发送指令）
pub fn connect(config: &StepperConfig) -> Result<Stepper> {
    println!("🔌 连接到 {} ...", config.endpoint);
    let stepper = StepperBuilder::from_config(config.clone()).build()?;

    let device = stepper
        .wait_for_config(CONNECT_TIMEOUT)
        .with_context(|| format!("{} 在 {:?} 内没有响应", config.endpoint, CONNECT_TIMEOUT))?;

    let mechanics = stepper.mechanics();
    println!(
        "✅ 已连接：速度 {:.1} rpm，加速度 {:.1} rpm/s，刹车 {:?}，闭环 {}",
        mechanics.raw_to_rpm(device.velocity),
        mechanics.raw_to_accel_rpm(device.acceleration),
        device.brake_mode,
        if device.closed_loop_enabled { "开" } else { "关" },
    );
    Ok(stepper)
}
