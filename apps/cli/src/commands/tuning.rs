//! 运动参数设置：速度、加速度、刹车模式、闭环

use anyhow::Result;
use clap::{Args, ValueEnum};
use ustepper_sdk::{BrakeMode, StepperConfig};

use crate::connect::connect;

/// 速度命令参数
#[derive(Args, Debug)]
pub struct SpeedCommand {
    /// 速度值
    pub value: f64,

    /// 以 rpm 为单位（默认是原始单位）
    #[arg(long)]
    pub rpm: bool,
}

impl SpeedCommand {
    pub fn execute(&self, config: &StepperConfig) -> Result<()> {
        let stepper = connect(config)?;
        if self.rpm {
            stepper.set_speed_rpm(self.value)?;
        } else {
            stepper.set_speed(self.value)?;
        }
        println!("✅ Speed set to {}{}", self.value, if self.rpm { " rpm" } else { "" });
        Ok(())
    }
}

/// 加速度命令参数
#[derive(Args, Debug)]
pub struct AccelCommand {
    /// 加速度值
    pub value: f64,

    /// 以 rpm/s 为单位（默认是原始单位）
    #[arg(long)]
    pub rpm: bool,
}

impl AccelCommand {
    pub fn execute(&self, config: &StepperConfig) -> Result<()> {
        let stepper = connect(config)?;
        if self.rpm {
            stepper.set_acceleration_rpm(self.value)?;
        } else {
            stepper.set_acceleration(self.value)?;
        }
        println!(
            "✅ Acceleration set to {}{}",
            self.value,
            if self.rpm { " rpm/s" } else { "" }
        );
        Ok(())
    }
}

/// 刹车模式命令参数
#[derive(Args, Debug)]
pub struct BrakeCommand {
    /// free / cool / hard
    pub mode: BrakeMode,
}

impl BrakeCommand {
    pub fn execute(&self, config: &StepperConfig) -> Result<()> {
        let stepper = connect(config)?;
        stepper.set_brake_mode(self.mode)?;
        println!("✅ Brake mode set to {:?}", self.mode);
        Ok(())
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Switch {
    On,
    Off,
}

/// 闭环命令参数
#[derive(Args, Debug)]
pub struct ClosedLoopCommand {
    pub state: Switch,
}

impl ClosedLoopCommand {
    pub fn execute(&self, config: &StepperConfig) -> Result<()> {
        let stepper = connect(config)?;
        let enabled = self.state == Switch::On;
        stepper.set_closed_loop(enabled)?;
        println!("✅ Closed loop {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }
}
