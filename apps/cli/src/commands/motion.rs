//! 运动命令：回零、相对移动、点动

use anyhow::{Result, bail};
use clap::Args;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use ustepper_sdk::StepperConfig;

use crate::connect::connect;

/// 回零命令参数
#[derive(Args, Debug)]
pub struct HomeCommand {
    /// 等待控制器回复完成
    #[arg(short, long)]
    pub wait: bool,

    /// 等待超时（秒）
    #[arg(long, default_value_t = 60.0)]
    pub timeout: f64,
}

impl HomeCommand {
    pub fn execute(&self, config: &StepperConfig) -> Result<()> {
        let stepper = connect(config)?;
        let baseline = stepper.operations_done();
        stepper.home()?;
        println!("🏠 Homing...");

        if self.wait {
            stepper.wait_for_operation_done(baseline, Duration::from_secs_f64(self.timeout))?;
            println!("✅ Homing done");
        }
        Ok(())
    }
}

/// 相对移动命令参数
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct MoveCommand {
    /// 移动角度（度，负数为逆时针）
    #[arg(short, long, allow_hyphen_values = true)]
    pub degrees: Option<f64>,

    /// 移动步数（原始微步，负数为逆时针）
    #[arg(short, long, allow_hyphen_values = true)]
    pub steps: Option<i64>,
}

impl MoveCommand {
    /// 换算为原始步数
    pub fn raw_steps(&self, config: &StepperConfig) -> Result<i64> {
        match (self.degrees, self.steps) {
            (Some(deg), None) if deg.is_finite() => Ok(config.mechanics.degrees_to_raw_steps(deg)),
            (None, Some(steps)) => Ok(steps),
            _ => bail!("需要且只能指定 --degrees 或 --steps 之一"),
        }
    }

    pub fn execute(&self, config: &StepperConfig) -> Result<()> {
        let steps = self.raw_steps(config)?;
        let stepper = connect(config)?;
        stepper.move_steps(steps)?;
        println!(
            "➡️  Move {} steps ({:.2}°)",
            steps,
            config.mechanics.raw_steps_to_degrees(steps)
        );
        Ok(())
    }
}

/// 点动命令参数
#[derive(Args, Debug)]
pub struct JogCommand {
    /// 速度比例 [-1, 1]，乘以配置中的 max_velocity
    #[arg(short, long, allow_hyphen_values = true)]
    pub ratio: f64,

    /// 持续时间（秒），Ctrl-C 提前结束
    #[arg(short, long, default_value_t = 1.0)]
    pub duration: f64,
}

impl JogCommand {
    pub fn execute(&self, config: &StepperConfig) -> Result<()> {
        if !(-1.0..=1.0).contains(&self.ratio) {
            bail!("--ratio 必须在 [-1, 1] 范围内");
        }
        if !self.duration.is_finite() || self.duration < 0.0 {
            bail!("--duration 必须是非负数");
        }

        let stepper = connect(config)?;
        let Some(intent) = stepper.intent() else {
            bail!("stepper has no shared intent");
        };

        let running = Arc::new(AtomicBool::new(true));
        let r = running.clone();
        ctrlc::set_handler(move || r.store(false, Ordering::SeqCst))?;

        println!(
            "🕹️  Jog {:.0}% for {:.1}s (Ctrl-C to stop)",
            self.ratio * 100.0,
            self.duration
        );
        intent.set(true, self.ratio);

        let deadline = Instant::now() + Duration::from_secs_f64(self.duration);
        while running.load(Ordering::SeqCst) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }

        // 松开后至少等两个轮询周期，保证刹车帧发出
        intent.release();
        std::thread::sleep(config.poll_interval() * 3);
        println!("✅ Released");
        Ok(())
    }
}
