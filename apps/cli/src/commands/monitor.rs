//! 监控命令
//!
//! 周期性打印最新遥测和链路指标，直到 Ctrl-C。

use anyhow::Result;
use clap::Args;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use ustepper_sdk::{SessionSnapshot, StepperConfig};

use crate::connect::connect;

#[derive(Args, Debug)]
pub struct MonitorCommand {
    /// 刷新频率（Hz）
    #[arg(short, long, default_value_t = 5)]
    pub frequency: u32,

    /// 输出 JSON（每行一帧）
    #[arg(long)]
    pub json: bool,
}

impl MonitorCommand {
    pub fn execute(&self, config: &StepperConfig) -> Result<()> {
        let stepper = connect(config)?;

        let running = Arc::new(AtomicBool::new(true));
        let r = running.clone();
        ctrlc::set_handler(move || r.store(false, Ordering::SeqCst))?;

        let period = Duration::from_secs_f64(1.0 / f64::from(self.frequency.max(1)));
        while running.load(Ordering::SeqCst) {
            let snapshot = stepper.snapshot();
            if self.json {
                if let Some(frame) = snapshot.telemetry {
                    println!("{}", serde_json::to_string(&frame)?);
                }
            } else {
                println!("{}", format_line(&snapshot));
            }
            std::thread::sleep(period);
        }

        let metrics = stepper.metrics();
        println!(
            "\n📊 tx {} (dropped {}), rx {} (malformed {}, unknown {}), reconnects {}",
            metrics.tx_frames_total,
            metrics.tx_dropped,
            metrics.rx_frames_total,
            metrics.rx_malformed,
            metrics.rx_unknown,
            metrics.reconnect_attempts,
        );
        Ok(())
    }
}

fn format_line(snapshot: &SessionSnapshot) -> String {
    let link = format!("[{}]", snapshot.connection);
    match snapshot.telemetry {
        Some(t) => format!(
            "{:<14} pos {:>8.2}° (abs {:>10.2}°)  steps {:>6}  enc {:>8.2}  drv {:>8.2}{}",
            link,
            t.position_deg,
            t.absolute_position_deg,
            t.raw_steps,
            t.encoder_velocity,
            t.driver_velocity,
            if snapshot.flags.telemetry_requests_allowed { "" } else { "  (busy)" },
        ),
        None => format!("{:<14} waiting for position...", link),
    }
}
