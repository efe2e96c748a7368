//! 录制命令
//!
//! start/stop/add/play/pause 走 WebSocket；show/upload 走控制器的 HTTP 接口。

use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;
use ustepper_sdk::StepperConfig;
use ustepper_sdk::tools::RecordingClient;

use crate::connect::connect;

#[derive(Subcommand, Debug)]
pub enum RecordCommand {
    /// 开始录制
    Start,
    /// 停止录制
    Stop,
    /// 把当前位置追加到录制
    Add,
    /// 播放录制
    Play,
    /// 暂停播放
    Pause,
    /// 显示控制器上的录制
    Show,
    /// 上传录制文件（text/plain，最大 2MB）
    Upload {
        /// 本地文件
        path: PathBuf,
    },
}

impl RecordCommand {
    pub fn execute(&self, config: &StepperConfig) -> Result<()> {
        match self {
            RecordCommand::Show => return show(config),
            RecordCommand::Upload { path } => {
                let client = RecordingClient::from_endpoint(&config.endpoint)?;
                client.upload(path)?;
                println!("✅ Uploaded {}", path.display());
                return show(config);
            },
            _ => {},
        }

        let stepper = connect(config)?;
        match self {
            RecordCommand::Start => stepper.record_start()?,
            RecordCommand::Stop => stepper.record_stop()?,
            RecordCommand::Add => stepper.record_add()?,
            RecordCommand::Play => stepper.record_play()?,
            RecordCommand::Pause => stepper.record_pause()?,
            RecordCommand::Show | RecordCommand::Upload { .. } => {},
        }
        println!("✅ record {:?} sent", self);
        Ok(())
    }
}

fn show(config: &StepperConfig) -> Result<()> {
    let client = RecordingClient::from_endpoint(&config.endpoint)?;
    let sequence = client.fetch()?;
    println!("📼 Recording ({})", sequence.len());
    print!("{}", sequence);
    Ok(())
}
