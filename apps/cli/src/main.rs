//! # uStepper CLI
//!
//! Command-line interface for uStepper WiFi stepper controllers.
//!
//! 每条命令都是一次性的：连接 → 等待配置 → 发送 → 断开。
//!
//! ```bash
//! # 生成默认配置（~/.config/ustepper/config.toml）
//! ustepper-cli config init
//!
//! # 回零并等待完成
//! ustepper-cli home --wait
//!
//! # 顺时针转 90°
//! ustepper-cli move --degrees 90
//!
//! # 以 50% 速度逆时针点动 2 秒
//! ustepper-cli jog --ratio -0.5 --duration 2
//!
//! # 查看控制器上的录制
//! ustepper-cli record show
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod connect;
mod settings;

use commands::{
    AccelCommand, BrakeCommand, ClosedLoopCommand, ConfigCommand, HomeCommand, JogCommand,
    MonitorCommand, MoveCommand, RecordCommand, SpeedCommand,
};

/// uStepper CLI - 步进电机控制器命令行工具
#[derive(Parser, Debug)]
#[command(name = "ustepper-cli")]
#[command(about = "Command-line interface for uStepper WiFi stepper controllers", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件（默认 ~/.config/ustepper/config.toml）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 控制器地址（覆盖配置文件）
    #[arg(short, long, global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 持续显示位置和链路状态
    Monitor {
        #[command(flatten)]
        args: MonitorCommand,
    },

    /// 回零
    Home {
        #[command(flatten)]
        args: HomeCommand,
    },

    /// 停止一切
    Stop,

    /// 刹车
    Halt,

    /// 相对移动
    Move {
        #[command(flatten)]
        args: MoveCommand,
    },

    /// 连续运动（点动）
    Jog {
        #[command(flatten)]
        args: JogCommand,
    },

    /// 设置速度
    Speed {
        #[command(flatten)]
        args: SpeedCommand,
    },

    /// 设置加速度
    Accel {
        #[command(flatten)]
        args: AccelCommand,
    },

    /// 设置刹车模式
    Brake {
        #[command(flatten)]
        args: BrakeCommand,
    },

    /// 开关闭环控制
    ClosedLoop {
        #[command(flatten)]
        args: ClosedLoopCommand,
    },

    /// 录制
    #[command(subcommand)]
    Record(RecordCommand),
}

fn main() -> Result<()> {
    ustepper_sdk::init_logger();

    let cli = Cli::parse();
    let load = || settings::resolve(cli.config.as_deref(), cli.endpoint.as_deref());

    match cli.command {
        Commands::Config(cmd) => cmd.execute(cli.config.as_deref(), cli.endpoint.as_deref()),
        Commands::Monitor { args } => args.execute(&load()?),
        Commands::Home { args } => args.execute(&load()?),
        Commands::Stop => {
            let stepper = connect::connect(&load()?)?;
            stepper.stop()?;
            println!("🛑 Stop sent");
            Ok(())
        },
        Commands::Halt => {
            let stepper = connect::connect(&load()?)?;
            stepper.brake()?;
            println!("✅ Brake sent");
            Ok(())
        },
        Commands::Move { args } => args.execute(&load()?),
        Commands::Jog { args } => args.execute(&load()?),
        Commands::Speed { args } => args.execute(&load()?),
        Commands::Accel { args } => args.execute(&load()?),
        Commands::Brake { args } => args.execute(&load()?),
        Commands::ClosedLoop { args } => args.execute(&load()?),
        Commands::Record(cmd) => cmd.execute(&load()?),
    }
}
