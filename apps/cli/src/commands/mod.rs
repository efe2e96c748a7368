//! 命令定义和实现

pub mod config;
pub mod monitor;
pub mod motion;
pub mod record;
pub mod tuning;

pub use config::ConfigCommand;
pub use monitor::MonitorCommand;
pub use motion::{HomeCommand, JogCommand, MoveCommand};
pub use record::RecordCommand;
pub use tuning::{AccelCommand, BrakeCommand, ClosedLoopCommand, SpeedCommand};
