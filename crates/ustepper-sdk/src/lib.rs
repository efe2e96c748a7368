//! uStepper SDK - uStepper WiFi 步进电机控制器 Rust SDK
//!
//! 通过 WebSocket 文本协议（类 G-code）控制 uStepper WiFi 控制器：
//! 发送运动/配置指令，周期性轮询位置，并在断线后自动重连。
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **协议层** (`protocol`): 指令编码、上行帧解码、单位换算
//! - **传输层** (`transport`): WebSocket 连接抽象，事件驱动、非阻塞
//! - **驱动层** (`driver`): IO 线程、会话状态、轮询调度、重连
//! - **工具** (`tools`): 录制文件与 HTTP 侧通道
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use ustepper_sdk::prelude::*;
//! use std::time::Duration;
//!
//! ustepper_sdk::init_logger();
//!
//! let stepper = StepperBuilder::new()
//!     .endpoint("ws://192.168.4.1:81/")
//!     .build()
//!     .unwrap();
//!
//! stepper.wait_for_config(Duration::from_secs(5)).unwrap();
//! stepper.move_degrees(90.0).unwrap();
//! ```

pub mod prelude;

pub use ustepper_driver as driver;
pub use ustepper_protocol as protocol;
pub use ustepper_tools as tools;
pub use ustepper_transport as transport;

// --- 常用类型 ---
pub use ustepper_driver::{
    DriverError, MetricsSnapshot, SessionSnapshot, SharedIntent, Stepper, StepperBuilder,
    StepperConfig,
};
pub use ustepper_protocol::{
    BrakeMode, Command, ConfigFrame, DeviceMessage, Mechanics, Opcode, ProtocolError,
    TelemetryFrame,
};
pub use ustepper_transport::{ConnectionState, TransportError};

use tracing_subscriber::EnvFilter;

/// 未设置 `RUST_LOG` 时的默认过滤规则
pub const DEFAULT_LOG_FILTER: &str = "ustepper=info";

/// 初始化日志（`tracing` + `log` 桥接）
///
/// 过滤规则取自 `RUST_LOG`，未设置时使用 [`DEFAULT_LOG_FILTER`]。
/// 重复调用是安全的，只有第一次生效。
pub fn init_logger() {
    let _ = try_init_logger(DEFAULT_LOG_FILTER);
}

/// 初始化日志，返回安装失败的原因（例如已经安装过全局 subscriber）
pub fn try_init_logger(
    default_filter: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_filter))?;

    tracing_log::LogTracer::init()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
