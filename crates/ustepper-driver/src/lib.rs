//! # uStepper Driver
//!
//! 本 crate 提供 uStepper WiFi 控制器的驱动功能，包括：
//! - IO 线程管理（单线程协作式事件循环）
//! - 会话状态（配置、遥测、遥测抑制、录制标志）
//! - 两阶段轮询调度（运动指令 / 遥测请求交替）
//! - 断线重连 supervisor
//! - 状态同步（ArcSwap 无锁读取）与链路指标
//!
//! # 使用场景
//!
//! 大多数用户只需要 [`StepperBuilder`] 和 [`Stepper`]；
//! [`Pipeline`] 及其组件是公开的，便于在自己的事件循环中驱动或做确定性测试。

mod builder;
pub mod clock;
pub mod config;
mod error;
pub mod intent;
pub mod metrics;
pub mod pipeline;
pub mod scheduler;
pub mod session;
mod stepper;
pub mod supervisor;

pub use builder::StepperBuilder;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, DEFAULT_ENDPOINT, StepperConfig};
pub use error::DriverError;
pub use intent::{IntentSource, MotionIntent, NoIntent, Ratio, SharedIntent};
pub use metrics::{MetricsSnapshot, StepperMetrics};
pub use pipeline::{ControlMessage, Pipeline, StepperContext, io_loop};
pub use scheduler::PollScheduler;
pub use session::{PollPhase, Session, SessionFlags, SessionSnapshot, SessionUpdate};
pub use stepper::Stepper;
pub use supervisor::{ReconnectSupervisor, SupervisorAction};
