//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use ustepper_sdk::prelude::*;
//! ```

pub use crate::driver::{IntentSource, Ratio, SharedIntent, Stepper, StepperBuilder, StepperConfig};
pub use crate::protocol::{BrakeMode, Command, ConfigFrame, Mechanics, TelemetryFrame};
pub use crate::tools::{RecordingClient, RecordingSequence};
pub use crate::transport::ConnectionState;

// 错误类型
pub use crate::driver::DriverError;
pub use crate::protocol::ProtocolError;
pub use crate::transport::TransportError;
