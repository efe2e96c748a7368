//! # uStepper Protocol
//!
//! uStepper WiFi 控制器的文本协议定义（无 IO 依赖）
//!
//! ## 模块
//!
//! - `command`: 下行指令（G/M 代码）构建与编码
//! - `feedback`: 上行帧（OK/RDY/DATA/CONF/DONE）解析
//! - `units`: 角度、原始步数、转速之间的换算
//!
//! ## 帧格式
//!
//! 每一帧都是一行文本。下行帧由操作码和若干 `字母+数值` 参数组成，
//! 以空格分隔（如 `G0 A512`）；上行帧的首个 token 为标签，
//! 其余为按固定顺序排列的带前缀字段（如 `DATA P725S0V1.50V2.00`）。
//!
//! ## 请求关联
//!
//! 协议没有请求 ID。解码结果直接覆盖"当前"状态，
//! 依赖传输层按序投递；上层不得尝试将响应与具体请求配对。

pub mod command;
pub mod feedback;
pub mod units;

// 重新导出常用类型
pub use command::*;
pub use feedback::*;
pub use units::*;

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// 已识别标签但负载不完整或非数值
    ///
    /// 解码器从不返回部分填充的结构体。
    #[error("Malformed {tag} frame: {reason}")]
    MalformedFrame { tag: &'static str, reason: String },

    #[error("Unknown opcode: {0}")]
    UnknownOpcode(String),

    #[error("Invalid parameter `{token}`")]
    InvalidParameter { token: String },

    #[error("Empty command line")]
    EmptyCommand,
}

impl ProtocolError {
    pub(crate) fn malformed(tag: &'static str, reason: impl Into<String>) -> Self {
        ProtocolError::MalformedFrame {
            tag,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::malformed("DATA", "expected 4 fields, got 1");
        assert_eq!(
            err.to_string(),
            "Malformed DATA frame: expected 4 fields, got 1"
        );

        let err = ProtocolError::UnknownOpcode("X9".to_string());
        assert_eq!(err.to_string(), "Unknown opcode: X9");

        let err = ProtocolError::InvalidParameter {
            token: "Aabc".to_string(),
        };
        assert!(err.to_string().contains("Aabc"));
    }
}
