//! 驱动层错误类型定义

use crate::config::ConfigError;
use thiserror::Error;
use ustepper_protocol::ProtocolError;
use ustepper_transport::TransportError;

/// 驱动层错误类型
///
/// 这些是句柄（[`Stepper`](crate::Stepper)）的错误，而不是协议核心的错误：
/// 协议核心内部的丢帧、解析失败只记录日志和计数，从不向上传播。
#[derive(Error, Debug)]
pub enum DriverError {
    /// 传输层错误
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// 协议解析错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 配置错误
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// 命令通道已关闭（IO 线程退出）
    #[error("Command channel closed")]
    ChannelClosed,

    /// 命令通道已满
    #[error("Command channel full")]
    ChannelFull,

    /// 操作超时
    #[error("Operation timeout")]
    Timeout,

    /// IO 线程错误
    #[error("IO thread error: {0}")]
    IoThread(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::from(TransportError::NotConnected);
        assert_eq!(err.to_string(), "Transport error: Not connected");

        let err = DriverError::from(ProtocolError::UnknownOpcode("X1".to_string()));
        assert!(err.to_string().contains("X1"));

        assert_eq!(
            DriverError::ChannelClosed.to_string(),
            "Command channel closed"
        );
        assert_eq!(DriverError::ChannelFull.to_string(), "Command channel full");
        assert_eq!(DriverError::Timeout.to_string(), "Operation timeout");
        assert!(
            DriverError::IoThread("spawn failed".to_string())
                .to_string()
                .contains("spawn failed")
        );
    }

    #[test]
    fn test_driver_error_from_config() {
        let err = DriverError::from(ConfigError::Invalid("poll_interval_ms must be > 0".into()));
        assert!(matches!(err, DriverError::Config(_)));
        assert!(err.to_string().contains("poll_interval_ms"));
    }
}
