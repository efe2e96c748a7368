//! # uStepper Transport Layer
//!
//! 与控制器之间的持久文本连接抽象。
//!
//! 传输层只负责连接生命周期和收发原始文本帧，不解析协议内容，
//! 也不做自动重连（重连由驱动层的 supervisor 负责）。
//!
//! ## 实现
//!
//! - [`WebSocketTransport`]：基于 `tungstenite` 的 WebSocket 客户端
//! - `MockTransport`（feature `mock`）：内存实现，用于测试

use std::time::Duration;
use thiserror::Error;

pub mod state;
pub mod websocket;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use state::{AtomicConnectionState, ConnectionState};
pub use websocket::WebSocketTransport;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockHandle, MockTransport};

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum TransportError {
    /// 当前未连接，帧被丢弃（不排队）
    #[error("Not connected")]
    NotConnected,

    #[error("Invalid endpoint `{endpoint}`: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// WebSocket 握手失败
    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    /// 连接已关闭（IO 线程已退出）
    #[error("Connection closed")]
    Closed,
}

/// 传输层事件
///
/// 连接的异步状态变化和收到的帧都以事件形式交给唯一的分发者。
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// 连接已建立
    Opened,
    /// 收到一帧文本
    Message(String),
    /// 连接已关闭
    Closed { reason: String },
    /// 连接出错（通常紧随一个 `Closed`）
    Error(String),
}

/// 传输层接口
///
/// 所有方法都不阻塞：`connect` 只发起连接，结果通过 [`poll_event`](Transport::poll_event)
/// 以事件形式返回。
pub trait Transport: Send {
    /// 发起连接
    ///
    /// 幂等：已有连接时先关闭再重新连接。状态立即变为 `Connecting`。
    fn connect(&mut self, endpoint: &str) -> Result<(), TransportError>;

    /// 发送一帧文本
    ///
    /// 仅在 `Connected` 状态下发送，否则返回 [`TransportError::NotConnected`]，从不排队。
    fn send(&mut self, text: &str) -> Result<(), TransportError>;

    /// 关闭连接
    ///
    /// 关闭后直到下一次 `connect` 之前不会再有任何发送。
    fn close(&mut self);

    fn state(&self) -> ConnectionState;

    /// 取出下一个事件（非阻塞）
    fn poll_event(&mut self) -> Option<TransportEvent>;

    /// 等待下一个事件，最多 `timeout`
    ///
    /// 默认实现以 1ms 粒度轮询 `poll_event`。
    fn poll_event_timeout(&mut self, timeout: Duration) -> Option<TransportEvent> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if let Some(event) = self.poll_event() {
                return Some(event);
            }
            if std::time::Instant::now() >= deadline {
                return None;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn connect(&mut self, endpoint: &str) -> Result<(), TransportError> {
        (**self).connect(endpoint)
    }

    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        (**self).send(text)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn state(&self) -> ConnectionState {
        (**self).state()
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        (**self).poll_event()
    }

    fn poll_event_timeout(&mut self, timeout: Duration) -> Option<TransportEvent> {
        (**self).poll_event_timeout(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        assert_eq!(TransportError::NotConnected.to_string(), "Not connected");
        let err = TransportError::InvalidEndpoint {
            endpoint: "foo".to_string(),
            reason: "relative URL".to_string(),
        };
        assert!(err.to_string().contains("foo"));
        let err: TransportError =
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused").into();
        assert!(matches!(err, TransportError::Io(_)));
    }

    #[test]
    fn test_boxed_transport_forwards() {
        let (transport, handle) = MockTransport::new();
        let mut boxed: Box<dyn Transport> = Box::new(transport);

        boxed.connect("ws://device/").unwrap();
        assert_eq!(boxed.state(), ConnectionState::Connecting);
        handle.open();
        assert_eq!(boxed.poll_event(), Some(TransportEvent::Opened));
        assert!(boxed.state().is_connected());
        boxed.send("M16").unwrap();
        assert_eq!(handle.sent(), vec!["M16".to_string()]);
    }
}
