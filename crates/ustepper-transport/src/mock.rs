//! Mock 传输层
//!
//! 纯内存实现，不依赖网络。`MockTransport` 交给被测对象（通常移入 IO 线程），
//! 测试代码通过克隆的 [`MockHandle`] 注入事件并检查已发送的帧。
//!
//! 状态转换与 [`WebSocketTransport`](crate::WebSocketTransport) 一致：
//! 在 `poll_event` 取出 `Opened` / `Closed` 时才生效。

use crate::{ConnectionState, Transport, TransportError, TransportEvent};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Default)]
struct MockInner {
    state: ConnectionState,
    events: VecDeque<TransportEvent>,
    sent: Vec<String>,
    endpoints: Vec<String>,
    close_calls: usize,
    auto_open: bool,
}

/// Mock 传输层
#[derive(Debug)]
pub struct MockTransport {
    inner: Arc<Mutex<MockInner>>,
}

/// 测试端句柄
#[derive(Debug, Clone)]
pub struct MockHandle {
    inner: Arc<Mutex<MockInner>>,
}

impl MockTransport {
    /// 创建 mock，连接停留在 `Connecting` 直到 [`MockHandle::open`]
    pub fn new() -> (Self, MockHandle) {
        let inner = Arc::new(Mutex::new(MockInner::default()));
        (
            Self {
                inner: inner.clone(),
            },
            MockHandle { inner },
        )
    }

    /// 创建 mock，每次 `connect` 自动产生 `Opened` 事件
    pub fn auto_open() -> (Self, MockHandle) {
        let (transport, handle) = Self::new();
        transport.inner.lock().auto_open = true;
        (transport, handle)
    }
}

impl Transport for MockTransport {
    fn connect(&mut self, endpoint: &str) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        inner.endpoints.push(endpoint.to_string());
        // 丢弃旧连接尚未取走的事件
        inner.events.clear();
        inner.state = ConnectionState::Connecting;
        if inner.auto_open {
            inner.events.push_back(TransportEvent::Opened);
        }
        Ok(())
    }

    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        if !inner.state.is_connected() {
            return Err(TransportError::NotConnected);
        }
        inner.sent.push(text.to_string());
        Ok(())
    }

    fn close(&mut self) {
        let mut inner = self.inner.lock();
        inner.close_calls += 1;
        if !inner.state.is_disconnected() {
            inner.state = ConnectionState::Disconnected;
            inner.events.clear();
            inner.events.push_back(TransportEvent::Closed {
                reason: "closed by client".to_string(),
            });
        }
    }

    fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        let mut inner = self.inner.lock();
        let event = inner.events.pop_front()?;
        match &event {
            TransportEvent::Opened => inner.state = ConnectionState::Connected,
            TransportEvent::Closed { .. } => inner.state = ConnectionState::Disconnected,
            _ => {},
        }
        Some(event)
    }
}

impl MockHandle {
    /// 模拟握手完成
    pub fn open(&self) {
        self.push(TransportEvent::Opened);
    }

    /// 模拟收到一帧
    pub fn receive(&self, text: impl Into<String>) {
        self.push(TransportEvent::Message(text.into()));
    }

    /// 模拟连接断开
    pub fn drop_connection(&self, reason: impl Into<String>) {
        self.push(TransportEvent::Closed {
            reason: reason.into(),
        });
    }

    /// 模拟连接错误（错误事件后跟关闭事件）
    pub fn fail(&self, error: impl Into<String>) {
        let error = error.into();
        let mut inner = self.inner.lock();
        inner.events.push_back(TransportEvent::Error(error.clone()));
        inner.events.push_back(TransportEvent::Closed { reason: error });
    }

    pub fn push(&self, event: TransportEvent) {
        self.inner.lock().events.push_back(event);
    }

    /// 已发送的全部帧
    pub fn sent(&self) -> Vec<String> {
        self.inner.lock().sent.clone()
    }

    /// 取出并清空已发送的帧
    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut self.inner.lock().sent)
    }

    /// `connect` 调用次数
    pub fn connect_count(&self) -> usize {
        self.inner.lock().endpoints.len()
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.inner.lock().endpoints.clone()
    }

    pub fn close_count(&self) -> usize {
        self.inner.lock().close_calls
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// 尚未被取走的事件数
    pub fn pending_events(&self) -> usize {
        self.inner.lock().events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_requires_connected() {
        let (mut transport, handle) = MockTransport::new();
        assert!(matches!(
            transport.send("M15"),
            Err(TransportError::NotConnected)
        ));

        transport.connect("ws://a/").unwrap();
        assert!(matches!(
            transport.send("M15"),
            Err(TransportError::NotConnected)
        ));

        handle.open();
        assert_eq!(transport.poll_event(), Some(TransportEvent::Opened));
        transport.send("M15").unwrap();
        assert_eq!(handle.take_sent(), vec!["M15".to_string()]);
        assert!(handle.sent().is_empty());
    }

    #[test]
    fn test_auto_open() {
        let (mut transport, handle) = MockTransport::auto_open();
        transport.connect("ws://a/").unwrap();
        assert_eq!(transport.poll_event(), Some(TransportEvent::Opened));
        assert!(transport.state().is_connected());
        assert_eq!(handle.connect_count(), 1);
        assert_eq!(handle.endpoints(), vec!["ws://a/".to_string()]);
    }

    #[test]
    fn test_close_is_terminal() {
        let (mut transport, handle) = MockTransport::auto_open();
        transport.connect("ws://a/").unwrap();
        transport.poll_event();

        transport.close();
        assert!(transport.state().is_disconnected());
        assert!(matches!(
            transport.poll_event(),
            Some(TransportEvent::Closed { .. })
        ));
        assert!(transport.send("G4").is_err());
        assert_eq!(handle.close_count(), 1);

        // 重复关闭不产生新事件
        transport.close();
        assert_eq!(transport.poll_event(), None);
    }

    #[test]
    fn test_fail_then_closed() {
        let (mut transport, handle) = MockTransport::auto_open();
        transport.connect("ws://a/").unwrap();
        transport.poll_event();

        handle.fail("connection reset");
        assert_eq!(
            transport.poll_event(),
            Some(TransportEvent::Error("connection reset".to_string()))
        );
        assert!(transport.state().is_connected());
        assert!(matches!(
            transport.poll_event(),
            Some(TransportEvent::Closed { .. })
        ));
        assert!(handle.state().is_disconnected());
    }
}
