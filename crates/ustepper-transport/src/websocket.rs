//! WebSocket 传输层
//!
//! 每个连接一个 IO 线程：
//!
//! ```text
//! 调用方 ──send()──> [outbound channel] ──> IO 线程 ──> socket
//! 调用方 <─poll_event()── [event channel] <── IO 线程 <── socket
//! ```
//!
//! 每次 `connect` 分配一个新的代数（generation），IO 线程发出的事件都带有代数。
//! `poll_event` 丢弃旧代数的事件，所以旧 socket 迟到的关闭通知不会把新连接标记为断开。

use crate::{AtomicConnectionState, ConnectionState, Transport, TransportError, TransportEvent};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use tungstenite::client::IntoClientRequest;
use tungstenite::handshake::client::Request;
use tungstenite::{Message, WebSocket};

/// TCP 连接超时
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// IO 线程读超时（决定出站帧的最大排队延迟）
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(5);

/// 出站请求
enum Outbound {
    Text(String),
    Close,
}

/// WebSocket 传输层
pub struct WebSocketTransport {
    state: Arc<AtomicConnectionState>,
    generation: u64,
    event_tx: Sender<(u64, TransportEvent)>,
    event_rx: Receiver<(u64, TransportEvent)>,
    outbound: Option<Sender<Outbound>>,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        Self {
            state: Arc::new(AtomicConnectionState::default()),
            generation: 0,
            event_tx,
            event_rx,
            outbound: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// 共享的连接状态（供其它线程无锁观察）
    pub fn state_handle(&self) -> Arc<AtomicConnectionState> {
        self.state.clone()
    }

    /// 当前连接代数
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn parse_endpoint(endpoint: &str) -> Result<(Request, String, u16), TransportError> {
        let invalid = |reason: &str| TransportError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        };

        let request = endpoint
            .into_client_request()
            .map_err(|e| invalid(&e.to_string()))?;
        let uri = request.uri();
        if uri.scheme_str() != Some("ws") {
            return Err(invalid("only ws:// endpoints are supported"));
        }
        let host = uri
            .host()
            .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string())
            .ok_or_else(|| invalid("missing host"))?;
        let port = uri.port_u16().unwrap_or(80);

        Ok((request, host, port))
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for WebSocketTransport {
    fn connect(&mut self, endpoint: &str) -> Result<(), TransportError> {
        let (request, host, port) = Self::parse_endpoint(endpoint)?;

        self.close();
        self.generation += 1;
        let generation = self.generation;

        let (out_tx, out_rx) = crossbeam_channel::unbounded();
        let worker = ConnectionWorker {
            generation,
            events: self.event_tx.clone(),
            outbound: out_rx,
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
        };

        self.state.set(ConnectionState::Connecting, Ordering::Release);
        std::thread::Builder::new()
            .name(format!("ustepper-ws-{}", generation))
            .spawn(move || worker.run(request, &host, port))
            .inspect_err(|_| self.state.set(ConnectionState::Disconnected, Ordering::Release))?;

        self.outbound = Some(out_tx);
        info!(endpoint, generation, "Connecting");
        Ok(())
    }

    fn send(&mut self, text: &str) -> Result<(), TransportError> {
        if !self.state().is_connected() {
            return Err(TransportError::NotConnected);
        }
        let outbound = self.outbound.as_ref().ok_or(TransportError::NotConnected)?;
        outbound
            .send(Outbound::Text(text.to_string()))
            .map_err(|_| TransportError::Closed)
    }

    fn close(&mut self) {
        if let Some(outbound) = self.outbound.take() {
            let _ = outbound.send(Outbound::Close);
        }
        if self.state().is_disconnected() {
            return;
        }

        // 新代数使旧 IO 线程之后的事件全部失效
        self.generation += 1;
        self.state.set(ConnectionState::Disconnected, Ordering::Release);
        let _ = self.event_tx.send((
            self.generation,
            TransportEvent::Closed {
                reason: "closed by client".to_string(),
            },
        ));
        info!("Connection closed by client");
    }

    fn state(&self) -> ConnectionState {
        self.state.get(Ordering::Acquire)
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        loop {
            let (generation, event) = match self.event_rx.try_recv() {
                Ok(item) => item,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return None,
            };

            if generation != self.generation {
                trace!(generation, current = self.generation, ?event, "Dropping stale event");
                continue;
            }

            match &event {
                TransportEvent::Opened => {
                    self.state.set(ConnectionState::Connected, Ordering::Release)
                },
                TransportEvent::Closed { .. } => {
                    self.outbound = None;
                    self.state.set(ConnectionState::Disconnected, Ordering::Release)
                },
                _ => {},
            }
            return Some(event);
        }
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// 单个连接的 IO 线程
struct ConnectionWorker {
    generation: u64,
    events: Sender<(u64, TransportEvent)>,
    outbound: Receiver<Outbound>,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl ConnectionWorker {
    fn emit(&self, event: TransportEvent) {
        // 接收端已销毁时没有人关心事件
        let _ = self.events.send((self.generation, event));
    }

    fn fail(&self, error: String) {
        warn!(generation = self.generation, "{}", error);
        self.emit(TransportEvent::Error(error.clone()));
        self.emit(TransportEvent::Closed { reason: error });
    }

    fn run(self, request: Request, host: &str, port: u16) {
        let stream = match self.open_tcp(host, port) {
            Ok(stream) => stream,
            Err(e) => return self.fail(format!("TCP connect to {}:{} failed: {}", host, port, e)),
        };

        let mut socket = match tungstenite::client(request, stream) {
            Ok((socket, _response)) => socket,
            Err(e) => return self.fail(TransportError::Handshake(e.to_string()).to_string()),
        };

        if let Err(e) = socket.get_ref().set_read_timeout(Some(self.read_timeout)) {
            return self.fail(format!("Failed to set read timeout: {}", e));
        }

        debug!(generation = self.generation, "WebSocket handshake complete");
        self.emit(TransportEvent::Opened);

        let reason = self.io_loop(&mut socket);
        debug!(generation = self.generation, %reason, "IO thread exiting");
    }

    fn open_tcp(&self, host: &str, port: u16) -> std::io::Result<TcpStream> {
        let mut last_err = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                },
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no address resolved")
        }))
    }

    /// 收发循环，返回退出原因
    fn io_loop(&self, socket: &mut WebSocket<TcpStream>) -> String {
        loop {
            // 1. 先发送所有排队的出站帧
            loop {
                match self.outbound.try_recv() {
                    Ok(Outbound::Text(text)) => {
                        trace!(generation = self.generation, frame = %text, "TX");
                        if let Err(e) = socket.send(Message::Text(text)) {
                            let reason = format!("send failed: {}", e);
                            self.fail(reason.clone());
                            return reason;
                        }
                    },
                    Ok(Outbound::Close) | Err(TryRecvError::Disconnected) => {
                        let _ = socket.close(None);
                        let _ = socket.flush();
                        return "closed by client".to_string();
                    },
                    Err(TryRecvError::Empty) => break,
                }
            }

            // 2. 读一帧（读超时即返回）
            match socket.read() {
                Ok(Message::Text(text)) => {
                    trace!(generation = self.generation, frame = %text, "RX");
                    self.emit(TransportEvent::Message(text));
                },
                Ok(Message::Binary(data)) => {
                    self.emit(TransportEvent::Message(
                        String::from_utf8_lossy(&data).into_owned(),
                    ));
                },
                Ok(Message::Close(frame)) => {
                    let reason = frame
                        .map(|f| format!("closed by device ({})", f.code))
                        .unwrap_or_else(|| "closed by device".to_string());
                    let _ = socket.flush();
                    self.emit(TransportEvent::Closed {
                        reason: reason.clone(),
                    });
                    return reason;
                },
                Ok(_) => {},
                Err(tungstenite::Error::Io(e))
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) =>
                {
                    // 读超时：推送可能排队的 pong
                    let _ = socket.flush();
                },
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    let reason = "connection closed".to_string();
                    self.emit(TransportEvent::Closed {
                        reason: reason.clone(),
                    });
                    return reason;
                },
                Err(e) => {
                    let reason = format!("read failed: {}", e);
                    self.fail(reason.clone());
                    return reason;
                },
            }
        }
    }
}
