//! WebSocket 传输层回环测试
//!
//! 在本机启动一个最小的 tungstenite 服务端，模拟控制器的应答。

use std::net::TcpListener;
use std::thread;
use std::time::{Duration, Instant};
use tungstenite::Message;
use ustepper_transport::{ConnectionState, Transport, TransportEvent, WebSocketTransport};

/// 等待满足条件的事件，超时返回 None
fn wait_for(
    transport: &mut WebSocketTransport,
    timeout: Duration,
    pred: impl Fn(&TransportEvent) -> bool,
) -> Option<TransportEvent> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        match transport.poll_event_timeout(Duration::from_millis(50)) {
            Some(event) if pred(&event) => return Some(event),
            _ => {},
        }
    }
    None
}

#[test]
fn test_loopback_exchange() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut ws = tungstenite::accept(stream).unwrap();
        ws.send(Message::Text("RDY".into())).unwrap();

        let request = ws.read().unwrap().into_text().unwrap();
        ws.send(Message::Text("CONF V200A50B1C0".into())).unwrap();

        // 等待客户端关闭
        while ws.read().is_ok() {}
        request
    });

    let mut transport = WebSocketTransport::new();
    transport
        .connect(&format!("ws://127.0.0.1:{}/", port))
        .unwrap();

    assert_eq!(
        wait_for(&mut transport, Duration::from_secs(5), |e| matches!(
            e,
            TransportEvent::Opened
        )),
        Some(TransportEvent::Opened)
    );
    assert_eq!(transport.state(), ConnectionState::Connected);

    assert_eq!(
        wait_for(&mut transport, Duration::from_secs(5), |e| matches!(
            e,
            TransportEvent::Message(_)
        )),
        Some(TransportEvent::Message("RDY".to_string()))
    );

    transport.send("M16").unwrap();
    assert_eq!(
        wait_for(&mut transport, Duration::from_secs(5), |e| matches!(
            e,
            TransportEvent::Message(_)
        )),
        Some(TransportEvent::Message("CONF V200A50B1C0".to_string()))
    );

    transport.close();
    assert!(matches!(
        transport.poll_event(),
        Some(TransportEvent::Closed { .. })
    ));
    assert!(transport.send("M15").is_err());

    assert_eq!(server.join().unwrap(), "M16");
}

#[test]
fn test_device_initiated_close() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut ws = tungstenite::accept(stream).unwrap();
        ws.close(None).unwrap();
        while ws.read().is_ok() {}
    });

    let mut transport = WebSocketTransport::new();
    transport
        .connect(&format!("ws://127.0.0.1:{}/", port))
        .unwrap();

    let closed = wait_for(&mut transport, Duration::from_secs(5), |e| {
        matches!(e, TransportEvent::Closed { .. })
    });
    assert!(closed.is_some());
    assert_eq!(transport.state(), ConnectionState::Disconnected);

    server.join().unwrap();
}
