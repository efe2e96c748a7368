//! 连接状态定义
//!
//! 连接状态由传输层拥有，其它组件只读观察。

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// 连接状态
///
/// # 状态转换
///
/// - Disconnected → Connecting：发起连接
/// - Connecting → Connected：握手完成
/// - Connecting/Connected → Disconnected：关闭或出错
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ConnectionState {
    #[default]
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl ConnectionState {
    /// 从 u8 转换
    ///
    /// 如果值无效，返回 Disconnected。
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            _ => Self::Disconnected,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }

    pub fn is_disconnected(self) -> bool {
        self == Self::Disconnected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        })
    }
}

/// 连接状态（原子版本，用于线程间共享）
///
/// IO 线程写入，观察者无锁读取。
///
/// # 示例
///
/// ```rust
/// use ustepper_transport::{AtomicConnectionState, ConnectionState};
/// use std::sync::atomic::Ordering;
///
/// let state = AtomicConnectionState::new(ConnectionState::Disconnected);
/// state.set(ConnectionState::Connecting, Ordering::Release);
/// assert_eq!(state.get(Ordering::Acquire), ConnectionState::Connecting);
/// ```
#[derive(Debug, Default)]
pub struct AtomicConnectionState {
    inner: AtomicU8,
}

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            inner: AtomicU8::new(state.as_u8()),
        }
    }

    pub fn get(&self, ordering: Ordering) -> ConnectionState {
        ConnectionState::from_u8(self.inner.load(ordering))
    }

    pub fn set(&self, state: ConnectionState, ordering: Ordering) {
        self.inner.store(state.as_u8(), ordering);
    }

    /// 比较并交换
    ///
    /// 当前值等于 `current` 时设置为 `new` 并返回 true，否则返回 false。
    pub fn compare_exchange(
        &self,
        current: ConnectionState,
        new: ConnectionState,
        success: Ordering,
        failure: Ordering,
    ) -> bool {
        self.inner
            .compare_exchange(current.as_u8(), new.as_u8(), success, failure)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8() {
        assert_eq!(ConnectionState::from_u8(0), ConnectionState::Disconnected);
        assert_eq!(ConnectionState::from_u8(1), ConnectionState::Connecting);
        assert_eq!(ConnectionState::from_u8(2), ConnectionState::Connected);
        assert_eq!(ConnectionState::from_u8(200), ConnectionState::Disconnected);
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
        assert_eq!(ConnectionState::default().to_string(), "disconnected");
    }

    #[test]
    fn test_atomic_state() {
        let state = AtomicConnectionState::default();
        assert_eq!(state.get(Ordering::Relaxed), ConnectionState::Disconnected);

        state.set(ConnectionState::Connecting, Ordering::Relaxed);
        assert!(state.compare_exchange(
            ConnectionState::Connecting,
            ConnectionState::Connected,
            Ordering::Relaxed,
            Ordering::Relaxed
        ));
        assert!(state.get(Ordering::Relaxed).is_connected());

        // 期望值不匹配
        assert!(!state.compare_exchange(
            ConnectionState::Connecting,
            ConnectionState::Disconnected,
            Ordering::Relaxed,
            Ordering::Relaxed
        ));
        assert!(state.get(Ordering::Relaxed).is_connected());
    }
}
