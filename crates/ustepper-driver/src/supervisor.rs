//! 重连 supervisor
//!
//! 周期（默认 3 s）比轮询调度器长，每个周期检查一次连接：
//!
//! - **Disconnected**：发起新的连接；
//! - **Connected 但未收到配置**：重新请求配置（`M16`），否则调度器一直不会开始轮询；
//! - 其它情况不做任何事，健康连接上重复检查没有副作用。
//!
//! 正在进行的连接（`Connecting`）不打断，由传输层自行转为 `Opened` 或 `Closed`。

use std::time::Duration;
use ustepper_transport::ConnectionState;

/// supervisor 要求 Pipeline 执行的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorAction {
    None,
    Reconnect,
    RequestConfig,
}

/// 周期性连接检查
#[derive(Debug, Clone)]
pub struct ReconnectSupervisor {
    period: Duration,
    next_check: Option<Duration>,
}

impl ReconnectSupervisor {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_check: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// 启动；第一次检查在 `now + period`
    pub fn start(&mut self, now: Duration) {
        if self.next_check.is_none() {
            self.next_check = Some(now + self.period);
        }
    }

    /// 停止（显式关闭连接后）
    pub fn stop(&mut self) {
        self.next_check = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_check.is_some()
    }

    pub fn check(
        &mut self,
        now: Duration,
        connection: ConnectionState,
        config_received: bool,
    ) -> SupervisorAction {
        let Some(due) = self.next_check else {
            return SupervisorAction::None;
        };
        if now < due {
            return SupervisorAction::None;
        }
        self.next_check = Some(now + self.period);

        match connection {
            ConnectionState::Disconnected => SupervisorAction::Reconnect,
            ConnectionState::Connected if !config_received => SupervisorAction::RequestConfig,
            _ => SupervisorAction::None,
        }
    }
}
