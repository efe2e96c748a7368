//! 轮询调度器
//!
//! 两阶段交替器，每个周期最多产生一帧：
//!
//! ```text
//! tick N   : Command   阶段 → 速度变化时发送 G2/G3/G4
//! tick N+1 : Telemetry 阶段 → 允许时发送 M15
//! tick N+2 : Command   阶段 → ...
//! ```
//!
//! 输入源的变化频率可以远高于周期，请求速率只由周期决定。
//! 未连接或尚未收到配置时什么都不发，阶段也不推进（不猜测默认值）。

use std::time::Duration;
use tracing::trace;
use ustepper_protocol::Command;
use ustepper_transport::ConnectionState;

use crate::session::{PollPhase, Session};

/// 轮询调度器
///
/// 时间由调用方传入（见 [`Clock`](crate::Clock)），调度器本身不读取系统时间。
#[derive(Debug, Clone)]
pub struct PollScheduler {
    period: Duration,
    max_velocity: f64,
    next_due: Option<Duration>,
    last_sent_velocity: f64,
}

impl PollScheduler {
    pub fn new(period: Duration, max_velocity: f64) -> Self {
        Self {
            period,
            max_velocity,
            next_due: None,
            last_sent_velocity: 0.0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn max_velocity(&self) -> f64 {
        self.max_velocity
    }

    /// 开始调度，第一个周期在 `now + period` 到期
    pub fn start(&mut self, now: Duration) {
        if self.next_due.is_none() {
            self.next_due = Some(now + self.period);
        }
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    /// 最近一次发送的速度（原始单位）
    pub fn last_sent_velocity(&self) -> f64 {
        self.last_sent_velocity
    }

    /// 连接断开时调用：下一个连接上第一个非零速度一定会发送
    pub fn reset_velocity(&mut self) {
        self.last_sent_velocity = 0.0;
    }

    /// 推进时间，到期时返回本周期要发送的指令（至多一条）
    pub fn tick(
        &mut self,
        now: Duration,
        session: &mut Session,
        connection: ConnectionState,
    ) -> Option<Command> {
        let due = self.next_due?;
        if now < due {
            return None;
        }

        // 落后超过一个周期时不补发，从当前时刻重新对齐
        let next = due + self.period;
        self.next_due = Some(if next <= now { now + self.period } else { next });

        if !connection.is_connected() || !session.flags().config_received {
            trace!(%connection, "Poll skipped: not ready");
            return None;
        }

        let command = match session.poll_phase() {
            PollPhase::Command => {
                let velocity = session.intent().velocity(self.max_velocity);
                if velocity != self.last_sent_velocity {
                    self.last_sent_velocity = velocity;
                    Some(Command::continuous(velocity))
                } else {
                    None
                }
            },
            PollPhase::Telemetry => session
                .flags()
                .telemetry_requests_allowed
                .then(Command::request_telemetry),
        };
        session.advance_phase();
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::MotionIntent;
    use ustepper_protocol::{BrakeMode, ConfigFrame, DeviceMessage, Opcode};

    const PERIOD: Duration = Duration::from_millis(50);

    fn ready_session() -> Session {
        let mut session = Session::new();
        session.on_connection_opened();
        session.apply(&DeviceMessage::Configuration(ConfigFrame {
            velocity: 200.0,
            acceleration: 50.0,
            brake_mode: BrakeMode::Free,
            closed_loop_enabled: true,
        }));
        session
    }

    fn intent(ratio_x: f64) -> MotionIntent {
        MotionIntent {
            active: true,
            ratio_x,
        }
    }

    /// 跑 n 个周期，返回每个周期的编码结果
    fn run(
        scheduler: &mut PollScheduler,
        session: &mut Session,
        start: Duration,
        n: u32,
    ) -> Vec<Option<String>> {
        (1..=n)
            .map(|i| {
                scheduler
                    .tick(start + PERIOD * i, session, ConnectionState::Connected)
                    .map(|c| c.encode())
            })
            .collect()
    }

    #[test]
    fn test_not_due_before_period() {
        let mut scheduler = PollScheduler::new(PERIOD, 100.0);
        let mut session = ready_session();
        session.set_intent(intent(0.5));
        scheduler.start(Duration::ZERO);

        assert!(
            scheduler
                .tick(Duration::from_millis(49), &mut session, ConnectionState::Connected)
                .is_none()
        );
        assert_eq!(session.poll_phase(), PollPhase::Command);
        assert!(
            scheduler
                .tick(PERIOD, &mut session, ConnectionState::Connected)
                .is_some()
        );
    }

    #[test]
    fn test_velocity_scenario() {
        let mut scheduler = PollScheduler::new(PERIOD, 100.0);
        let mut session = ready_session();
        scheduler.start(Duration::ZERO);

        session.set_intent(intent(0.5));
        let out = run(&mut scheduler, &mut session, Duration::ZERO, 2);
        assert_eq!(out, vec![Some("G2 A50".into()), Some("M15".into())]);

        session.set_intent(intent(-0.5));
        let out = run(&mut scheduler, &mut session, PERIOD * 2, 2);
        assert_eq!(out, vec![Some("G3 A50".into()), Some("M15".into())]);
    }

    #[test]
    fn test_unchanged_velocity_not_resent() {
        let mut scheduler = PollScheduler::new(PERIOD, 100.0);
        let mut session = ready_session();
        scheduler.start(Duration::ZERO);
        session.set_intent(intent(0.5));

        let out = run(&mut scheduler, &mut session, Duration::ZERO, 6);
        assert_eq!(
            out,
            vec![
                Some("G2 A50".into()),
                Some("M15".into()),
                None,
                Some("M15".into()),
                None,
                Some("M15".into()),
            ]
        );
    }

    #[test]
    fn test_release_sends_brake() {
        let mut scheduler = PollScheduler::new(PERIOD, 100.0);
        let mut session = ready_session();
        scheduler.start(Duration::ZERO);

        session.set_intent(intent(1.0));
        run(&mut scheduler, &mut session, Duration::ZERO, 2);

        session.set_intent(MotionIntent::default());
        let out = run(&mut scheduler, &mut session, PERIOD * 2, 1);
        assert_eq!(out, vec![Some("G4".into())]);
        assert_eq!(scheduler.last_sent_velocity(), 0.0);
    }

    #[test]
    fn test_idle_input_sends_nothing_but_telemetry() {
        let mut scheduler = PollScheduler::new(PERIOD, 100.0);
        let mut session = ready_session();
        scheduler.start(Duration::ZERO);

        let out = run(&mut scheduler, &mut session, Duration::ZERO, 4);
        assert_eq!(out, vec![None, Some("M15".into()), None, Some("M15".into())]);
    }

    #[test]
    fn test_waits_for_config() {
        let mut scheduler = PollScheduler::new(PERIOD, 100.0);
        let mut session = Session::new();
        session.on_connection_opened();
        session.set_intent(intent(0.5));
        scheduler.start(Duration::ZERO);

        let out = run(&mut scheduler, &mut session, Duration::ZERO, 5);
        assert!(out.iter().all(Option::is_none));
        assert_eq!(session.poll_phase(), PollPhase::Command);
    }

    #[test]
    fn test_sends_nothing_while_disconnected() {
        let mut scheduler = PollScheduler::new(PERIOD, 100.0);
        let mut session = ready_session();
        session.set_intent(intent(0.5));
        scheduler.start(Duration::ZERO);

        for state in [ConnectionState::Disconnected, ConnectionState::Connecting] {
            for i in 1..=4 {
                assert!(scheduler.tick(PERIOD * i, &mut session, state).is_none());
            }
        }
        assert_eq!(scheduler.last_sent_velocity(), 0.0);
    }

    #[test]
    fn test_suppressed_telemetry() {
        let mut scheduler = PollScheduler::new(PERIOD, 100.0);
        let mut session = ready_session();
        scheduler.start(Duration::ZERO);
        session.on_dispatch(&Command::home());

        let out = run(&mut scheduler, &mut session, Duration::ZERO, 6);
        assert!(out.iter().all(Option::is_none));

        session.apply(&DeviceMessage::OperationDone);
        let out = run(&mut scheduler, &mut session, PERIOD * 6, 2);
        assert!(out.contains(&Some("M15".into())));
    }

    #[test]
    fn test_stop_and_restart() {
        let mut scheduler = PollScheduler::new(PERIOD, 100.0);
        let mut session = ready_session();
        session.set_intent(intent(0.5));

        // 未启动
        assert!(
            scheduler
                .tick(PERIOD, &mut session, ConnectionState::Connected)
                .is_none()
        );

        scheduler.start(Duration::ZERO);
        assert!(scheduler.is_running());
        scheduler.stop();
        assert!(!scheduler.is_running());
        assert!(
            scheduler
                .tick(PERIOD * 10, &mut session, ConnectionState::Connected)
                .is_none()
        );

        scheduler.start(PERIOD * 10);
        let cmd = scheduler
            .tick(PERIOD * 11, &mut session, ConnectionState::Connected)
            .unwrap();
        assert_eq!(cmd.opcode(), Opcode::Continuous);
    }

    #[test]
    fn test_reset_velocity_resends_after_reconnect() {
        let mut scheduler = PollScheduler::new(PERIOD, 100.0);
        let mut session = ready_session();
        session.set_intent(intent(0.5));
        scheduler.start(Duration::ZERO);
        run(&mut scheduler, &mut session, Duration::ZERO, 2);

        session.on_connection_lost();
        scheduler.reset_velocity();
        session.on_connection_opened();
        session.apply(&DeviceMessage::Configuration(ConfigFrame::default()));

        let out = run(&mut scheduler, &mut session, PERIOD * 2, 1);
        assert_eq!(out, vec![Some("G2 A50".into())]);
    }

    #[test]
    fn test_late_tick_realigns() {
        let mut scheduler = PollScheduler::new(PERIOD, 100.0);
        let mut session = ready_session();
        session.set_intent(intent(0.5));
        scheduler.start(Duration::ZERO);

        // 迟到 10 个周期也只产生一帧
        assert!(
            scheduler
                .tick(PERIOD * 10, &mut session, ConnectionState::Connected)
                .is_some()
        );
        assert!(
            scheduler
                .tick(PERIOD * 10, &mut session, ConnectionState::Connected)
                .is_none()
        );
        assert!(
            scheduler
                .tick(PERIOD * 11, &mut session, ConnectionState::Connected)
                .is_some()
        );
    }
}
