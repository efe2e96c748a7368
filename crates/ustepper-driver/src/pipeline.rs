//! Pipeline IO 循环模块
//!
//! [`Pipeline`] 独占传输层、会话、调度器和 supervisor，
//! 所有状态修改都发生在同一个线程内，不需要加锁。
//!
//! # 单次循环
//!
//! ```text
//! 1. 处理操作命令（来自 Stepper 句柄的有界通道）
//! 2. 处理传输层事件 → 解码 → 更新会话
//! 3. supervisor 检查（重连 / 补发配置请求）
//! 4. 调度器 tick（至多一帧）
//! 5. 发布会话快照，短暂休眠
//! ```
//!
//! 协议没有请求 ID：解码结果直接覆盖当前状态，依赖传输层按序投递。

use arc_swap::ArcSwap;
use crossbeam_channel::{Receiver, TryRecvError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use ustepper_protocol::{Command, DeviceMessage, Mechanics, Opcode, decode_with};
use ustepper_transport::{Transport, TransportError, TransportEvent};

use crate::clock::Clock;
use crate::config::StepperConfig;
use crate::intent::{IntentSource, MotionIntent};
use crate::metrics::StepperMetrics;
use crate::scheduler::PollScheduler;
use crate::session::{Session, SessionSnapshot, SessionUpdate};
use crate::supervisor::{ReconnectSupervisor, SupervisorAction};

/// IO 循环的默认休眠间隔
pub const DEFAULT_LOOP_INTERVAL: Duration = Duration::from_millis(1);

/// 发往 IO 线程的操作命令
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// 分发一条设备指令
    Dispatch(Command),
    StartPolling,
    StopPolling,
    /// 立即重新连接（恢复 supervisor）
    Reconnect,
    /// 关闭连接并停止 supervisor，直到下一次 `Reconnect`
    Disconnect,
    /// 关闭连接并退出 IO 循环
    Shutdown,
}

/// IO 线程与句柄之间共享的只读状态
#[derive(Debug, Default)]
pub struct StepperContext {
    pub snapshot: ArcSwap<SessionSnapshot>,
    pub metrics: StepperMetrics,
}

impl StepperContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// 分发器：唯一消费传输层事件并修改会话的地方
pub struct Pipeline<T, I, C> {
    transport: T,
    intent: I,
    clock: C,
    session: Session,
    scheduler: PollScheduler,
    supervisor: ReconnectSupervisor,
    mechanics: Mechanics,
    endpoint: String,
    ctx: Arc<StepperContext>,
    first_telemetry_logged: bool,
}

impl<T, I, C> Pipeline<T, I, C>
where
    T: Transport,
    I: IntentSource,
    C: Clock,
{
    pub fn new(
        transport: T,
        intent: I,
        clock: C,
        config: &StepperConfig,
        ctx: Arc<StepperContext>,
    ) -> Self {
        Self {
            transport,
            intent,
            clock,
            session: Session::new(),
            scheduler: PollScheduler::new(config.poll_interval(), config.max_velocity),
            supervisor: ReconnectSupervisor::new(config.reconnect_interval()),
            mechanics: config.mechanics,
            endpoint: config.endpoint.clone(),
            ctx,
            first_telemetry_logged: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn scheduler(&self) -> &PollScheduler {
        &self.scheduler
    }

    pub fn supervisor(&self) -> &ReconnectSupervisor {
        &self.supervisor
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn context(&self) -> &Arc<StepperContext> {
        &self.ctx
    }

    /// 发起首次连接并启动调度器和 supervisor
    pub fn start(&mut self) {
        let now = self.clock.now();
        self.connect();
        self.scheduler.start(now);
        self.supervisor.start(now);
        self.publish();
    }

    /// 关闭连接（终止态，直到下一次 `Reconnect`）
    pub fn shutdown(&mut self) {
        self.disconnect();
        self.scheduler.stop();
        self.publish();
    }

    /// 处理一次循环：事件 → supervisor → 调度器 → 发布快照
    pub fn run_once(&mut self) {
        self.process_events();
        self.tick();
        self.publish();
    }

    /// 处理一条操作命令，返回 false 表示应退出循环
    pub fn handle_control(&mut self, message: ControlMessage) -> bool {
        match message {
            ControlMessage::Dispatch(command) => self.dispatch(command),
            ControlMessage::StartPolling => self.scheduler.start(self.clock.now()),
            ControlMessage::StopPolling => self.scheduler.stop(),
            ControlMessage::Reconnect => {
                self.connect();
                self.supervisor.start(self.clock.now());
            },
            ControlMessage::Disconnect => self.disconnect(),
            ControlMessage::Shutdown => return false,
        }
        self.publish();
        true
    }

    /// 分发一条指令
    ///
    /// 阻塞指令的遥测抑制在发送前同步生效，发送被丢弃时撤销。
    /// 录制进行中时，回零和停止之前先发送停止录制。
    pub fn dispatch(&mut self, command: Command) {
        if matches!(command.opcode(), Opcode::Home | Opcode::Stop)
            && self.session.flags().recording_active
        {
            self.dispatch_one(&Command::record_stop());
        }

        self.dispatch_one(&command);
    }

    fn dispatch_one(&mut self, command: &Command) {
        let before = *self.session.flags();
        self.session.on_dispatch(command);
        if !self.transmit(command) {
            self.session.on_dispatch_dropped(&before);
        }
    }

    /// 取出并处理所有待处理的传输层事件
    pub fn process_events(&mut self) {
        while let Some(event) = self.transport.poll_event() {
            self.handle_event(event);
        }
    }

    /// supervisor 检查 + 调度器 tick
    pub fn tick(&mut self) {
        let now = self.clock.now();
        self.session.set_intent(MotionIntent::sample(&self.intent));

        let connection = self.transport.state();
        match self
            .supervisor
            .check(now, connection, self.session.flags().config_received)
        {
            SupervisorAction::Reconnect => {
                StepperMetrics::incr(&self.ctx.metrics.reconnect_attempts);
                info!(endpoint = %self.endpoint, "Reconnecting");
                self.connect();
            },
            SupervisorAction::RequestConfig => {
                debug!("No configuration yet, requesting again");
                self.transmit(&Command::request_config());
            },
            SupervisorAction::None => {},
        }

        let connection = self.transport.state();
        if let Some(command) = self.scheduler.tick(now, &mut self.session, connection) {
            self.transmit(&command);
        }
    }

    fn connect(&mut self) {
        // 旧连接上的会话状态不能带到新连接
        self.connection_lost();
        match self.transport.connect(&self.endpoint) {
            Ok(()) => self.session.on_connecting(),
            Err(e) => {
                StepperMetrics::incr(&self.ctx.metrics.transport_errors);
                warn!(endpoint = %self.endpoint, "Connect failed: {}", e);
            },
        }
    }

    fn disconnect(&mut self) {
        self.transport.close();
        self.supervisor.stop();
        self.connection_lost();
    }

    fn connection_lost(&mut self) {
        self.session.on_connection_lost();
        self.scheduler.reset_velocity();
    }

    /// 发送一帧；未连接时丢弃并计数，从不向上传播
    fn transmit(&mut self, command: &Command) -> bool {
        let text = command.encode();
        match self.transport.send(&text) {
            Ok(()) => {
                trace!(frame = %text, "TX");
                StepperMetrics::incr(&self.ctx.metrics.tx_frames_total);
                true
            },
            Err(TransportError::NotConnected) => {
                debug!(frame = %text, "Send dropped: not connected");
                StepperMetrics::incr(&self.ctx.metrics.tx_dropped);
                false
            },
            Err(e) => {
                warn!(frame = %text, "Send failed: {}", e);
                StepperMetrics::incr(&self.ctx.metrics.tx_dropped);
                StepperMetrics::incr(&self.ctx.metrics.transport_errors);
                false
            },
        }
    }

    fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => {
                info!(endpoint = %self.endpoint, "Connected");
                self.session.on_connection_opened();
                self.scheduler.reset_velocity();
                self.transmit(&Command::request_config());
            },
            TransportEvent::Message(text) => self.handle_message(&text),
            TransportEvent::Closed { reason } => {
                info!(%reason, "Connection lost");
                self.connection_lost();
            },
            TransportEvent::Error(error) => {
                StepperMetrics::incr(&self.ctx.metrics.transport_errors);
                warn!("Transport error: {}", error);
            },
        }
    }

    fn handle_message(&mut self, text: &str) {
        StepperMetrics::incr(&self.ctx.metrics.rx_frames_total);
        trace!(frame = %text, "RX");

        let message = match decode_with(text, &self.mechanics) {
            Ok(message) => message,
            Err(e) => {
                StepperMetrics::incr(&self.ctx.metrics.rx_malformed);
                debug!(frame = %text, "Discarding frame: {}", e);
                return;
            },
        };

        if let DeviceMessage::Unknown(raw) = &message {
            StepperMetrics::incr(&self.ctx.metrics.rx_unknown);
            debug!(frame = %raw, "Unknown frame");
            return;
        }

        match self.session.apply(&message) {
            SessionUpdate::ConfigReceived => {
                if let Some(config) = self.session.config() {
                    info!(
                        velocity = config.velocity,
                        acceleration = config.acceleration,
                        brake_mode = ?config.brake_mode,
                        closed_loop = config.closed_loop_enabled,
                        "Configuration received"
                    );
                }
            },
            SessionUpdate::TelemetryUpdated if !self.first_telemetry_logged => {
                self.first_telemetry_logged = true;
                info!("Position received");
            },
            SessionUpdate::OperationDone => debug!("Blocking operation done"),
            _ => {},
        }
    }

    /// 会话有变化时发布新快照
    fn publish(&self) {
        let snapshot = self.session.snapshot();
        if **self.ctx.snapshot.load() != snapshot {
            self.ctx.snapshot.store(Arc::new(snapshot));
        }
    }
}

/// IO 线程循环
///
/// # 参数
/// - `pipeline`: 分发器（移入 IO 线程独占）
/// - `ctrl_rx`: 操作命令接收通道
/// - `loop_interval`: 每次循环后的休眠时间
///
/// 收到 [`ControlMessage::Shutdown`] 或通道断开（句柄已销毁）时关闭连接并返回。
pub fn io_loop<T, I, C>(
    mut pipeline: Pipeline<T, I, C>,
    ctrl_rx: Receiver<ControlMessage>,
    loop_interval: Duration,
) where
    T: Transport,
    I: IntentSource,
    C: Clock,
{
    pipeline.start();

    loop {
        // 1. 先处理积压的操作命令
        loop {
            match ctrl_rx.try_recv() {
                Ok(message) => {
                    if !pipeline.handle_control(message) {
                        debug!("IO thread: shutdown requested");
                        pipeline.shutdown();
                        return;
                    }
                },
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("IO thread: control channel closed, exiting");
                    pipeline.shutdown();
                    return;
                },
            }
        }

        // 2. 事件、supervisor、调度器
        pipeline.run_once();

        spin_sleep::sleep(loop_interval);
    }
}
