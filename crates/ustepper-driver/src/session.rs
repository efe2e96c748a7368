//! 会话状态
//!
//! 所有解码后的上行事件和操作命令的唯一修改点，也是调度器推导运动意图的唯一读取点。
//! 会话只在 IO 线程内被修改，其它线程通过 [`SessionSnapshot`] 只读观察。
//!
//! # 遥测抑制
//!
//! 阻塞操作（回零）期间设备不处理遥测请求：
//! - 分发阻塞指令时，由发起方**同步**清除 `telemetry_requests_allowed`（早于任何设备响应）；
//! - 只有解码到 `DONE` 时才恢复；
//! - 指令未能发出（链路未连接）时撤销抑制，设备不会为没收到的指令回复 `DONE`。
//!
//! 每个 `DONE` 都会让 `operations_done` 计数加一，等待方据此区分新旧完成事件。

use ustepper_protocol::{Command, ConfigFrame, DeviceMessage, Opcode, TelemetryFrame};
use ustepper_transport::ConnectionState;

use crate::intent::MotionIntent;

/// 轮询阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollPhase {
    /// 发送运动指令
    #[default]
    Command,
    /// 请求遥测
    Telemetry,
}

impl PollPhase {
    pub fn next(self) -> Self {
        match self {
            Self::Command => Self::Telemetry,
            Self::Telemetry => Self::Command,
        }
    }
}

/// 会话标志
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionFlags {
    /// 本次连接是否已收到配置
    pub config_received: bool,
    /// 是否允许发送遥测请求
    pub telemetry_requests_allowed: bool,
    /// 设备是否正在录制
    pub recording_active: bool,
    pub poll_phase: PollPhase,
}

impl Default for SessionFlags {
    fn default() -> Self {
        Self {
            config_received: false,
            telemetry_requests_allowed: true,
            recording_active: false,
            poll_phase: PollPhase::Command,
        }
    }
}

/// 应用一条上行消息的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionUpdate {
    /// 无状态变化（OK / RDY / 未识别）
    Unchanged,
    TelemetryUpdated,
    /// 本次连接收到的第一帧配置
    ConfigReceived,
    /// 后续配置帧（仅覆盖数据）
    ConfigUpdated,
    /// 阻塞操作完成，遥测请求恢复
    OperationDone,
}

/// 会话状态
#[derive(Debug, Clone, Default)]
pub struct Session {
    connection: ConnectionState,
    flags: SessionFlags,
    telemetry: Option<TelemetryFrame>,
    config: Option<ConfigFrame>,
    intent: MotionIntent,
    operations_done: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flags(&self) -> &SessionFlags {
        &self.flags
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn telemetry(&self) -> Option<&TelemetryFrame> {
        self.telemetry.as_ref()
    }

    pub fn config(&self) -> Option<&ConfigFrame> {
        self.config.as_ref()
    }

    pub fn intent(&self) -> MotionIntent {
        self.intent
    }

    /// 已完成的阻塞操作数（单调递增）
    pub fn operations_done(&self) -> u64 {
        self.operations_done
    }

    pub fn set_intent(&mut self, intent: MotionIntent) {
        self.intent = intent;
    }

    pub fn poll_phase(&self) -> PollPhase {
        self.flags.poll_phase
    }

    pub(crate) fn advance_phase(&mut self) {
        self.flags.poll_phase = self.flags.poll_phase.next();
    }

    /// 应用一条解码后的上行消息
    ///
    /// 帧整体替换，不做字段级合并。
    pub fn apply(&mut self, message: &DeviceMessage) -> SessionUpdate {
        match message {
            DeviceMessage::Telemetry(frame) => {
                self.telemetry = Some(*frame);
                SessionUpdate::TelemetryUpdated
            },
            DeviceMessage::Configuration(frame) => {
                self.config = Some(*frame);
                if self.flags.config_received {
                    SessionUpdate::ConfigUpdated
                } else {
                    self.flags.config_received = true;
                    SessionUpdate::ConfigReceived
                }
            },
            DeviceMessage::OperationDone => {
                self.flags.telemetry_requests_allowed = true;
                self.operations_done += 1;
                SessionUpdate::OperationDone
            },
            DeviceMessage::Acknowledged | DeviceMessage::Ready | DeviceMessage::Unknown(_) => {
                SessionUpdate::Unchanged
            },
        }
    }

    /// 指令分发前调用（早于发送）
    pub fn on_dispatch(&mut self, command: &Command) {
        if command.is_blocking() {
            self.flags.telemetry_requests_allowed = false;
        }
        match command.opcode() {
            Opcode::RecordStart => self.flags.recording_active = true,
            Opcode::RecordStop => self.flags.recording_active = false,
            _ => {},
        }
    }

    /// 指令被丢弃（未发出）时调用，恢复分发前的标志
    pub fn on_dispatch_dropped(&mut self, previous: &SessionFlags) {
        self.flags.telemetry_requests_allowed = previous.telemetry_requests_allowed;
        self.flags.recording_active = previous.recording_active;
    }

    /// 开始连接
    pub fn on_connecting(&mut self) {
        self.connection = ConnectionState::Connecting;
    }

    /// 连接已建立：新连接必须重新收到配置后才能恢复轮询
    pub fn on_connection_opened(&mut self) {
        self.connection = ConnectionState::Connected;
        self.flags.config_received = false;
        self.flags.poll_phase = PollPhase::Command;
    }

    /// 连接断开
    pub fn on_connection_lost(&mut self) {
        self.connection = ConnectionState::Disconnected;
        self.flags.config_received = false;
        self.flags.poll_phase = PollPhase::Command;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            connection: self.connection,
            flags: self.flags,
            telemetry: self.telemetry,
            config: self.config,
            intent: self.intent,
            operations_done: self.operations_done,
        }
    }
}

/// 会话快照（不可变，供其它线程读取）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SessionSnapshot {
    pub connection: ConnectionState,
    pub flags: SessionFlags,
    pub telemetry: Option<TelemetryFrame>,
    pub config: Option<ConfigFrame>,
    pub intent: MotionIntent,
    /// 收到的 `DONE` 总数
    pub operations_done: u64,
}

impl SessionSnapshot {
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// 已连接且收到配置，轮询正在进行
    pub fn is_ready(&self) -> bool {
        self.is_connected() && self.flags.config_received
    }
}
