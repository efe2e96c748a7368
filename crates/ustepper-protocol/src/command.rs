//! 下行指令定义
//!
//! 包含操作码、参数以及指令的编码（`Display`）和解析（`FromStr`）。

use crate::ProtocolError;
use crate::feedback::BrakeMode;
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

/// 本 SDK 所有带数值的指令统一使用的参数名
pub const VALUE_PARAM: char = 'A';

/// 操作码
///
/// 协议中的 G/M 代码。编码值见 [`Opcode::code`]。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Opcode {
    // === 运动指令 ===
    /// G0：顺时针移动 N 步
    Move,
    /// G1：逆时针移动 N 步
    MoveCcw,
    /// G2：顺时针连续运动
    Continuous,
    /// G3：逆时针连续运动
    ContinuousCcw,
    /// G4：刹车
    Brake,
    /// G5：回零（阻塞操作，完成后设备回复 DONE）
    Home,

    // === 生命周期指令 ===
    /// M0：停止一切
    Stop,
    /// M1：设置速度
    SetSpeed,
    /// M2：设置加速度
    SetAcceleration,
    /// M3：刹车模式 free
    SetBrakeFree,
    /// M4：刹车模式 cool
    SetBrakeCool,
    /// M5：刹车模式 hard
    SetBrakeHard,
    /// M6：使能闭环
    EnableClosedLoop,
    /// M7：关闭闭环
    DisableClosedLoop,

    // === 录制指令 ===
    /// M10
    RecordStart,
    /// M11
    RecordStop,
    /// M12
    RecordAdd,
    /// M13
    RecordPlay,
    /// M14
    RecordPause,

    // === 查询指令 ===
    /// M15：请求遥测
    RequestTelemetry,
    /// M16：请求配置
    RequestConfig,
}

/// 操作码分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeKind {
    Motion,
    Lifecycle,
    Recording,
    Query,
}

impl Opcode {
    /// 全部操作码（按编码顺序）
    pub const ALL: [Opcode; 21] = [
        Opcode::Move,
        Opcode::MoveCcw,
        Opcode::Continuous,
        Opcode::ContinuousCcw,
        Opcode::Brake,
        Opcode::Home,
        Opcode::Stop,
        Opcode::SetSpeed,
        Opcode::SetAcceleration,
        Opcode::SetBrakeFree,
        Opcode::SetBrakeCool,
        Opcode::SetBrakeHard,
        Opcode::EnableClosedLoop,
        Opcode::DisableClosedLoop,
        Opcode::RecordStart,
        Opcode::RecordStop,
        Opcode::RecordAdd,
        Opcode::RecordPlay,
        Opcode::RecordPause,
        Opcode::RequestTelemetry,
        Opcode::RequestConfig,
    ];

    /// 线上编码
    pub const fn code(self) -> &'static str {
        match self {
            Opcode::Move => "G0",
            Opcode::MoveCcw => "G1",
            Opcode::Continuous => "G2",
            Opcode::ContinuousCcw => "G3",
            Opcode::Brake => "G4",
            Opcode::Home => "G5",
            Opcode::Stop => "M0",
            Opcode::SetSpeed => "M1",
            Opcode::SetAcceleration => "M2",
            Opcode::SetBrakeFree => "M3",
            Opcode::SetBrakeCool => "M4",
            Opcode::SetBrakeHard => "M5",
            Opcode::EnableClosedLoop => "M6",
            Opcode::DisableClosedLoop => "M7",
            Opcode::RecordStart => "M10",
            Opcode::RecordStop => "M11",
            Opcode::RecordAdd => "M12",
            Opcode::RecordPlay => "M13",
            Opcode::RecordPause => "M14",
            Opcode::RequestTelemetry => "M15",
            Opcode::RequestConfig => "M16",
        }
    }

    /// 从线上编码解析
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.code() == code)
    }

    pub const fn kind(self) -> OpcodeKind {
        match self {
            Opcode::Move
            | Opcode::MoveCcw
            | Opcode::Continuous
            | Opcode::ContinuousCcw
            | Opcode::Brake
            | Opcode::Home => OpcodeKind::Motion,
            Opcode::Stop
            | Opcode::SetSpeed
            | Opcode::SetAcceleration
            | Opcode::SetBrakeFree
            | Opcode::SetBrakeCool
            | Opcode::SetBrakeHard
            | Opcode::EnableClosedLoop
            | Opcode::DisableClosedLoop => OpcodeKind::Lifecycle,
            Opcode::RecordStart
            | Opcode::RecordStop
            | Opcode::RecordAdd
            | Opcode::RecordPlay
            | Opcode::RecordPause => OpcodeKind::Recording,
            Opcode::RequestTelemetry | Opcode::RequestConfig => OpcodeKind::Query,
        }
    }

    /// 是否为阻塞操作
    ///
    /// 阻塞操作期间设备不处理遥测请求，直到回复 `DONE`。
    pub const fn is_blocking(self) -> bool {
        matches!(self, Opcode::Home)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// 指令参数：单字母名 + 数值
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Param {
    pub name: char,
    pub value: f64,
}

impl Param {
    pub const fn new(name: char, value: f64) -> Self {
        Self { name, value }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // f64 的 Display 即最短往返表示：50.0 → "50"，1.5 → "1.5"
        write!(f, "{}{}", self.name, self.value)
    }
}

/// 参数缓冲区
///
/// 现有指令最多携带 1 个参数，栈上预留 2 个位置即可避免堆分配。
pub type ParamBuffer = SmallVec<[Param; 2]>;

/// 下行指令
///
/// 构造完成后不可修改（字段私有，只提供只读访问）。
///
/// # 示例
///
/// ```rust
/// use ustepper_protocol::{Command, Opcode};
///
/// let cmd = Command::move_steps(512);
/// assert_eq!(cmd.opcode(), Opcode::Move);
/// assert_eq!(cmd.encode(), "G0 A512");
///
/// let cmd = Command::continuous(-50.0);
/// assert_eq!(cmd.encode(), "G3 A50");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    opcode: Opcode,
    params: ParamBuffer,
}

impl Command {
    /// 无参数指令
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            params: ParamBuffer::new(),
        }
    }

    /// 带参数指令
    pub fn with_params(opcode: Opcode, params: impl IntoIterator<Item = Param>) -> Self {
        Self {
            opcode,
            params: params.into_iter().collect(),
        }
    }

    /// 单个 `A` 参数的指令
    fn with_value(opcode: Opcode, value: f64) -> Self {
        Self::with_params(opcode, [Param::new(VALUE_PARAM, value)])
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// 按名称查找参数（返回第一个匹配）
    pub fn param(&self, name: char) -> Option<f64> {
        self.params.iter().find(|p| p.name == name).map(|p| p.value)
    }

    /// 编码为线上文本
    pub fn encode(&self) -> String {
        self.to_string()
    }

    pub fn is_blocking(&self) -> bool {
        self.opcode.is_blocking()
    }

    // ------------------------------------------------------------------
    // 常用指令构造器
    // ------------------------------------------------------------------

    /// 按步数移动，正数顺时针（G0），负数逆时针（G1）
    pub fn move_steps(steps: i64) -> Self {
        let opcode = if steps < 0 { Opcode::MoveCcw } else { Opcode::Move };
        Self::with_value(opcode, steps.unsigned_abs() as f64)
    }

    /// 连续运动
    ///
    /// 速度为正发送 G2，为负发送 G3，参数取绝对值。速度为 0 时发送刹车（G4）。
    pub fn continuous(velocity: f64) -> Self {
        if velocity > 0.0 {
            Self::with_value(Opcode::Continuous, velocity)
        } else if velocity < 0.0 {
            Self::with_value(Opcode::ContinuousCcw, velocity.abs())
        } else {
            Self::brake()
        }
    }

    pub fn brake() -> Self {
        Self::new(Opcode::Brake)
    }

    pub fn home() -> Self {
        Self::new(Opcode::Home)
    }

    pub fn stop() -> Self {
        Self::new(Opcode::Stop)
    }

    /// 设置速度（原始单位）
    pub fn set_speed(velocity: f64) -> Self {
        Self::with_value(Opcode::SetSpeed, velocity)
    }

    /// 设置加速度（原始单位）
    pub fn set_acceleration(acceleration: f64) -> Self {
        Self::with_value(Opcode::SetAcceleration, acceleration)
    }

    pub fn set_brake_mode(mode: BrakeMode) -> Self {
        Self::new(match mode {
            BrakeMode::Free => Opcode::SetBrakeFree,
            BrakeMode::Cool => Opcode::SetBrakeCool,
            BrakeMode::Hard => Opcode::SetBrakeHard,
        })
    }

    pub fn closed_loop(enabled: bool) -> Self {
        Self::new(if enabled {
            Opcode::EnableClosedLoop
        } else {
            Opcode::DisableClosedLoop
        })
    }

    pub fn record_start() -> Self {
        Self::new(Opcode::RecordStart)
    }

    pub fn record_stop() -> Self {
        Self::new(Opcode::RecordStop)
    }

    pub fn record_add() -> Self {
        Self::new(Opcode::RecordAdd)
    }

    pub fn record_play() -> Self {
        Self::new(Opcode::RecordPlay)
    }

    pub fn record_pause() -> Self {
        Self::new(Opcode::RecordPause)
    }

    pub fn request_telemetry() -> Self {
        Self::new(Opcode::RequestTelemetry)
    }

    pub fn request_config() -> Self {
        Self::new(Opcode::RequestConfig)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.opcode.code())?;
        for param in &self.params {
            write!(f, " {}", param)?;
        }
        Ok(())
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    /// 解析一行下行指令（录制文件中的每一行即为此格式）
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut tokens = line.split_whitespace();
        let code = tokens.next().ok_or(ProtocolError::EmptyCommand)?;
        let opcode =
            Opcode::from_code(code).ok_or_else(|| ProtocolError::UnknownOpcode(code.to_string()))?;

        let params = tokens.map(parse_param).collect::<Result<ParamBuffer, _>>()?;

        Ok(Self { opcode, params })
    }
}

fn parse_param(token: &str) -> Result<Param, ProtocolError> {
    let invalid = || ProtocolError::InvalidParameter {
        token: token.to_string(),
    };

    let mut chars = token.chars();
    let name = chars.next().filter(|c| c.is_ascii_alphabetic()).ok_or_else(invalid)?;
    let value: f64 = chars.as_str().parse().map_err(|_| invalid())?;
    if !value.is_finite() {
        return Err(invalid());
    }
    Ok(Param::new(name, value))
}
