//! 上行帧解析
//!
//! 设备发回的每一帧按首个 token 分类：
//!
//! | 标签   | 含义       | 负载                           |
//! |--------|------------|--------------------------------|
//! | `OK`   | 指令已接收 | 无                             |
//! | `RDY`  | 设备就绪   | 无                             |
//! | `DATA` | 遥测       | 位置、原始步数、编码器速度、驱动速度 |
//! | `CONF` | 配置       | 速度、加速度、刹车模式、闭环标志   |
//! | `DONE` | 阻塞操作完成 | 无                           |
//!
//! 分类只比较首个 token（严格相等），不做子串匹配，
//! 避免负载中恰好出现 "OK" 之类的字符导致误判。

use crate::ProtocolError;
use crate::units::{Mechanics, wrap_degrees};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use smallvec::SmallVec;

pub const TAG_ACK: &str = "OK";
pub const TAG_READY: &str = "RDY";
pub const TAG_TELEMETRY: &str = "DATA";
pub const TAG_CONFIG: &str = "CONF";
pub const TAG_DONE: &str = "DONE";

const TELEMETRY_FIELDS: usize = 4;
const CONFIG_FIELDS: usize = 4;

/// 刹车模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum BrakeMode {
    /// 释放（电机无保持力矩）
    #[default]
    Free = 0,
    /// 低电流保持
    Cool = 1,
    /// 全电流保持
    Hard = 2,
}

impl std::str::FromStr for BrakeMode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "free" => Ok(BrakeMode::Free),
            "cool" => Ok(BrakeMode::Cool),
            "hard" => Ok(BrakeMode::Hard),
            _ => Err(ProtocolError::InvalidParameter {
                token: s.to_string(),
            }),
        }
    }
}

/// 遥测帧（`DATA`）
///
/// 每帧完整替换上一帧，不做字段级合并。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TelemetryFrame {
    /// 一圈内的角度 `[0, 360)`
    pub position_deg: f64,
    /// 绝对角度（不折算）
    pub absolute_position_deg: f64,
    /// 一圈内的原始步数 `[0, F·M)`
    pub raw_steps: i64,
    /// 绝对原始步数（不折算）
    pub absolute_raw_steps: i64,
    pub encoder_velocity: f64,
    pub driver_velocity: f64,
}

impl TelemetryFrame {
    /// 由绝对量构造，自动计算折算后的字段
    pub fn from_absolute(
        absolute_position_deg: f64,
        absolute_raw_steps: i64,
        encoder_velocity: f64,
        driver_velocity: f64,
        mechanics: &Mechanics,
    ) -> Self {
        Self {
            position_deg: wrap_degrees(absolute_position_deg),
            absolute_position_deg,
            raw_steps: mechanics.wrap_raw_steps(absolute_raw_steps),
            absolute_raw_steps,
            encoder_velocity,
            driver_velocity,
        }
    }

    /// 解析 `DATA` 标签之后的负载
    pub fn parse(payload: &str, mechanics: &Mechanics) -> Result<Self, ProtocolError> {
        let fields = parse_fields(TAG_TELEMETRY, payload, TELEMETRY_FIELDS)?;
        Ok(Self::from_absolute(
            fields[0],
            fields[1].round() as i64,
            fields[2],
            fields[3],
            mechanics,
        ))
    }
}

/// 配置帧（`CONF`）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConfigFrame {
    /// 速度（原始单位）
    pub velocity: f64,
    /// 加速度（原始单位）
    pub acceleration: f64,
    pub brake_mode: BrakeMode,
    pub closed_loop_enabled: bool,
}

impl ConfigFrame {
    /// 解析 `CONF` 标签之后的负载
    pub fn parse(payload: &str) -> Result<Self, ProtocolError> {
        let fields = parse_fields(TAG_CONFIG, payload, CONFIG_FIELDS)?;

        let brake_raw = fields[2];
        let brake_mode = Some(brake_raw)
            .filter(|v| v.fract() == 0.0 && (0.0..=255.0).contains(v))
            .and_then(|v| BrakeMode::try_from(v as u8).ok())
            .ok_or_else(|| {
                ProtocolError::malformed(TAG_CONFIG, format!("invalid brake mode {}", brake_raw))
            })?;

        Ok(Self {
            velocity: fields[0],
            acceleration: fields[1],
            brake_mode,
            closed_loop_enabled: fields[3] != 0.0,
        })
    }
}

/// 解码后的上行消息
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceMessage {
    /// `OK`
    Acknowledged,
    /// `RDY`
    Ready,
    /// `DATA`
    Telemetry(TelemetryFrame),
    /// `CONF`
    Configuration(ConfigFrame),
    /// `DONE`
    OperationDone,
    /// 未识别的帧（原文保留，供日志使用）
    Unknown(String),
}

/// 使用默认机械常数解码
pub fn decode(raw: &str) -> Result<DeviceMessage, ProtocolError> {
    decode_with(raw, &Mechanics::default())
}

/// 解码一帧上行文本
///
/// 负载字段不足或非数值时返回 `MalformedFrame`，不会返回部分填充的帧。
///
/// # 示例
///
/// ```rust
/// use ustepper_protocol::{DeviceMessage, Mechanics, decode_with};
///
/// let msg = decode_with("DATA P725S0V1.50V2.00", &Mechanics::default()).unwrap();
/// let DeviceMessage::Telemetry(frame) = msg else { panic!() };
/// assert_eq!(frame.position_deg, 5.0);
/// assert_eq!(frame.absolute_position_deg, 725.0);
/// ```
pub fn decode_with(raw: &str, mechanics: &Mechanics) -> Result<DeviceMessage, ProtocolError> {
    let text = raw.trim();
    let (tag, payload) = match text.split_once(char::is_whitespace) {
        Some((tag, rest)) => (tag, rest),
        None => (text, ""),
    };

    match tag {
        TAG_ACK => Ok(DeviceMessage::Acknowledged),
        TAG_READY => Ok(DeviceMessage::Ready),
        TAG_TELEMETRY => TelemetryFrame::parse(payload, mechanics).map(DeviceMessage::Telemetry),
        TAG_CONFIG => ConfigFrame::parse(payload).map(DeviceMessage::Configuration),
        TAG_DONE => Ok(DeviceMessage::OperationDone),
        _ => Ok(DeviceMessage::Unknown(raw.to_string())),
    }
}

/// 切分负载字段并去掉单字母类型前缀，按出现顺序返回数值
///
/// 字段可以用空格分隔（`P725 S0`），也可以直接相连（`P725S0`）：
/// 每个 ASCII 字母都开启一个新字段。多余的尾部字段被忽略。
fn parse_fields(
    tag: &'static str,
    payload: &str,
    expected: usize,
) -> Result<SmallVec<[f64; 4]>, ProtocolError> {
    let mut raw: SmallVec<[(char, String); 4]> = SmallVec::new();

    for c in payload.chars() {
        if c.is_ascii_alphabetic() {
            raw.push((c, String::new()));
        } else if c.is_whitespace() {
            continue;
        } else {
            match raw.last_mut() {
                Some((_, digits)) => digits.push(c),
                None => {
                    return Err(ProtocolError::malformed(
                        tag,
                        format!("value without type prefix in `{}`", payload),
                    ));
                },
            }
        }
    }

    if raw.len() < expected {
        return Err(ProtocolError::malformed(
            tag,
            format!("expected {} fields, got {}", expected, raw.len()),
        ));
    }

    raw.into_iter()
        .take(expected)
        .map(|(prefix, digits)| {
            digits.parse::<f64>().ok().filter(|v| v.is_finite()).ok_or_else(|| {
                ProtocolError::malformed(
                    tag,
                    format!("non-numeric value `{}` for field {}", digits, prefix),
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_simple_tags() {
        assert_eq!(decode("OK").unwrap(), DeviceMessage::Acknowledged);
        assert_eq!(decode("RDY\r\n").unwrap(), DeviceMessage::Ready);
        assert_eq!(decode("DONE").unwrap(), DeviceMessage::OperationDone);
    }

    #[test]
    fn test_decode_telemetry_concatenated() {
        let msg = decode("DATA P725S0V1.50V2.00").unwrap();
        let DeviceMessage::Telemetry(frame) = msg else {
            panic!("Expected telemetry, got {:?}", msg);
        };
        assert_eq!(frame.position_deg, 5.0);
        assert_eq!(frame.absolute_position_deg, 725.0);
        assert_eq!(frame.raw_steps, 0);
        assert_eq!(frame.absolute_raw_steps, 0);
        assert_eq!(frame.encoder_velocity, 1.5);
        assert_eq!(frame.driver_velocity, 2.0);
    }

    #[test]
    fn test_decode_telemetry_space_separated() {
        let msg = decode("DATA P-90 S-12800 V-3 V4.25").unwrap();
        let DeviceMessage::Telemetry(frame) = msg else {
            panic!("Expected telemetry");
        };
        assert_eq!(frame.position_deg, 270.0);
        assert_eq!(frame.absolute_position_deg, -90.0);
        assert_eq!(frame.raw_steps, 51_200 - 12_800);
        assert_eq!(frame.absolute_raw_steps, -12_800);
        assert_eq!(frame.encoder_velocity, -3.0);
        assert_eq!(frame.driver_velocity, 4.25);
    }

    #[test]
    fn test_decode_telemetry_wraps_raw_steps_with_mechanics() {
        let mech = Mechanics::new(200, 16);
        let msg = decode_with("DATA P0S3300V0V0", &mech).unwrap();
        let DeviceMessage::Telemetry(frame) = msg else {
            panic!("Expected telemetry");
        };
        assert_eq!(frame.raw_steps, 100);
        assert_eq!(frame.absolute_raw_steps, 3300);
    }

    #[test]
    fn test_decode_config() {
        let msg = decode("CONF V200A50B1C0").unwrap();
        assert_eq!(
            msg,
            DeviceMessage::Configuration(ConfigFrame {
                velocity: 200.0,
                acceleration: 50.0,
                brake_mode: BrakeMode::Cool,
                closed_loop_enabled: false,
            })
        );

        let msg = decode("CONF V1.5 A2 B2 C1").unwrap();
        let DeviceMessage::Configuration(conf) = msg else {
            panic!("Expected configuration");
        };
        assert_eq!(conf.brake_mode, BrakeMode::Hard);
        assert!(conf.closed_loop_enabled);
    }

    #[test]
    fn test_decode_malformed_telemetry() {
        let err = decode("DATA P").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedFrame { tag: "DATA", .. }));

        let err = decode("DATA P1S2V3").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedFrame { .. }));

        let err = decode("DATA P1S2V3.3.3V4").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedFrame { .. }));

        let err = decode("DATA 12 S2 V3 V4").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedFrame { .. }));

        let err = decode("DATA").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedFrame { .. }));
    }

    #[test]
    fn test_decode_malformed_config() {
        assert!(matches!(
            decode("CONF V200A50B7C0"),
            Err(ProtocolError::MalformedFrame { tag: "CONF", .. })
        ));
        assert!(matches!(
            decode("CONF V200A50B1.5C0"),
            Err(ProtocolError::MalformedFrame { .. })
        ));
        assert!(matches!(
            decode("CONF V200A50"),
            Err(ProtocolError::MalformedFrame { .. })
        ));
    }

    #[test]
    fn test_decode_extra_fields_ignored() {
        let msg = decode("CONF V1A2B0C1X99").unwrap();
        assert!(matches!(msg, DeviceMessage::Configuration(_)));
    }

    #[test]
    fn test_decode_unknown() {
        assert_eq!(
            decode("HELLO world").unwrap(),
            DeviceMessage::Unknown("HELLO world".to_string())
        );
        assert_eq!(decode("").unwrap(), DeviceMessage::Unknown(String::new()));
    }

    #[test]
    fn test_tag_match_is_strict() {
        // 子串匹配会把这些误判为 OK / DONE
        assert!(matches!(decode("NOK").unwrap(), DeviceMessage::Unknown(_)));
        assert!(matches!(
            decode("HOMINGDONE").unwrap(),
            DeviceMessage::Unknown(_)
        ));
        assert!(matches!(decode("ok").unwrap(), DeviceMessage::Unknown(_)));
        // 负载中出现 "OK" 不影响 DATA 的分类
        assert!(decode("DATA P1S1V1V1 OK").is_ok());
    }

    #[test]
    fn test_brake_mode_conversions() {
        assert_eq!(BrakeMode::try_from(1u8).unwrap(), BrakeMode::Cool);
        assert!(BrakeMode::try_from(3u8).is_err());
        assert_eq!(u8::from(BrakeMode::Hard), 2);
        assert_eq!("COOL".parse::<BrakeMode>().unwrap(), BrakeMode::Cool);
        assert!("soft".parse::<BrakeMode>().is_err());
    }
}
