//! 驱动配置
//!
//! 所有字段都有默认值，TOML 中缺失的键使用默认值。
//!
//! ```toml
//! endpoint = "ws://192.168.4.1:81/"
//! poll_interval_ms = 50
//! reconnect_interval_ms = 3000
//! max_velocity = 100.0
//! command_queue_capacity = 10
//!
//! [mechanics]
//! full_steps_per_rev = 200
//! microsteps = 256
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use ustepper_protocol::Mechanics;

/// 控制器 AP 模式下的默认地址
pub const DEFAULT_ENDPOINT: &str = "ws://192.168.4.1:81/";

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 驱动配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepperConfig {
    /// 控制器 WebSocket 地址
    pub endpoint: String,
    /// 轮询周期（毫秒）
    pub poll_interval_ms: u64,
    /// 重连检查周期（毫秒）
    pub reconnect_interval_ms: u64,
    /// 摇杆满偏时的速度（原始单位）
    pub max_velocity: f64,
    /// 操作命令队列容量
    pub command_queue_capacity: usize,
    pub mechanics: Mechanics,
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            poll_interval_ms: 50,
            reconnect_interval_ms: 3000,
            max_velocity: 100.0,
            command_queue_capacity: 10,
            mechanics: Mechanics::default(),
        }
    }
}

impl StepperConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| -> Result<(), ConfigError> {
            Err(ConfigError::Invalid(msg.to_string()))
        };

        if self.endpoint.trim().is_empty() {
            return invalid("endpoint must not be empty");
        }
        if self.poll_interval_ms == 0 {
            return invalid("poll_interval_ms must be > 0");
        }
        if self.reconnect_interval_ms == 0 {
            return invalid("reconnect_interval_ms must be > 0");
        }
        if !self.max_velocity.is_finite() || self.max_velocity < 0.0 {
            return invalid("max_velocity must be a finite, non-negative number");
        }
        if self.mechanics.full_steps_per_rev == 0 || self.mechanics.microsteps == 0 {
            return invalid("mechanics values must be > 0");
        }
        if self.command_queue_capacity == 0 {
            return invalid("command_queue_capacity must be > 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StepperConfig::default();
        assert_eq!(config.endpoint, "ws://192.168.4.1:81/");
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
        assert_eq!(config.reconnect_interval(), Duration::from_secs(3));
        assert_eq!(config.max_velocity, 100.0);
        assert_eq!(config.mechanics.steps_per_revolution(), 51_200);
        assert_eq!(config.command_queue_capacity, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let config = StepperConfig::from_toml_str(
            r#"
            endpoint = "ws://10.0.0.7:81/"

            [mechanics]
            microsteps = 16
            "#,
        )
        .unwrap();

        assert_eq!(config.endpoint, "ws://10.0.0.7:81/");
        assert_eq!(config.poll_interval_ms, 50);
        assert_eq!(config.mechanics.full_steps_per_rev, 200);
        assert_eq!(config.mechanics.microsteps, 16);
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(
            StepperConfig::from_toml_str("").unwrap(),
            StepperConfig::default()
        );
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = StepperConfig {
            max_velocity: 250.5,
            poll_interval_ms: 20,
            ..Default::default()
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(StepperConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            StepperConfig::from_toml_str("poll_interval_ms = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            StepperConfig::from_toml_str("max_velocity = -1.0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            StepperConfig::from_toml_str("[mechanics]\nmicrosteps = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            StepperConfig::from_toml_str("poll_interval_ms = \"fast\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = StepperConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }
}
