//! Builder 模式实现
//!
//! 提供链式构造 `Stepper` 实例的便捷方式。

use std::time::Duration;
use ustepper_protocol::Mechanics;
use ustepper_transport::{Transport, WebSocketTransport};

use crate::clock::{Clock, SystemClock};
use crate::config::StepperConfig;
use crate::error::DriverError;
use crate::intent::{IntentSource, SharedIntent};
use crate::pipeline::DEFAULT_LOOP_INTERVAL;
use crate::stepper::Stepper;

/// Stepper Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use ustepper_driver::StepperBuilder;
/// use std::time::Duration;
///
/// // 使用默认配置（ws://192.168.4.1:81/，50ms 轮询）
/// let stepper = StepperBuilder::new().build().unwrap();
///
/// // 自定义地址和轮询周期
/// let stepper = StepperBuilder::new()
///     .endpoint("ws://10.0.0.7:81/")
///     .poll_interval(Duration::from_millis(20))
///     .max_velocity(250.0)
///     .build()
///     .unwrap();
/// ```
pub struct StepperBuilder {
    config: StepperConfig,
    /// 自定义输入源（未设置时使用内置的 `SharedIntent`）
    intent: Option<Box<dyn IntentSource>>,
    loop_interval: Duration,
}

impl StepperBuilder {
    pub fn new() -> Self {
        Self::from_config(StepperConfig::default())
    }

    /// 从已有配置开始（通常来自 TOML 文件）
    pub fn from_config(config: StepperConfig) -> Self {
        Self {
            config,
            intent: None,
            loop_interval: DEFAULT_LOOP_INTERVAL,
        }
    }

    /// 控制器地址（默认 `ws://192.168.4.1:81/`）
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// 轮询周期（默认 50ms）
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// 重连检查周期（默认 3s）
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.config.reconnect_interval_ms = interval.as_millis() as u64;
        self
    }

    /// 输入满偏对应的速度（原始单位，默认 100）
    pub fn max_velocity(mut self, velocity: f64) -> Self {
        self.config.max_velocity = velocity;
        self
    }

    pub fn mechanics(mut self, mechanics: Mechanics) -> Self {
        self.config.mechanics = mechanics;
        self
    }

    /// 操作命令队列容量（默认 10）
    pub fn command_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.command_queue_capacity = capacity;
        self
    }

    /// 使用自定义输入源代替内置的 `SharedIntent`
    pub fn intent_source(mut self, source: impl IntentSource + 'static) -> Self {
        self.intent = Some(Box::new(source));
        self
    }

    /// IO 循环休眠间隔（默认 1ms）
    pub fn loop_interval(mut self, interval: Duration) -> Self {
        self.loop_interval = interval;
        self
    }

    pub fn config(&self) -> &StepperConfig {
        &self.config
    }

    /// 使用 WebSocket 传输层构建
    pub fn build(self) -> Result<Stepper, DriverError> {
        self.build_with_transport(WebSocketTransport::new())
    }

    /// 使用指定的传输层构建（测试中传入 `MockTransport`）
    pub fn build_with_transport<T>(self, transport: T) -> Result<Stepper, DriverError>
    where
        T: Transport + 'static,
    {
        self.build_with(transport, SystemClock::new())
    }

    /// 使用指定的传输层和时钟构建
    pub fn build_with<T, C>(self, transport: T, clock: C) -> Result<Stepper, DriverError>
    where
        T: Transport + 'static,
        C: Clock + 'static,
    {
        self.config.validate()?;

        let (intent, shared): (Box<dyn IntentSource>, Option<SharedIntent>) = match self.intent {
            Some(source) => (source, None),
            None => {
                let shared = SharedIntent::new();
                (Box::new(shared.clone()), Some(shared))
            },
        };

        Stepper::spawn(
            transport,
            intent,
            clock,
            shared,
            self.config,
            self.loop_interval,
        )
    }
}

impl Default for StepperBuilder {
    fn default() -> Self {
        Self::new()
    }
}
