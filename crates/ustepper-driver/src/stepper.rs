//! Stepper 句柄
//!
//! 对外的 [`Stepper`] 结构体，封装 IO 线程和状态同步细节。
//!
//! - 操作命令通过有界通道（容量见 `command_queue_capacity`）发往 IO 线程，发送端从不阻塞；
//! - 会话状态通过 `ArcSwap` 快照无锁读取；
//! - 指标为原子计数器。

use crossbeam_channel::{SendTimeoutError, Sender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{error, info};
use ustepper_protocol::{BrakeMode, Command, ConfigFrame, Mechanics, TelemetryFrame};
use ustepper_transport::{ConnectionState, Transport};

use crate::clock::Clock;
use crate::config::StepperConfig;
use crate::error::DriverError;
use crate::intent::{IntentSource, SharedIntent};
use crate::metrics::MetricsSnapshot;
use crate::pipeline::{ControlMessage, Pipeline, StepperContext, io_loop};
use crate::session::SessionSnapshot;

/// 线程 join 超时
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// 带超时的线程 join
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        let (tx, rx) = crossbeam_channel::bounded(1);

        // 看门狗线程负责真正的 join，超时后它会继续等待，进程退出时由 OS 回收
        std::thread::spawn(move || {
            let _ = tx.send(self.join().map(|_| ()));
        });

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(_) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
        }
    }
}

/// uStepper 控制器句柄
///
/// 由 [`StepperBuilder`](crate::StepperBuilder) 创建。销毁时关闭连接并等待 IO 线程退出。
///
/// # 示例
///
/// ```rust,no_run
/// use ustepper_driver::StepperBuilder;
/// use std::time::Duration;
///
/// let stepper = StepperBuilder::new()
///     .endpoint("ws://192.168.4.1:81/")
///     .build()
///     .unwrap();
///
/// stepper.wait_for_config(Duration::from_secs(5)).unwrap();
/// stepper.move_degrees(90.0).unwrap();
/// ```
pub struct Stepper {
    /// 操作命令发送端
    ///
    /// Drop 时必须先于 join 释放，否则 IO 线程收不到 `Disconnected`。
    ctrl_tx: Option<Sender<ControlMessage>>,
    ctx: Arc<StepperContext>,
    /// 内置共享输入（使用自定义输入源时为 None）
    intent: Option<SharedIntent>,
    io_thread: Option<JoinHandle<()>>,
    config: StepperConfig,
}

impl Stepper {
    /// 启动 IO 线程（由 Builder 调用）
    pub(crate) fn spawn<T, I, C>(
        transport: T,
        intent: I,
        clock: C,
        shared_intent: Option<SharedIntent>,
        config: StepperConfig,
        loop_interval: Duration,
    ) -> Result<Self, DriverError>
    where
        T: Transport + 'static,
        I: IntentSource + 'static,
        C: Clock + 'static,
    {
        let (ctrl_tx, ctrl_rx) = crossbeam_channel::bounded(config.command_queue_capacity);
        let ctx = Arc::new(StepperContext::new());
        let pipeline = Pipeline::new(transport, intent, clock, &config, ctx.clone());

        let io_thread = std::thread::Builder::new()
            .name("ustepper-io".to_string())
            .spawn(move || io_loop(pipeline, ctrl_rx, loop_interval))
            .map_err(|e| DriverError::IoThread(e.to_string()))?;

        info!(endpoint = %config.endpoint, "Stepper IO thread started");

        Ok(Self {
            ctrl_tx: Some(ctrl_tx),
            ctx,
            intent: shared_intent,
            io_thread: Some(io_thread),
            config,
        })
    }

    // ============================================================
    // 状态读取
    // ============================================================

    /// 最新的会话快照（无锁）
    pub fn snapshot(&self) -> SessionSnapshot {
        **self.ctx.snapshot.load()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.snapshot().connection
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state().is_connected()
    }

    pub fn telemetry(&self) -> Option<TelemetryFrame> {
        self.snapshot().telemetry
    }

    pub fn device_config(&self) -> Option<ConfigFrame> {
        self.snapshot().config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.ctx.metrics.reset();
    }

    pub fn config(&self) -> &StepperConfig {
        &self.config
    }

    pub fn mechanics(&self) -> &Mechanics {
        &self.config.mechanics
    }

    /// 内置共享输入，用于从其它线程喂入摇杆比例
    pub fn intent(&self) -> Option<&SharedIntent> {
        self.intent.as_ref()
    }

    // ============================================================
    // 等待
    // ============================================================

    fn wait_until<R>(
        &self,
        timeout: Duration,
        mut check: impl FnMut(&SessionSnapshot) -> Option<R>,
    ) -> Result<R, DriverError> {
        let start = Instant::now();
        loop {
            if let Some(result) = check(&self.snapshot()) {
                return Ok(result);
            }
            if self.io_thread.as_ref().is_none_or(|t| t.is_finished()) {
                return Err(DriverError::ChannelClosed);
            }
            if start.elapsed() >= timeout {
                return Err(DriverError::Timeout);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    pub fn wait_for_connection(&self, timeout: Duration) -> Result<(), DriverError> {
        self.wait_until(timeout, |s| s.is_connected().then_some(()))
    }

    /// 等待本次连接的第一帧配置（之后调度器开始轮询）
    pub fn wait_for_config(&self, timeout: Duration) -> Result<ConfigFrame, DriverError> {
        self.wait_until(timeout, |s| {
            if s.is_ready() { s.config } else { None }
        })
    }

    pub fn wait_for_telemetry(&self, timeout: Duration) -> Result<TelemetryFrame, DriverError> {
        self.wait_until(timeout, |s| s.telemetry)
    }

    /// 已收到的 `DONE` 总数，配合 [`wait_for_operation_done`](Self::wait_for_operation_done) 使用
    pub fn operations_done(&self) -> u64 {
        self.snapshot().operations_done
    }

    /// 等待计数超过 `baseline` 的下一个 `DONE`
    ///
    /// `baseline` 须在分发阻塞指令之前读取，否则可能错过完成事件。
    pub fn wait_for_operation_done(
        &self,
        baseline: u64,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        self.wait_until(timeout, |s| (s.operations_done > baseline).then_some(()))
    }

    // ============================================================
    // 操作命令
    // ============================================================

    fn control(&self, message: ControlMessage) -> Result<(), DriverError> {
        let tx = self.ctrl_tx.as_ref().ok_or(DriverError::ChannelClosed)?;
        tx.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => DriverError::ChannelFull,
            TrySendError::Disconnected(_) => DriverError::ChannelClosed,
        })
    }

    /// 发送任意指令（非阻塞）
    ///
    /// # 错误
    /// - `DriverError::ChannelClosed`: IO 线程已退出
    /// - `DriverError::ChannelFull`: 命令队列已满
    pub fn send_command(&self, command: Command) -> Result<(), DriverError> {
        self.control(ControlMessage::Dispatch(command))
    }

    /// 发送指令，队列满时最多等待 `timeout`
    pub fn send_command_timeout(
        &self,
        command: Command,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        let tx = self.ctrl_tx.as_ref().ok_or(DriverError::ChannelClosed)?;
        tx.send_timeout(ControlMessage::Dispatch(command), timeout)
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => DriverError::Timeout,
                SendTimeoutError::Disconnected(_) => DriverError::ChannelClosed,
            })
    }

    /// 回零（阻塞操作，设备回复 DONE 之前不请求遥测）
    pub fn home(&self) -> Result<(), DriverError> {
        self.send_command(Command::home())
    }

    /// 回零并等待设备回复 `DONE`
    pub fn home_and_wait(&self, timeout: Duration) -> Result<(), DriverError> {
        let baseline = self.operations_done();
        self.home()?;
        self.wait_for_operation_done(baseline, timeout)
    }

    /// 停止一切
    pub fn stop(&self) -> Result<(), DriverError> {
        self.send_command(Command::stop())
    }

    pub fn brake(&self) -> Result<(), DriverError> {
        self.send_command(Command::brake())
    }

    /// 相对移动（原始步数，负数为逆时针）
    pub fn move_steps(&self, steps: i64) -> Result<(), DriverError> {
        self.send_command(Command::move_steps(steps))
    }

    /// 相对移动（角度）
    pub fn move_degrees(&self, degrees: f64) -> Result<(), DriverError> {
        self.move_steps(self.config.mechanics.degrees_to_raw_steps(degrees))
    }

    /// 连续运动（原始速度，符号决定方向，0 为刹车）
    pub fn run_continuous(&self, velocity: f64) -> Result<(), DriverError> {
        self.send_command(Command::continuous(velocity))
    }

    pub fn set_speed(&self, velocity: f64) -> Result<(), DriverError> {
        self.send_command(Command::set_speed(velocity))
    }

    pub fn set_speed_rpm(&self, rpm: f64) -> Result<(), DriverError> {
        self.set_speed(self.config.mechanics.velocity_rpm_to_raw(rpm))
    }

    pub fn set_acceleration(&self, acceleration: f64) -> Result<(), DriverError> {
        self.send_command(Command::set_acceleration(acceleration))
    }

    pub fn set_acceleration_rpm(&self, rpm_per_s: f64) -> Result<(), DriverError> {
        self.set_acceleration(self.config.mechanics.accel_rpm_to_raw(rpm_per_s))
    }

    pub fn set_brake_mode(&self, mode: BrakeMode) -> Result<(), DriverError> {
        self.send_command(Command::set_brake_mode(mode))
    }

    pub fn set_closed_loop(&self, enabled: bool) -> Result<(), DriverError> {
        self.send_command(Command::closed_loop(enabled))
    }

    pub fn record_start(&self) -> Result<(), DriverError> {
        self.send_command(Command::record_start())
    }

    pub fn record_stop(&self) -> Result<(), DriverError> {
        self.send_command(Command::record_stop())
    }

    /// 把当前位置追加到录制序列
    pub fn record_add(&self) -> Result<(), DriverError> {
        self.send_command(Command::record_add())
    }

    pub fn record_play(&self) -> Result<(), DriverError> {
        self.send_command(Command::record_play())
    }

    pub fn record_pause(&self) -> Result<(), DriverError> {
        self.send_command(Command::record_pause())
    }

    pub fn start_polling(&self) -> Result<(), DriverError> {
        self.control(ControlMessage::StartPolling)
    }

    pub fn stop_polling(&self) -> Result<(), DriverError> {
        self.control(ControlMessage::StopPolling)
    }

    /// 立即重新连接
    pub fn reconnect(&self) -> Result<(), DriverError> {
        self.control(ControlMessage::Reconnect)
    }

    /// 关闭连接，直到下一次 [`reconnect`](Self::reconnect)
    pub fn disconnect(&self) -> Result<(), DriverError> {
        self.control(ControlMessage::Disconnect)
    }
}

impl Drop for Stepper {
    fn drop(&mut self) {
        // 先尝试正常退出，再释放发送端；两者任一都会让 IO 循环返回
        if let Some(tx) = self.ctrl_tx.take() {
            let _ = tx.try_send(ControlMessage::Shutdown);
        }

        if let Some(handle) = self.io_thread.take()
            && let Err(_e) = handle.join_timeout(JOIN_TIMEOUT)
        {
            error!(
                "IO thread panicked or failed to shut down within {:?}",
                JOIN_TIMEOUT
            );
        }
    }
}
