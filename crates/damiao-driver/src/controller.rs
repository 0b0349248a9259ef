//! 多电机控制器
//!
//! `MotorController` 独占一条 CAN 总线，负责：
//!
//! - 注册电机（命令 ID / 反馈 ID 唯一）
//! - 批量使能、失能、发送 MIT 指令
//! - 手动排空（`poll_feedback`）和清空（`flush_bus`）
//! - 后台轮询线程的生命周期：第一次注册电机时自动启动，`shutdown()` 时停止
//!
//! 关闭顺序固定为：停止轮询 → 失能所有电机 → 释放总线。`Drop` 时自动执行。

use crate::bus::Bus;
use crate::config::{MotorConfig, PollingConfig};
use crate::error::{DriverError, collect_failures};
use crate::metrics::{MetricsSnapshot, PollingMetrics};
use crate::motor::Motor;
use crate::pipeline::{DriverContext, drain_pass, flush, polling_loop};
use crate::poller::{Poller, PollingState};
use crate::registry::{FEEDBACK_SLOTS, MotorRegistry};
#[cfg(target_os = "linux")]
use damiao_can::SocketCanAdapter;
use damiao_can::CanAdapter;
use damiao_protocol::{FORCE_POS_ID_OFFSET, ID_REGISTER, MotorType};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::{info, warn};

/// 最大命令 ID
///
/// 加上最大的模式偏移（0x300）后仍需小于寄存器广播 ID 0x7FF。
pub const MAX_COMMAND_ID: u16 = ID_REGISTER - FORCE_POS_ID_OFFSET - 1;

/// 达妙多电机控制器
///
/// # Example
///
/// ```no_run
/// # #[cfg(target_os = "linux")]
/// # fn main() -> Result<(), damiao_driver::DriverError> {
/// use damiao_driver::MotorController;
/// use damiao_protocol::MotorType;
///
/// let controller = MotorController::open("can0")?;
/// let motor = controller.add_motor(0x01, 0x01, MotorType::Dm4310)?;
/// controller.enable_all()?;
/// motor.send_cmd_mit(0.0, 0.0, 1.0, 0.5, 0.0)?;
/// if let Some(state) = motor.get_states() {
///     println!("position = {:.3} rad", state.position);
/// }
/// controller.shutdown()?;
/// # Ok(())
/// # }
/// # #[cfg(not(target_os = "linux"))]
/// # fn main() {}
/// ```
pub struct MotorController {
    ctx: Arc<DriverContext>,
    shut_down: AtomicBool,
}

impl MotorController {
    /// 使用默认轮询配置创建控制器
    pub fn new(adapter: impl CanAdapter + Send + 'static) -> Self {
        Self::with_config(adapter, PollingConfig::default())
    }

    /// 使用指定轮询配置创建控制器
    pub fn with_config(adapter: impl CanAdapter + Send + 'static, config: PollingConfig) -> Self {
        let metrics = Arc::new(PollingMetrics::new());
        let bus = Arc::new(Bus::new(Box::new(adapter), metrics.clone()));
        info!("Motor controller created on '{}'", bus.channel());

        Self {
            ctx: Arc::new(DriverContext {
                bus,
                registry: MotorRegistry::new(),
                poller: Poller::new(),
                metrics,
                config,
            }),
            shut_down: AtomicBool::new(false),
        }
    }

    /// 打开 SocketCAN 接口并创建控制器
    #[cfg(target_os = "linux")]
    pub fn open(interface: &str) -> Result<Self, DriverError> {
        let adapter = SocketCanAdapter::new(interface)?;
        Ok(Self::new(adapter))
    }

    /// CAN 通道名称
    pub fn channel(&self) -> &str {
        self.ctx.bus.channel()
    }

    pub fn polling_config(&self) -> &PollingConfig {
        &self.ctx.config
    }

    fn ensure_running(&self) -> Result<(), DriverError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(DriverError::ShutDown);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // 电机管理
    // ------------------------------------------------------------------

    /// 创建并注册电机
    ///
    /// 注册成功后自动启动后台轮询（已在运行时不重复启动）。
    ///
    /// # 错误
    /// - `DuplicateMotor`: 命令 ID 已注册
    /// - `DuplicateFeedbackId`: 反馈 ID 已被其它电机占用
    /// - `InvalidFeedbackId` / `InvalidCommandId`: ID 超出范围
    pub fn add_motor(
        &self,
        command_id: u16,
        feedback_id: u8,
        motor_type: MotorType,
    ) -> Result<Arc<Motor>, DriverError> {
        self.ensure_running()?;

        if command_id > MAX_COMMAND_ID {
            return Err(DriverError::InvalidCommandId {
                command_id,
                max: MAX_COMMAND_ID,
            });
        }
        if feedback_id as usize >= FEEDBACK_SLOTS {
            return Err(DriverError::InvalidFeedbackId { feedback_id });
        }

        let motor = Arc::new(Motor::new(
            command_id,
            feedback_id,
            motor_type,
            self.ctx.bus.clone(),
            self.ctx.config.register_timeout(),
        ));
        let motor = self.ctx.registry.insert(motor)?;
        info!(
            "Motor 0x{:03X} ({}) registered with feedback id {}",
            command_id, motor_type, feedback_id
        );

        if let Err(e) = self.start_polling() {
            warn!("Failed to start polling after adding motor 0x{:03X}: {}", command_id, e);
        }
        Ok(motor)
    }

    /// 按配置注册电机（型号名称在这里解析）
    pub fn add_motor_from_config(&self, config: &MotorConfig) -> Result<Arc<Motor>, DriverError> {
        let motor_type = config.resolve_type()?;
        self.add_motor(config.command_id, config.feedback_id, motor_type)
    }

    pub fn get_motor(&self, command_id: u16) -> Option<Arc<Motor>> {
        self.ctx.registry.get(command_id)
    }

    pub fn has_motor(&self, command_id: u16) -> bool {
        self.ctx.registry.contains(command_id)
    }

    /// 按注册顺序返回所有电机
    pub fn motors(&self) -> Vec<Arc<Motor>> {
        self.ctx.registry.all()
    }

    pub fn motor_count(&self) -> usize {
        self.ctx.registry.len()
    }

    fn motor_or_not_found(&self, command_id: u16) -> Result<Arc<Motor>, DriverError> {
        self.get_motor(command_id)
            .ok_or(DriverError::MotorNotFound { command_id })
    }

    /// 对每个电机执行操作（按注册顺序，全部尝试后汇总失败）
    fn for_each_motor<F>(&self, op: F) -> Result<(), DriverError>
    where
        F: Fn(&Motor) -> Result<(), DriverError>,
    {
        let failures = self
            .motors()
            .iter()
            .filter_map(|motor| op(motor.as_ref()).err().map(|e| (motor.command_id(), e)))
            .collect();
        collect_failures(failures)
    }

    // ------------------------------------------------------------------
    // 使能 / 失能
    // ------------------------------------------------------------------

    /// 使能所有电机
    pub fn enable_all(&self) -> Result<(), DriverError> {
        self.for_each_motor(Motor::enable)
    }

    /// 失能所有电机
    pub fn disable_all(&self) -> Result<(), DriverError> {
        self.for_each_motor(Motor::disable)
    }

    // ------------------------------------------------------------------
    // 指令
    // ------------------------------------------------------------------

    /// 向指定电机发送 MIT 指令
    pub fn send_cmd(
        &self,
        command_id: u16,
        target_position: f32,
        target_velocity: f32,
        stiffness: f32,
        damping: f32,
        feedforward_torque: f32,
    ) -> Result<(), DriverError> {
        self.motor_or_not_found(command_id)?.send_cmd_mit(
            target_position,
            target_velocity,
            stiffness,
            damping,
            feedforward_torque,
        )
    }

    /// 向所有电机发送同一条 MIT 指令
    pub fn send_cmd_all(
        &self,
        target_position: f32,
        target_velocity: f32,
        stiffness: f32,
        damping: f32,
        feedforward_torque: f32,
    ) -> Result<(), DriverError> {
        self.for_each_motor(|motor| {
            motor.send_cmd_mit(
                target_position,
                target_velocity,
                stiffness,
                damping,
                feedforward_torque,
            )
        })
    }

    // ------------------------------------------------------------------
    // 总线
    // ------------------------------------------------------------------

    /// 手动执行一次排空，返回读到的帧数
    pub fn poll_feedback(&self) -> Result<usize, DriverError> {
        self.ensure_running()?;
        drain_pass(&self.ctx)
    }

    /// 丢弃总线上排队的所有帧，返回丢弃的帧数
    ///
    /// 接口掉线时返回 `TransportDown`，其中带有通道名。
    pub fn flush_bus(&self) -> Result<usize, DriverError> {
        self.ensure_running()?;
        flush(&self.ctx.bus)
    }

    // ------------------------------------------------------------------
    // 轮询
    // ------------------------------------------------------------------

    /// 启动后台轮询
    ///
    /// 没有电机或已在运行时什么都不做，返回是否启动了新线程。
    pub fn start_polling(&self) -> Result<bool, DriverError> {
        self.ensure_running()?;
        if self.ctx.registry.is_empty() {
            return Ok(false);
        }

        let ctx = self.ctx.clone();
        self.ctx.poller.start(move |generation| {
            thread::Builder::new()
                .name(format!("damiao-poll-{}", ctx.bus.channel()))
                .spawn(move || polling_loop(ctx, generation))
        })
    }

    /// 停止后台轮询，等待线程退出（最多 `stop_timeout_ms`）
    ///
    /// 返回线程是否在时限内退出。
    pub fn stop_polling(&self) -> bool {
        self.ctx.poller.stop(self.ctx.config.stop_timeout())
    }

    pub fn is_polling(&self) -> bool {
        self.polling_state() == PollingState::Running
    }

    pub fn polling_state(&self) -> PollingState {
        self.ctx.poller.state()
    }

    // ------------------------------------------------------------------
    // 指标
    // ------------------------------------------------------------------

    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.ctx.metrics.reset();
    }

    // ------------------------------------------------------------------
    // 关闭
    // ------------------------------------------------------------------

    /// 按顺序关闭：停止轮询 → 失能所有电机 → 释放总线
    ///
    /// 重复调用直接返回 `Ok(())`。失能失败不会阻止释放总线。
    pub fn shutdown(&self) -> Result<(), DriverError> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        info!("Shutting down motor controller on '{}'", self.channel());

        if !self.stop_polling() {
            warn!("Polling thread did not exit in time, releasing bus anyway");
        }

        let disabled = self.disable_all();
        if let Err(e) = &disabled {
            warn!("Failed to disable all motors during shutdown: {}", e);
        }

        let released = self.ctx.bus.shutdown();
        disabled.and(released)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl Drop for MotorController {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Motor controller shutdown on drop failed: {}", e);
        }
    }
}
