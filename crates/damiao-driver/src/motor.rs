//! 单个电机
//!
//! `Motor` 由 [`MotorController`](crate::MotorController) 创建并注册，
//! 以 `Arc<Motor>` 的形式交给调用方。所有指令方法只负责写总线，不等待电机应答；
//! 最新反馈由轮询线程写入，调用方通过 [`Motor::get_states`] 无锁读取。

use crate::bus::Bus;
use crate::error::DriverError;
use crate::state::{AtomicControlMode, MotorState};
use arc_swap::ArcSwapOption;
use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use damiao_protocol::{
    ControlMode, DmFrame, ForcePosCommand, MitCommand, MotorFeedback, MotorLimits, MotorType,
    PosVelCommand, ProtocolError, RegisterId, RegisterRequest, RegisterValue, SpecialCommand,
    VelocityCommand,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// 等待中的寄存器读取（每个寄存器最多一个）
struct PendingRead {
    token: u64,
    tx: Sender<[u8; 4]>,
}

/// 达妙电机
pub struct Motor {
    command_id: u16,
    feedback_id: u8,
    motor_type: MotorType,
    limits: MotorLimits,
    mode: AtomicControlMode,
    enabled: AtomicBool,
    state: ArcSwapOption<MotorState>,
    pending: Mutex<HashMap<RegisterId, PendingRead>>,
    next_token: AtomicU64,
    register_timeout: Duration,
    bus: Arc<Bus>,
}

impl Motor {
    pub(crate) fn new(
        command_id: u16,
        feedback_id: u8,
        motor_type: MotorType,
        bus: Arc<Bus>,
        register_timeout: Duration,
    ) -> Self {
        Self {
            command_id,
            feedback_id,
            limits: motor_type.limits(),
            motor_type,
            mode: AtomicControlMode::default(),
            enabled: AtomicBool::new(false),
            state: ArcSwapOption::empty(),
            pending: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(0),
            register_timeout,
            bus,
        }
    }

    /// 命令 ID（ESC_ID）
    pub fn command_id(&self) -> u16 {
        self.command_id
    }

    /// 反馈帧中的逻辑 ID
    pub fn feedback_id(&self) -> u8 {
        self.feedback_id
    }

    pub fn motor_type(&self) -> MotorType {
        self.motor_type
    }

    pub fn limits(&self) -> MotorLimits {
        self.limits
    }

    /// 驱动侧记录的控制模式（初始为 MIT）
    pub fn control_mode(&self) -> ControlMode {
        self.mode.get()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    // ------------------------------------------------------------------
    // 特殊指令
    // ------------------------------------------------------------------

    fn send_special(&self, command: SpecialCommand) -> Result<(), DriverError> {
        self.bus.send(command.to_frame(self.command_id, self.control_mode()))
    }

    /// 使能电机
    pub fn enable(&self) -> Result<(), DriverError> {
        self.send_special(SpecialCommand::Enable)?;
        self.enabled.store(true, Ordering::Release);
        debug!("Motor 0x{:03X} enabled", self.command_id);
        Ok(())
    }

    /// 失能电机
    pub fn disable(&self) -> Result<(), DriverError> {
        self.send_special(SpecialCommand::Disable)?;
        self.enabled.store(false, Ordering::Release);
        debug!("Motor 0x{:03X} disabled", self.command_id);
        Ok(())
    }

    /// 将当前位置设为零点
    pub fn save_zero_position(&self) -> Result<(), DriverError> {
        self.send_special(SpecialCommand::SaveZero)
    }

    /// 清除电机错误（过压、过流、过温等）
    pub fn clear_error(&self) -> Result<(), DriverError> {
        self.send_special(SpecialCommand::ClearError)
    }

    // ------------------------------------------------------------------
    // 控制模式
    // ------------------------------------------------------------------

    /// 确保电机处于指定控制模式
    ///
    /// 已处于该模式时什么都不做；否则写 `CTRL_MODE` 寄存器并更新本地记录。
    /// 写寄存器不等待应答。
    pub fn ensure_control_mode(&self, mode: ControlMode) -> Result<(), DriverError> {
        let current = self.control_mode();
        if current == mode {
            return Ok(());
        }

        self.write_register(RegisterId::CTRL_MODE, RegisterValue::U32(u8::from(mode) as u32))?;
        self.mode.set(mode);
        debug!(
            "Motor 0x{:03X} control mode {} -> {}",
            self.command_id, current, mode
        );
        Ok(())
    }

    fn require_mode(&self, expected: ControlMode) -> Result<(), DriverError> {
        let actual = self.control_mode();
        if actual != expected {
            return Err(DriverError::InvalidMode { expected, actual });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // 控制指令
    // ------------------------------------------------------------------

    /// MIT 模式控制指令
    ///
    /// 超出型号范围的值在编码时被限幅。
    pub fn send_cmd_mit(
        &self,
        target_position: f32,
        target_velocity: f32,
        stiffness: f32,
        damping: f32,
        feedforward_torque: f32,
    ) -> Result<(), DriverError> {
        self.require_mode(ControlMode::Mit)?;
        let command = MitCommand::new(
            target_position,
            target_velocity,
            stiffness,
            damping,
            feedforward_torque,
        );
        self.bus.send(command.to_frame(self.command_id, &self.limits))
    }

    /// 位置速度模式指令
    pub fn send_cmd_pos_vel(&self, position: f32, velocity: f32) -> Result<(), DriverError> {
        self.require_mode(ControlMode::PosVel)?;
        self.bus.send(PosVelCommand::new(position, velocity).to_frame(self.command_id))
    }

    /// 速度模式指令
    pub fn send_cmd_vel(&self, velocity: f32) -> Result<(), DriverError> {
        self.require_mode(ControlMode::Vel)?;
        self.bus.send(VelocityCommand::new(velocity).to_frame(self.command_id))
    }

    /// 力位混合模式指令
    ///
    /// `velocity` 限幅到 0 ~ 100 rad/s，`current_ratio` 限幅到 0 ~ 1。
    pub fn send_cmd_force_pos(
        &self,
        position: f32,
        velocity: f32,
        current_ratio: f32,
    ) -> Result<(), DriverError> {
        self.require_mode(ControlMode::ForcePos)?;
        self.bus.send(
            ForcePosCommand::new(position, velocity, current_ratio).to_frame(self.command_id),
        )
    }

    // ------------------------------------------------------------------
    // 反馈
    // ------------------------------------------------------------------

    /// 最新反馈状态，尚未收到反馈时为 `None`
    ///
    /// 无锁读取，不会阻塞。
    pub fn get_states(&self) -> Option<MotorState> {
        self.state.load().as_deref().copied()
    }

    /// 解码反馈帧并整体替换缓存状态
    pub(crate) fn process_feedback_frame(&self, frame: &DmFrame) -> Result<(), ProtocolError> {
        let feedback = MotorFeedback::parse(frame, &self.limits)?;
        let state = MotorState::from_feedback(feedback, frame, Instant::now());
        self.state.store(Some(Arc::new(state)));
        Ok(())
    }

    // ------------------------------------------------------------------
    // 寄存器
    // ------------------------------------------------------------------

    /// 将寄存器应答交给等待中的读取
    ///
    /// 没有等待中的读取时丢弃，返回 `false`。
    pub(crate) fn handle_register_reply(&self, rid: RegisterId, value: [u8; 4]) -> bool {
        let pending = self.pending.lock().remove(&rid);
        match pending {
            Some(read) => read.tx.try_send(value).is_ok(),
            None => {
                trace!(
                    "Motor 0x{:03X}: unsolicited reply for {} ({})",
                    self.command_id,
                    rid,
                    hex::encode(value)
                );
                false
            },
        }
    }

    /// 读取寄存器（阻塞直到应答或超时）
    ///
    /// 应答由轮询线程（或手动 `poll_feedback()`）路由回来，轮询停止时只会超时。
    /// `timeout` 为 `None` 时使用配置中的 `register_timeout_ms`。
    /// 同一寄存器的新请求会取代旧请求，旧请求返回 [`DriverError::RegisterSuperseded`]。
    pub fn read_register(
        &self,
        rid: RegisterId,
        timeout: Option<Duration>,
    ) -> Result<RegisterValue, DriverError> {
        let timeout = timeout.unwrap_or(self.register_timeout);
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = bounded(1);
        self.pending.lock().insert(rid, PendingRead { token, tx });

        if let Err(e) = self.bus.send(RegisterRequest::read(self.command_id, rid).to_frame()) {
            self.remove_pending(rid, token);
            return Err(e);
        }

        match rx.recv_timeout(timeout) {
            Ok(bytes) => Ok(RegisterValue::from_bytes(rid.kind(), bytes)),
            Err(RecvTimeoutError::Timeout) => {
                self.remove_pending(rid, token);
                Err(DriverError::RegisterTimeout { rid, timeout })
            },
            Err(RecvTimeoutError::Disconnected) => Err(DriverError::RegisterSuperseded { rid }),
        }
    }

    fn remove_pending(&self, rid: RegisterId, token: u64) {
        let mut pending = self.pending.lock();
        if pending.get(&rid).is_some_and(|read| read.token == token) {
            pending.remove(&rid);
        }
    }

    /// 写寄存器（不等待应答，掉电不保存）
    pub fn write_register(&self, rid: RegisterId, value: RegisterValue) -> Result<(), DriverError> {
        self.bus.send(RegisterRequest::write(self.command_id, rid, value).to_frame())
    }

    /// 保存参数到 Flash（电机需处于失能状态）
    pub fn save_parameters(&self) -> Result<(), DriverError> {
        self.bus.send(RegisterRequest::save(self.command_id).to_frame())
    }
}

impl fmt::Debug for Motor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Motor")
            .field("command_id", &format_args!("0x{:03X}", self.command_id))
            .field("feedback_id", &self.feedback_id)
            .field("motor_type", &self.motor_type)
            .field("control_mode", &self.control_mode())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
