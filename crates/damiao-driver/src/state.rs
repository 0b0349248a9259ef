//! 电机状态定义
//!
//! `MotorState` 是一帧反馈解码后的快照，由轮询线程整体替换（ArcSwap），
//! 读者永远不会看到半更新的状态。

use damiao_protocol::{ControlMode, DmFrame, MotorFeedback, MotorStatus};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

/// 电机最新反馈状态
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorState {
    /// 逻辑 ID（反馈帧 Byte 0 低 4 位）
    pub feedback_id: u8,
    /// 状态码
    pub status: MotorStatus,
    /// 位置（rad）
    pub position: f32,
    /// 速度（rad/s）
    pub velocity: f32,
    /// 力矩（N·m）
    pub torque: f32,
    /// MOS 温度（℃）
    pub temperature_mos: u8,
    /// 转子温度（℃）
    pub temperature_rotor: u8,
    /// 反馈帧的仲裁 ID（电机的 MST_ID）
    pub arbitration_id: u32,
    /// 硬件时间戳（微秒），0 表示不可用
    pub hardware_timestamp_us: u64,
    /// 接收时刻（系统单调时钟）
    pub received_at: Instant,
}

impl MotorState {
    pub(crate) fn from_feedback(feedback: MotorFeedback, frame: &DmFrame, received_at: Instant) -> Self {
        Self {
            feedback_id: feedback.feedback_id,
            status: feedback.status,
            position: feedback.position,
            velocity: feedback.velocity,
            torque: feedback.torque,
            temperature_mos: feedback.temperature_mos,
            temperature_rotor: feedback.temperature_rotor,
            arbitration_id: frame.id,
            hardware_timestamp_us: frame.timestamp_us,
            received_at,
        }
    }

    /// 距离接收已经过去的时间
    pub fn age(&self) -> Duration {
        self.received_at.elapsed()
    }

    /// 状态码是否为故障
    pub fn is_fault(&self) -> bool {
        self.status.is_fault()
    }
}

/// 控制模式（原子版本，调用线程之间共享）
#[derive(Debug)]
pub struct AtomicControlMode {
    inner: AtomicU8,
}

impl AtomicControlMode {
    pub fn new(mode: ControlMode) -> Self {
        Self {
            inner: AtomicU8::new(mode.into()),
        }
    }

    /// 获取当前模式（无效值回落到 MIT）
    pub fn get(&self) -> ControlMode {
        ControlMode::try_from(self.inner.load(Ordering::Acquire)).unwrap_or_default()
    }

    pub fn set(&self, mode: ControlMode) {
        self.inner.store(mode.into(), Ordering::Release);
    }
}

impl Default for AtomicControlMode {
    fn default() -> Self {
        Self::new(ControlMode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use damiao_protocol::MotorLimits;

    #[test]
    fn test_from_feedback_copies_fields() {
        let limits = MotorLimits::new(12.5, 30.0, 10.0);
        let feedback = MotorFeedback {
            feedback_id: 2,
            status: MotorStatus::Enabled,
            position: 1.0,
            velocity: 0.5,
            torque: -0.25,
            temperature_mos: 33,
            temperature_rotor: 36,
        };
        let mut frame = feedback.to_frame(0x12, &limits);
        frame.timestamp_us = 42;

        let now = Instant::now();
        let state = MotorState::from_feedback(feedback, &frame, now);
        assert_eq!(state.feedback_id, 2);
        assert_eq!(state.arbitration_id, 0x12);
        assert_eq!(state.hardware_timestamp_us, 42);
        assert_eq!(state.temperature_rotor, 36);
        assert_eq!(state.received_at, now);
        assert!(!state.is_fault());
    }

    #[test]
    fn test_atomic_control_mode() {
        let mode = AtomicControlMode::default();
        assert_eq!(mode.get(), ControlMode::Mit);
        mode.set(ControlMode::ForcePos);
        assert_eq!(mode.get(), ControlMode::ForcePos);
    }
}
