//! 驱动层错误类型定义

use damiao_can::CanError;
use damiao_protocol::{ControlMode, ProtocolError, RegisterId};
use std::time::Duration;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// CAN 驱动错误（`NetworkDown` 除外，见 [`DriverError::TransportDown`]）
    #[error("CAN driver error: {0}")]
    Can(CanError),

    /// 协议解析错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// CAN 接口已关闭（`ENETDOWN`）
    ///
    /// 通常需要 `sudo ip link set <channel> up type can bitrate 1000000` 恢复。
    #[error("CAN interface '{channel}' is down (Error Code 100)")]
    TransportDown { channel: String },

    /// 命令 ID 已被注册
    #[error("Motor with command id 0x{command_id:03X} already exists")]
    DuplicateMotor { command_id: u16 },

    /// 反馈 ID 已被其它电机占用
    #[error("Feedback id {feedback_id} is already bound to motor 0x{existing:03X}")]
    DuplicateFeedbackId { feedback_id: u8, existing: u16 },

    /// 反馈 ID 超出 4 位范围
    #[error("Feedback id {feedback_id} out of range (0-15)")]
    InvalidFeedbackId { feedback_id: u8 },

    /// 命令 ID 加上模式偏移后会越过标准帧范围或与寄存器 ID 冲突
    #[error("Command id 0x{command_id:X} out of range (0x000-0x{max:03X})")]
    InvalidCommandId { command_id: u16, max: u16 },

    /// 电机未注册
    #[error("Motor 0x{command_id:03X} not found")]
    MotorNotFound { command_id: u16 },

    /// 当前控制模式不支持该指令
    #[error("Invalid control mode: command requires {expected}, motor is in {actual}")]
    InvalidMode {
        expected: ControlMode,
        actual: ControlMode,
    },

    /// 寄存器读取超时
    #[error("Register {rid} read timed out after {timeout:?}")]
    RegisterTimeout { rid: RegisterId, timeout: Duration },

    /// 等待中的寄存器请求被同一寄存器的新请求取代
    #[error("Register {rid} request superseded by a newer one")]
    RegisterSuperseded { rid: RegisterId },

    /// 批量操作中部分电机失败（所有电机都已尝试）
    #[error("{} motor operation(s) failed", .failures.len())]
    PartialFailure { failures: Vec<(u16, DriverError)> },

    /// 控制器已经关闭
    #[error("Controller has been shut down")]
    ShutDown,

    /// 后台轮询线程启动失败
    #[error("Polling thread error: {0}")]
    PollingThread(String),

    /// 配置错误（TOML 解析、未知电机型号等）
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<CanError> for DriverError {
    fn from(err: CanError) -> Self {
        match err {
            CanError::NetworkDown { channel } => DriverError::TransportDown { channel },
            other => DriverError::Can(other),
        }
    }
}

impl DriverError {
    /// 是否为传输层故障（接口掉线 / 底层 CAN 错误）
    pub fn is_transport(&self) -> bool {
        matches!(self, DriverError::TransportDown { .. } | DriverError::Can(_))
    }
}

/// 将逐个电机的结果汇总为一个结果
///
/// 全部成功返回 `Ok(())`，否则返回 [`DriverError::PartialFailure`]。
pub(crate) fn collect_failures(failures: Vec<(u16, DriverError)>) -> Result<(), DriverError> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(DriverError::PartialFailure { failures })
    }
}
