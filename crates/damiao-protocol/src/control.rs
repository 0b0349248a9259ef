//! 控制帧结构体定义
//!
//! 包含所有控制指令帧的结构体，提供构建 `DmFrame` 的方法。

use crate::ids::*;
use crate::limits::*;
use crate::{DmFrame, ProtocolError, float_to_uint};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// 控制模式
// ============================================================================

/// 控制模式（`CTRL_MODE` 寄存器，RID 10）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ControlMode {
    /// MIT 模式（位置 + 速度 + Kp + Kd + 前馈力矩）
    #[default]
    Mit = 1,
    /// 位置速度模式
    PosVel = 2,
    /// 速度模式
    Vel = 3,
    /// 力位混合模式
    ForcePos = 4,
}

impl ControlMode {
    pub fn name(&self) -> &'static str {
        match self {
            ControlMode::Mit => "MIT",
            ControlMode::PosVel => "POS_VEL",
            ControlMode::Vel => "VEL",
            ControlMode::ForcePos => "FORCE_POS",
        }
    }

    /// 该模式下控制帧的 CAN ID 偏移
    pub fn id_offset(&self) -> u16 {
        match self {
            ControlMode::Mit => MIT_ID_OFFSET,
            ControlMode::PosVel => POS_VEL_ID_OFFSET,
            ControlMode::Vel => VEL_ID_OFFSET,
            ControlMode::ForcePos => FORCE_POS_ID_OFFSET,
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ControlMode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MIT" => Ok(ControlMode::Mit),
            "POS_VEL" | "POSVEL" => Ok(ControlMode::PosVel),
            "VEL" => Ok(ControlMode::Vel),
            "FORCE_POS" | "FORCEPOS" => Ok(ControlMode::ForcePos),
            _ => Err(ProtocolError::InvalidValue {
                field: format!("ControlMode({})", s),
                value: 0,
            }),
        }
    }
}

// ============================================================================
// 特殊指令（使能 / 失能 / 零点 / 清错）
// ============================================================================

/// 特殊指令
///
/// 帧格式：Byte 0-6 = 0xFF，Byte 7 = 指令码。
/// 在 MIT 模式下 CAN ID 为命令 ID，其它模式下为对应模式的偏移 ID。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SpecialCommand {
    Enable = CMD_ENABLE,
    Disable = CMD_DISABLE,
    SaveZero = CMD_SAVE_ZERO,
    ClearError = CMD_CLEAR_ERROR,
}

impl SpecialCommand {
    /// 转换为 CAN 帧
    pub fn to_frame(self, command_id: u16, mode: ControlMode) -> DmFrame {
        let mut data = [0xFFu8; 8];
        data[7] = self as u8;
        DmFrame::new_standard(command_id.wrapping_add(mode.id_offset()), &data)
    }
}

// ============================================================================
// MIT 控制指令
// ============================================================================

/// MIT 控制指令
///
/// 位域布局（大端位序，跨字节打包）：
/// - Byte 0-1: 位置 (16 位)
/// - Byte 2: 速度 [bit11~bit4]
/// - Byte 3: 速度 [bit3~bit0] | Kp [bit11~bit8]
/// - Byte 4: Kp [bit7~bit0]
/// - Byte 5: Kd [bit11~bit4]
/// - Byte 6: Kd [bit3~bit0] | 力矩 [bit11~bit8]
/// - Byte 7: 力矩 [bit7~bit0]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MitCommand {
    /// 目标位置（rad）
    pub position: f32,
    /// 目标速度（rad/s）
    pub velocity: f32,
    /// 刚度 Kp
    pub stiffness: f32,
    /// 阻尼 Kd
    pub damping: f32,
    /// 前馈力矩（N·m）
    pub feedforward_torque: f32,
}

impl MitCommand {
    pub fn new(
        position: f32,
        velocity: f32,
        stiffness: f32,
        damping: f32,
        feedforward_torque: f32,
    ) -> Self {
        Self {
            position,
            velocity,
            stiffness,
            damping,
            feedforward_torque,
        }
    }

    /// 编码为 8 字节数据（超出范围的值被限幅）
    pub fn encode(&self, limits: &MotorLimits) -> [u8; 8] {
        let p = float_to_uint(self.position, -limits.p_max, limits.p_max, POSITION_BITS);
        let v = float_to_uint(self.velocity, -limits.v_max, limits.v_max, VELOCITY_BITS);
        let kp = float_to_uint(self.stiffness, KP_MIN, KP_MAX, KP_BITS);
        let kd = float_to_uint(self.damping, KD_MIN, KD_MAX, KD_BITS);
        let t = float_to_uint(
            self.feedforward_torque,
            -limits.t_max,
            limits.t_max,
            TORQUE_BITS,
        );

        [
            ((p >> 8) & 0xFF) as u8,
            (p & 0xFF) as u8,
            ((v >> 4) & 0xFF) as u8,
            (((v & 0x0F) << 4) | ((kp >> 8) & 0x0F)) as u8,
            (kp & 0xFF) as u8,
            ((kd >> 4) & 0xFF) as u8,
            (((kd & 0x0F) << 4) | ((t >> 8) & 0x0F)) as u8,
            (t & 0xFF) as u8,
        ]
    }

    /// 转换为 CAN 帧（CAN ID = 命令 ID）
    pub fn to_frame(&self, command_id: u16, limits: &MotorLimits) -> DmFrame {
        DmFrame::new_standard(command_id + MIT_ID_OFFSET, &self.encode(limits))
    }
}

// ============================================================================
// 位置速度 / 速度 / 力位混合指令
// ============================================================================

/// 位置速度模式指令（0x100 + ID）
///
/// - Byte 0-3: 目标位置 f32 (LE)
/// - Byte 4-7: 最大速度 f32 (LE)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PosVelCommand {
    pub position: f32,
    pub velocity: f32,
}

impl PosVelCommand {
    pub fn new(position: f32, velocity: f32) -> Self {
        Self { position, velocity }
    }

    pub fn to_frame(&self, command_id: u16) -> DmFrame {
        let mut data = [0u8; 8];
        data[0..4].copy_from_slice(&self.position.to_le_bytes());
        data[4..8].copy_from_slice(&self.velocity.to_le_bytes());
        DmFrame::new_standard(command_id.wrapping_add(POS_VEL_ID_OFFSET), &data)
    }
}

/// 速度模式指令（0x200 + ID），Byte 0-3: 目标速度 f32 (LE)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VelocityCommand {
    pub velocity: f32,
}

impl VelocityCommand {
    pub fn new(velocity: f32) -> Self {
        Self { velocity }
    }

    pub fn to_frame(&self, command_id: u16) -> DmFrame {
        DmFrame::new_standard(command_id.wrapping_add(VEL_ID_OFFSET), &self.velocity.to_le_bytes())
    }
}

/// 力位混合模式速度字段上限（rad/s，编码为 ×100 的 u16）
pub const FORCE_POS_VELOCITY_MAX: f32 = 100.0;

/// 力位混合模式电流标幺值上限（编码为 ×10000 的 u16）
pub const FORCE_POS_CURRENT_MAX: f32 = 1.0;

/// 力位混合模式指令（0x300 + ID）
///
/// - Byte 0-3: 目标位置 f32 (LE)
/// - Byte 4-5: 速度 ×100，u16 (LE)，范围 0 ~ 10000
/// - Byte 6-7: 电流标幺值 ×10000，u16 (LE)，范围 0 ~ 10000
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ForcePosCommand {
    pub position: f32,
    pub velocity: f32,
    pub current_ratio: f32,
}

impl ForcePosCommand {
    pub fn new(position: f32, velocity: f32, current_ratio: f32) -> Self {
        Self {
            position,
            velocity,
            current_ratio,
        }
    }

    pub fn to_frame(&self, command_id: u16) -> DmFrame {
        let vel = (self.velocity.clamp(0.0, FORCE_POS_VELOCITY_MAX) * 100.0).round() as u16;
        let cur = (self.current_ratio.clamp(0.0, FORCE_POS_CURRENT_MAX) * 10000.0).round() as u16;

        let mut data = [0u8; 8];
        data[0..4].copy_from_slice(&self.position.to_le_bytes());
        data[4..6].copy_from_slice(&vel.to_le_bytes());
        data[6..8].copy_from_slice(&cur.to_le_bytes());
        DmFrame::new_standard(command_id.wrapping_add(FORCE_POS_ID_OFFSET), &data)
    }
}
