//! 反馈帧解析
//!
//! 电机在收到任何控制帧后（以及开启主动上报时周期性地）发送反馈帧：
//!
//! - Byte 0: 状态码 [bit7~bit4] | 逻辑 ID [bit3~bit0]
//! - Byte 1-2: 位置 (16 位)
//! - Byte 3: 速度 [bit11~bit4]
//! - Byte 4: 速度 [bit3~bit0] | 力矩 [bit11~bit8]
//! - Byte 5: 力矩 [bit7~bit0]
//! - Byte 6: MOS 温度（℃）
//! - Byte 7: 转子温度（℃）

use crate::limits::*;
use crate::{DmFrame, ProtocolError, float_to_uint, uint_to_float};
use bilge::prelude::*;

/// 反馈帧 Byte 0 位域
///
/// bilge 默认 LSB first：第一个字段占据低 4 位。
#[bitsize(8)]
#[derive(FromBits, DebugBits, Clone, Copy, Default)]
pub struct FeedbackHeader {
    pub feedback_id: u4, // Bit 0-3: 逻辑 ID
    pub status: u4,      // Bit 4-7: 状态码
}

/// 电机状态码（反馈帧 Byte 0 高 4 位）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotorStatus {
    /// 失能
    #[default]
    Disabled,
    /// 使能
    Enabled,
    /// 过压
    OverVoltage,
    /// 欠压
    UnderVoltage,
    /// 过流
    OverCurrent,
    /// MOS 过温
    MosOverTemperature,
    /// 电机线圈过温
    RotorOverTemperature,
    /// 通讯丢失
    CommunicationLost,
    /// 过载
    Overload,
    /// 未定义的状态码
    Unknown(u8),
}

impl MotorStatus {
    /// 状态码原始值
    pub fn code(&self) -> u8 {
        match self {
            MotorStatus::Disabled => 0x0,
            MotorStatus::Enabled => 0x1,
            MotorStatus::OverVoltage => 0x8,
            MotorStatus::UnderVoltage => 0x9,
            MotorStatus::OverCurrent => 0xA,
            MotorStatus::MosOverTemperature => 0xB,
            MotorStatus::RotorOverTemperature => 0xC,
            MotorStatus::CommunicationLost => 0xD,
            MotorStatus::Overload => 0xE,
            MotorStatus::Unknown(code) => *code,
        }
    }

    /// 是否为故障状态
    pub fn is_fault(&self) -> bool {
        !matches!(self, MotorStatus::Disabled | MotorStatus::Enabled)
    }
}

impl From<u8> for MotorStatus {
    fn from(value: u8) -> Self {
        match value {
            0x0 => MotorStatus::Disabled,
            0x1 => MotorStatus::Enabled,
            0x8 => MotorStatus::OverVoltage,
            0x9 => MotorStatus::UnderVoltage,
            0xA => MotorStatus::OverCurrent,
            0xB => MotorStatus::MosOverTemperature,
            0xC => MotorStatus::RotorOverTemperature,
            0xD => MotorStatus::CommunicationLost,
            0xE => MotorStatus::Overload,
            other => MotorStatus::Unknown(other),
        }
    }
}

/// 反馈帧（已换算为物理量）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotorFeedback {
    /// 逻辑 ID（0-15）
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
}

impl MotorFeedback {
    /// 从 8 字节数据解析
    pub fn decode(data: &[u8], limits: &MotorLimits) -> Result<Self, ProtocolError> {
        if data.len() != 8 {
            return Err(ProtocolError::InvalidLength {
                expected: 8,
                actual: data.len(),
            });
        }

        let header = FeedbackHeader::from(u8::new(data[0]));
        let p_int = ((data[1] as u32) << 8) | data[2] as u32;
        let v_int = ((data[3] as u32) << 4) | (data[4] as u32 >> 4);
        let t_int = (((data[4] & 0x0F) as u32) << 8) | data[5] as u32;

        Ok(Self {
            feedback_id: header.feedback_id().value(),
            status: MotorStatus::from(header.status().value()),
            position: uint_to_float(p_int, -limits.p_max, limits.p_max, POSITION_BITS),
            velocity: uint_to_float(v_int, -limits.v_max, limits.v_max, VELOCITY_BITS),
            torque: uint_to_float(t_int, -limits.t_max, limits.t_max, TORQUE_BITS),
            temperature_mos: data[6],
            temperature_rotor: data[7],
        })
    }

    /// 从 CAN 帧解析
    pub fn parse(frame: &DmFrame, limits: &MotorLimits) -> Result<Self, ProtocolError> {
        Self::decode(frame.data_slice(), limits)
    }

    /// 编码为 8 字节数据（电机侧格式，用于仿真与回放）
    pub fn encode(&self, limits: &MotorLimits) -> [u8; 8] {
        let header = FeedbackHeader::new(
            u4::new(self.feedback_id & 0x0F),
            u4::new(self.status.code() & 0x0F),
        );
        let p = float_to_uint(self.position, -limits.p_max, limits.p_max, POSITION_BITS);
        let v = float_to_uint(self.velocity, -limits.v_max, limits.v_max, VELOCITY_BITS);
        let t = float_to_uint(self.torque, -limits.t_max, limits.t_max, TORQUE_BITS);

        [
            u8::from(header).value(),
            ((p >> 8) & 0xFF) as u8,
            (p & 0xFF) as u8,
            ((v >> 4) & 0xFF) as u8,
            (((v & 0x0F) << 4) | ((t >> 8) & 0x0F)) as u8,
            (t & 0xFF) as u8,
            self.temperature_mos,
            self.temperature_rotor,
        ]
    }

    /// 编码为 CAN 帧（仲裁 ID 由电机的 MST_ID 决定）
    pub fn to_frame(&self, arbitration_id: u16, limits: &MotorLimits) -> DmFrame {
        DmFrame::new_standard(arbitration_id, &self.encode(limits))
    }
}
