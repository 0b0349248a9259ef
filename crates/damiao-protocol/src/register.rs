//! 寄存器读写子协议
//!
//! 请求帧（CAN ID 0x7FF）与应答帧共享同一布局：
//!
//! - Byte 0: 命令 ID 低字节
//! - Byte 1: 命令 ID 高字节
//! - Byte 2: 标记（0x33 读 / 0x55 写 / 0xAA 保存）
//! - Byte 3: 寄存器地址（RID）
//! - Byte 4-7: 寄存器值（小端，读请求为 0）

use crate::ids::*;
use crate::{DmFrame, ProtocolError};
use std::fmt;

/// 寄存器值的存储类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterKind {
    U32,
    F32,
}

/// 寄存器地址
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegisterId(pub u8);

impl RegisterId {
    /// 欠压保护值
    pub const UV_VALUE: RegisterId = RegisterId(0);
    /// 扭矩系数
    pub const KT_VALUE: RegisterId = RegisterId(1);
    /// 过温保护值
    pub const OT_VALUE: RegisterId = RegisterId(2);
    /// 过流保护值
    pub const OC_VALUE: RegisterId = RegisterId(3);
    /// 加速度
    pub const ACC: RegisterId = RegisterId(4);
    /// 减速度
    pub const DEC: RegisterId = RegisterId(5);
    /// 最大速度
    pub const MAX_SPD: RegisterId = RegisterId(6);
    /// 反馈 ID（MST_ID）
    pub const MST_ID: RegisterId = RegisterId(7);
    /// 命令 ID（ESC_ID）
    pub const ESC_ID: RegisterId = RegisterId(8);
    /// 通讯超时（×50us）
    pub const TIMEOUT: RegisterId = RegisterId(9);
    /// 控制模式
    pub const CTRL_MODE: RegisterId = RegisterId(10);
    /// 阻尼系数
    pub const DAMP: RegisterId = RegisterId(11);
    /// 转动惯量
    pub const INERTIA: RegisterId = RegisterId(12);
    /// 硬件版本
    pub const HW_VER: RegisterId = RegisterId(13);
    /// 软件版本
    pub const SW_VER: RegisterId = RegisterId(14);
    /// 序列号
    pub const SN: RegisterId = RegisterId(15);
    /// 极对数
    pub const NPP: RegisterId = RegisterId(16);
    /// 相电阻
    pub const RS: RegisterId = RegisterId(17);
    /// 相电感
    pub const LS: RegisterId = RegisterId(18);
    /// 磁链
    pub const FLUX: RegisterId = RegisterId(19);
    /// 减速比
    pub const GR: RegisterId = RegisterId(20);
    /// 位置映射范围
    pub const PMAX: RegisterId = RegisterId(21);
    /// 速度映射范围
    pub const VMAX: RegisterId = RegisterId(22);
    /// 扭矩映射范围
    pub const TMAX: RegisterId = RegisterId(23);
    /// 电流环带宽
    pub const I_BW: RegisterId = RegisterId(24);
    /// 速度环 Kp
    pub const KP_ASR: RegisterId = RegisterId(25);
    /// 速度环 Ki
    pub const KI_ASR: RegisterId = RegisterId(26);
    /// 位置环 Kp
    pub const KP_APR: RegisterId = RegisterId(27);
    /// 位置环 Ki
    pub const KI_APR: RegisterId = RegisterId(28);
    /// 过压保护值
    pub const OV_VALUE: RegisterId = RegisterId(29);
    /// 齿轮力矩效率
    pub const GREF: RegisterId = RegisterId(30);
    /// 速度环阻尼系数
    pub const DETA: RegisterId = RegisterId(31);
    /// 速度环滤波带宽
    pub const V_BW: RegisterId = RegisterId(32);
    /// 电流环增强系数
    pub const IQ_C1: RegisterId = RegisterId(33);
    /// 速度环增强系数
    pub const VL_C1: RegisterId = RegisterId(34);
    /// CAN 波特率代码
    pub const CAN_BR: RegisterId = RegisterId(35);
    /// 子版本号
    pub const SUB_VER: RegisterId = RegisterId(36);
    /// 电机当前位置
    pub const P_M: RegisterId = RegisterId(80);
    /// 输出轴位置
    pub const XOUT: RegisterId = RegisterId(81);

    /// 寄存器值的存储类型
    pub fn kind(&self) -> RegisterKind {
        match self.0 {
            7..=10 | 13..=16 | 35 | 36 => RegisterKind::U32,
            _ => RegisterKind::F32,
        }
    }
}

impl fmt::Display for RegisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RID{}", self.0)
    }
}

impl From<u8> for RegisterId {
    fn from(value: u8) -> Self {
        RegisterId(value)
    }
}

/// 寄存器值
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegisterValue {
    U32(u32),
    F32(f32),
}

impl RegisterValue {
    /// 按寄存器类型解释 4 字节小端数据
    pub fn from_bytes(kind: RegisterKind, bytes: [u8; 4]) -> Self {
        match kind {
            RegisterKind::U32 => RegisterValue::U32(u32::from_le_bytes(bytes)),
            RegisterKind::F32 => RegisterValue::F32(f32::from_le_bytes(bytes)),
        }
    }

    pub fn to_bytes(&self) -> [u8; 4] {
        match self {
            RegisterValue::U32(v) => v.to_le_bytes(),
            RegisterValue::F32(v) => v.to_le_bytes(),
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            RegisterValue::U32(v) => Some(*v),
            RegisterValue::F32(_) => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            RegisterValue::F32(v) => Some(*v),
            RegisterValue::U32(_) => None,
        }
    }
}

/// 寄存器操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RegisterOp {
    Read = TAG_REGISTER_READ,
    Write = TAG_REGISTER_WRITE,
    Save = TAG_REGISTER_SAVE,
}

/// 寄存器请求帧
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterRequest {
    pub command_id: u16,
    pub op: RegisterOp,
    pub rid: RegisterId,
    pub value: [u8; 4],
}

impl RegisterRequest {
    /// 读寄存器
    pub fn read(command_id: u16, rid: RegisterId) -> Self {
        Self {
            command_id,
            op: RegisterOp::Read,
            rid,
            value: [0; 4],
        }
    }

    /// 写寄存器（掉电不保存，需要 `save` 才写入 Flash）
    pub fn write(command_id: u16, rid: RegisterId, value: RegisterValue) -> Self {
        Self {
            command_id,
            op: RegisterOp::Write,
            rid,
            value: value.to_bytes(),
        }
    }

    /// 保存所有参数到 Flash（电机需处于失能状态）
    pub fn save(command_id: u16) -> Self {
        Self {
            command_id,
            op: RegisterOp::Save,
            rid: RegisterId(0x01),
            value: [0; 4],
        }
    }

    pub fn encode(&self) -> [u8; 8] {
        let id = self.command_id.to_le_bytes();
        [
            id[0],
            id[1],
            self.op as u8,
            self.rid.0,
            self.value[0],
            self.value[1],
            self.value[2],
            self.value[3],
        ]
    }

    /// 转换为 CAN 帧（CAN ID 0x7FF）
    pub fn to_frame(&self) -> DmFrame {
        DmFrame::new_standard(ID_REGISTER, &self.encode())
    }
}

/// 寄存器应答帧
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterReply {
    /// 完整命令 ID（Byte 0-1）
    pub command_id: u16,
    /// 应答标记（读 / 写）
    pub tag: u8,
    /// 寄存器地址
    pub rid: RegisterId,
    /// 原始寄存器值
    pub value: [u8; 4],
}

impl RegisterReply {
    /// 解析应答数据
    ///
    /// 长度必须为 8，Byte 2 必须是应答标记，否则视为畸形帧。
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() != 8 {
            return Err(ProtocolError::InvalidLength {
                expected: 8,
                actual: data.len(),
            });
        }
        if !is_register_reply_tag(data[2]) {
            return Err(ProtocolError::UnexpectedTag { tag: data[2] });
        }

        Ok(Self {
            command_id: u16::from_le_bytes([data[0], data[1]]),
            tag: data[2],
            rid: RegisterId(data[3]),
            value: [data[4], data[5], data[6], data[7]],
        })
    }

    pub fn parse(frame: &DmFrame) -> Result<Self, ProtocolError> {
        Self::decode(frame.data_slice())
    }

    /// 按寄存器表解释值
    pub fn typed_value(&self) -> RegisterValue {
        RegisterValue::from_bytes(self.rid.kind(), self.value)
    }

    /// 编码为电机侧应答帧（用于仿真）
    pub fn to_frame(&self, arbitration_id: u16) -> DmFrame {
        let id = self.command_id.to_le_bytes();
        DmFrame::new_standard(
            arbitration_id,
            &[
                id[0],
                id[1],
                self.tag,
                self.rid.0,
                self.value[0],
                self.value[1],
                self.value[2],
                self.value[3],
            ],
        )
    }
}
