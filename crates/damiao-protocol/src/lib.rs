//! # DaMiao Protocol
//!
//! 达妙（DaMiao）关节电机 CAN 总线协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `ids`: CAN ID 与标记字节常量
//! - `limits`: 电机型号与物理量映射范围
//! - `control`: 控制帧构建（MIT / 位置速度 / 速度 / 力位混合 / 使能）
//! - `feedback`: 反馈帧解析
//! - `register`: 寄存器读写子协议
//!
//! ## 定点映射
//!
//! MIT 控制帧和反馈帧中的物理量均使用无符号定点数表示：
//! 先将浮点值限幅到 `[min, max]`，再线性映射到 `0 ..= 2^bits - 1`。
//! 寄存器值和位置速度模式的浮点数使用小端字节序（LE）。

pub mod control;
pub mod feedback;
pub mod ids;
pub mod limits;
pub mod register;

// 重新导出常用类型
pub use control::*;
pub use feedback::*;
pub use ids::*;
pub use limits::*;
pub use register::*;

use thiserror::Error;

/// CAN 2.0 标准帧的统一抽象
///
/// `DmFrame` 是协议层和适配层之间的中间抽象：
/// - 协议层通过 `to_frame()` 构建、通过 `TryFrom<&DmFrame>` / `parse()` 解析
/// - 适配层（SocketCAN / Mock）负责与具体硬件帧类型互相转换
///
/// # 设计特性
///
/// - **Copy**：固定 8 字节，无堆分配
/// - **len**：记录有效数据长度，路由时用于丢弃非 8 字节帧
/// - **timestamp_us**：硬件时间戳（微秒），0 表示不可用
///
/// ```rust
/// use damiao_protocol::DmFrame;
///
/// let frame = DmFrame::new_standard(0x001, &[1, 2, 3, 4]);
/// assert_eq!(frame.id(), 0x001);
/// assert_eq!(frame.data_slice(), &[1, 2, 3, 4]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DmFrame {
    /// CAN ID（仲裁 ID）
    pub id: u32,

    /// 帧数据（固定 8 字节，未使用部分为 0）
    pub data: [u8; 8],

    /// 有效数据长度 (0-8)
    pub len: u8,

    /// 是否为扩展帧（29-bit ID）
    pub is_extended: bool,

    /// 硬件时间戳（微秒），0 表示不可用
    pub timestamp_us: u64,
}

impl DmFrame {
    /// 创建标准帧
    pub fn new_standard(id: u16, data: &[u8]) -> Self {
        Self::new(id as u32, data, false)
    }

    /// 创建扩展帧
    pub fn new_extended(id: u32, data: &[u8]) -> Self {
        Self::new(id, data, true)
    }

    fn new(id: u32, data: &[u8], is_extended: bool) -> Self {
        let mut fixed_data = [0u8; 8];
        let len = data.len().min(8);
        fixed_data[..len].copy_from_slice(&data[..len]);

        Self {
            id,
            data: fixed_data,
            len: len as u8,
            is_extended,
            timestamp_us: 0,
        }
    }

    /// 获取数据切片（只包含有效数据）
    pub fn data_slice(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// 获取 CAN ID
    pub fn id(&self) -> u32 {
        self.id
    }

    /// 获取完整数据（8字节固定数组）
    pub fn data(&self) -> &[u8; 8] {
        &self.data
    }

    /// 是否为完整的 8 字节帧
    ///
    /// 达妙协议的所有指令、反馈和寄存器帧都是 8 字节，
    /// 其它长度的帧来自共享总线上的其它设备。
    pub fn is_full(&self) -> bool {
        self.len == 8
    }
}

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid CAN ID: 0x{id:X}")]
    InvalidCanId { id: u32 },

    #[error("Unexpected register tag: 0x{tag:02X}")]
    UnexpectedTag { tag: u8 },

    #[error("Unknown motor type: {0}")]
    UnknownMotorType(String),

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: u32 },
}

/// 浮点数 → 无符号定点数
///
/// 公式：`(clamp(x) - x_min) * (2^bits - 1) / (x_max - x_min)`，四舍五入。
///
/// 超出范围的值被限幅而不是拒绝。
pub fn float_to_uint(x: f32, x_min: f32, x_max: f32, bits: u32) -> u32 {
    let span = x_max - x_min;
    if span <= 0.0 || x.is_nan() {
        return 0;
    }
    let max_int = ((1u32 << bits) - 1) as f32;
    let clamped = x.clamp(x_min, x_max);
    let scaled = ((clamped - x_min) * max_int / span).round();
    (scaled as u32).min((1u32 << bits) - 1)
}

/// 无符号定点数 → 浮点数
///
/// 公式：`x_int * (x_max - x_min) / (2^bits - 1) + x_min`
pub fn uint_to_float(x_int: u32, x_min: f32, x_max: f32, bits: u32) -> f32 {
    let span = x_max - x_min;
    let max_int = ((1u32 << bits) - 1) as f32;
    (x_int.min((1u32 << bits) - 1) as f32) * span / max_int + x_min
}

/// 指定位宽下的量化步长（往返误差上界为半个步长）
pub fn quantization_step(x_min: f32, x_max: f32, bits: u32) -> f32 {
    (x_max - x_min) / ((1u32 << bits) - 1) as f32
}
