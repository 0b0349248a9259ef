//! 电机型号与定点映射范围
//!
//! 每个型号有固定的位置 / 速度 / 力矩范围（PMAX / VMAX / TMAX），
//! 仅用于物理量与定点数之间的缩放。Kp、Kd 的范围与型号无关。

use crate::ProtocolError;
use std::fmt;
use std::str::FromStr;

/// MIT 模式 Kp 范围
pub const KP_MIN: f32 = 0.0;
pub const KP_MAX: f32 = 500.0;

/// MIT 模式 Kd 范围
pub const KD_MIN: f32 = 0.0;
pub const KD_MAX: f32 = 5.0;

/// MIT 各字段位宽
pub const POSITION_BITS: u32 = 16;
pub const VELOCITY_BITS: u32 = 12;
pub const KP_BITS: u32 = 12;
pub const KD_BITS: u32 = 12;
pub const TORQUE_BITS: u32 = 12;

/// 单个型号的映射范围（对称区间 `[-max, max]`）
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotorLimits {
    /// 位置上限（rad）
    pub p_max: f32,
    /// 速度上限（rad/s）
    pub v_max: f32,
    /// 力矩上限（N·m）
    pub t_max: f32,
}

impl MotorLimits {
    pub const fn new(p_max: f32, v_max: f32, t_max: f32) -> Self {
        Self {
            p_max,
            v_max,
            t_max,
        }
    }
}

/// 电机型号
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotorType {
    Dm3507,
    Dm4310,
    Dm4310_48V,
    Dm4340,
    Dm4340_48V,
    Dm6006,
    Dm8006,
    Dm8009,
    Dm10010L,
    Dm10010,
    DmH3510,
    DmG6215,
    DmH6220,
    DmJH11,
    Dm6248P,
    /// 自定义映射范围（与电机 PMAX/VMAX/TMAX 寄存器一致）
    Custom(MotorLimits),
}

impl MotorType {
    /// 所有预设型号
    pub const PRESETS: [MotorType; 15] = [
        MotorType::Dm3507,
        MotorType::Dm4310,
        MotorType::Dm4310_48V,
        MotorType::Dm4340,
        MotorType::Dm4340_48V,
        MotorType::Dm6006,
        MotorType::Dm8006,
        MotorType::Dm8009,
        MotorType::Dm10010L,
        MotorType::Dm10010,
        MotorType::DmH3510,
        MotorType::DmG6215,
        MotorType::DmH6220,
        MotorType::DmJH11,
        MotorType::Dm6248P,
    ];

    /// 出厂默认映射范围
    pub fn limits(&self) -> MotorLimits {
        match self {
            MotorType::Dm3507 => MotorLimits::new(12.5, 50.0, 5.0),
            MotorType::Dm4310 => MotorLimits::new(12.5, 30.0, 10.0),
            MotorType::Dm4310_48V => MotorLimits::new(12.5, 50.0, 10.0),
            MotorType::Dm4340 => MotorLimits::new(12.5, 8.0, 28.0),
            MotorType::Dm4340_48V => MotorLimits::new(12.5, 10.0, 28.0),
            MotorType::Dm6006 => MotorLimits::new(12.5, 45.0, 20.0),
            MotorType::Dm8006 => MotorLimits::new(12.5, 45.0, 40.0),
            MotorType::Dm8009 => MotorLimits::new(12.5, 45.0, 54.0),
            MotorType::Dm10010L => MotorLimits::new(12.5, 25.0, 200.0),
            MotorType::Dm10010 => MotorLimits::new(12.5, 20.0, 200.0),
            MotorType::DmH3510 => MotorLimits::new(12.5, 280.0, 1.0),
            MotorType::DmG6215 => MotorLimits::new(12.5, 45.0, 10.0),
            MotorType::DmH6220 => MotorLimits::new(12.5, 45.0, 10.0),
            MotorType::DmJH11 => MotorLimits::new(12.5, 10.0, 80.0),
            MotorType::Dm6248P => MotorLimits::new(12.566, 20.0, 120.0),
            MotorType::Custom(limits) => *limits,
        }
    }

    /// 型号名称（与 `FromStr` 互逆）
    pub fn name(&self) -> &'static str {
        match self {
            MotorType::Dm3507 => "DM3507",
            MotorType::Dm4310 => "DM4310",
            MotorType::Dm4310_48V => "DM4310_48V",
            MotorType::Dm4340 => "DM4340",
            MotorType::Dm4340_48V => "DM4340_48V",
            MotorType::Dm6006 => "DM6006",
            MotorType::Dm8006 => "DM8006",
            MotorType::Dm8009 => "DM8009",
            MotorType::Dm10010L => "DM10010L",
            MotorType::Dm10010 => "DM10010",
            MotorType::DmH3510 => "DMH3510",
            MotorType::DmG6215 => "DMG6215",
            MotorType::DmH6220 => "DMH6220",
            MotorType::DmJH11 => "DMJH11",
            MotorType::Dm6248P => "DM6248P",
            MotorType::Custom(_) => "CUSTOM",
        }
    }
}

impl fmt::Display for MotorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MotorType {
    type Err = ProtocolError;

    /// 解析型号名称，大小写不敏感，`DM` 前缀可省略（如 `"4310"`）
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase().replace('-', "_");
        let normalized = if upper.starts_with("DM") {
            upper
        } else {
            format!("DM{}", upper)
        };

        MotorType::PRESETS
            .iter()
            .find(|preset| preset.name() == normalized)
            .copied()
            .ok_or_else(|| ProtocolError::UnknownMotorType(s.to_string()))
    }
}
