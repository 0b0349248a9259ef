//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use damiao_sdk::prelude::*;
//! ```

// 驱动层
pub use crate::driver::{
    ControllerBuilder, ControllerConfig, Motor, MotorConfig, MotorController, MotorState,
    PollingConfig,
};

// 协议层
pub use crate::protocol::{ControlMode, MotorStatus, MotorType, RegisterId, RegisterValue};

// CAN 层（常用 Trait）
pub use crate::can::CanAdapter;

// 错误类型
pub use crate::can::CanError;
pub use crate::driver::DriverError;
pub use crate::protocol::ProtocolError;
