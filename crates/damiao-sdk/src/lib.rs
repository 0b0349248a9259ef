//! DaMiao SDK - 达妙关节电机 Rust SDK
//!
//! 在一条 CAN 总线上控制多个达妙（DaMiao）电机：发送指令、在后台线程中读取反馈。
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **协议层** (`protocol`): 帧编解码、定点映射、寄存器表，无 I/O
//! - **CAN 层** (`can`): `CanAdapter` trait、SocketCAN 适配器、Mock 适配器
//! - **驱动层** (`driver`): `MotorController` / `Motor`、帧路由、后台轮询
//!
//! # 快速开始
//!
//! ```no_run
//! use damiao_sdk::prelude::*;
//!
//! # #[cfg(target_os = "linux")]
//! # fn main() -> Result<(), DriverError> {
//! damiao_sdk::init_logger();
//!
//! let controller = MotorController::open("can0")?;
//! let motor = controller.add_motor(0x01, 0x01, MotorType::Dm4310)?;
//! controller.enable_all()?;
//! motor.ensure_control_mode(ControlMode::Mit)?;
//! motor.send_cmd_mit(0.5, 0.0, 1.0, 0.5, 0.0)?;
//! println!("{:?}", motor.get_states());
//! controller.shutdown()?;
//! # Ok(())
//! # }
//! # #[cfg(not(target_os = "linux"))]
//! # fn main() {}
//! ```

pub use damiao_can as can;
pub use damiao_driver as driver;
pub use damiao_protocol as protocol;

// Prelude 模块
pub mod prelude;

// --- 用户以此为界 ---

// CAN 层常用类型
pub use can::{CanAdapter, CanError, DmFrame};

// 协议层
pub use protocol::{ControlMode, MotorLimits, MotorType, ProtocolError, RegisterId, RegisterValue};

// 驱动层
pub use driver::{
    ControllerBuilder, ControllerConfig, DriverError, Motor, MotorConfig, MotorController,
    MotorState, PollingConfig, PollingState,
};

/// 初始化日志
///
/// 安装 `tracing-subscriber` 的 fmt 输出，级别由 `RUST_LOG` 控制（默认 `info`），
/// 并把 `log` crate 的记录桥接到 tracing。重复调用无副作用。
///
/// ```rust
/// damiao_sdk::init_logger();
/// tracing::info!("logger ready");
/// ```
pub fn init_logger() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::util::SubscriberInitExt;

    let _ = tracing_log::LogTracer::builder()
        .with_max_level(log::LevelFilter::Trace)
        .init();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .finish()
        .try_init();
}
