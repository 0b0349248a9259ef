//! # DaMiao Driver
//!
//! 达妙电机驱动层：一条 CAN 总线上的多电机管理与反馈轮询。
//!
//! - [`MotorController`]: 独占总线，注册电机，批量使能/失能/发送指令，管理后台轮询
//! - [`Motor`]: 单个电机的指令接口和最新反馈（`ArcSwap` 无锁读取）
//! - 后台轮询线程：第一次注册电机时启动，循环"排空总线 → 休眠 1ms"，
//!   传输层故障时自行退出
//! - [`ControllerBuilder`] / [`ControllerConfig`]: 链式构造或从 TOML 加载
//!
//! # 线程模型
//!
//! 一个轮询线程 + 任意多个调用线程。发送从不等待反馈；
//! 总线句柄只在单帧收发时加锁，注册表使用读写锁。

mod builder;
mod bus;
pub mod config;
mod controller;
mod error;
pub mod metrics;
mod motor;
mod pipeline;
mod poller;
mod registry;
pub mod state;

pub use builder::ControllerBuilder;
pub use config::{ControllerConfig, LimitsConfig, MotorConfig, PollingConfig};
pub use controller::{MAX_COMMAND_ID, MotorController};
pub use error::DriverError;
pub use metrics::{MetricsSnapshot, PollingMetrics};
pub use motor::Motor;
pub use poller::PollingState;
pub use state::{AtomicControlMode, MotorState};
