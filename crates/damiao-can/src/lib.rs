//! # DaMiao CAN Adapter Layer
//!
//! CAN 硬件抽象层，提供统一的 CAN 接口抽象。
//!
//! 驱动层只依赖 [`CanAdapter`] trait：整帧收发，零超时接收表示"当前没有排队的帧"。

use std::time::Duration;
use thiserror::Error;

// 重新导出 damiao-protocol 中的 DmFrame
pub use damiao_protocol::DmFrame;

#[cfg(target_os = "linux")]
pub mod socketcan;

#[cfg(target_os = "linux")]
pub use socketcan::SocketCanAdapter;

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockCanAdapter, MockCanHandle};

/// CAN 适配层统一错误类型
#[derive(Error, Debug)]
pub enum CanError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] CanDeviceError),
    #[error("Read timeout")]
    Timeout,
    #[error("Buffer overflow")]
    BufferOverflow,
    #[error("Bus off")]
    BusOff,
    /// 网络接口已关闭（Linux `ENETDOWN`，errno 100）
    ///
    /// 通常意味着 `ip link set <channel> down` 或者线缆/控制器被拔出，
    /// 与普通 IO 错误区分，便于上层给出明确提示。
    #[error("CAN interface '{channel}' is down (Error Code 100)")]
    NetworkDown { channel: String },
    /// 适配器已经 `shutdown()`
    #[error("Adapter closed")]
    Closed,
}

impl CanError {
    /// 将 IO 错误归类：`ENETDOWN` 映射为 [`CanError::NetworkDown`]，其余保持 `Io`
    pub fn from_io(err: std::io::Error, channel: &str) -> Self {
        if err.kind() == std::io::ErrorKind::NetworkDown {
            CanError::NetworkDown {
                channel: channel.to_string(),
            }
        } else {
            CanError::Io(err)
        }
    }
}

/// 设备/后端错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanDeviceErrorKind {
    Unknown,
    NotFound,
    NotUp,
    AccessDenied,
    InvalidFrame,
    Backend,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct CanDeviceError {
    pub kind: CanDeviceErrorKind,
    pub message: String,
}

impl CanDeviceError {
    pub fn new(kind: CanDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<String> for CanDeviceError {
    fn from(message: String) -> Self {
        Self::new(CanDeviceErrorKind::Unknown, message)
    }
}

impl From<&str> for CanDeviceError {
    fn from(message: &str) -> Self {
        Self::new(CanDeviceErrorKind::Unknown, message)
    }
}

/// CAN 适配器
///
/// 实现者只需要提供 `send` / `receive` / `channel` / `shutdown`，
/// 其余方法有基于读超时的默认实现。
pub trait CanAdapter {
    /// 发送一帧（不等待任何应答）
    fn send(&mut self, frame: DmFrame) -> Result<(), CanError>;

    /// 按当前读超时接收一帧，超时返回 `CanError::Timeout`
    fn receive(&mut self) -> Result<DmFrame, CanError>;

    fn set_receive_timeout(&mut self, _timeout: Duration) {}

    fn receive_timeout(&mut self, timeout: Duration) -> Result<DmFrame, CanError> {
        self.set_receive_timeout(timeout);
        self.receive()
    }

    /// 零超时接收：`Ok(None)` 表示当前没有排队的帧
    fn try_receive(&mut self) -> Result<Option<DmFrame>, CanError> {
        match self.receive_timeout(Duration::ZERO) {
            Ok(frame) => Ok(Some(frame)),
            Err(CanError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// 通道名称（如 "can0"），用于错误信息
    fn channel(&self) -> &str;

    /// 释放底层传输，重复调用无副作用
    fn shutdown(&mut self) -> Result<(), CanError>;
}

impl<A: CanAdapter + ?Sized> CanAdapter for Box<A> {
    fn send(&mut self, frame: DmFrame) -> Result<(), CanError> {
        (**self).send(frame)
    }

    fn receive(&mut self) -> Result<DmFrame, CanError> {
        (**self).receive()
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        (**self).set_receive_timeout(timeout)
    }

    fn receive_timeout(&mut self, timeout: Duration) -> Result<DmFrame, CanError> {
        (**self).receive_timeout(timeout)
    }

    fn try_receive(&mut self) -> Result<Option<DmFrame>, CanError> {
        (**self).try_receive()
    }

    fn channel(&self) -> &str {
        (**self).channel()
    }

    fn shutdown(&mut self) -> Result<(), CanError> {
        (**self).shutdown()
    }
}

/// 帧的十六进制摘要（日志用）
pub fn frame_summary(frame: &DmFrame) -> String {
    format!(
        "id=0x{:03X} len={} data={}",
        frame.id,
        frame.len,
        hex::encode(frame.data_slice())
    )
}
