//! SocketCAN CAN 适配器实现
//!
//! 支持 Linux 平台下的 SocketCAN 支持，使用内核级的 CAN 通讯接口。
//!
//! ## 特性
//!
//! - 基于 Linux SocketCAN 子系统
//! - 支持标准帧和扩展帧
//! - 使用 `poll` 实现读超时，零超时即非阻塞探测
//! - 自动过滤错误帧和远程帧
//! - `ENETDOWN` 映射为 [`CanError::NetworkDown`]
//!
//! ## 限制
//!
//! - **仅限 Linux 平台**：SocketCAN 是 Linux 内核特性
//! - **接口配置**：波特率等配置由系统工具（`ip link`）完成，不在应用层设置
//! - **权限要求**：可能需要 `dialout` 组权限或 `sudo`

use crate::{CanAdapter, CanDeviceError, CanDeviceErrorKind, CanError, DmFrame, frame_summary};
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use socketcan::{
    CanError as SocketCanError, CanErrorFrame, CanFrame, CanSocket, EmbeddedFrame, ExtendedId,
    Frame, Socket, StandardId,
};
use std::os::fd::BorrowedFd;
use std::os::unix::io::AsRawFd;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

mod interface_check;

use interface_check::check_interface_status;

/// 默认读超时（`receive()` 使用）
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(2);

/// SocketCAN 适配器
///
/// # 示例
///
/// ```no_run
/// use damiao_can::{CanAdapter, DmFrame, SocketCanAdapter};
///
/// let mut adapter = SocketCanAdapter::new("can0").unwrap();
/// adapter.send(DmFrame::new_standard(0x001, &[0xFF; 8])).unwrap();
/// while let Some(frame) = adapter.try_receive().unwrap() {
///     println!("{:?}", frame);
/// }
/// adapter.shutdown().unwrap();
/// ```
#[derive(Debug)]
pub struct SocketCanAdapter {
    /// SocketCAN socket，`shutdown()` 后为 `None`
    socket: Option<CanSocket>,
    /// 接口名称（如 "can0"）
    interface: String,
    /// 读超时时间（用于 receive 方法）
    read_timeout: Duration,
}

impl SocketCanAdapter {
    /// 创建新的 SocketCAN 适配器
    ///
    /// 在打开 socket 之前，会检查接口是否存在且已启动（UP 状态）。
    ///
    /// # 错误
    /// - `CanError::Device`: 接口不存在 / 未启动 / 无法打开
    pub fn new(interface: impl Into<String>) -> Result<Self, CanError> {
        let interface = interface.into();

        match check_interface_status(&interface) {
            Ok(true) => {
                trace!("CAN interface '{}' is UP, proceeding with initialization", interface);
            },
            Ok(false) => {
                return Err(CanError::Device(CanDeviceError::new(
                    CanDeviceErrorKind::NotUp,
                    format!(
                        "CAN interface '{}' exists but is not UP. Please start it first:\n  sudo ip link set up {}",
                        interface, interface
                    ),
                )));
            },
            Err(e) => return Err(e),
        }

        let socket = CanSocket::open(&interface).map_err(|e| {
            CanError::Device(CanDeviceError::new(
                CanDeviceErrorKind::Backend,
                format!("Failed to open CAN interface '{}': {}", interface, e),
            ))
        })?;

        info!("SocketCAN interface '{}' opened", interface);

        Ok(Self {
            socket: Some(socket),
            interface,
            read_timeout: DEFAULT_READ_TIMEOUT,
        })
    }

    /// 获取接口名称
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// 获取读超时时间
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// socket 是否仍然打开
    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    /// 在 `timeout` 内接收一个有效数据帧
    ///
    /// 错误帧和远程帧被跳过；Bus Off 与缓冲区溢出作为错误返回。
    fn receive_within(&mut self, timeout: Duration) -> Result<DmFrame, CanError> {
        let socket = self.socket.as_ref().ok_or(CanError::Closed)?;

        loop {
            Self::wait_readable(socket, timeout, &self.interface)?;

            let can_frame = socket
                .read_frame()
                .map_err(|e| CanError::from_io(e, &self.interface))?;

            if can_frame.is_error_frame() {
                if let Ok(error_frame) = CanErrorFrame::try_from(can_frame) {
                    match SocketCanError::from(error_frame) {
                        SocketCanError::BusOff => {
                            error!("CAN Bus Off error detected on '{}'", self.interface);
                            return Err(CanError::BusOff);
                        },
                        SocketCanError::ControllerProblem(problem) => {
                            let problem_str = format!("{}", problem);
                            if problem_str.to_ascii_lowercase().contains("overflow") {
                                error!("CAN Buffer Overflow detected: {}", problem);
                                return Err(CanError::BufferOverflow);
                            }
                            warn!("CAN Controller Problem: {}, ignoring", problem);
                        },
                        other => warn!("CAN Error Frame received: {}, ignoring", other),
                    }
                } else {
                    warn!("Received CAN error frame but failed to parse, ignoring");
                }
                continue;
            }

            if can_frame.is_remote_frame() {
                trace!("Skipping remote frame ID=0x{:X}", can_frame.raw_id());
                continue;
            }

            let frame = Self::to_dm_frame(&can_frame);
            trace!("Received CAN frame: {}", frame_summary(&frame));
            return Ok(frame);
        }
    }

    /// 等待 socket 可读；超时返回 `CanError::Timeout`
    fn wait_readable(socket: &CanSocket, timeout: Duration, interface: &str) -> Result<(), CanError> {
        // nix 0.30 的 PollFd::new 需要 BorrowedFd
        let pollfd = PollFd::new(
            unsafe { BorrowedFd::borrow_raw(socket.as_raw_fd()) },
            PollFlags::POLLIN,
        );

        // 向上取整到毫秒，避免亚毫秒超时退化成零
        let timeout_ms = timeout.as_micros().div_ceil(1000).min(u16::MAX as u128) as u16;
        match poll(&mut [pollfd], PollTimeout::from(timeout_ms)) {
            Ok(0) => Err(CanError::Timeout),
            Ok(_) => Ok(()),
            Err(e) => Err(CanError::from_io(std::io::Error::from(e), interface)),
        }
    }

    fn to_dm_frame(can_frame: &CanFrame) -> DmFrame {
        let mut data = [0u8; 8];
        let frame_data = can_frame.data();
        let len = frame_data.len().min(8);
        data[..len].copy_from_slice(&frame_data[..len]);

        DmFrame {
            id: can_frame.raw_id(),
            data,
            len: len as u8,
            is_extended: can_frame.is_extended(),
            timestamp_us: 0,
        }
    }

    fn to_can_frame(frame: &DmFrame) -> Result<CanFrame, CanError> {
        let payload = frame.data_slice();
        let can_frame = if frame.is_extended {
            ExtendedId::new(frame.id).and_then(|id| CanFrame::new(id, payload))
        } else {
            u16::try_from(frame.id)
                .ok()
                .and_then(StandardId::new)
                .and_then(|id| CanFrame::new(id, payload))
        };

        can_frame.ok_or_else(|| {
            CanError::Device(CanDeviceError::new(
                CanDeviceErrorKind::InvalidFrame,
                format!("Failed to create frame with ID 0x{:X}", frame.id),
            ))
        })
    }
}

impl Drop for SocketCanAdapter {
    fn drop(&mut self) {
        if self.socket.is_some() {
            trace!("[Auto-Drop] SocketCAN interface '{}' closed", self.interface);
        }
    }
}

impl CanAdapter for SocketCanAdapter {
    /// 发送帧（Fire-and-Forget）
    ///
    /// # 错误
    /// - `CanError::Closed`: 已经 `shutdown()`
    /// - `CanError::NetworkDown`: 接口已关闭
    /// - `CanError::Device`: 创建帧失败（如 ID 无效）
    fn send(&mut self, frame: DmFrame) -> Result<(), CanError> {
        let socket = self.socket.as_ref().ok_or(CanError::Closed)?;
        let can_frame = Self::to_can_frame(&frame)?;

        socket
            .write_frame(&can_frame)
            .map_err(|e| CanError::from_io(e, &self.interface))?;

        trace!("Sent CAN frame: {}", frame_summary(&frame));
        Ok(())
    }

    fn receive(&mut self) -> Result<DmFrame, CanError> {
        self.receive_within(self.read_timeout)
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    fn receive_timeout(&mut self, timeout: Duration) -> Result<DmFrame, CanError> {
        self.receive_within(timeout)
    }

    fn channel(&self) -> &str {
        &self.interface
    }

    fn shutdown(&mut self) -> Result<(), CanError> {
        if let Some(socket) = self.socket.take() {
            drop(socket);
            debug!("SocketCAN interface '{}' shut down", self.interface);
        }
        Ok(())
    }
}
