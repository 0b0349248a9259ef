//! CAN 接口状态检查
//!
//! 打开 socket 之前通过 sysfs 确认接口存在且已启动（IFF_UP），
//! 这样能给出比 `ENODEV` / `ENETDOWN` 更明确的修复提示。

use crate::{CanDeviceError, CanDeviceErrorKind, CanError};
use std::fs;
use std::path::{Path, PathBuf};

const SYSFS_NET: &str = "/sys/class/net";

/// 检查接口是否存在并处于 UP 状态
///
/// # 返回值
/// - `Ok(true)`: 接口存在且已启动
/// - `Ok(false)`: 接口存在但未启动
/// - `Err(CanError::Device)`: 接口不存在，或 sysfs 不可读
pub fn check_interface_status(interface: &str) -> Result<bool, CanError> {
    check_interface_status_in(Path::new(SYSFS_NET), interface)
}

fn check_interface_status_in(root: &Path, interface: &str) -> Result<bool, CanError> {
    let dir: PathBuf = root.join(interface);
    if !dir.exists() {
        return Err(CanError::Device(CanDeviceError::new(
            CanDeviceErrorKind::NotFound,
            format!(
                "CAN interface '{}' does not exist. For a virtual bus:\n  sudo ip link add dev {} type vcan",
                interface, interface
            ),
        )));
    }

    let flags = fs::read_to_string(dir.join("flags")).map_err(|e| {
        CanError::Device(CanDeviceError::new(
            CanDeviceErrorKind::Backend,
            format!("Failed to read flags of '{}': {}", interface, e),
        ))
    })?;

    let flags = parse_flags(&flags).ok_or_else(|| {
        CanError::Device(CanDeviceError::new(
            CanDeviceErrorKind::Backend,
            format!("Unexpected flags '{}' for '{}'", flags.trim(), interface),
        ))
    })?;

    Ok(flags & libc::IFF_UP as u32 != 0)
}

/// 解析 sysfs `flags`（形如 `0x1003`）
fn parse_flags(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    let hex = raw.strip_prefix("0x").unwrap_or(raw);
    u32::from_str_radix(hex, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        assert_eq!(parse_flags("0x1003\n"), Some(0x1003));
        assert_eq!(parse_flags("0x80"), Some(0x80));
        assert_eq!(parse_flags("garbage"), None);
    }

    #[test]
    fn test_missing_interface() {
        let root = Path::new("/nonexistent-sysfs-root");
        match check_interface_status_in(root, "can9") {
            Err(CanError::Device(e)) => assert_eq!(e.kind, CanDeviceErrorKind::NotFound),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_up_and_down_flags() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let up = root.join("vcan_up");
        let down = root.join("vcan_down");
        fs::create_dir_all(&up).unwrap();
        fs::create_dir_all(&down).unwrap();
        fs::write(up.join("flags"), "0xc1\n").unwrap();
        fs::write(down.join("flags"), "0x80\n").unwrap();

        assert!(check_interface_status_in(root, "vcan_up").unwrap());
        assert!(!check_interface_status_in(root, "vcan_down").unwrap());
    }
}
