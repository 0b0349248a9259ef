//! 控制器配置
//!
//! 支持代码构造和 TOML 文件两种方式：
//!
//! ```toml
//! interface = "can0"
//!
//! [polling]
//! poll_interval_us = 1000
//! stop_timeout_ms = 100
//! register_timeout_ms = 100
//!
//! [[motors]]
//! command_id = 0x01
//! feedback_id = 0x01
//! motor_type = "DM4310"
//! ```

use crate::error::DriverError;
use damiao_protocol::{MotorLimits, MotorType};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// 后台轮询配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// 两轮排空之间的休眠（微秒）
    pub poll_interval_us: u64,
    /// 停止轮询时等待线程退出的上限（毫秒）
    pub stop_timeout_ms: u64,
    /// 寄存器读取的默认超时（毫秒）
    pub register_timeout_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            poll_interval_us: 1000,
            stop_timeout_ms: 100,
            register_timeout_ms: 100,
        }
    }
}

impl PollingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn register_timeout(&self) -> Duration {
        Duration::from_millis(self.register_timeout_ms)
    }
}

/// 自定义映射范围（覆盖型号预设）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub p_max: f32,
    pub v_max: f32,
    pub t_max: f32,
}

/// 单个电机配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorConfig {
    /// 命令 ID（ESC_ID）
    pub command_id: u16,
    /// 反馈帧中的逻辑 ID（0-15）
    pub feedback_id: u8,
    /// 型号名称，如 "DM4310" 或 "4340"
    pub motor_type: String,
    /// 可选的自定义映射范围
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<LimitsConfig>,
}

impl MotorConfig {
    pub fn new(command_id: u16, feedback_id: u8, motor_type: impl Into<String>) -> Self {
        Self {
            command_id,
            feedback_id,
            motor_type: motor_type.into(),
            limits: None,
        }
    }

    /// 解析型号；指定了 `limits` 时使用自定义范围
    pub fn resolve_type(&self) -> Result<MotorType, DriverError> {
        if let Some(limits) = self.limits {
            return Ok(MotorType::Custom(MotorLimits::new(
                limits.p_max,
                limits.v_max,
                limits.t_max,
            )));
        }
        self.motor_type
            .parse::<MotorType>()
            .map_err(|e| DriverError::Config(format!("motor 0x{:03X}: {}", self.command_id, e)))
    }
}

/// 控制器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// CAN 接口名称
    #[serde(default = "default_interface")]
    pub interface: String,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub motors: Vec<MotorConfig>,
}

fn default_interface() -> String {
    "can0".to_string()
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            polling: PollingConfig::default(),
            motors: Vec::new(),
        }
    }
}

impl ControllerConfig {
    /// 从 TOML 字符串解析
    pub fn from_toml_str(content: &str) -> Result<Self, DriverError> {
        toml::from_str(content).map_err(|e| DriverError::Config(e.to_string()))
    }

    /// 从 TOML 文件加载
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DriverError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| DriverError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// 序列化为 TOML
    pub fn to_toml_string(&self) -> Result<String, DriverError> {
        toml::to_string_pretty(self).map_err(|e| DriverError::Config(e.to_string()))
    }

    /// 保存到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), DriverError> {
        let path = path.as_ref();
        fs::write(path, self.to_toml_string()?)
            .map_err(|e| DriverError::Config(format!("{}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
interface = "vcan0"

[polling]
poll_interval_us = 500

[[motors]]
command_id = 1
feedback_id = 1
motor_type = "DM4310"

[[motors]]
command_id = 2
feedback_id = 2
motor_type = "4340"

[[motors]]
command_id = 3
feedback_id = 3
motor_type = "custom"
limits = { p_max = 3.14, v_max = 10.0, t_max = 2.0 }
"#;

    #[test]
    fn test_default_polling_config() {
        let config = PollingConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
        assert_eq!(config.stop_timeout(), Duration::from_millis(100));
        assert_eq!(config.register_timeout(), Duration::from_millis(100));
    }

    #[test]
    fn test_parse_sample() {
        let config = ControllerConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.interface, "vcan0");
        assert_eq!(config.polling.poll_interval_us, 500);
        // 未指定的字段使用默认值
        assert_eq!(config.polling.stop_timeout_ms, 100);
        assert_eq!(config.motors.len(), 3);

        assert_eq!(config.motors[0].resolve_type().unwrap(), MotorType::Dm4310);
        assert_eq!(config.motors[1].resolve_type().unwrap(), MotorType::Dm4340);
        assert_eq!(
            config.motors[2].resolve_type().unwrap(),
            MotorType::Custom(MotorLimits::new(3.14, 10.0, 2.0))
        );
    }

    #[test]
    fn test_unknown_motor_type() {
        let motor = MotorConfig::new(5, 5, "DM9999");
        assert!(matches!(motor.resolve_type(), Err(DriverError::Config(_))));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            ControllerConfig::from_toml_str("interface = "),
            Err(DriverError::Config(_))
        ));
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ControllerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ControllerConfig::default());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("controller.toml");

        let mut config = ControllerConfig::default();
        config.motors.push(MotorConfig::new(0x01, 0x01, "DM4310"));
        config.save_to_file(&path).unwrap();

        let loaded = ControllerConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ControllerConfig::from_file("/nonexistent/controller.toml"),
            Err(DriverError::Config(_))
        ));
    }
}
