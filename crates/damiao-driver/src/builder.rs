//! Builder 模式实现
//!
//! 提供链式构造 `MotorController` 实例的便捷方式。

use crate::config::{ControllerConfig, MotorConfig, PollingConfig};
use crate::controller::MotorController;
use crate::error::DriverError;
#[cfg(target_os = "linux")]
use damiao_can::SocketCanAdapter;
use damiao_can::CanAdapter;
use tracing::debug;

/// 控制器 Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use damiao_driver::{ControllerBuilder, PollingConfig};
///
/// # #[cfg(target_os = "linux")]
/// # fn main() -> Result<(), damiao_driver::DriverError> {
/// let controller = ControllerBuilder::new()
///     .interface("can0")
///     .polling_config(PollingConfig {
///         poll_interval_us: 500,
///         ..Default::default()
///     })
///     .motor(0x01, 0x01, "DM4310")
///     .motor(0x02, 0x02, "DM4340")
///     .build()?;
/// # Ok(())
/// # }
/// # #[cfg(not(target_os = "linux"))]
/// # fn main() {}
/// ```
#[derive(Debug, Clone, Default)]
pub struct ControllerBuilder {
    config: ControllerConfig,
}

impl ControllerBuilder {
    /// 创建新的 Builder（接口默认 "can0"）
    pub fn new() -> Self {
        Self::default()
    }

    /// 从完整配置（例如 TOML 文件）创建
    pub fn from_config(config: ControllerConfig) -> Self {
        Self { config }
    }

    /// 设置 CAN 接口名称
    pub fn interface(mut self, interface: impl Into<String>) -> Self {
        self.config.interface = interface.into();
        self
    }

    /// 设置轮询配置
    pub fn polling_config(mut self, config: PollingConfig) -> Self {
        self.config.polling = config;
        self
    }

    /// 添加电机（型号在 build 时解析）
    pub fn motor(mut self, command_id: u16, feedback_id: u8, motor_type: impl Into<String>) -> Self {
        self.config
            .motors
            .push(MotorConfig::new(command_id, feedback_id, motor_type));
        self
    }

    /// 添加完整的电机配置
    pub fn motor_config(mut self, motor: MotorConfig) -> Self {
        self.config.motors.push(motor);
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// 使用给定的适配器构建（测试 / 自定义后端）
    ///
    /// 电机按添加顺序注册，任何一个失败都会让构建失败（已创建的控制器随之关闭）。
    pub fn build_with_adapter(
        self,
        adapter: impl CanAdapter + Send + 'static,
    ) -> Result<MotorController, DriverError> {
        let controller = MotorController::with_config(adapter, self.config.polling);
        for motor in &self.config.motors {
            controller.add_motor_from_config(motor)?;
        }
        debug!(
            "Controller built on '{}' with {} motor(s)",
            controller.channel(),
            controller.motor_count()
        );
        Ok(controller)
    }

    /// 打开配置中的 SocketCAN 接口并构建
    #[cfg(target_os = "linux")]
    pub fn build(self) -> Result<MotorController, DriverError> {
        let adapter = SocketCanAdapter::new(self.config.interface.as_str())?;
        self.build_with_adapter(adapter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use damiao_can::MockCanAdapter;
    use damiao_protocol::MotorType;

    #[test]
    fn test_builder_defaults() {
        let builder = ControllerBuilder::new();
        assert_eq!(builder.config().interface, "can0");
        assert!(builder.config().motors.is_empty());
    }

    #[test]
    fn test_builder_chain() {
        let builder = ControllerBuilder::new()
            .interface("can1")
            .polling_config(PollingConfig {
                poll_interval_us: 250,
                ..Default::default()
            })
            .motor(0x01, 0x01, "DM4310")
            .motor(0x02, 0x02, "4340");
        assert_eq!(builder.config().interface, "can1");
        assert_eq!(builder.config().polling.poll_interval_us, 250);
        assert_eq!(builder.config().motors.len(), 2);
    }

    #[test]
    fn test_build_with_adapter_registers_motors() {
        let (adapter, _handle) = MockCanAdapter::new("mock0");
        let controller = ControllerBuilder::new()
            .motor(0x01, 0x01, "DM4310")
            .motor(0x02, 0x02, "DM4340")
            .build_with_adapter(adapter)
            .unwrap();

        assert_eq!(controller.motor_count(), 2);
        assert_eq!(controller.get_motor(0x02).unwrap().motor_type(), MotorType::Dm4340);
        assert_eq!(controller.polling_config().poll_interval_us, 1000);
        assert!(controller.is_polling());
    }

    #[test]
    fn test_build_fails_on_unknown_type_and_releases_bus() {
        let (adapter, handle) = MockCanAdapter::new("mock0");
        let result = ControllerBuilder::new()
            .motor(0x01, 0x01, "DM4310")
            .motor(0x02, 0x02, "DM0000")
            .build_with_adapter(adapter);

        assert!(matches!(result, Err(DriverError::Config(_))));
        assert!(handle.is_closed());
    }

    #[test]
    fn test_build_fails_on_duplicate_feedback_id() {
        let (adapter, _handle) = MockCanAdapter::new("mock0");
        let result = ControllerBuilder::new()
            .motor(0x01, 0x01, "DM4310")
            .motor(0x02, 0x01, "DM4310")
            .build_with_adapter(adapter);
        assert!(matches!(result, Err(DriverError::DuplicateFeedbackId { .. })));
    }
}
