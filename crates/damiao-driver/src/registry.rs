//! 电机注册表
//!
//! 一份按注册顺序保存的 `Vec<Arc<Motor>>`，加上两个索引：
//! 命令 ID → 下标，反馈逻辑 ID（0-15）→ 下标。读多写少，使用读写锁。

use crate::error::DriverError;
use crate::motor::Motor;
use damiao_protocol::{DmFrame, FEEDBACK_ID_MASK, RegisterId, is_register_reply_tag};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// 反馈逻辑 ID 的个数（4 位）
pub(crate) const FEEDBACK_SLOTS: usize = 16;

/// 一帧的路由结果
pub(crate) enum Route {
    /// 寄存器应答，按完整命令 ID 匹配
    Register {
        motor: Arc<Motor>,
        rid: RegisterId,
        value: [u8; 4],
    },
    /// 反馈帧，按逻辑 ID 匹配
    Feedback(Arc<Motor>),
    /// 没有匹配的电机
    Unrouted { logical_id: u8 },
}

#[derive(Default)]
struct Inner {
    motors: Vec<Arc<Motor>>,
    by_command_id: HashMap<u16, usize>,
    by_feedback_id: [Option<usize>; FEEDBACK_SLOTS],
}

#[derive(Default)]
pub(crate) struct MotorRegistry {
    inner: RwLock<Inner>,
}

impl MotorRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 注册电机，命令 ID 或反馈 ID 冲突时拒绝
    pub(crate) fn insert(&self, motor: Arc<Motor>) -> Result<Arc<Motor>, DriverError> {
        let mut inner = self.inner.write();
        let command_id = motor.command_id();
        let feedback_id = motor.feedback_id();

        if inner.by_command_id.contains_key(&command_id) {
            return Err(DriverError::DuplicateMotor { command_id });
        }
        let slot = feedback_id as usize;
        if slot >= FEEDBACK_SLOTS {
            return Err(DriverError::InvalidFeedbackId { feedback_id });
        }
        if let Some(existing) = inner.by_feedback_id[slot] {
            return Err(DriverError::DuplicateFeedbackId {
                feedback_id,
                existing: inner.motors[existing].command_id(),
            });
        }

        let index = inner.motors.len();
        inner.motors.push(motor.clone());
        inner.by_command_id.insert(command_id, index);
        inner.by_feedback_id[slot] = Some(index);
        Ok(motor)
    }

    pub(crate) fn get(&self, command_id: u16) -> Option<Arc<Motor>> {
        let inner = self.inner.read();
        inner
            .by_command_id
            .get(&command_id)
            .map(|&index| inner.motors[index].clone())
    }

    pub(crate) fn contains(&self, command_id: u16) -> bool {
        self.inner.read().by_command_id.contains_key(&command_id)
    }

    /// 按注册顺序的快照
    pub(crate) fn all(&self) -> Vec<Arc<Motor>> {
        self.inner.read().motors.clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.read().motors.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 对一帧 8 字节数据做一次分类
    ///
    /// Byte 2 是应答标记且 Byte 0-1 是已注册的命令 ID 时走寄存器路径，
    /// 否则按 Byte 0 低 4 位走反馈路径。
    pub(crate) fn route(&self, frame: &DmFrame) -> Route {
        let data = &frame.data;
        let inner = self.inner.read();

        if is_register_reply_tag(data[2]) {
            let command_id = u16::from_le_bytes([data[0], data[1]]);
            if let Some(&index) = inner.by_command_id.get(&command_id) {
                return Route::Register {
                    motor: inner.motors[index].clone(),
                    rid: RegisterId(data[3]),
                    value: [data[4], data[5], data[6], data[7]],
                };
            }
        }

        let logical_id = data[0] & FEEDBACK_ID_MASK;
        match inner.by_feedback_id[logical_id as usize] {
            Some(index) => Route::Feedback(inner.motors[index].clone()),
            None => Route::Unrouted { logical_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Bus;
    use crate::metrics::PollingMetrics;
    use damiao_can::MockCanAdapter;
    use damiao_protocol::{MotorType, TAG_REGISTER_READ};
    use std::time::Duration;

    fn test_bus() -> Arc<Bus> {
        let (adapter, _handle) = MockCanAdapter::new("mock0");
        Arc::new(Bus::new(Box::new(adapter), Arc::new(PollingMetrics::new())))
    }

    fn motor(bus: &Arc<Bus>, command_id: u16, feedback_id: u8) -> Arc<Motor> {
        Arc::new(Motor::new(
            command_id,
            feedback_id,
            MotorType::Dm4310,
            bus.clone(),
            Duration::from_millis(10),
        ))
    }

    #[test]
    fn test_insert_and_lookup_in_order() {
        let bus = test_bus();
        let registry = MotorRegistry::new();
        assert!(registry.is_empty());

        registry.insert(motor(&bus, 0x02, 2)).unwrap();
        registry.insert(motor(&bus, 0x01, 1)).unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains(0x01));
        assert_eq!(registry.get(0x02).unwrap().feedback_id(), 2);
        assert!(registry.get(0x03).is_none());

        let order: Vec<u16> = registry.all().iter().map(|m| m.command_id()).collect();
        assert_eq!(order, vec![0x02, 0x01]);
    }

    #[test]
    fn test_duplicate_command_id_rejected() {
        let bus = test_bus();
        let registry = MotorRegistry::new();
        registry.insert(motor(&bus, 0x01, 1)).unwrap();
        assert!(matches!(
            registry.insert(motor(&bus, 0x01, 2)),
            Err(DriverError::DuplicateMotor { command_id: 0x01 })
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_feedback_id_rejected() {
        let bus = test_bus();
        let registry = MotorRegistry::new();
        registry.insert(motor(&bus, 0x01, 1)).unwrap();
        match registry.insert(motor(&bus, 0x02, 1)) {
            Err(DriverError::DuplicateFeedbackId {
                feedback_id,
                existing,
            }) => {
                assert_eq!(feedback_id, 1);
                assert_eq!(existing, 0x01);
            },
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(!registry.contains(0x02));
    }

    #[test]
    fn test_out_of_range_feedback_id_rejected() {
        let bus = test_bus();
        let registry = MotorRegistry::new();
        assert!(matches!(
            registry.insert(motor(&bus, 0x01, 0x11)),
            Err(DriverError::InvalidFeedbackId { feedback_id: 0x11 })
        ));
    }

    #[test]
    fn test_route_feedback_by_low_nibble() {
        let bus = test_bus();
        let registry = MotorRegistry::new();
        registry.insert(motor(&bus, 0x01, 1)).unwrap();

        // 状态码在高 4 位
        let frame = DmFrame::new_standard(0x11, &[0x11, 0x80, 0, 0x80, 0x08, 0, 30, 30]);
        assert!(matches!(registry.route(&frame), Route::Feedback(m) if m.command_id() == 0x01));

        let frame = DmFrame::new_standard(0x13, &[0x13, 0x80, 0, 0x80, 0x08, 0, 30, 30]);
        assert!(matches!(registry.route(&frame), Route::Unrouted { logical_id: 3 }));
    }

    #[test]
    fn test_route_register_reply_by_command_id() {
        let bus = test_bus();
        let registry = MotorRegistry::new();
        registry.insert(motor(&bus, 0x01, 1)).unwrap();

        let frame = DmFrame::new_standard(0x11, &[0x01, 0x00, TAG_REGISTER_READ, 10, 1, 0, 0, 0]);
        match registry.route(&frame) {
            Route::Register { motor, rid, value } => {
                assert_eq!(motor.command_id(), 0x01);
                assert_eq!(rid, RegisterId::CTRL_MODE);
                assert_eq!(value, [1, 0, 0, 0]);
            },
            _ => panic!("expected register route"),
        }
    }

    #[test]
    fn test_reply_tag_with_unknown_command_id_falls_back_to_feedback() {
        let bus = test_bus();
        let registry = MotorRegistry::new();
        registry.insert(motor(&bus, 0x01, 1)).unwrap();

        // Byte 2 恰好是 0x33 的反馈帧：Byte 0-1 = 0x8011 不是命令 ID
        let frame = DmFrame::new_standard(0x11, &[0x11, 0x80, 0x33, 0x80, 0x08, 0, 30, 30]);
        assert!(matches!(registry.route(&frame), Route::Feedback(_)));
    }
}
