//! 控制器集成测试
//!
//! 使用 Mock 适配器验证多电机控制器的端到端行为：
//! 1. 注册与 ID 冲突
//! 2. 帧路由（长度、逻辑 ID、寄存器应答）
//! 3. 轮询生命周期
//! 4. 关闭顺序

use damiao_sdk::can::{MockCanAdapter, MockCanHandle};
use damiao_sdk::prelude::*;
use damiao_sdk::protocol::{
    CMD_DISABLE, CMD_ENABLE, ID_REGISTER, MotorFeedback, RegisterReply, TAG_REGISTER_READ,
    TAG_REGISTER_WRITE,
};
use damiao_sdk::{DmFrame, MotorLimits, PollingState};
use rand::Rng;
use std::thread;
use std::time::Duration;

fn mock_controller() -> (MotorController, MockCanHandle) {
    let (adapter, handle) = MockCanAdapter::new("can0");
    (MotorController::new(adapter), handle)
}

fn feedback_frame(feedback_id: u8, mst_id: u16, position: f32, limits: &MotorLimits) -> DmFrame {
    MotorFeedback {
        feedback_id,
        status: MotorStatus::Enabled,
        position,
        velocity: 0.25,
        torque: -0.5,
        temperature_mos: 31,
        temperature_rotor: 34,
    }
    .to_frame(mst_id, limits)
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    cond()
}

#[test]
fn test_duplicate_command_id_rejected() {
    let (controller, _handle) = mock_controller();
    let first = controller.add_motor(0x01, 0x01, MotorType::Dm4310).unwrap();

    let result = controller.add_motor(0x01, 0x02, MotorType::Dm4340);
    assert!(matches!(
        result,
        Err(DriverError::DuplicateMotor { command_id: 0x01 })
    ));

    // 原电机不受影响
    assert_eq!(controller.motor_count(), 1);
    let motor = controller.get_motor(0x01).unwrap();
    assert_eq!(motor.feedback_id(), first.feedback_id());
    assert_eq!(motor.motor_type(), MotorType::Dm4310);
}

#[test]
fn test_get_states_is_none_before_feedback() {
    let (controller, _handle) = mock_controller();
    let motor = controller.add_motor(0x01, 0x01, MotorType::Dm4310).unwrap();
    thread::sleep(Duration::from_millis(10));
    assert!(motor.get_states().is_none());
}

#[test]
fn test_end_to_end_mit_scenario() {
    let (controller, handle) = mock_controller();
    let motor = controller.add_motor(0x01, 0x01, MotorType::Dm4310).unwrap();
    let limits = motor.limits();

    // 电机收到 MIT 指令后回一帧反馈（MST_ID = 0x11）
    handle.set_responder(move |frame| {
        if frame.id == 0x001 && frame.data[..7] != [0xFF; 7] {
            vec![feedback_frame(0x01, 0x11, 0.0, &limits)]
        } else {
            Vec::new()
        }
    });

    controller.enable_all().unwrap();
    motor.ensure_control_mode(ControlMode::Mit).unwrap();
    motor.send_cmd_mit(0.0, 0.0, 1.0, 0.5, 0.0).unwrap();

    let sent = handle.sent_frames();
    assert_eq!(sent.len(), 2, "enable + MIT, no mode switch needed");
    assert_eq!(sent[0].id, 0x001);
    assert_eq!(sent[0].data, [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, CMD_ENABLE]);
    assert_eq!(sent[1].id, 0x001);
    assert_eq!(sent[1].data, [0x80, 0x00, 0x80, 0x00, 0x08, 0x19, 0xA8, 0x00]);

    assert!(wait_until(Duration::from_secs(1), || motor.get_states().is_some()));
    let state = motor.get_states().unwrap();
    assert_eq!(state.feedback_id, 0x01);
    assert_eq!(state.arbitration_id, 0x11);
    assert_eq!(state.status, MotorStatus::Enabled);
    assert!(state.position.abs() < 1e-3);
    assert!((state.velocity - 0.25).abs() < 0.02);
    assert!((state.torque + 0.5).abs() < 0.01);
    assert_eq!(state.temperature_mos, 31);
    assert_eq!(state.temperature_rotor, 34);

    controller.shutdown().unwrap();
}

#[test]
fn test_length_seven_frame_discarded() {
    let (controller, handle) = mock_controller();
    let motor = controller.add_motor(0x01, 0x01, MotorType::Dm4310).unwrap();
    assert!(controller.stop_polling());
    controller.reset_metrics();

    let full = feedback_frame(0x01, 0x11, 1.0, &motor.limits());
    handle.inject(DmFrame::new_standard(0x11, &full.data[..7]));

    assert_eq!(controller.poll_feedback().unwrap(), 1);
    assert!(motor.get_states().is_none());

    let metrics = controller.metrics();
    assert_eq!(metrics.discarded_length, 1);
    assert_eq!(metrics.feedback_dispatched, 0);
}

#[test]
fn test_unknown_logical_id_discarded() {
    let (controller, handle) = mock_controller();
    let motor = controller.add_motor(0x01, 0x01, MotorType::Dm4310).unwrap();
    let other = controller.add_motor(0x02, 0x02, MotorType::Dm4310).unwrap();
    assert!(controller.stop_polling());

    handle.inject(feedback_frame(0x05, 0x15, 1.0, &motor.limits()));
    controller.poll_feedback().unwrap();

    assert!(motor.get_states().is_none());
    assert!(other.get_states().is_none());
    assert_eq!(controller.metrics().discarded_unrouted, 1);
}

#[test]
fn test_frames_routed_to_matching_motor_only() {
    let (controller, handle) = mock_controller();
    let m1 = controller.add_motor(0x01, 0x01, MotorType::Dm4310).unwrap();
    let m2 = controller.add_motor(0x02, 0x02, MotorType::Dm8009).unwrap();
    assert!(controller.stop_polling());

    handle.inject(feedback_frame(0x02, 0x12, -2.0, &m2.limits()));
    controller.poll_feedback().unwrap();

    assert!(m1.get_states().is_none());
    let state = m2.get_states().unwrap();
    assert!((state.position + 2.0).abs() < 1e-2);
}

#[test]
fn test_double_start_and_restart() {
    let (controller, _handle) = mock_controller();
    controller.add_motor(0x01, 0x01, MotorType::Dm4310).unwrap();
    assert_eq!(controller.polling_state(), PollingState::Running);

    // 已经在运行，不会启动第二个线程
    assert!(!controller.start_polling().unwrap());
    assert!(!controller.start_polling().unwrap());

    assert!(controller.stop_polling());
    assert_eq!(controller.polling_state(), PollingState::Idle);

    assert!(controller.start_polling().unwrap());
    assert!(controller.is_polling());

    // 重启后的线程仍然在工作
    let before = controller.metrics().drain_passes;
    assert!(wait_until(Duration::from_secs(1), || {
        controller.metrics().drain_passes > before
    }));
}

#[test]
fn test_register_read_through_background_polling() {
    let (controller, handle) = mock_controller();
    let motor = controller.add_motor(0x01, 0x01, MotorType::Dm4310).unwrap();

    handle.set_responder(|frame| {
        if frame.id != ID_REGISTER as u32 || frame.data[2] != TAG_REGISTER_READ {
            return Vec::new();
        }
        let value = match frame.data[3] {
            21 => 12.5f32.to_le_bytes(),
            10 => 1u32.to_le_bytes(),
            _ => [0; 4],
        };
        vec![
            RegisterReply {
                command_id: u16::from_le_bytes([frame.data[0], frame.data[1]]),
                tag: TAG_REGISTER_READ,
                rid: RegisterId(frame.data[3]),
                value,
            }
            .to_frame(0x11),
        ]
    });

    let p_max = motor
        .read_register(RegisterId::PMAX, Some(Duration::from_millis(500)))
        .unwrap();
    assert_eq!(p_max, RegisterValue::F32(12.5));

    let mode = motor.read_register(RegisterId::CTRL_MODE, None).unwrap();
    assert_eq!(mode.as_u32(), Some(1));

    // 寄存器应答不会覆盖反馈状态
    assert!(motor.get_states().is_none());
    assert_eq!(controller.metrics().register_replies, 2);
}

#[test]
fn test_register_read_times_out_without_reply() {
    let (controller, _handle) = mock_controller();
    let motor = controller.add_motor(0x01, 0x01, MotorType::Dm4310).unwrap();
    let result = motor.read_register(RegisterId::SW_VER, Some(Duration::from_millis(20)));
    assert!(matches!(result, Err(DriverError::RegisterTimeout { .. })));
}

#[test]
fn test_mode_switch_writes_ctrl_mode_register() {
    let (controller, handle) = mock_controller();
    let motor = controller.add_motor(0x03, 0x03, MotorType::Dm4340).unwrap();

    motor.ensure_control_mode(ControlMode::PosVel).unwrap();
    motor.send_cmd_pos_vel(1.0, 2.0).unwrap();

    let sent = handle.sent_frames();
    assert_eq!(sent[0].id, ID_REGISTER as u32);
    assert_eq!(sent[0].data, [0x03, 0x00, TAG_REGISTER_WRITE, 10, 2, 0, 0, 0]);
    assert_eq!(sent[1].id, 0x103);
    assert_eq!(sent[1].data[..4], 1.0f32.to_le_bytes());
    assert_eq!(sent[1].data[4..], 2.0f32.to_le_bytes());

    assert!(matches!(
        controller.send_cmd(0x03, 0.0, 0.0, 0.0, 0.0, 0.0),
        Err(DriverError::InvalidMode {
            expected: ControlMode::Mit,
            actual: ControlMode::PosVel
        })
    ));
}

#[test]
fn test_random_noise_never_breaks_routing() {
    let (controller, handle) = mock_controller();
    let motor = controller.add_motor(0x01, 0x01, MotorType::Dm4310).unwrap();
    assert!(controller.stop_polling());
    controller.reset_metrics();

    let mut rng = rand::thread_rng();
    for _ in 0..500 {
        let len = rng.gen_range(0..=8);
        let mut data = [0u8; 8];
        rng.fill(&mut data[..]);
        // 避开电机 1 的逻辑 ID，保证不会被路由
        data[0] = (data[0] & 0xF0) | rng.gen_range(2..16);
        handle.inject(DmFrame::new_standard(rng.gen_range(0..0x7FF), &data[..len]));
    }

    assert_eq!(controller.poll_feedback().unwrap(), 500);
    assert!(motor.get_states().is_none());

    let metrics = controller.metrics();
    assert_eq!(metrics.frames_received, 500);
    assert_eq!(metrics.discarded_total(), 500);
}

#[test]
fn test_config_file_builds_controller() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("motors.toml");
    std::fs::write(
        &path,
        r#"
interface = "can0"

[polling]
poll_interval_us = 500
stop_timeout_ms = 50

[[motors]]
command_id = 1
feedback_id = 1
motor_type = "DM4310"

[[motors]]
command_id = 2
feedback_id = 2
motor_type = "DM6006"
"#,
    )
    .unwrap();

    let config = ControllerConfig::from_file(&path).unwrap();
    let (adapter, _handle) = MockCanAdapter::new(config.interface.clone());
    let controller = ControllerBuilder::from_config(config)
        .build_with_adapter(adapter)
        .unwrap();

    assert_eq!(controller.channel(), "can0");
    assert_eq!(controller.polling_config().poll_interval_us, 500);
    let types: Vec<MotorType> = controller.motors().iter().map(|m| m.motor_type()).collect();
    assert_eq!(types, vec![MotorType::Dm4310, MotorType::Dm6006]);
}

#[test]
fn test_shutdown_order() {
    let (controller, handle) = mock_controller();
    controller.add_motor(0x01, 0x01, MotorType::Dm4310).unwrap();
    controller.add_motor(0x02, 0x02, MotorType::Dm4310).unwrap();
    controller.enable_all().unwrap();

    // 记录失能帧的发送顺序
    let (tx, rx) = crossbeam_channel::unbounded();
    handle.set_responder(move |frame| {
        if frame.data[7] == CMD_DISABLE {
            let _ = tx.send(frame.id);
        }
        Vec::new()
    });

    controller.shutdown().unwrap();
    let disabled: Vec<u32> = rx.try_iter().collect();
    assert_eq!(disabled, vec![0x001, 0x002]);
    assert!(handle.is_closed());
    assert_eq!(handle.shutdown_calls(), 1);
    assert_eq!(controller.polling_state(), PollingState::Idle);

    for motor in controller.motors() {
        assert!(!motor.is_enabled());
    }

    // 幂等
    controller.shutdown().unwrap();
    assert_eq!(handle.shutdown_calls(), 1);
}

#[test]
fn test_motor_outlives_controller() {
    let (controller, _handle) = mock_controller();
    let motor = controller.add_motor(0x01, 0x01, MotorType::Dm4310).unwrap();
    drop(controller);

    assert!(matches!(motor.enable(), Err(DriverError::ShutDown)));
    assert!(motor.get_states().is_none());
}
