//! 最小示例：让一个 DM4310 跟随缓慢的正弦位置
//!
//! ```bash
//! sudo ip link set can0 up type can bitrate 1000000
//! cargo run --example sine_position -- can0
//! ```
//!
//! 按 Ctrl+C 结束（进程退出时控制器 Drop 会失能电机并释放总线）。

#[cfg(target_os = "linux")]
fn main() -> Result<(), damiao_sdk::DriverError> {
    use damiao_sdk::prelude::*;
    use std::thread;
    use std::time::{Duration, Instant};

    damiao_sdk::init_logger();

    let interface = std::env::args().nth(1).unwrap_or_else(|| "can0".to_string());
    let controller = ControllerBuilder::new()
        .interface(interface)
        .motor(0x01, 0x01, "DM4310")
        .build()?;
    let motor = controller
        .get_motor(0x01)
        .ok_or(DriverError::MotorNotFound { command_id: 0x01 })?;

    controller.enable_all()?;
    thread::sleep(Duration::from_millis(100));
    motor.ensure_control_mode(ControlMode::Mit)?;

    let start = Instant::now();
    loop {
        let t = start.elapsed().as_secs_f32();
        motor.send_cmd_mit((0.2 * t).sin(), 0.0, 1.0, 0.5, 0.0)?;

        if let Some(state) = motor.get_states() {
            println!(
                "pos={:+.3} rad  vel={:+.3} rad/s  tau={:+.3} Nm  T_mos={}°C  T_rotor={}°C  status={:?}",
                state.position,
                state.velocity,
                state.torque,
                state.temperature_mos,
                state.temperature_rotor,
                state.status
            );
        }
        thread::sleep(Duration::from_millis(100));
    }
}

#[cfg(not(target_os = "linux"))]
fn main() {
    eprintln!("This example requires SocketCAN (Linux only).");
}
