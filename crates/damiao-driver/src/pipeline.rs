//! 帧路由与后台轮询循环
//!
//! 一次排空（drain pass）：零超时接收直到总线为空，每帧只分类一次：
//!
//! 1. 长度不是 8 字节 → 丢弃
//! 2. Byte 2 是寄存器应答标记且 Byte 0-1 是已注册命令 ID → 寄存器路径
//! 3. 否则按 Byte 0 低 4 位查反馈索引 → 反馈路径，没有匹配则丢弃
//!
//! 手动 `poll_feedback()` 和后台线程共用同一个排空函数。

use crate::bus::Bus;
use crate::config::PollingConfig;
use crate::error::DriverError;
use crate::metrics::PollingMetrics;
use crate::poller::Poller;
use crate::registry::{MotorRegistry, Route};
use damiao_can::{DmFrame, frame_summary};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::{error, info, trace};

/// 控制器与工作线程共享的上下文
pub(crate) struct DriverContext {
    pub(crate) bus: Arc<Bus>,
    pub(crate) registry: MotorRegistry,
    pub(crate) poller: Poller,
    pub(crate) metrics: Arc<PollingMetrics>,
    pub(crate) config: PollingConfig,
}

/// 一次排空，返回读到的帧数
///
/// 路由失败的帧只计数不报错；传输层错误原样返回。
pub(crate) fn drain_pass(ctx: &DriverContext) -> Result<usize, DriverError> {
    let mut count = 0;
    while let Some(frame) = ctx.bus.try_receive()? {
        count += 1;
        dispatch_frame(&ctx.registry, &ctx.metrics, &frame);
    }
    ctx.metrics.drain_passes.fetch_add(1, Ordering::Relaxed);
    Ok(count)
}

fn dispatch_frame(registry: &MotorRegistry, metrics: &PollingMetrics, frame: &DmFrame) {
    if !frame.is_full() {
        trace!("Discarding frame with length {}: {}", frame.len, frame_summary(frame));
        metrics.discarded_length.fetch_add(1, Ordering::Relaxed);
        return;
    }

    // 分类在读锁内完成，分发前释放
    match registry.route(frame) {
        Route::Register { motor, rid, value } => {
            metrics.register_replies.fetch_add(1, Ordering::Relaxed);
            if !motor.handle_register_reply(rid, value) {
                trace!(
                    "Motor 0x{:03X}: no pending read for {}",
                    motor.command_id(),
                    rid
                );
            }
        },
        Route::Feedback(motor) => match motor.process_feedback_frame(frame) {
            Ok(()) => {
                metrics.feedback_dispatched.fetch_add(1, Ordering::Relaxed);
            },
            Err(e) => {
                trace!(
                    "Motor 0x{:03X}: malformed feedback ({}): {}",
                    motor.command_id(),
                    e,
                    frame_summary(frame)
                );
                metrics.discarded_malformed.fetch_add(1, Ordering::Relaxed);
            },
        },
        Route::Unrouted { logical_id } => {
            trace!(
                "No motor bound to logical id {}: {}",
                logical_id,
                frame_summary(frame)
            );
            metrics.discarded_unrouted.fetch_add(1, Ordering::Relaxed);
        },
    }
}

/// 丢弃总线上所有排队的帧，返回丢弃的帧数
pub(crate) fn flush(bus: &Bus) -> Result<usize, DriverError> {
    let mut count = 0;
    while bus.try_receive()?.is_some() {
        count += 1;
    }
    Ok(count)
}

/// 后台轮询循环
///
/// 每轮：检查状态机 → 没有电机则退出 → 排空 → 休眠 `poll_interval`。
/// 任何传输错误都会让线程把状态置回 Idle 并退出，不重试。
pub(crate) fn polling_loop(ctx: Arc<DriverContext>, generation: u64) {
    // 设置线程优先级（可选 feature）
    #[cfg(feature = "realtime")]
    {
        use thread_priority::*;
        use tracing::warn;

        match set_current_thread_priority(ThreadPriority::Max) {
            Ok(_) => {
                info!("Polling thread priority set to MAX (realtime)");
            },
            Err(e) => {
                warn!(
                    "Failed to set polling thread priority: {}. \
                    On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                    e
                );
            },
        }
    }

    let interval = ctx.config.poll_interval();
    info!(
        "[{}] polling thread started (interval {:?})",
        ctx.bus.channel(),
        interval
    );

    loop {
        if !ctx.poller.should_continue(generation) {
            trace!("Polling thread: stop requested, exiting");
            break;
        }

        if ctx.registry.is_empty() {
            ctx.poller.finish(generation);
            break;
        }

        if let Err(e) = drain_pass(&ctx) {
            match e {
                DriverError::ShutDown => {
                    trace!("Polling thread: bus closed, exiting");
                },
                DriverError::TransportDown { ref channel } => {
                    error!(
                        "Polling thread: CAN interface '{}' is down, stopping polling",
                        channel
                    );
                },
                ref other => {
                    error!("Polling thread: {}, stopping polling", other);
                },
            }
            ctx.poller.finish(generation);
            break;
        }

        // 使用 spin_sleep 而非 thread::sleep 以获得微秒级精度
        spin_sleep::sleep(interval);
    }

    trace!("[{}] polling thread (generation {}) exited", ctx.bus.channel(), generation);
}
