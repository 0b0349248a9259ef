//! 轮询链路指标
//!
//! 所有计数器都是原子变量，可以在任意线程读取，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 轮询与路由计数器
///
/// ```rust
/// use damiao_driver::PollingMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = PollingMetrics::new();
/// metrics.frames_received.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().frames_received, 1);
/// ```
#[derive(Debug, Default)]
pub struct PollingMetrics {
    /// 完成的排空轮次（手动 + 后台）
    pub drain_passes: AtomicU64,
    /// 从总线读到的总帧数
    pub frames_received: AtomicU64,
    /// 已交给电机的反馈帧
    pub feedback_dispatched: AtomicU64,
    /// 已交给电机的寄存器应答
    pub register_replies: AtomicU64,
    /// 因长度不是 8 被丢弃
    pub discarded_length: AtomicU64,
    /// 没有匹配电机被丢弃（未知逻辑 ID）
    pub discarded_unrouted: AtomicU64,
    /// 解码失败被丢弃
    pub discarded_malformed: AtomicU64,
    /// 传输层错误次数
    pub transport_errors: AtomicU64,
    /// 发送的总帧数
    pub frames_sent: AtomicU64,
}

impl PollingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            drain_passes: self.drain_passes.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            feedback_dispatched: self.feedback_dispatched.load(Ordering::Relaxed),
            register_replies: self.register_replies.load(Ordering::Relaxed),
            discarded_length: self.discarded_length.load(Ordering::Relaxed),
            discarded_unrouted: self.discarded_unrouted.load(Ordering::Relaxed),
            discarded_malformed: self.discarded_malformed.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器（用于测试）
    pub fn reset(&self) {
        self.drain_passes.store(0, Ordering::Relaxed);
        self.frames_received.store(0, Ordering::Relaxed);
        self.feedback_dispatched.store(0, Ordering::Relaxed);
        self.register_replies.store(0, Ordering::Relaxed);
        self.discarded_length.store(0, Ordering::Relaxed);
        self.discarded_unrouted.store(0, Ordering::Relaxed);
        self.discarded_malformed.store(0, Ordering::Relaxed);
        self.transport_errors.store(0, Ordering::Relaxed);
        self.frames_sent.store(0, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub drain_passes: u64,
    pub frames_received: u64,
    pub feedback_dispatched: u64,
    pub register_replies: u64,
    pub discarded_length: u64,
    pub discarded_unrouted: u64,
    pub discarded_malformed: u64,
    pub transport_errors: u64,
    pub frames_sent: u64,
}

impl MetricsSnapshot {
    /// 被丢弃的帧总数
    pub fn discarded_total(&self) -> u64 {
        self.discarded_length + self.discarded_unrouted + self.discarded_malformed
    }

    /// 成功路由的帧占比（百分比），没有收到帧时返回 0.0
    pub fn routed_rate(&self) -> f64 {
        if self.frames_received == 0 {
            return 0.0;
        }
        ((self.feedback_dispatched + self.register_replies) as f64 / self.frames_received as f64)
            * 100.0
    }
}
