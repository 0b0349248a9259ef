//! Mock CAN 适配器
//!
//! 无硬件依赖的内存总线，用于测试和仿真：
//!
//! - [`MockCanAdapter`] 交给控制器持有，实现 [`CanAdapter`]
//! - [`MockCanHandle`] 留在测试侧，用于注入接收帧、查看已发送帧、模拟接口掉线
//!
//! 两者共享同一份状态，可以跨线程使用。

use crate::{CanAdapter, CanError, DmFrame, frame_summary};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

/// 发送钩子：根据发送的帧生成"电机应答"，应答会被放入接收队列
pub type Responder = Box<dyn FnMut(&DmFrame) -> Vec<DmFrame> + Send>;

#[derive(Default)]
struct MockBus {
    rx_queue: VecDeque<DmFrame>,
    sent: Vec<DmFrame>,
    network_down: bool,
    closed: bool,
    shutdown_calls: usize,
    responder: Option<Responder>,
}

/// Mock 适配器
pub struct MockCanAdapter {
    channel: String,
    bus: Arc<Mutex<MockBus>>,
}

/// Mock 总线的测试侧句柄
#[derive(Clone)]
pub struct MockCanHandle {
    channel: String,
    bus: Arc<Mutex<MockBus>>,
}

impl MockCanAdapter {
    /// 创建适配器及其句柄
    pub fn new(channel: impl Into<String>) -> (Self, MockCanHandle) {
        let channel = channel.into();
        let bus = Arc::new(Mutex::new(MockBus::default()));
        (
            Self {
                channel: channel.clone(),
                bus: bus.clone(),
            },
            MockCanHandle { channel, bus },
        )
    }

    fn network_down(&self) -> CanError {
        CanError::NetworkDown {
            channel: self.channel.clone(),
        }
    }
}

impl CanAdapter for MockCanAdapter {
    fn send(&mut self, frame: DmFrame) -> Result<(), CanError> {
        let mut bus = self.bus.lock();
        if bus.closed {
            return Err(CanError::Closed);
        }
        if bus.network_down {
            return Err(self.network_down());
        }

        trace!("[mock:{}] send {}", self.channel, frame_summary(&frame));
        bus.sent.push(frame);

        if let Some(responder) = bus.responder.as_mut() {
            let replies = responder(&frame);
            bus.rx_queue.extend(replies);
        }
        Ok(())
    }

    fn receive(&mut self) -> Result<DmFrame, CanError> {
        let mut bus = self.bus.lock();
        if bus.closed {
            return Err(CanError::Closed);
        }
        if bus.network_down {
            return Err(self.network_down());
        }
        bus.rx_queue.pop_front().ok_or(CanError::Timeout)
    }

    fn channel(&self) -> &str {
        &self.channel
    }

    fn shutdown(&mut self) -> Result<(), CanError> {
        let mut bus = self.bus.lock();
        bus.shutdown_calls += 1;
        bus.closed = true;
        Ok(())
    }
}

impl MockCanHandle {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// 注入一帧到接收队列末尾
    pub fn inject(&self, frame: DmFrame) {
        self.bus.lock().rx_queue.push_back(frame);
    }

    /// 按顺序注入多帧
    pub fn inject_all(&self, frames: impl IntoIterator<Item = DmFrame>) {
        self.bus.lock().rx_queue.extend(frames);
    }

    /// 尚未被读取的帧数
    pub fn pending_rx(&self) -> usize {
        self.bus.lock().rx_queue.len()
    }

    /// 已发送帧的快照
    pub fn sent_frames(&self) -> Vec<DmFrame> {
        self.bus.lock().sent.clone()
    }

    /// 取走已发送帧
    pub fn take_sent(&self) -> Vec<DmFrame> {
        std::mem::take(&mut self.bus.lock().sent)
    }

    /// 模拟接口掉线（收发都返回 `NetworkDown`）
    pub fn set_network_down(&self, down: bool) {
        self.bus.lock().network_down = down;
    }

    /// 设置发送钩子，模拟电机对指令的应答
    pub fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&DmFrame) -> Vec<DmFrame> + Send + 'static,
    {
        self.bus.lock().responder = Some(Box::new(responder));
    }

    pub fn clear_responder(&self) {
        self.bus.lock().responder = None;
    }

    /// `shutdown()` 被调用的次数
    pub fn shutdown_calls(&self) -> usize {
        self.bus.lock().shutdown_calls
    }

    pub fn is_closed(&self) -> bool {
        self.bus.lock().closed
    }
}
