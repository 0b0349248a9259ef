//! 共享总线句柄
//!
//! 发送方（调用线程）和排空方（轮询线程）共用一个适配器，
//! 锁只在单帧收发期间持有。

use crate::error::DriverError;
use crate::metrics::PollingMetrics;
use damiao_can::{CanAdapter, DmFrame, frame_summary};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, trace, warn};

pub(crate) type BoxedAdapter = Box<dyn CanAdapter + Send>;

pub(crate) struct Bus {
    adapter: Mutex<BoxedAdapter>,
    channel: String,
    closed: AtomicBool,
    metrics: Arc<PollingMetrics>,
}

impl Bus {
    pub(crate) fn new(adapter: BoxedAdapter, metrics: Arc<PollingMetrics>) -> Self {
        let channel = adapter.channel().to_string();
        Self {
            adapter: Mutex::new(adapter),
            channel,
            closed: AtomicBool::new(false),
            metrics,
        }
    }

    pub(crate) fn channel(&self) -> &str {
        &self.channel
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// 发送一帧，不等待应答
    pub(crate) fn send(&self, frame: DmFrame) -> Result<(), DriverError> {
        if self.is_closed() {
            return Err(DriverError::ShutDown);
        }
        trace!("[{}] tx {}", self.channel, frame_summary(&frame));

        let result = self.adapter.lock().send(frame);
        match result {
            Ok(()) => {
                self.metrics.frames_sent.fetch_add(1, Ordering::Relaxed);
                Ok(())
            },
            Err(e) => {
                self.metrics.transport_errors.fetch_add(1, Ordering::Relaxed);
                Err(e.into())
            },
        }
    }

    /// 零超时接收：`Ok(None)` 表示当前没有排队的帧
    pub(crate) fn try_receive(&self) -> Result<Option<DmFrame>, DriverError> {
        if self.is_closed() {
            return Err(DriverError::ShutDown);
        }

        let result = self.adapter.lock().try_receive();
        match result {
            Ok(Some(frame)) => {
                self.metrics.frames_received.fetch_add(1, Ordering::Relaxed);
                Ok(Some(frame))
            },
            Ok(None) => Ok(None),
            Err(e) => {
                self.metrics.transport_errors.fetch_add(1, Ordering::Relaxed);
                Err(e.into())
            },
        }
    }

    /// 释放底层传输，只执行一次
    pub(crate) fn shutdown(&self) -> Result<(), DriverError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        if let Err(e) = self.adapter.lock().shutdown() {
            warn!("[{}] adapter shutdown failed: {}", self.channel, e);
            return Err(e.into());
        }
        info!("[{}] CAN bus released", self.channel);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use damiao_can::MockCanAdapter;

    fn mock_bus() -> (Bus, damiao_can::MockCanHandle) {
        let (adapter, handle) = MockCanAdapter::new("mock0");
        (Bus::new(Box::new(adapter), Arc::new(PollingMetrics::new())), handle)
    }

    #[test]
    fn test_send_counts_frames() {
        let (bus, handle) = mock_bus();
        bus.send(DmFrame::new_standard(0x01, &[0; 8])).unwrap();
        assert_eq!(handle.sent_frames().len(), 1);
        assert_eq!(bus.metrics.snapshot().frames_sent, 1);
        assert_eq!(bus.channel(), "mock0");
    }

    #[test]
    fn test_network_down_is_transport_down() {
        let (bus, handle) = mock_bus();
        handle.set_network_down(true);
        match bus.try_receive() {
            Err(DriverError::TransportDown { channel }) => assert_eq!(channel, "mock0"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(bus.metrics.snapshot().transport_errors, 1);
    }

    #[test]
    fn test_shutdown_once() {
        let (bus, handle) = mock_bus();
        bus.shutdown().unwrap();
        bus.shutdown().unwrap();
        assert_eq!(handle.shutdown_calls(), 1);
        assert!(matches!(
            bus.send(DmFrame::new_standard(0x01, &[0; 8])),
            Err(DriverError::ShutDown)
        ));
        assert!(matches!(bus.try_receive(), Err(DriverError::ShutDown)));
    }
}
