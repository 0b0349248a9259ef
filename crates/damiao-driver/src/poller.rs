//! 后台轮询状态机
//!
//! `Idle → Running → Stopping → Idle`，状态、代数（generation）和线程句柄在同一把锁下。
//! 每次启动递增代数，工作线程每轮检查"仍是 Running 且代数未变"，
//! 因此停止后立即重启不会让旧线程继续工作。

use crate::error::DriverError;
use parking_lot::Mutex;
use std::thread::{JoinHandle, spawn};
use std::time::Duration;
use tracing::{debug, error, warn};

/// 轮询状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollingState {
    /// 没有工作线程
    Idle,
    /// 工作线程正在运行
    Running,
    /// 已请求停止，等待线程退出
    Stopping,
}

/// Extension trait for timeout-capable thread joins
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        use crossbeam_channel::{RecvTimeoutError, bounded};

        let (tx, rx) = bounded(1);

        // 看门狗线程负责 join，超时后继续在后台等待
        spawn(move || {
            let _ = tx.send(self.join());
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

struct PollerInner {
    state: PollingState,
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

pub(crate) struct Poller {
    inner: Mutex<PollerInner>,
}

impl Poller {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(PollerInner {
                state: PollingState::Idle,
                generation: 0,
                handle: None,
            }),
        }
    }

    pub(crate) fn state(&self) -> PollingState {
        self.inner.lock().state
    }

    /// 启动工作线程（只在 Idle 时生效）
    ///
    /// `spawn_worker` 收到本次的代数。返回是否真的启动了新线程。
    pub(crate) fn start<F>(&self, spawn_worker: F) -> Result<bool, DriverError>
    where
        F: FnOnce(u64) -> std::io::Result<JoinHandle<()>>,
    {
        let mut inner = self.inner.lock();
        if inner.state != PollingState::Idle {
            return Ok(false);
        }

        let generation = inner.generation.wrapping_add(1);
        // 锁在 spawn 期间一直持有，新线程第一次检查时一定看到 Running
        let handle = spawn_worker(generation)
            .map_err(|e| DriverError::PollingThread(e.to_string()))?;

        inner.generation = generation;
        inner.state = PollingState::Running;
        inner.handle = Some(handle);
        debug!("Polling started (generation {})", generation);
        Ok(true)
    }

    /// 工作线程每轮调用：是否继续
    pub(crate) fn should_continue(&self, generation: u64) -> bool {
        let inner = self.inner.lock();
        inner.state == PollingState::Running && inner.generation == generation
    }

    /// 工作线程自行退出（没有电机 / 传输错误）时调用
    pub(crate) fn finish(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.generation == generation && inner.state == PollingState::Running {
            inner.state = PollingState::Idle;
            inner.handle = None;
            debug!("Polling worker exited (generation {})", generation);
        }
    }

    /// 请求停止并在 `timeout` 内等待线程退出
    ///
    /// 返回线程是否在时限内退出（没有线程时为 `true`）。
    pub(crate) fn stop(&self, timeout: Duration) -> bool {
        let (handle, generation) = {
            let mut inner = self.inner.lock();
            if inner.state == PollingState::Running {
                inner.state = PollingState::Stopping;
            }
            (inner.handle.take(), inner.generation)
        };

        let joined = match handle {
            Some(handle) => match handle.join_timeout(timeout) {
                Ok(()) => true,
                Err(_e) => {
                    error!(
                        "Polling thread panicked or failed to shut down within {:?}",
                        timeout
                    );
                    false
                },
            },
            None => true,
        };

        let mut inner = self.inner.lock();
        if inner.generation == generation && inner.state == PollingState::Stopping {
            inner.state = PollingState::Idle;
            debug!("Polling stopped (generation {})", generation);
        } else if inner.state == PollingState::Running && inner.generation != generation {
            warn!("Polling restarted while stopping (generation {})", inner.generation);
        }
        joined
    }
}
