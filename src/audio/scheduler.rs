//! 一次性延迟任务 - 在 tokio 定时器上执行音频恢复
//!
//! 没有取消接口：任务一旦调度，只有进程退出才会丢弃它。

use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::{AlertError, Result};

pub type RestoreTask = Box<dyn FnOnce() + Send + 'static>;

/// 延迟执行器
pub trait RestoreScheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: RestoreTask) -> RestoreHandle;
}

/// 已调度的恢复任务，只能等待，不能取消
pub struct RestoreHandle {
    inner: JoinHandle<()>,
}

impl RestoreHandle {
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    /// 等待恢复执行完毕（短生命周期进程在退出前调用）
    pub async fn wait(self) {
        if let Err(e) = self.inner.await {
            warn!(error = %e, "Restore task did not complete");
        }
    }
}

/// 基于 tokio 运行时的调度器
#[derive(Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// 绑定当前 tokio 运行时；不在运行时内返回 `Initialization`
    pub fn new() -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| AlertError::Initialization(format!("no tokio runtime: {}", e)))?;
        Ok(Self { handle })
    }

    pub fn with_handle(handle: Handle) -> Self {
        Self { handle }
    }
}

impl RestoreScheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: RestoreTask) -> RestoreHandle {
        let inner = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
        RestoreHandle { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_new_outside_runtime_fails() {
        let err = TokioScheduler::new().err().unwrap();
        assert!(matches!(err, AlertError::Initialization(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_fires_after_delay() {
        let scheduler = TokioScheduler::new().unwrap();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();

        let start = tokio::time::Instant::now();
        let handle = scheduler.schedule(
            Duration::from_millis(300),
            Box::new(move || flag.store(true, Ordering::SeqCst)),
        );

        tokio::time::advance(Duration::from_millis(299)).await;
        tokio::task::yield_now().await;
        assert!(!fired.load(Ordering::SeqCst));

        handle.wait().await;
        assert!(fired.load(Ordering::SeqCst));
        assert!(start.elapsed() >= Duration::from_millis(300));
    }
}
