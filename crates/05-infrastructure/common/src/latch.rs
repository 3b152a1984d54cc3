//! 重量级操作标记
//!
//! 服务构造期间持有，后台维护任务（存储刷新等）观察到标记后暂停自己的工作。
//! 标记不阻塞服务解析本身。

use once_cell::sync::Lazy;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::trace;

static GLOBAL_LATCH: Lazy<Arc<HeavyProcessLatch>> =
    Lazy::new(|| Arc::new(HeavyProcessLatch::new()));

/// 引用计数的重量级操作标记
#[derive(Debug)]
pub struct HeavyProcessLatch {
    active: watch::Sender<usize>,
}

impl HeavyProcessLatch {
    /// 创建新的标记
    pub fn new() -> Self {
        let (active, _) = watch::channel(0);
        Self { active }
    }

    /// 进程级默认实例
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL_LATCH)
    }

    /// 标记一个重量级操作开始，守卫释放时结束
    pub fn process_started(&self, operation: &str) -> HeavyProcessGuard<'_> {
        self.active.send_modify(|count| *count += 1);
        trace!("重量级操作开始: {}", operation);
        HeavyProcessGuard { latch: self }
    }

    /// 当前是否有重量级操作进行中
    pub fn is_running(&self) -> bool {
        self.active_count() > 0
    }

    /// 进行中的重量级操作数量
    pub fn active_count(&self) -> usize {
        *self.active.borrow()
    }

    /// 等待所有重量级操作结束
    pub async fn wait_until_idle(&self) {
        let mut receiver = self.active.subscribe();
        // 发送端由 self 持有，等待不会因通道关闭而失败
        let _ = receiver.wait_for(|count| *count == 0).await;
    }

    fn process_finished(&self) {
        self.active.send_modify(|count| *count = count.saturating_sub(1));
    }
}

impl Default for HeavyProcessLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// 重量级操作守卫
///
/// 在所有退出路径（包括 panic 展开）上释放标记。
#[must_use = "守卫被丢弃时标记立即释放"]
#[derive(Debug)]
pub struct HeavyProcessGuard<'a> {
    latch: &'a HeavyProcessLatch,
}

impl Drop for HeavyProcessGuard<'_> {
    fn drop(&mut self) {
        self.latch.process_finished();
    }
}
