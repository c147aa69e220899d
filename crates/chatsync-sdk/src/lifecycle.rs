//! 连接生命周期管理
//!
//! 连接层在连接建立 / 断开时通知各模块，统一触发订阅的挂载与卸载。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::Result;
use crate::transport::Transport;

/// 连接生命周期回调 Hook
///
/// 各模块通过实现此 trait 来响应连接变化
#[async_trait]
pub trait ConnectionLifecycleHook: Send + Sync {
    /// 连接建立（含重连）后调用
    async fn on_connected(&self, transport: Arc<dyn Transport>) -> Result<()>;

    /// 连接断开后调用
    async fn on_disconnected(&self) -> Result<()>;
}

/// 生命周期管理器
pub struct LifecycleManager {
    hooks: Vec<Arc<dyn ConnectionLifecycleHook>>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    /// 注册生命周期回调 Hook
    pub fn register_hook(&mut self, hook: Arc<dyn ConnectionLifecycleHook>) {
        self.hooks.push(hook);
        info!("✅ 生命周期 Hook 已注册: 当前共 {} 个", self.hooks.len());
    }

    /// 通知所有 Hook：连接已建立
    ///
    /// 按注册顺序执行，某个 Hook 失败时记录错误并继续，最后返回第一个错误
    pub async fn notify_connected(&self, transport: Arc<dyn Transport>) -> Result<()> {
        info!("🔄 通知所有模块：连接已建立");

        let mut errors = Vec::new();
        for (index, hook) in self.hooks.iter().enumerate() {
            if let Err(e) = hook.on_connected(transport.clone()).await {
                warn!("⚠️ Hook #{} 处理连接建立失败: {}", index, e);
                errors.push(e);
            }
        }

        Self::first_error(errors, "连接建立")
    }

    /// 通知所有 Hook：连接已断开
    pub async fn notify_disconnected(&self) -> Result<()> {
        info!("🔄 通知所有模块：连接已断开");

        let mut errors = Vec::new();
        for (index, hook) in self.hooks.iter().enumerate() {
            if let Err(e) = hook.on_disconnected().await {
                warn!("⚠️ Hook #{} 处理连接断开失败: {}", index, e);
                errors.push(e);
            }
        }

        Self::first_error(errors, "连接断开")
    }

    fn first_error(errors: Vec<crate::error::ChatSyncError>, stage: &str) -> Result<()> {
        let failed = errors.len();
        match errors.into_iter().next() {
            Some(first) => {
                warn!("⚠️ {} 个模块{}处理失败，但所有模块都已尝试执行", failed, stage);
                Err(first)
            }
            None => {
                info!("✅ 所有模块{}处理完成", stage);
                Ok(())
            }
        }
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatSyncError;
    use crate::transport::LocalTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHook {
        connected: AtomicUsize,
        disconnected: AtomicUsize,
        fail: bool,
    }

    impl CountingHook {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                connected: AtomicUsize::new(0),
                disconnected: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl ConnectionLifecycleHook for CountingHook {
        async fn on_connected(&self, _transport: Arc<dyn Transport>) -> Result<()> {
            self.connected.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ChatSyncError::Transport("hook failed".to_string()));
            }
            Ok(())
        }

        async fn on_disconnected(&self) -> Result<()> {
            self.disconnected.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_all_hooks_run_even_if_one_fails() {
        let failing = CountingHook::new(true);
        let healthy = CountingHook::new(false);

        let mut manager = LifecycleManager::new();
        manager.register_hook(failing.clone());
        manager.register_hook(healthy.clone());
        assert_eq!(manager.hook_count(), 2);

        let result = manager.notify_connected(Arc::new(LocalTransport::new())).await;
        assert!(matches!(result, Err(ChatSyncError::Transport(_))));
        assert_eq!(failing.connected.load(Ordering::SeqCst), 1);
        assert_eq!(healthy.connected.load(Ordering::SeqCst), 1);

        manager.notify_disconnected().await.unwrap();
        assert_eq!(healthy.disconnected.load(Ordering::SeqCst), 1);
    }
}
