//! 入站消息订阅管理
//!
//! 传输层上同一频道任意时刻最多只有一个处理器：
//! 注册前总是先无条件移除旧的处理器（替换而不是叠加）。

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{ChatSyncError, Result};
use crate::transport::{EventHandler, Transport};

/// 订阅管理器
///
/// 调用传输层 `on_event` / `off_event` 时不持有内部锁，
/// 传输层可以在这两个调用里同步回调处理器。
pub struct SubscriptionManager {
    /// 传输层句柄（未连接时为 None）
    transport: RwLock<Option<Arc<dyn Transport>>>,
    /// 入站消息频道名
    channel: String,
    /// 当前是否持有处理器
    active: RwLock<bool>,
}

impl SubscriptionManager {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            transport: RwLock::new(None),
            channel: channel.into(),
            active: RwLock::new(false),
        }
    }

    /// 挂载传输层句柄（连接建立后由连接层调用）
    ///
    /// 旧句柄上的处理器会先被移除，需要时由调用方重新订阅。
    pub fn attach_transport(&self, transport: Arc<dyn Transport>) {
        self.unsubscribe();
        *self.transport.write() = Some(transport);
        debug!("Transport attached for channel {}", self.channel);
    }

    /// 卸载传输层句柄，同时移除处理器
    pub fn detach_transport(&self) {
        self.unsubscribe();
        *self.transport.write() = None;
        debug!("Transport detached for channel {}", self.channel);
    }

    pub fn has_transport(&self) -> bool {
        self.transport.read().is_some()
    }

    /// 注册处理器
    ///
    /// 先移除旧处理器再注册，重复调用不会导致一次事件触发多次。
    /// 传输层未就绪时返回 `NotConnected`，由重连逻辑负责重新订阅。
    pub fn subscribe(&self, handler: EventHandler) -> Result<()> {
        let transport = self.current_transport().ok_or_else(|| {
            debug!("📨 传输层未连接，跳过订阅: channel={}", self.channel);
            ChatSyncError::NotConnected
        })?;

        transport.off_event(&self.channel);
        transport.on_event(&self.channel, handler);
        *self.active.write() = true;

        info!("📨 已订阅入站消息: channel={}", self.channel);
        Ok(())
    }

    /// 移除处理器；没有处理器或未连接时为空操作
    pub fn unsubscribe(&self) {
        if let Some(transport) = self.current_transport() {
            transport.off_event(&self.channel);
        }
        let mut active = self.active.write();
        if *active {
            info!("📨 已取消订阅入站消息: channel={}", self.channel);
        }
        *active = false;
    }

    pub fn is_subscribed(&self) -> bool {
        *self.active.read()
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    fn current_transport(&self) -> Option<Arc<dyn Transport>> {
        self.transport.read().clone()
    }
}
