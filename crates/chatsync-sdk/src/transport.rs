//! 传输层句柄
//!
//! 持久双向连接由外部负责建立（socket.io / WebSocket 等），
//! SDK 只依赖事件订阅与取消订阅两个原语。

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

/// 事件处理器（收到的是原始 JSON 负载）
pub type EventHandler = Arc<dyn Fn(serde_json::Value) + Send + Sync>;

/// 传输层句柄 trait（由连接层实现）
///
/// 实现可以在 `on_event` / `off_event` 内同步调用处理器（例如投递积压事件），
/// SDK 调用这两个方法时不持有会话状态锁。
pub trait Transport: Send + Sync {
    /// 为频道注册处理器（与已有处理器叠加，不做替换）
    fn on_event(&self, channel: &str, handler: EventHandler);

    /// 移除频道上的全部处理器
    fn off_event(&self, channel: &str);
}

/// 进程内传输实现
///
/// 与 socket.io 客户端语义一致：`on_event` 叠加注册，`off_event` 清除全部。
/// 用于本地联调和测试。
#[derive(Default)]
pub struct LocalTransport {
    handlers: RwLock<HashMap<String, Vec<EventHandler>>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 向频道投递一条事件，返回被调用的处理器数量
    pub fn emit(&self, channel: &str, payload: serde_json::Value) -> usize {
        // 先复制一份再调用，避免处理器内重新订阅时死锁
        let handlers: Vec<EventHandler> = self
            .handlers
            .read()
            .get(channel)
            .cloned()
            .unwrap_or_default();

        debug!("LocalTransport emit: channel={}, handlers={}", channel, handlers.len());
        for handler in &handlers {
            handler(payload.clone());
        }
        handlers.len()
    }

    /// 频道上当前注册的处理器数量
    pub fn handler_count(&self, channel: &str) -> usize {
        self.handlers.read().get(channel).map_or(0, |v| v.len())
    }
}

impl Transport for LocalTransport {
    fn on_event(&self, channel: &str, handler: EventHandler) {
        self.handlers
            .write()
            .entry(channel.to_string())
            .or_default()
            .push(handler);
    }

    fn off_event(&self, channel: &str) {
        self.handlers.write().remove(channel);
    }
}
