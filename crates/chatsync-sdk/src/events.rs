//! 事件系统模块 - 供渲染层观察会话状态变化
//!
//! 功能包括：
//! - 会话选择变更事件
//! - 消息列表重置 / 追加事件
//! - 联系人排序变更事件
//! - 加载状态与用户提示事件
//! - 事件广播和订阅机制

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::notify::NotificationKind;

/// 当前 UTC 毫秒时间戳
pub(crate) fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// SDK 事件类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChatEvent {
    /// 当前会话变更（None 表示没有选中会话）
    SelectionChanged {
        contact_id: Option<String>,
        timestamp: u64,
    },
    /// 消息列表整体替换（清空或加载历史）
    MessagesReset {
        contact_id: Option<String>,
        count: usize,
        timestamp: u64,
    },
    /// 当前会话追加了一条消息
    MessageAppended {
        contact_id: String,
        message_id: String,
        timestamp: u64,
    },
    /// 联系人被移到最前
    ContactsReordered {
        contact_id: String,
        timestamp: u64,
    },
    /// 联系人列表整体替换
    ContactsReplaced {
        count: usize,
        timestamp: u64,
    },
    /// 历史消息加载状态
    HistoryLoadingChanged {
        loading: bool,
        timestamp: u64,
    },
    /// 联系人加载状态
    ContactsLoadingChanged {
        loading: bool,
        timestamp: u64,
    },
    /// 面向用户的提示（toast）
    Notification {
        kind: NotificationKind,
        text: String,
        timestamp: u64,
    },
}

impl ChatEvent {
    /// 获取事件类型字符串
    pub fn event_type(&self) -> &'static str {
        match self {
            ChatEvent::SelectionChanged { .. } => "selection_changed",
            ChatEvent::MessagesReset { .. } => "messages_reset",
            ChatEvent::MessageAppended { .. } => "message_appended",
            ChatEvent::ContactsReordered { .. } => "contacts_reordered",
            ChatEvent::ContactsReplaced { .. } => "contacts_replaced",
            ChatEvent::HistoryLoadingChanged { .. } => "history_loading_changed",
            ChatEvent::ContactsLoadingChanged { .. } => "contacts_loading_changed",
            ChatEvent::Notification { .. } => "notification",
        }
    }

    /// 获取事件关联的联系人ID
    pub fn contact_id(&self) -> Option<&str> {
        match self {
            ChatEvent::SelectionChanged { contact_id, .. } => contact_id.as_deref(),
            ChatEvent::MessagesReset { contact_id, .. } => contact_id.as_deref(),
            ChatEvent::MessageAppended { contact_id, .. } => Some(contact_id),
            ChatEvent::ContactsReordered { contact_id, .. } => Some(contact_id),
            _ => None,
        }
    }

    /// 获取事件时间戳
    pub fn timestamp(&self) -> u64 {
        match self {
            ChatEvent::SelectionChanged { timestamp, .. }
            | ChatEvent::MessagesReset { timestamp, .. }
            | ChatEvent::MessageAppended { timestamp, .. }
            | ChatEvent::ContactsReordered { timestamp, .. }
            | ChatEvent::ContactsReplaced { timestamp, .. }
            | ChatEvent::HistoryLoadingChanged { timestamp, .. }
            | ChatEvent::ContactsLoadingChanged { timestamp, .. }
            | ChatEvent::Notification { timestamp, .. } => *timestamp,
        }
    }
}

/// 事件过滤器
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// 事件类型过滤器
    pub event_types: Option<Vec<String>>,
    /// 联系人ID过滤器
    pub contact_ids: Option<Vec<String>>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_types(mut self, event_types: Vec<String>) -> Self {
        self.event_types = Some(event_types);
        self
    }

    pub fn with_contact_ids(mut self, contact_ids: Vec<String>) -> Self {
        self.contact_ids = Some(contact_ids);
        self
    }

    /// 检查事件是否匹配过滤器
    pub fn matches(&self, event: &ChatEvent) -> bool {
        if let Some(ref types) = self.event_types {
            if !types.iter().any(|t| t == event.event_type()) {
                return false;
            }
        }

        if let Some(ref contact_ids) = self.contact_ids {
            match event.contact_id() {
                Some(id) if contact_ids.iter().any(|c| c == id) => {}
                // 事件没有联系人ID但过滤器要求有
                _ => return false,
            }
        }

        true
    }
}

/// 事件监听器类型
pub type EventListener = Box<dyn Fn(&ChatEvent) + Send + Sync>;

/// 事件统计信息
#[derive(Debug, Clone, Default)]
pub struct EventStats {
    /// 总事件数
    pub total_events: u64,
    /// 按类型分组的事件数
    pub events_by_type: HashMap<String, u64>,
    /// 监听器数量
    pub listener_count: usize,
    /// 最后事件时间
    pub last_event_time: Option<u64>,
}

/// 事件管理器
///
/// 发布是同步的：传输层回调里也能直接发布事件。
pub struct EventManager {
    /// 广播发送器
    sender: broadcast::Sender<ChatEvent>,
    /// 事件监听器映射（"*" 为通用监听器）
    listeners: Arc<RwLock<HashMap<String, Vec<EventListener>>>>,
    /// 事件统计
    stats: Arc<RwLock<EventStats>>,
}

impl EventManager {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));

        Self {
            sender,
            listeners: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(RwLock::new(EventStats::default())),
        }
    }

    /// 发布事件
    pub fn emit(&self, event: ChatEvent) {
        debug!("Emitting event: {}", event.event_type());

        {
            let mut stats = self.stats.write();
            stats.total_events += 1;
            *stats.events_by_type.entry(event.event_type().to_string()).or_insert(0) += 1;
            stats.last_event_time = Some(event.timestamp());
        }

        // 无订阅者时 send 会失败，属正常场景
        if let Err(e) = self.sender.send(event.clone()) {
            debug!("Failed to broadcast event (no active receivers): {}", e);
        }

        let listeners = self.listeners.read();
        if let Some(event_listeners) = listeners.get(event.event_type()) {
            for listener in event_listeners {
                listener(&event);
            }
        }
        if let Some(general_listeners) = listeners.get("*") {
            for listener in general_listeners {
                listener(&event);
            }
        }
    }

    /// 订阅全部事件
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.sender.subscribe()
    }

    /// 订阅满足过滤条件的事件
    pub fn subscribe_filtered(&self, filter: EventFilter) -> FilteredEventReceiver {
        FilteredEventReceiver::new(self.sender.subscribe(), filter)
    }

    /// 添加事件监听器（event_type 为 "*" 时监听全部）
    pub fn add_listener<F>(&self, event_type: &str, listener: F)
    where
        F: Fn(&ChatEvent) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.write();
        listeners.entry(event_type.to_string()).or_default().push(Box::new(listener));

        self.stats.write().listener_count = listeners.values().map(|v| v.len()).sum();

        info!("Added listener for event type: {}", event_type);
    }

    /// 移除所有监听器
    pub fn clear_listeners(&self) {
        self.listeners.write().clear();
        self.stats.write().listener_count = 0;

        info!("Cleared all event listeners");
    }

    pub fn get_stats(&self) -> EventStats {
        self.stats.read().clone()
    }

    /// 获取活跃订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// 过滤事件接收器
pub struct FilteredEventReceiver {
    receiver: broadcast::Receiver<ChatEvent>,
    filter: EventFilter,
}

impl FilteredEventReceiver {
    pub fn new(receiver: broadcast::Receiver<ChatEvent>, filter: EventFilter) -> Self {
        Self { receiver, filter }
    }

    /// 接收下一个匹配的事件
    pub async fn recv(&mut self) -> Result<ChatEvent, broadcast::error::RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.filter.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// 尝试接收事件（非阻塞）
    pub fn try_recv(&mut self) -> Result<ChatEvent, broadcast::error::TryRecvError> {
        loop {
            let event = self.receiver.try_recv()?;
            if self.filter.matches(&event) {
                return Ok(event);
            }
        }
    }
}
