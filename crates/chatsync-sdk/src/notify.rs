//! 用户提示（toast）

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::events::{now_millis, ChatEvent, EventManager};

/// 提示类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    /// 非当前会话收到新消息
    NewMessage,
    Success,
    Info,
    Error,
}

/// 提示输出端（由 UI 层实现）
pub trait NotificationSink: Send + Sync {
    fn notify(&self, kind: NotificationKind, message: &str);

    fn notify_error(&self, message: &str);
}

/// 通过事件总线转发提示
pub struct EventNotificationSink {
    event_manager: Arc<EventManager>,
}

impl EventNotificationSink {
    pub fn new(event_manager: Arc<EventManager>) -> Self {
        Self { event_manager }
    }
}

impl NotificationSink for EventNotificationSink {
    fn notify(&self, kind: NotificationKind, message: &str) {
        info!("🔔 {:?}: {}", kind, message);
        self.event_manager.emit(ChatEvent::Notification {
            kind,
            text: message.to_string(),
            timestamp: now_millis(),
        });
    }

    fn notify_error(&self, message: &str) {
        warn!("❌ {}", message);
        self.event_manager.emit(ChatEvent::Notification {
            kind: NotificationKind::Error,
            text: message.to_string(),
            timestamp: now_millis(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_sink_forwards_notifications() {
        let event_manager = Arc::new(EventManager::new(8));
        let mut receiver = event_manager.subscribe();
        let sink = EventNotificationSink::new(event_manager.clone());

        sink.notify(NotificationKind::NewMessage, "New message received!");
        sink.notify_error("Message failed to send");

        match receiver.try_recv().unwrap() {
            ChatEvent::Notification { kind, text, .. } => {
                assert_eq!(kind, NotificationKind::NewMessage);
                assert_eq!(text, "New message received!");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        match receiver.try_recv().unwrap() {
            ChatEvent::Notification { kind, text, .. } => {
                assert_eq!(kind, NotificationKind::Error);
                assert_eq!(text, "Message failed to send");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
