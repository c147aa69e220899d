//! 测试辅助：可编排的 ChatApi 与记录型提示输出端

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::{ChatSyncError, Result};
use crate::http_client::ChatApi;
use crate::models::{Contact, Message, MessagePayload};
use crate::notify::{NotificationKind, NotificationSink};

pub(crate) fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub(crate) fn msg(id: &str, sender: &str, receiver: &str, secs: i64) -> Message {
    Message {
        id: id.to_string(),
        sender_id: sender.to_string(),
        receiver_id: receiver.to_string(),
        text: Some(format!("text-{}", id)),
        image_ref: None,
        created_at: at(secs),
    }
}

pub(crate) fn contact(id: &str) -> Contact {
    Contact::new(id, format!("User {}", id))
}

/// 让出执行权直到条件满足（最多 200 次）
pub(crate) async fn wait_until<F: Fn() -> bool>(cond: F) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::task::yield_now().await;
    }
    cond()
}

/// 可编排的 ChatApi
pub(crate) struct MockChatApi {
    current_user_id: String,
    histories: Mutex<HashMap<String, Vec<Message>>>,
    history_gates: Mutex<HashMap<String, Arc<Notify>>>,
    send_gates: Mutex<HashMap<String, Arc<Notify>>>,
    contacts: Mutex<Vec<Contact>>,
    history_error: Mutex<Option<Option<String>>>,
    send_error: Mutex<Option<Option<String>>>,
    contacts_error: Mutex<Option<Option<String>>>,
    next_send_secs: AtomicUsize,
    pub history_calls: AtomicUsize,
    pub send_calls: AtomicUsize,
    pub contact_calls: AtomicUsize,
}

impl MockChatApi {
    pub fn new(current_user_id: &str) -> Arc<Self> {
        Arc::new(Self {
            current_user_id: current_user_id.to_string(),
            histories: Mutex::new(HashMap::new()),
            history_gates: Mutex::new(HashMap::new()),
            send_gates: Mutex::new(HashMap::new()),
            contacts: Mutex::new(Vec::new()),
            history_error: Mutex::new(None),
            send_error: Mutex::new(None),
            contacts_error: Mutex::new(None),
            next_send_secs: AtomicUsize::new(10_000),
            history_calls: AtomicUsize::new(0),
            send_calls: AtomicUsize::new(0),
            contact_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_history(&self, contact_id: &str, messages: Vec<Message>) {
        self.histories.lock().insert(contact_id.to_string(), messages);
    }

    pub fn set_contacts(&self, contacts: Vec<Contact>) {
        *self.contacts.lock() = contacts;
    }

    /// 之后对该联系人的历史拉取会挂起，直到返回的 Notify 被触发
    pub fn gate_history(&self, contact_id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.history_gates.lock().insert(contact_id.to_string(), gate.clone());
        gate
    }

    pub fn gate_send(&self, contact_id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.send_gates.lock().insert(contact_id.to_string(), gate.clone());
        gate
    }

    /// Some(None) 表示失败且没有服务端 message
    pub fn fail_history(&self, server_message: Option<&str>) {
        *self.history_error.lock() = Some(server_message.map(str::to_string));
    }

    pub fn heal_history(&self) {
        *self.history_error.lock() = None;
    }

    pub fn fail_send(&self, server_message: Option<&str>) {
        *self.send_error.lock() = Some(server_message.map(str::to_string));
    }

    pub fn fail_contacts(&self, server_message: Option<&str>) {
        *self.contacts_error.lock() = Some(server_message.map(str::to_string));
    }

    fn http_error(message: &Option<String>) -> ChatSyncError {
        ChatSyncError::Http {
            status: 500,
            message: message.clone(),
        }
    }
}

#[async_trait]
impl ChatApi for MockChatApi {
    async fn get_history(&self, contact_id: &str) -> Result<Vec<Message>> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.history_gates.lock().remove(contact_id);
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(message) = self.history_error.lock().as_ref() {
            return Err(Self::http_error(message));
        }
        Ok(self.histories.lock().get(contact_id).cloned().unwrap_or_default())
    }

    async fn post_message(&self, contact_id: &str, payload: &MessagePayload) -> Result<Message> {
        let n = self.send_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.send_gates.lock().remove(contact_id);
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(message) = self.send_error.lock().as_ref() {
            return Err(Self::http_error(message));
        }
        let secs = self.next_send_secs.fetch_add(1, Ordering::SeqCst) as i64;
        Ok(Message {
            id: format!("srv-{}", n),
            sender_id: self.current_user_id.clone(),
            receiver_id: contact_id.to_string(),
            text: payload.text.clone(),
            image_ref: payload.image.clone(),
            created_at: at(secs),
        })
    }

    async fn get_contacts(&self) -> Result<Vec<Contact>> {
        self.contact_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.contacts_error.lock().as_ref() {
            return Err(Self::http_error(message));
        }
        Ok(self.contacts.lock().clone())
    }
}

/// 记录所有提示
#[derive(Default)]
pub(crate) struct RecordingSink {
    entries: Mutex<Vec<(NotificationKind, String)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn entries(&self) -> Vec<(NotificationKind, String)> {
        self.entries.lock().clone()
    }

    pub fn count(&self, kind: NotificationKind) -> usize {
        self.entries.lock().iter().filter(|(k, _)| *k == kind).count()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, kind: NotificationKind, message: &str) {
        self.entries.lock().push((kind, message.to_string()));
    }

    fn notify_error(&self, message: &str) {
        self.entries.lock().push((NotificationKind::Error, message.to_string()));
    }
}
