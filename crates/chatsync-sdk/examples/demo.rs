//! 会话同步演示
//!
//! 使用进程内传输和内存接口，展示会话切换、收发消息和联系人排序

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chatsync_sdk::{
    ChatApi, ChatEvent, ChatSyncConfig, ConversationSyncEngine, Contact, LifecycleManager,
    LocalTransport, Message, MessagePayload, Result,
};
use chrono::{Duration, Utc};
use parking_lot::Mutex;

const ME: &str = "1001";

/// 内存中的消息服务
struct InMemoryApi {
    contacts: Vec<Contact>,
    messages: Mutex<Vec<Message>>,
    transport: Arc<LocalTransport>,
}

impl InMemoryApi {
    fn history_between(&self, a: &str, b: &str) -> Vec<Message> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.is_between(a, b))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ChatApi for InMemoryApi {
    async fn get_history(&self, contact_id: &str) -> Result<Vec<Message>> {
        Ok(self.history_between(ME, contact_id))
    }

    async fn post_message(&self, contact_id: &str, payload: &MessagePayload) -> Result<Message> {
        let mut messages = self.messages.lock();
        let message = Message {
            id: format!("srv-{}", messages.len() + 1),
            sender_id: ME.to_string(),
            receiver_id: contact_id.to_string(),
            text: payload.text.clone(),
            image_ref: payload.image.clone(),
            created_at: Utc::now(),
        };
        messages.push(message.clone());
        Ok(message)
    }

    async fn get_contacts(&self) -> Result<Vec<Contact>> {
        Ok(self.contacts.clone())
    }
}

impl InMemoryApi {
    /// 模拟对方发来一条消息（服务端写库后推送）
    fn deliver(&self, from: &str, text: &str) {
        let message = {
            let mut messages = self.messages.lock();
            let message = Message {
                id: format!("srv-{}", messages.len() + 1),
                sender_id: from.to_string(),
                receiver_id: ME.to_string(),
                text: Some(text.to_string()),
                image_ref: None,
                created_at: Utc::now(),
            };
            messages.push(message.clone());
            message
        };
        if let Ok(payload) = serde_json::to_value(&message) {
            self.transport.emit("newMessage", payload);
        }
    }
}

fn print_contacts(engine: &ConversationSyncEngine) {
    let names: Vec<String> = engine
        .contacts()
        .iter()
        .map(|c| c.display_name.clone())
        .collect();
    println!("   联系人排序: {}", names.join(" > "));
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("\n🚀 会话同步演示\n");
    println!("====================================\n");

    let transport = Arc::new(LocalTransport::new());
    let now = Utc::now();
    let api = Arc::new(InMemoryApi {
        contacts: vec![
            Contact::new("2001", "Alice"),
            Contact::new("2002", "Bob"),
            Contact::new("2003", "Carol"),
        ],
        messages: Mutex::new(vec![
            Message {
                id: "srv-a".to_string(),
                sender_id: "2001".to_string(),
                receiver_id: ME.to_string(),
                text: Some("早上好".to_string()),
                image_ref: None,
                created_at: now - Duration::minutes(5),
            },
            Message {
                id: "srv-b".to_string(),
                sender_id: ME.to_string(),
                receiver_id: "2001".to_string(),
                text: Some("早！".to_string()),
                image_ref: None,
                created_at: now - Duration::minutes(10),
            },
        ]),
        transport: transport.clone(),
    });

    let config = ChatSyncConfig::builder().debug_mode(true).build();
    let engine = ConversationSyncEngine::with_event_notifications(config, ME, api.clone())?;

    engine.event_manager().add_listener("notification", |event| {
        if let ChatEvent::Notification { kind, text, .. } = event {
            println!("   🔔 提示 [{:?}]: {}", kind, text);
        }
    });

    // 连接建立
    let mut lifecycle = LifecycleManager::new();
    lifecycle.register_hook(Arc::new(engine.clone()));
    lifecycle.notify_connected(transport.clone()).await?;

    println!("👥 拉取联系人...");
    engine.load_contacts().await?;
    print_contacts(&engine);

    println!("\n📥 打开与 Alice 的会话...");
    engine
        .select_conversation(Some(Contact::new("2001", "Alice")))
        .await?;
    for message in engine.messages() {
        println!(
            "   [{}] {} -> {}: {}",
            message.created_at.format("%H:%M:%S"),
            message.sender_id,
            message.receiver_id,
            message.text.as_deref().unwrap_or("")
        );
    }

    println!("\n📤 发送消息...");
    engine.send_message(MessagePayload::text("今天有空吗？")).await?;
    println!("   当前会话消息数: {}", engine.messages().len());

    println!("\n📨 Carol 发来消息（非当前会话）...");
    api.deliver("2003", "在吗？");
    print_contacts(&engine);

    println!("\n📨 Alice 回复（当前会话）...");
    api.deliver("2001", "有空");
    println!("   当前会话消息数: {}", engine.messages().len());

    let snapshot = engine.snapshot();
    println!("\n📊 快照: phase={:?}, 消息数={}", snapshot.phase, snapshot.messages.len());

    // 登出
    lifecycle.notify_disconnected().await?;
    engine.teardown();

    let by_type: HashMap<String, u64> = engine.event_manager().get_stats().events_by_type;
    println!("\n📊 事件统计: {:?}", by_type);
    println!("\n✅ 演示完成");
    Ok(())
}
