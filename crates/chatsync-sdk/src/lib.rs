//! ChatSync SDK - 实时会话同步核心
//!
//! 把三路异步来源合并为一致的本地视图：
//! - 📥 切换会话时的历史拉取（过期结果自动丢弃）
//! - 📤 本地发送（以服务端确认后的消息为准）
//! - 📨 传输层推送的入站消息（同一时刻最多一个处理器）
//! - 👥 联系人按最近往来排序
//! - ⚙️ 事件系统：渲染层通过快照和事件观察状态
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chatsync_sdk::{
//!     ChatSyncConfig, ConversationSyncEngine, HttpChatApi, MessagePayload,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ChatSyncConfig::builder()
//!         .api_base_url("http://localhost:5001/api")
//!         .build();
//!
//!     let api = Arc::new(HttpChatApi::new(&config)?);
//!     let engine = ConversationSyncEngine::with_event_notifications(config, "user123", api)?;
//!
//!     // 拉取联系人并打开第一个会话
//!     let contacts = engine.load_contacts().await?;
//!     engine.select_conversation(contacts.first().cloned()).await?;
//!
//!     // 发送消息
//!     engine.send_message(MessagePayload::text("Hello, World!")).await?;
//!
//!     // 登出
//!     engine.teardown();
//!     Ok(())
//! }
//! ```

// 导出核心模块
pub mod error;
pub mod config;
pub mod models;
pub mod ordering;
pub mod ranking;
pub mod cache;
pub mod transport;
pub mod subscription;
pub mod http_client;
pub mod notify;
pub mod events;
pub mod lifecycle;
pub mod engine;

#[cfg(test)]
mod test_support;

// 重新导出核心类型，方便使用
pub use error::{ChatSyncError, FetchTarget, Result};
pub use config::{ChatSyncConfig, ChatSyncConfigBuilder, EventConfig, HttpClientConfig};
pub use models::{Contact, Message, MessagePayload};
pub use ranking::ContactRanking;
pub use cache::MessageCache;
pub use transport::{EventHandler, LocalTransport, Transport};
pub use subscription::SubscriptionManager;
pub use http_client::{ChatApi, HttpChatApi};
pub use notify::{EventNotificationSink, NotificationKind, NotificationSink};
pub use events::{ChatEvent, EventFilter, EventManager, EventStats, FilteredEventReceiver};
pub use lifecycle::{ConnectionLifecycleHook, LifecycleManager};
pub use engine::{ChatSnapshot, ConversationSyncEngine, InboundOutcome, SyncPhase};

/// SDK 版本
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
