//! 会话同步引擎
//!
//! 协调三路异步来源，让本地消息列表与联系人排序保持一致：
//! - 切换会话时的历史拉取（请求/响应）
//! - 本地发送（以服务端返回的消息为准追加）
//! - 传输层推送的入站消息
//!
//! 状态机：`Idle` →（选择联系人）→ `Selecting` →（历史拉取成功）→ `Active`。
//! 每次切换会话都会递增 generation，过期的拉取结果在完成时被丢弃。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::cache::MessageCache;
use crate::config::ChatSyncConfig;
use crate::error::{ChatSyncError, FetchTarget, Result};
use crate::events::{now_millis, ChatEvent, EventManager};
use crate::http_client::ChatApi;
use crate::lifecycle::ConnectionLifecycleHook;
use crate::models::{Contact, Message, MessagePayload};
use crate::notify::{EventNotificationSink, NotificationKind, NotificationSink};
use crate::ranking::ContactRanking;
use crate::subscription::SubscriptionManager;
use crate::transport::{EventHandler, Transport};

const NEW_MESSAGE_TEXT: &str = "New message received!";
const NO_SELECTION_TEXT: &str = "No user selected";
const FETCH_MESSAGES_FAILED_TEXT: &str = "Failed to fetch messages";
const FETCH_USERS_FAILED_TEXT: &str = "Failed to fetch users";
const SEND_FAILED_TEXT: &str = "Message failed to send";

/// 同步阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncPhase {
    /// 没有选中会话
    Idle,
    /// 已选中，正在拉取历史
    Selecting,
    /// 稳定状态
    Active,
}

/// 入站消息的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundOutcome {
    /// 属于当前会话，已追加
    Appended,
    /// 不属于当前会话，已提示用户
    Notified,
    /// 不属于当前会话且是自己发出的，不提示
    Ignored,
}

/// 提供给渲染层的只读快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSnapshot {
    pub selection: Option<Contact>,
    pub messages: Vec<Message>,
    pub contacts: Vec<Contact>,
    pub phase: SyncPhase,
    pub is_loading_history: bool,
    pub is_loading_contacts: bool,
}

struct ChatState {
    selection: Option<Contact>,
    messages: MessageCache,
    ranking: ContactRanking,
    phase: SyncPhase,
    /// 每次切换会话递增，用于识别过期的拉取结果
    generation: u64,
    is_loading_history: bool,
    is_loading_contacts: bool,
}

impl ChatState {
    fn new() -> Self {
        Self {
            selection: None,
            messages: MessageCache::new(),
            ranking: ContactRanking::new(),
            phase: SyncPhase::Idle,
            generation: 0,
            is_loading_history: false,
            is_loading_contacts: false,
        }
    }

    fn selection_id(&self) -> Option<&str> {
        self.selection.as_ref().map(|c| c.id.as_str())
    }
}

struct EngineInner {
    config: ChatSyncConfig,
    current_user_id: String,
    api: Arc<dyn ChatApi>,
    notifier: Arc<dyn NotificationSink>,
    subscription: SubscriptionManager,
    /// 串行化所有会触碰传输层的操作（先取它，再短暂取状态锁）
    subscription_gate: Mutex<()>,
    event_manager: Arc<EventManager>,
    state: RwLock<ChatState>,
    contacts_refresh_in_flight: AtomicBool,
}

/// 会话同步引擎
///
/// 每个登录会话一个实例，由 UI 组合根持有；克隆共享同一份状态。
/// 状态锁从不跨 await 持有，也不在持有时调用传输层；事件总是在释放锁之后发布。
#[derive(Clone)]
pub struct ConversationSyncEngine {
    inner: Arc<EngineInner>,
}

impl ConversationSyncEngine {
    /// 创建引擎
    pub fn new(
        config: ChatSyncConfig,
        current_user_id: impl Into<String>,
        api: Arc<dyn ChatApi>,
        notifier: Arc<dyn NotificationSink>,
        event_manager: Arc<EventManager>,
    ) -> Result<Self> {
        config.validate()?;
        let current_user_id = current_user_id.into();
        if current_user_id.is_empty() {
            return Err(ChatSyncError::Config("current_user_id 不能为空".to_string()));
        }

        info!(
            "正在初始化会话同步引擎: user_id={}, channel={}",
            current_user_id, config.message_channel
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                subscription: SubscriptionManager::new(config.message_channel.clone()),
                subscription_gate: Mutex::new(()),
                config,
                current_user_id,
                api,
                notifier,
                event_manager,
                state: RwLock::new(ChatState::new()),
                contacts_refresh_in_flight: AtomicBool::new(false),
            }),
        })
    }

    /// 提示通过事件总线转发的便捷构造
    pub fn with_event_notifications(
        config: ChatSyncConfig,
        current_user_id: impl Into<String>,
        api: Arc<dyn ChatApi>,
    ) -> Result<Self> {
        let event_manager = Arc::new(EventManager::new(config.event_config.buffer_size));
        let notifier = Arc::new(EventNotificationSink::new(event_manager.clone()));
        Self::new(config, current_user_id, api, notifier, event_manager)
    }

    // ============================================================
    // 观察接口
    // ============================================================

    pub fn snapshot(&self) -> ChatSnapshot {
        let state = self.inner.state.read();
        ChatSnapshot {
            selection: state.selection.clone(),
            messages: state.messages.to_vec(),
            contacts: state.ranking.to_vec(),
            phase: state.phase,
            is_loading_history: state.is_loading_history,
            is_loading_contacts: state.is_loading_contacts,
        }
    }

    pub fn selection(&self) -> Option<Contact> {
        self.inner.state.read().selection.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.inner.state.read().messages.to_vec()
    }

    pub fn contacts(&self) -> Vec<Contact> {
        self.inner.state.read().ranking.to_vec()
    }

    pub fn phase(&self) -> SyncPhase {
        self.inner.state.read().phase
    }

    pub fn is_loading_history(&self) -> bool {
        self.inner.state.read().is_loading_history
    }

    pub fn is_loading_contacts(&self) -> bool {
        self.inner.state.read().is_loading_contacts
    }

    pub fn current_user_id(&self) -> &str {
        &self.inner.current_user_id
    }

    pub fn event_manager(&self) -> Arc<EventManager> {
        self.inner.event_manager.clone()
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner.subscription.is_subscribed()
    }

    // ============================================================
    // 传输层挂载
    // ============================================================

    /// 挂载（或更换）传输层句柄
    ///
    /// 旧句柄上的处理器会被移除；处于 Active 时在新句柄上重新订阅。
    pub fn attach_transport(&self, transport: Arc<dyn Transport>) {
        let _gate = self.inner.subscription_gate.lock();
        self.inner.subscription.attach_transport(transport);
        let active = self.inner.state.read().phase == SyncPhase::Active;
        // Selecting 阶段由拉取完成后自行订阅
        if active {
            self.subscribe_inbound();
        }
    }

    pub fn detach_transport(&self) {
        let _gate = self.inner.subscription_gate.lock();
        self.inner.subscription.detach_transport();
    }

    // ============================================================
    // 会话选择
    // ============================================================

    /// 切换当前会话
    ///
    /// 选择已激活的联系人是空操作；`None` 回到 Idle。
    /// 历史拉取失败时缓存保持为空，阶段停留在 Selecting，
    /// 可通过 [`Self::reload_active_conversation`] 重试。
    pub async fn select_conversation(&self, contact: Option<Contact>) -> Result<()> {
        let generation = {
            let _gate = self.inner.subscription_gate.lock();
            let target = contact.as_ref().map(|c| c.id.as_str());
            let previous = self.inner.state.read().selection_id().map(str::to_string);
            if previous.as_deref() == target {
                debug!("会话未变化，忽略: {:?}", target);
                return Ok(());
            }

            info!("👤 切换会话: {:?} -> {:?}", previous, target);

            // 先卸载旧的处理器，再清空缓存
            self.inner.subscription.unsubscribe();
            let mut state = self.inner.state.write();
            state.selection = contact.clone();
            Self::reset_conversation(&mut state)
        };

        let contact_id = contact.as_ref().map(|c| c.id.clone());
        self.emit(ChatEvent::SelectionChanged {
            contact_id: contact_id.clone(),
            timestamp: now_millis(),
        });
        self.emit_reset(contact_id, contact.is_some());

        match contact {
            Some(contact) => self.run_selecting(contact, generation).await,
            None => Ok(()),
        }
    }

    /// 重新拉取当前会话（历史拉取失败后的重试入口）
    pub async fn reload_active_conversation(&self) -> Result<()> {
        let (contact, generation) = {
            let _gate = self.inner.subscription_gate.lock();
            let contact = match self.selection() {
                Some(contact) => contact,
                None => return Err(ChatSyncError::NoActiveConversation),
            };
            self.inner.subscription.unsubscribe();
            let mut state = self.inner.state.write();
            (contact, Self::reset_conversation(&mut state))
        };

        info!("🔄 重新加载会话: contact_id={}", contact.id);
        self.emit_reset(Some(contact.id.clone()), true);
        self.run_selecting(contact, generation).await
    }

    /// 登出 / 断开时的清理：取消订阅并清空会话
    pub fn teardown(&self) {
        let had_selection = {
            let _gate = self.inner.subscription_gate.lock();
            self.inner.subscription.unsubscribe();
            let mut state = self.inner.state.write();
            let had_selection = state.selection.take().is_some();
            Self::reset_conversation(&mut state);
            had_selection
        };

        info!("🔚 会话同步引擎已清理");
        if had_selection {
            self.emit(ChatEvent::SelectionChanged {
                contact_id: None,
                timestamp: now_millis(),
            });
        }
        self.emit_reset(None, false);
    }

    /// 清空缓存并进入新一代，返回新的 generation
    fn reset_conversation(state: &mut ChatState) -> u64 {
        state.messages.clear();
        state.generation += 1;
        let has_selection = state.selection.is_some();
        state.phase = if has_selection {
            SyncPhase::Selecting
        } else {
            SyncPhase::Idle
        };
        state.is_loading_history = has_selection;
        state.generation
    }

    fn emit_reset(&self, contact_id: Option<String>, loading: bool) {
        self.emit(ChatEvent::MessagesReset {
            contact_id,
            count: 0,
            timestamp: now_millis(),
        });
        self.emit(ChatEvent::HistoryLoadingChanged {
            loading,
            timestamp: now_millis(),
        });
    }

    /// Selecting 阶段：拉取历史 → 排序装载 → 重新订阅 → Active
    async fn run_selecting(&self, contact: Contact, generation: u64) -> Result<()> {
        info!("📥 拉取历史消息: contact_id={}", contact.id);

        let batch = match self.inner.api.get_history(&contact.id).await {
            Ok(batch) => batch,
            Err(e) => return self.finish_history_failure(&contact, generation, e),
        };

        let count = {
            let mut state = self.inner.state.write();
            if state.generation != generation {
                debug!("会话已切换，丢弃过期的历史消息: contact_id={}", contact.id);
                return Ok(());
            }
            state.messages.load_sorted(batch);
            state.is_loading_history = false;
            state.messages.len()
        };

        info!("✅ 历史消息已加载: contact_id={}, count={}", contact.id, count);
        self.emit(ChatEvent::MessagesReset {
            contact_id: Some(contact.id.clone()),
            count,
            timestamp: now_millis(),
        });
        self.emit(ChatEvent::HistoryLoadingChanged {
            loading: false,
            timestamp: now_millis(),
        });

        let delay_ms = self.inner.config.resubscribe_delay_ms;
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        // generation 只在持有 subscription_gate 时变化
        let _gate = self.inner.subscription_gate.lock();
        if self.inner.state.read().generation != generation {
            debug!("会话已切换，跳过重新订阅: contact_id={}", contact.id);
            return Ok(());
        }
        self.subscribe_inbound();
        self.inner.state.write().phase = SyncPhase::Active;
        Ok(())
    }

    fn finish_history_failure(
        &self,
        contact: &Contact,
        generation: u64,
        e: ChatSyncError,
    ) -> Result<()> {
        {
            let mut state = self.inner.state.write();
            if state.generation != generation {
                debug!("会话已切换，忽略过期的拉取失败: contact_id={}", contact.id);
                return Ok(());
            }
            state.is_loading_history = false;
        }

        error!("❌ 拉取历史消息失败: contact_id={}, error={}", contact.id, e);
        self.emit(ChatEvent::HistoryLoadingChanged {
            loading: false,
            timestamp: now_millis(),
        });
        self.inner
            .notifier
            .notify_error(&e.user_message(FETCH_MESSAGES_FAILED_TEXT));

        Err(ChatSyncError::Fetch {
            what: FetchTarget::History,
            message: e.to_string(),
        })
    }

    // ============================================================
    // 入站消息
    // ============================================================

    /// 调用方需持有 subscription_gate
    fn subscribe_inbound(&self) {
        match self.inner.subscription.subscribe(self.inbound_handler()) {
            Ok(()) => {}
            Err(e) if e.is_not_connected() => {
                debug!("传输层未连接，等待重连后订阅");
            }
            Err(e) => warn!("⚠️ 订阅入站消息失败: {}", e),
        }
    }

    /// 构造传输层处理器（持有弱引用，避免 传输层 → 处理器 → 引擎 的循环引用）
    fn inbound_handler(&self) -> EventHandler {
        let weak: Weak<EngineInner> = Arc::downgrade(&self.inner);
        Arc::new(move |payload: serde_json::Value| {
            let inner = match weak.upgrade() {
                Some(inner) => inner,
                None => return,
            };
            if inner.config.debug_mode {
                info!("🐛 入站原始负载: {}", payload);
            }
            let engine = ConversationSyncEngine { inner };
            match serde_json::from_value::<Message>(payload) {
                Ok(message) => {
                    engine.handle_inbound(message);
                }
                Err(e) => warn!("⚠️ 无法解析入站消息，已丢弃: {}", e),
            }
        })
    }

    /// 处理一条入站消息
    ///
    /// 1. 会话对方在联系人列表中则置顶，否则刷新整个联系人列表
    /// 2. 属于当前会话则追加；否则除自己发出的消息外都提示用户
    pub fn handle_inbound(&self, message: Message) -> InboundOutcome {
        let me = self.inner.current_user_id.as_str();
        let partner = message.counterpart(me).to_string();
        let mut events = Vec::new();

        let (outcome, needs_refresh) = {
            let mut state = self.inner.state.write();

            let needs_refresh = if state.ranking.contains(&partner) {
                if state.ranking.promote(&partner) {
                    events.push(ChatEvent::ContactsReordered {
                        contact_id: partner.clone(),
                        timestamp: now_millis(),
                    });
                }
                false
            } else {
                true
            };

            let relevant = state.selection_id() == Some(partner.as_str())
                && message.is_between(&partner, me);

            let outcome = if relevant {
                events.push(ChatEvent::MessageAppended {
                    contact_id: partner.clone(),
                    message_id: message.id.clone(),
                    timestamp: now_millis(),
                });
                state.messages.append(message.clone());
                InboundOutcome::Appended
            } else if !message.is_sent_by(me) {
                InboundOutcome::Notified
            } else {
                InboundOutcome::Ignored
            };

            (outcome, needs_refresh)
        };

        debug!(
            "📨 入站消息: id={}, partner={}, outcome={:?}",
            message.id, partner, outcome
        );

        for event in events {
            self.emit(event);
        }
        if outcome == InboundOutcome::Notified {
            self.inner
                .notifier
                .notify(NotificationKind::NewMessage, NEW_MESSAGE_TEXT);
        }
        if needs_refresh {
            self.spawn_contact_refresh(&partner);
        }

        outcome
    }

    /// 同一时刻最多一个后台刷新
    fn spawn_contact_refresh(&self, partner: &str) {
        if self.inner.contacts_refresh_in_flight.swap(true, Ordering::AcqRel) {
            debug!("联系人刷新进行中，跳过: partner={}", partner);
            return;
        }

        info!("👥 未知联系人 {}，刷新联系人列表", partner);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let engine = self.clone();
                handle.spawn(async move {
                    // 失败已通过提示输出端报告
                    let _ = engine.load_contacts().await;
                    engine
                        .inner
                        .contacts_refresh_in_flight
                        .store(false, Ordering::Release);
                });
            }
            Err(_) => {
                self.inner
                    .contacts_refresh_in_flight
                    .store(false, Ordering::Release);
                warn!("⚠️ 当前没有 tokio 运行时，跳过联系人刷新");
            }
        }
    }

    // ============================================================
    // 联系人
    // ============================================================

    /// 拉取完整联系人列表并替换排序
    pub async fn load_contacts(&self) -> Result<Vec<Contact>> {
        self.inner.state.write().is_loading_contacts = true;
        self.emit(ChatEvent::ContactsLoadingChanged {
            loading: true,
            timestamp: now_millis(),
        });

        let result = self.inner.api.get_contacts().await;

        let outcome = match result {
            Ok(contacts) => {
                {
                    let mut state = self.inner.state.write();
                    state.ranking.replace_all(contacts.clone());
                    state.is_loading_contacts = false;
                }
                info!("✅ 联系人列表已刷新: count={}", contacts.len());
                self.emit(ChatEvent::ContactsReplaced {
                    count: contacts.len(),
                    timestamp: now_millis(),
                });
                Ok(contacts)
            }
            Err(e) => {
                self.inner.state.write().is_loading_contacts = false;
                error!("❌ 拉取联系人失败: {}", e);
                self.inner
                    .notifier
                    .notify_error(&e.user_message(FETCH_USERS_FAILED_TEXT));
                Err(ChatSyncError::Fetch {
                    what: FetchTarget::Contacts,
                    message: e.to_string(),
                })
            }
        };

        self.emit(ChatEvent::ContactsLoadingChanged {
            loading: false,
            timestamp: now_millis(),
        });
        outcome
    }

    /// 直接设置联系人列表（调用方已持有完整列表时使用）
    pub fn replace_contacts(&self, contacts: Vec<Contact>) {
        let count = contacts.len();
        self.inner.state.write().ranking.replace_all(contacts);
        self.emit(ChatEvent::ContactsReplaced {
            count,
            timestamp: now_millis(),
        });
    }

    // ============================================================
    // 发送
    // ============================================================

    /// 向当前会话发送消息
    ///
    /// 写入完成后以服务端返回的消息追加（不使用本地临时 id），再把对方置顶。
    /// 发送失败时不修改任何本地状态。
    pub async fn send_message(&self, payload: MessagePayload) -> Result<Message> {
        let recipient = match self.selection() {
            Some(contact) => contact,
            None => {
                warn!("⚠️ 没有选中会话，无法发送");
                self.inner.notifier.notify_error(NO_SELECTION_TEXT);
                return Err(ChatSyncError::NoActiveConversation);
            }
        };

        let message = match self.inner.api.post_message(&recipient.id, &payload).await {
            Ok(message) => message,
            Err(e) => {
                error!("❌ 发送消息失败: contact_id={}, error={}", recipient.id, e);
                self.inner
                    .notifier
                    .notify_error(&e.user_message(SEND_FAILED_TEXT));
                return Err(ChatSyncError::Send(e.to_string()));
            }
        };

        let mut events = Vec::new();
        {
            let mut state = self.inner.state.write();
            if state.selection_id() == Some(recipient.id.as_str()) {
                state.messages.append(message.clone());
                events.push(ChatEvent::MessageAppended {
                    contact_id: recipient.id.clone(),
                    message_id: message.id.clone(),
                    timestamp: now_millis(),
                });
            } else {
                debug!("发送完成时会话已切换，不追加: contact_id={}", recipient.id);
            }
            if state.ranking.promote(&recipient.id) {
                events.push(ChatEvent::ContactsReordered {
                    contact_id: recipient.id.clone(),
                    timestamp: now_millis(),
                });
            }
        }

        info!("📤 消息已发送: id={}, contact_id={}", message.id, recipient.id);
        for event in events {
            self.emit(event);
        }
        Ok(message)
    }

    fn emit(&self, event: ChatEvent) {
        self.inner.event_manager.emit(event);
    }
}

#[async_trait]
impl ConnectionLifecycleHook for ConversationSyncEngine {
    async fn on_connected(&self, transport: Arc<dyn Transport>) -> Result<()> {
        self.attach_transport(transport);
        Ok(())
    }

    async fn on_disconnected(&self) -> Result<()> {
        self.detach_transport();
        Ok(())
    }
}
