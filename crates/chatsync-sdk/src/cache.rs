//! 当前会话的消息缓存
//!
//! 只保存当前选中会话的消息，切换会话时整体清空。

use tracing::warn;

use crate::models::Message;
use crate::ordering::{is_not_older, sort_chronological};

/// 消息缓存
#[derive(Debug, Clone, Default)]
pub struct MessageCache {
    messages: Vec<Message>,
}

impl MessageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 清空（每次切换会话都会调用，包括切换到“无会话”）
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// 用一批消息替换缓存，按时间稳定排序
    pub fn load_sorted(&mut self, mut batch: Vec<Message>) {
        sort_chronological(&mut batch);
        self.messages = batch;
    }

    /// 追加到末尾，不重排、不去重
    ///
    /// 假设单条消息不早于缓存尾部；乱序只记录日志。
    pub fn append(&mut self, message: Message) {
        if let Some(last) = self.messages.last() {
            if !is_not_older(last, &message) {
                warn!(
                    "⚠️ 追加的消息早于缓存尾部: id={}, created_at={}, tail={}",
                    message.id, message.created_at, last.created_at
                );
            }
        }
        self.messages.push(message);
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }

    pub fn to_vec(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
