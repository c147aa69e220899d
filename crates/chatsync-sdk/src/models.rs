//! 数据模型
//!
//! 与服务端 JSON 结构保持一致（`_id` / `senderId` / `createdAt` 等字段名）。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ordering::Timestamped;

/// 聊天消息
///
/// 创建后不可变；`id` 由服务端分配。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// 图片地址（服务端字段名为 image）
    #[serde(rename = "image", default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// 会话对方：sender / receiver 中不是当前用户的那一个
    pub fn counterpart<'a>(&'a self, current_user_id: &str) -> &'a str {
        if self.sender_id == current_user_id {
            &self.receiver_id
        } else {
            &self.sender_id
        }
    }

    /// sender/receiver 是否恰好是 {a, b}
    pub fn is_between(&self, a: &str, b: &str) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }

    /// 是否由指定用户发出
    pub fn is_sent_by(&self, user_id: &str) -> bool {
        self.sender_id == user_id
    }
}

impl Timestamped for Message {
    fn timestamp(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// 联系人（会话对方）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(rename = "fullName", alias = "displayName", default)]
    pub display_name: String,
    #[serde(rename = "profilePic", alias = "avatarRef", default)]
    pub avatar_ref: Option<String>,
}

impl Contact {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            avatar_ref: None,
        }
    }

    pub fn with_avatar(mut self, avatar_ref: impl Into<String>) -> Self {
        self.avatar_ref = Some(avatar_ref.into());
        self
    }
}

/// 发送消息的请求体
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl MessagePayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            image: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}
