use thiserror::Error;

/// SDK 错误类型
///
/// 所有错误都是本地可恢复的，不会导致进程退出。
#[derive(Debug, Error)]
pub enum ChatSyncError {
    /// 拉取失败（历史消息或联系人列表）
    #[error("Fetch {what} failed: {message}")]
    Fetch {
        what: FetchTarget,
        message: String,
    },
    /// 发送失败（服务端拒绝或网络错误）
    #[error("Send failed: {0}")]
    Send(String),
    /// 当前没有选中的会话
    #[error("No active conversation")]
    NoActiveConversation,
    /// 传输层未连接（静默处理，不提示用户）
    #[error("Not connected")]
    NotConnected,
    /// HTTP 非 2xx 响应
    #[error("HTTP error [{status}]: {}", message.as_deref().unwrap_or("<no message>"))]
    Http {
        status: u16,
        /// 服务端返回体中的 message 字段
        message: Option<String>,
    },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Config error: {0}")]
    Config(String),
}

/// 拉取目标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchTarget {
    History,
    Contacts,
}

impl std::fmt::Display for FetchTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchTarget::History => write!(f, "history"),
            FetchTarget::Contacts => write!(f, "contacts"),
        }
    }
}

impl From<serde_json::Error> for ChatSyncError {
    fn from(error: serde_json::Error) -> Self {
        ChatSyncError::Serialization(error.to_string())
    }
}

impl From<reqwest::Error> for ChatSyncError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            return ChatSyncError::Serialization(error.to_string());
        }
        match error.status() {
            Some(status) => ChatSyncError::Http {
                status: status.as_u16(),
                message: None,
            },
            None => ChatSyncError::Transport(error.to_string()),
        }
    }
}

impl ChatSyncError {
    /// 服务端返回的错误信息（如果有）
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ChatSyncError::Http { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// 面向用户的提示文本：优先服务端 message，否则使用 fallback
    pub fn user_message(&self, fallback: &str) -> String {
        self.server_message()
            .filter(|m| !m.is_empty())
            .unwrap_or(fallback)
            .to_string()
    }

    /// 是否为传输层不可用
    pub fn is_not_connected(&self) -> bool {
        matches!(self, ChatSyncError::NotConnected)
    }
}

pub type Result<T> = std::result::Result<T, ChatSyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_prefers_server_message() {
        let err = ChatSyncError::Http {
            status: 400,
            message: Some("Receiver not found".to_string()),
        };
        assert_eq!(err.user_message("Message failed to send"), "Receiver not found");
        assert_eq!(err.server_message(), Some("Receiver not found"));
    }

    #[test]
    fn test_user_message_falls_back() {
        let err = ChatSyncError::Http { status: 500, message: None };
        assert_eq!(err.user_message("Failed to fetch users"), "Failed to fetch users");

        let empty = ChatSyncError::Http { status: 500, message: Some(String::new()) };
        assert_eq!(empty.user_message("Failed to fetch users"), "Failed to fetch users");

        let transport = ChatSyncError::Transport("connection reset".to_string());
        assert_eq!(transport.server_message(), None);
        assert_eq!(transport.user_message("Failed to fetch messages"), "Failed to fetch messages");
    }

    #[test]
    fn test_display() {
        let err = ChatSyncError::Fetch {
            what: FetchTarget::History,
            message: "timeout".to_string(),
        };
        assert_eq!(err.to_string(), "Fetch history failed: timeout");
        assert!(ChatSyncError::NotConnected.is_not_connected());
    }
}
