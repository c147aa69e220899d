//! SDK 配置

use serde::{Deserialize, Serialize};

use crate::error::{ChatSyncError, Result};

/// 本地开发环境的 API 地址
pub const LOCAL_API_BASE_URL: &str = "http://localhost:5001/api";

/// 入站消息默认频道名
pub const DEFAULT_MESSAGE_CHANNEL: &str = "newMessage";

/// HTTP 客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// 连接超时（秒）
    pub connect_timeout_secs: Option<u64>,
    /// 请求超时（秒）
    pub request_timeout_secs: Option<u64>,
    /// 是否携带 cookie（会话凭证）
    pub with_credentials: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: Some(10),
            request_timeout_secs: Some(30),
            with_credentials: true,
        }
    }
}

/// 事件配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    /// 事件缓冲区大小
    pub buffer_size: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self { buffer_size: 256 }
    }
}

/// 会话同步配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSyncConfig {
    /// REST API 基础地址
    pub api_base_url: String,
    /// 入站消息频道名
    pub message_channel: String,
    /// 拉取历史后重新订阅前的等待时间（毫秒），0 表示立即订阅
    pub resubscribe_delay_ms: u64,
    /// HTTP 客户端配置
    pub http_client_config: HttpClientConfig,
    /// 事件配置
    pub event_config: EventConfig,
    /// 调试模式
    pub debug_mode: bool,
}

impl Default for ChatSyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: LOCAL_API_BASE_URL.to_string(),
            message_channel: DEFAULT_MESSAGE_CHANNEL.to_string(),
            resubscribe_delay_ms: 100,
            http_client_config: HttpClientConfig::default(),
            event_config: EventConfig::default(),
            debug_mode: false,
        }
    }
}

impl ChatSyncConfig {
    pub fn builder() -> ChatSyncConfigBuilder {
        ChatSyncConfigBuilder::new()
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://")) {
            return Err(ChatSyncError::Config(format!(
                "api_base_url 必须以 http:// 或 https:// 开头: {}",
                self.api_base_url
            )));
        }
        if self.message_channel.is_empty() {
            return Err(ChatSyncError::Config("message_channel 不能为空".to_string()));
        }
        if self.event_config.buffer_size == 0 {
            return Err(ChatSyncError::Config("event buffer_size 必须大于 0".to_string()));
        }
        Ok(())
    }
}

/// 配置构建器
pub struct ChatSyncConfigBuilder {
    config: ChatSyncConfig,
}

impl ChatSyncConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ChatSyncConfig::default(),
        }
    }

    pub fn api_base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// 按页面主机名选择 API 地址
    ///
    /// `localhost` / `127.0.0.1` 使用本地地址，其它主机使用 `remote`。
    pub fn api_base_url_for_host<S: Into<String>>(self, host: &str, remote: S) -> Self {
        match host {
            "localhost" | "127.0.0.1" => self.api_base_url(LOCAL_API_BASE_URL),
            _ => self.api_base_url(remote),
        }
    }

    pub fn message_channel<S: Into<String>>(mut self, channel: S) -> Self {
        self.config.message_channel = channel.into();
        self
    }

    pub fn resubscribe_delay_ms(mut self, delay_ms: u64) -> Self {
        self.config.resubscribe_delay_ms = delay_ms;
        self
    }

    pub fn http_client_config(mut self, config: HttpClientConfig) -> Self {
        self.config.http_client_config = config;
        self
    }

    pub fn event_config(mut self, config: EventConfig) -> Self {
        self.config.event_config = config;
        self
    }

    pub fn debug_mode(mut self, enabled: bool) -> Self {
        self.config.debug_mode = enabled;
        self
    }

    pub fn build(self) -> ChatSyncConfig {
        self.config
    }
}

impl Default for ChatSyncConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
