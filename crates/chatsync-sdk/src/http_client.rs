//! HTTP 客户端模块 - 请求/响应式接口
//!
//! 拉取历史消息、发送消息、拉取联系人列表。使用 reqwest 作为底层 HTTP 客户端，
//! 非 2xx 响应会尝试解析返回体中的 `message` 字段作为面向用户的错误信息。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use crate::config::ChatSyncConfig;
use crate::error::{ChatSyncError, Result};
use crate::models::{Contact, Message, MessagePayload};

/// 会话相关的请求接口（由 HTTP 层实现，测试中可替换）
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// 拉取与某个联系人的历史消息
    async fn get_history(&self, contact_id: &str) -> Result<Vec<Message>>;

    /// 向某个联系人发送消息，返回服务端确认后的消息
    async fn post_message(&self, contact_id: &str, payload: &MessagePayload) -> Result<Message>;

    /// 拉取完整联系人列表
    async fn get_contacts(&self) -> Result<Vec<Contact>>;
}

/// 基于 reqwest 的实现
pub struct HttpChatApi {
    client: Client,
    base_url: String,
}

impl HttpChatApi {
    pub fn new(config: &ChatSyncConfig) -> Result<Self> {
        config.validate()?;

        let http = &config.http_client_config;
        let mut builder = Client::builder();

        if let Some(timeout) = http.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(timeout));
        }
        if let Some(timeout) = http.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }
        if http.with_credentials {
            builder = builder.cookie_store(true);
        }

        let client = builder
            .build()
            .map_err(|e| ChatSyncError::Config(format!("创建 HTTP 客户端失败: {}", e)))?;

        info!("✅ HTTP 客户端已创建 (base_url: {})", config.api_base_url);

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        endpoint_url(&self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        debug!("GET {}", url);
        let response = self.client.get(&url).send().await?;
        parse_response(response).await
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn get_history(&self, contact_id: &str) -> Result<Vec<Message>> {
        self.get_json(&format!("messages/{}", contact_id)).await
    }

    async fn post_message(&self, contact_id: &str, payload: &MessagePayload) -> Result<Message> {
        let url = self.url(&format!("messages/send/{}", contact_id));
        debug!("POST {}", url);
        let response = self.client.post(&url).json(payload).send().await?;
        parse_response(response).await
    }

    async fn get_contacts(&self) -> Result<Vec<Contact>> {
        self.get_json("messages/users").await
    }
}

/// 拼接接口地址
pub fn endpoint_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// 从错误返回体中取出 `message` 字段
pub fn extract_server_message(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!("❌ 请求失败，HTTP 状态码: {}, 返回: {}", status, body);
        return Err(ChatSyncError::Http {
            status: status.as_u16(),
            message: extract_server_message(&body),
        });
    }

    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
