//! Custom bot messages posted to a group webhook.
//!
//! Webhooks need no access token: the URL itself is the credential.

use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{LarkError, Result};
use crate::models::ApiResponse;

/// Bot that posts messages to a caller-supplied webhook URL.
#[derive(Clone, Debug)]
pub struct WebhookBot {
    url: String,
    http: Client,
}

impl WebhookBot {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(LarkError::ConfigError(
                "webhook url must not be empty".to_string(),
            ));
        }
        Ok(Self {
            url,
            http: Client::new(),
        })
    }

    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send a plain text message.
    pub async fn send_text(&self, text: &str) -> Result<ApiResponse> {
        self.send_payload(&text_payload(text)).await
    }

    /// Send a rich text (`post`) message.
    ///
    /// Each row is a list of inline elements such as
    /// `{"tag": "text", "text": "..."}` or `{"tag": "a", "text": "...", "href": "..."}`.
    pub async fn send_post(&self, title: &str, rows: Vec<Vec<Value>>) -> Result<ApiResponse> {
        self.send_payload(&post_payload(title, rows)).await
    }

    /// Send an interactive card.
    pub async fn send_card(&self, card: Value) -> Result<ApiResponse> {
        self.send_payload(&json!({ "msg_type": "interactive", "card": card }))
            .await
    }

    /// Post an arbitrary payload and return the response verbatim.
    pub async fn send_payload(&self, payload: &Value) -> Result<ApiResponse> {
        debug!(msg_type = ?payload.get("msg_type"), "Posting webhook message");
        let response = self.http.post(&self.url).json(payload).send().await?;
        ApiResponse::from_response(response).await
    }
}

pub fn text_payload(text: &str) -> Value {
    json!({
        "msg_type": "text",
        "content": { "text": text }
    })
}

pub fn post_payload(title: &str, rows: Vec<Vec<Value>>) -> Value {
    json!({
        "msg_type": "post",
        "content": {
            "post": {
                "zh_cn": {
                    "title": title,
                    "content": rows
                }
            }
        }
    })
}
