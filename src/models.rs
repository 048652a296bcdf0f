//! Data models shared by the authenticated client and its collaborators.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LarkError, Result};

/// Application credentials issued by the open platform.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub app_id: String,
    pub app_secret: String,
}

impl Credentials {
    /// Create credentials, rejecting empty values.
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Result<Self> {
        let credentials = Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
        };
        credentials.validate()?;
        Ok(credentials)
    }

    /// Check that neither field is empty or whitespace.
    pub fn validate(&self) -> Result<()> {
        if self.app_id.trim().is_empty() {
            return Err(LarkError::ConfigError("app_id must not be empty".to_string()));
        }
        if self.app_secret.trim().is_empty() {
            return Err(LarkError::ConfigError(
                "app_secret must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// Keep the secret out of logs and panics.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &self.app_id)
            .field("app_secret", &"***")
            .finish()
    }
}

/// Request body for the tenant access token endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct TokenRequest<'a> {
    pub app_id: &'a str,
    pub app_secret: &'a str,
}

/// Response from the tenant access token endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub tenant_access_token: Option<String>,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expire: Option<u64>,
}

/// Raw response of a vendor call: HTTP status plus the parsed body.
///
/// The body is never interpreted. A body that is not JSON is kept as a JSON
/// string and an empty body becomes `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn from_text(status: u16, text: &str) -> Self {
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
        };
        Self { status, body }
    }

    /// Read status and body from a `reqwest` response.
    pub async fn from_response(response: reqwest::Response) -> Result<Self> {
        let status = response.status().as_u16();
        let text = response.text().await?;
        Ok(Self::from_text(status, &text))
    }

    pub fn is_http_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Vendor status code from the body (`code`, or `StatusCode` on older webhook replies).
    pub fn code(&self) -> Option<i64> {
        self.body
            .get("code")
            .or_else(|| self.body.get("StatusCode"))
            .and_then(Value::as_i64)
    }

    pub fn msg(&self) -> Option<&str> {
        self.body
            .get("msg")
            .or_else(|| self.body.get("StatusMessage"))
            .and_then(Value::as_str)
    }

    pub fn data(&self) -> Option<&Value> {
        self.body.get("data")
    }
}

impl fmt::Display for ApiResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = serde_json::to_string_pretty(&self.body).map_err(|_| fmt::Error)?;
        write!(f, "HTTP {}\n{}", self.status, body)
    }
}

/// Which user identifier a resource call uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserIdType {
    OpenId,
    UnionId,
    UserId,
}

impl UserIdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserIdType::OpenId => "open_id",
            UserIdType::UnionId => "union_id",
            UserIdType::UserId => "user_id",
        }
    }
}

impl fmt::Display for UserIdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserIdType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "open_id" => Ok(UserIdType::OpenId),
            "union_id" => Ok(UserIdType::UnionId),
            "user_id" => Ok(UserIdType::UserId),
            other => Err(format!("unknown user id type: {}", other)),
        }
    }
}

/// Recipient kind for IM messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveIdType {
    OpenId,
    UnionId,
    UserId,
    Email,
    ChatId,
}

impl ReceiveIdType {
    /// Guess the id type from the shape of a recipient id.
    ///
    /// `ou_` is an open id, `on_` a union id, `oc_` a chat id, anything with an
    /// `@` an email; everything else is treated as a user id.
    pub fn infer(receive_id: &str) -> Self {
        if receive_id.starts_with("ou_") {
            ReceiveIdType::OpenId
        } else if receive_id.starts_with("on_") {
            ReceiveIdType::UnionId
        } else if receive_id.starts_with("oc_") {
            ReceiveIdType::ChatId
        } else if receive_id.contains('@') {
            ReceiveIdType::Email
        } else {
            ReceiveIdType::UserId
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiveIdType::OpenId => "open_id",
            ReceiveIdType::UnionId => "union_id",
            ReceiveIdType::UserId => "user_id",
            ReceiveIdType::Email => "email",
            ReceiveIdType::ChatId => "chat_id",
        }
    }
}

impl fmt::Display for ReceiveIdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReceiveIdType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "open_id" => Ok(ReceiveIdType::OpenId),
            "union_id" => Ok(ReceiveIdType::UnionId),
            "user_id" => Ok(ReceiveIdType::UserId),
            "email" => Ok(ReceiveIdType::Email),
            "chat_id" => Ok(ReceiveIdType::ChatId),
            other => Err(format!("unknown receive id type: {}", other)),
        }
    }
}
