//! User authorization (OAuth) for acting on behalf of a user.
//!
//! A [`UserToken`] obtained here can be handed to
//! [`Authenticator::with_user_token`](crate::auth::Authenticator::with_user_token),
//! which refreshes it as needed, or its access token alone to
//! [`Authenticator::with_static_token`](crate::auth::Authenticator::with_static_token).

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::auth::FEISHU_BASE_URL;
use crate::error::{LarkError, Result};
use crate::models::{ApiResponse, Credentials};

pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/callback";

/// User access token together with the refresh token that renews it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserToken {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds.
    pub expires_at: u64,
}

impl UserToken {
    /// Build a token from an `access_token` or `refresh_access_token` reply.
    ///
    /// A non-2xx status, a non-zero `code` or missing fields are
    /// authentication errors.
    pub fn from_grant(response: &ApiResponse, now: SystemTime) -> Result<Self> {
        if !response.is_http_success() {
            return Err(LarkError::AuthenticationError(format!(
                "Status {}: {}",
                response.status, response.body
            )));
        }
        if response.code() != Some(0) {
            return Err(LarkError::AuthenticationError(format!(
                "code {}: {}",
                response.code().unwrap_or(-1),
                response.msg().unwrap_or_default()
            )));
        }

        let data = response.data().ok_or_else(|| {
            LarkError::AuthenticationError("user token response has no data".to_string())
        })?;
        let field = |name: &str| {
            data.get(name)
                .and_then(|v| v.as_str())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    LarkError::AuthenticationError(format!("user token response has no {}", name))
                })
        };
        let access_token = field("access_token")?;
        let refresh_token = field("refresh_token")?;
        let expires_in = data
            .get("expires_in")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| {
                LarkError::AuthenticationError("user token response has no expires_in".to_string())
            })?;

        let issued = now.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        Ok(Self {
            access_token,
            refresh_token,
            expires_at: issued + expires_in,
        })
    }

    pub fn expires_at_time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(self.expires_at)
    }

    /// Read a token written by [`UserToken::save`]. A missing file is `None`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Write the token as JSON, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!(path = %path.display(), "Saved user access token");
        Ok(())
    }
}

impl std::fmt::Debug for UserToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserToken")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// User OAuth helper bound to one app.
#[derive(Clone, Debug)]
pub struct UserOAuth {
    credentials: Arc<Credentials>,
    redirect_uri: String,
    base_url: String,
    http: Client,
}

impl UserOAuth {
    pub fn new(credentials: Credentials, redirect_uri: impl Into<String>) -> Result<Self> {
        credentials.validate()?;
        Ok(Self {
            credentials: Arc::new(credentials),
            redirect_uri: redirect_uri.into(),
            base_url: FEISHU_BASE_URL.to_string(),
            http: Client::new(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn app_id(&self) -> &str {
        &self.credentials.app_id
    }

    /// URL the user visits to grant access. Scopes are space separated.
    pub fn authorize_url(&self, scope: &str, state: Option<&str>) -> Result<String> {
        let mut params = vec![
            ("app_id", self.credentials.app_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("scope", scope),
        ];
        if let Some(state) = state {
            params.push(("state", state));
        }

        let url = Url::parse_with_params(&format!("{}/authen/v1/index", self.base_url), &params)
            .map_err(|e| LarkError::ConfigError(format!("invalid base url: {}", e)))?;
        Ok(url.to_string())
    }

    /// Exchange an authorization code for a user access token.
    pub async fn exchange_code(&self, code: &str) -> Result<ApiResponse> {
        debug!("Exchanging authorization code for user access token");
        let payload = json!({
            "grant_type": "authorization_code",
            "code": code,
            "app_id": self.credentials.app_id,
            "app_secret": self.credentials.app_secret,
        });
        self.post("/authen/v1/access_token", &payload).await
    }

    /// Exchange an authorization code and keep the resulting [`UserToken`].
    pub async fn request_token(&self, code: &str) -> Result<UserToken> {
        let response = self.exchange_code(code).await?;
        UserToken::from_grant(&response, SystemTime::now())
    }

    /// Refresh a user access token.
    pub async fn refresh_user_token(&self, refresh_token: &str) -> Result<ApiResponse> {
        debug!("Refreshing user access token");
        let payload = json!({
            "grant_type": "refresh_token",
            "refresh_token": refresh_token,
            "app_id": self.credentials.app_id,
            "app_secret": self.credentials.app_secret,
        });
        self.post("/authen/v1/refresh_access_token", &payload).await
    }

    /// Identity (open_id, union_id, name, ...) of the token's user.
    pub async fn user_info(&self, user_access_token: &str) -> Result<ApiResponse> {
        let response = self
            .http
            .get(format!("{}/authen/v1/user_info", self.base_url))
            .bearer_auth(user_access_token)
            .send()
            .await?;
        ApiResponse::from_response(response).await
    }

    async fn post(&self, path: &str, payload: &serde_json::Value) -> Result<ApiResponse> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(payload)
            .send()
            .await?;
        ApiResponse::from_response(response).await
    }
}
