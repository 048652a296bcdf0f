//! Tenant access token acquisition and caching.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use reqwest::Client;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{LarkError, Result};
use crate::models::{Credentials, TokenRequest, TokenResponse};
use crate::oauth::{UserOAuth, UserToken};

/// Open platform base URL for Feishu (mainland China).
pub const FEISHU_BASE_URL: &str = "https://open.feishu.cn/open-apis";

/// Open platform base URL for Lark (international).
pub const LARK_BASE_URL: &str = "https://open.larksuite.com/open-apis";

/// Tenant access token endpoint, relative to the base URL.
const TENANT_TOKEN_PATH: &str = "/auth/v3/tenant_access_token/internal";

/// Subtracted from the vendor-reported lifetime before caching.
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// User access tokens are refreshed this long before they expire.
pub const USER_TOKEN_MARGIN: Duration = Duration::from_secs(300);

/// Source of the current time, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Cached access token with expiration.
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: SystemTime,
}

#[derive(Clone)]
enum TokenSource {
    /// Exchange app credentials for a tenant access token.
    Tenant(Arc<Credentials>),
    /// A pre-obtained bearer token (e.g. a user access token). Never refreshed.
    Static(String),
    /// A user access token kept alive through its refresh token.
    User(Arc<UserSession>),
}

struct UserSession {
    oauth: UserOAuth,
    token: RwLock<UserToken>,
    store: Option<PathBuf>,
}

/// Authenticator for the open platform.
///
/// Tokens are fetched lazily: construction performs no network I/O. Clones
/// share the same cache.
#[derive(Clone)]
pub struct Authenticator {
    source: TokenSource,
    base_url: String,
    client: Client,
    clock: Arc<dyn Clock>,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl Authenticator {
    /// Create a new authenticator from app credentials.
    ///
    /// Fails with a configuration error if either credential is empty.
    pub fn new(credentials: Credentials) -> Result<Self> {
        credentials.validate()?;
        Ok(Self::with_source(TokenSource::Tenant(Arc::new(credentials))))
    }

    /// Create a new authenticator from a credentials JSON file
    /// (`{"app_id": "...", "app_secret": "..."}`).
    ///
    /// An unreadable or malformed file is a configuration error.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            LarkError::ConfigError(format!(
                "cannot read credentials file {}: {}",
                path.display(),
                e
            ))
        })?;
        let credentials: Credentials = serde_json::from_str(&content).map_err(|e| {
            LarkError::ConfigError(format!(
                "malformed credentials file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::new(credentials)
    }

    /// Create a new authenticator from `LARK_APP_ID` and `LARK_APP_SECRET`.
    pub fn from_env() -> Result<Self> {
        let app_id = env_var("LARK_APP_ID")?;
        let app_secret = env_var("LARK_APP_SECRET")?;
        Self::new(Credentials::new(app_id, app_secret)?)
    }

    /// Use a pre-obtained bearer token instead of app credentials.
    pub fn with_static_token(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(LarkError::ConfigError(
                "access token must not be empty".to_string(),
            ));
        }
        Ok(Self::with_source(TokenSource::Static(token)))
    }

    /// Act as a user. The token is refreshed through `oauth` once it is
    /// within [`USER_TOKEN_MARGIN`] of expiring.
    pub fn with_user_token(oauth: UserOAuth, token: UserToken) -> Self {
        Self::with_user_session(oauth, token, None)
    }

    /// Like [`Authenticator::with_user_token`], loading the token from a file
    /// written by [`UserToken::save`]. Refreshed tokens are written back to it.
    pub fn from_user_token_file<P: AsRef<Path>>(oauth: UserOAuth, path: P) -> Result<Self> {
        let path = path.as_ref();
        let token = UserToken::load(path)?.ok_or_else(|| {
            LarkError::ConfigError(format!("no user token stored at {}", path.display()))
        })?;
        Ok(Self::with_user_session(
            oauth,
            token,
            Some(path.to_path_buf()),
        ))
    }

    fn with_user_session(oauth: UserOAuth, token: UserToken, store: Option<PathBuf>) -> Self {
        Self::with_source(TokenSource::User(Arc::new(UserSession {
            oauth,
            token: RwLock::new(token),
            store,
        })))
    }

    fn with_source(source: TokenSource) -> Self {
        Self {
            source,
            base_url: FEISHU_BASE_URL.to_string(),
            client: Client::new(),
            clock: Arc::new(SystemClock),
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    /// Point at a different deployment (Lark, or a mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// HTTP client used for token requests; [`LarkClient`](crate::LarkClient)
    /// reuses it for every call.
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    /// App id, if this authenticator is bound to an app.
    pub fn app_id(&self) -> Option<&str> {
        match &self.source {
            TokenSource::Tenant(credentials) => Some(&credentials.app_id),
            TokenSource::User(session) => Some(session.oauth.app_id()),
            TokenSource::Static(_) => None,
        }
    }

    pub fn now(&self) -> SystemTime {
        self.clock.now()
    }

    /// Get a valid access token, fetching a new one if the cache is empty or expired.
    pub async fn get_access_token(&self) -> Result<String> {
        let credentials = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::User(session) => return self.user_access_token(session, false).await,
            TokenSource::Tenant(credentials) => credentials,
        };

        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > self.clock.now() {
                    debug!("Using cached tenant access token");
                    return Ok(token.access_token.clone());
                }
                debug!("Cached tenant access token expired");
            }
        }

        let new_token = self.fetch_token(credentials).await?;
        let access_token = new_token.access_token.clone();

        {
            let mut cached = self.cached_token.write().await;
            *cached = Some(new_token);
        }

        Ok(access_token)
    }

    /// Fetch a new token regardless of the cache.
    ///
    /// On failure the previously cached token stays in place.
    pub async fn refresh_token(&self) -> Result<String> {
        let credentials = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::User(session) => return self.user_access_token(session, true).await,
            TokenSource::Tenant(credentials) => credentials,
        };

        let new_token = self.fetch_token(credentials).await?;
        let access_token = new_token.access_token.clone();
        *self.cached_token.write().await = Some(new_token);
        Ok(access_token)
    }

    /// Drop the cached token so the next call fetches a fresh one.
    pub async fn invalidate(&self) {
        match &self.source {
            TokenSource::User(session) => session.token.write().await.expires_at = 0,
            _ => *self.cached_token.write().await = None,
        }
    }

    /// Instant after which the cached token is no longer served, if any.
    pub async fn cached_expiry(&self) -> Option<SystemTime> {
        match &self.source {
            TokenSource::Static(_) => None,
            TokenSource::User(session) => session
                .token
                .read()
                .await
                .expires_at_time()
                .checked_sub(USER_TOKEN_MARGIN),
            TokenSource::Tenant(_) => self
                .cached_token
                .read()
                .await
                .as_ref()
                .map(|token| token.expires_at),
        }
    }

    /// Serve the stored user token, refreshing it when it is close to expiry
    /// or when `force` is set. The stored token is replaced only on success.
    async fn user_access_token(&self, session: &UserSession, force: bool) -> Result<String> {
        let refresh_token = {
            let token = session.token.read().await;
            if !force && token.expires_at_time() > self.clock.now() + USER_TOKEN_MARGIN {
                debug!("Using stored user access token");
                return Ok(token.access_token.clone());
            }
            token.refresh_token.clone()
        };

        info!(app_id = %session.oauth.app_id(), "Refreshing user access token");
        let response = session
            .oauth
            .refresh_user_token(&refresh_token)
            .await
            .map_err(|e| match e {
                LarkError::HttpError(e) => {
                    warn!(error = %e, "User token endpoint unreachable");
                    LarkError::AuthenticationError(format!(
                        "user token endpoint unreachable: {}",
                        e
                    ))
                }
                other => other,
            })?;
        let fresh = UserToken::from_grant(&response, self.clock.now())?;

        if let Some(path) = &session.store {
            fresh.save(path)?;
        }

        let access_token = fresh.access_token.clone();
        *session.token.write().await = fresh;
        Ok(access_token)
    }

    /// Exchange app credentials for a tenant access token.
    async fn fetch_token(&self, credentials: &Credentials) -> Result<CachedToken> {
        let url = format!("{}{}", self.base_url, TENANT_TOKEN_PATH);
        debug!(app_id = %credentials.app_id, "Requesting tenant access token");

        let response = self
            .client
            .post(&url)
            .json(&TokenRequest {
                app_id: &credentials.app_id,
                app_secret: &credentials.app_secret,
            })
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Token endpoint unreachable");
                LarkError::AuthenticationError(format!("token endpoint unreachable: {}", e))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            warn!(error = %e, "Failed to read token response");
            LarkError::AuthenticationError(format!("failed to read token response: {}", e))
        })?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Token endpoint returned an error status");
            return Err(LarkError::AuthenticationError(format!(
                "Status {}: {}",
                status, body
            )));
        }

        let token_response: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            LarkError::AuthenticationError(format!("malformed token response: {}", e))
        })?;

        if token_response.code != 0 {
            warn!(
                code = token_response.code,
                msg = %token_response.msg,
                "Token endpoint rejected credentials"
            );
            return Err(LarkError::AuthenticationError(format!(
                "code {}: {}",
                token_response.code, token_response.msg
            )));
        }

        let access_token = token_response
            .tenant_access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                LarkError::AuthenticationError("response has no tenant_access_token".to_string())
            })?;
        let expire = token_response.expire.ok_or_else(|| {
            LarkError::AuthenticationError("response has no expire".to_string())
        })?;

        let lifetime = Duration::from_secs(expire).saturating_sub(EXPIRY_MARGIN);
        let expires_at = self.clock.now() + lifetime;

        info!(app_id = %credentials.app_id, expire, "Fetched tenant access token");

        Ok(CachedToken {
            access_token,
            expires_at,
        })
    }
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| LarkError::ConfigError(format!("{} is not set", name)))
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("app_id", &self.app_id())
            .field("base_url", &self.base_url)
            .finish()
    }
}
