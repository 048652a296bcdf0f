//! Authenticated open platform client.

use std::borrow::Cow;
use std::sync::Arc;

use reqwest::multipart::Form;
use reqwest::{Client, Method, Response};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::auth::Authenticator;
use crate::error::Result;
use crate::models::{ApiResponse, UserIdType};

/// Query string parameters for a call. Optional values that are `None` are skipped.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Query(Vec<(String, String)>);

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, key: &str, value: impl ToString) -> Self {
        self.0.push((key.to_string(), value.to_string()));
        self
    }

    pub fn push_opt<V: ToString>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.push(key, value),
            None => self,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }
}

/// Client for authenticated open platform calls.
///
/// Every resource facade (documents, bitable, messages, calendar, ...) goes
/// through [`LarkClient::call`], which attaches a valid tenant access token.
/// Responses come back verbatim; vendor error codes in the body are not
/// interpreted and nothing is retried.
#[derive(Clone, Debug)]
pub struct LarkClient {
    auth: Authenticator,
    http: Client,
    base_url: String,
    user_id_type: Option<UserIdType>,
    sent_messages: Arc<Mutex<Vec<String>>>,
}

impl LarkClient {
    /// Create a new LarkClient using the authenticator's base URL and HTTP
    /// client, so timeouts configured on the authenticator apply to every call.
    pub fn new(auth: Authenticator) -> Self {
        let base_url = auth.base_url().to_string();
        let http = auth.http_client().clone();
        Self {
            auth,
            http,
            base_url,
            user_id_type: None,
            sent_messages: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Default `user_id_type` for resource calls that take one.
    pub fn with_user_id_type(mut self, user_id_type: UserIdType) -> Self {
        self.user_id_type = Some(user_id_type);
        self
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.auth
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn user_id_type(&self) -> Option<UserIdType> {
        self.user_id_type
    }

    /// Remember a message id sent by this client, for a later recall.
    pub(crate) async fn record_sent(&self, message_id: String) {
        self.sent_messages.lock().await.push(message_id);
    }

    /// Message ids sent so far, oldest first. The record is emptied.
    pub(crate) async fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut *self.sent_messages.lock().await)
    }

    /// Get a valid tenant access token.
    pub async fn get_token(&self) -> Result<String> {
        self.auth.get_access_token().await
    }

    /// Perform an authenticated call and return the raw response.
    ///
    /// `path` is joined to the base URL unless it is already an absolute
    /// `http(s)://` URL. Top-level `null` fields of an object body are dropped.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: Option<&Query>,
    ) -> Result<ApiResponse> {
        let response = self.send(method, path, body, query).await?;
        ApiResponse::from_response(response).await
    }

    /// Like [`LarkClient::call`] but hands back the undecoded response, for
    /// binary downloads.
    pub async fn call_raw(
        &self,
        method: Method,
        path: &str,
        query: Option<&Query>,
    ) -> Result<Response> {
        self.send(method, path, None, query).await
    }

    /// Authenticated multipart POST, for file and image uploads.
    pub async fn call_multipart(&self, path: &str, form: Form) -> Result<ApiResponse> {
        let token = self.auth.get_access_token().await?;
        let url = self.endpoint(path);
        debug!(%url, "Dispatching authenticated multipart upload");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .multipart(form)
            .send()
            .await?;

        ApiResponse::from_response(response).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: Option<&Query>,
    ) -> Result<Response> {
        let token = self.auth.get_access_token().await?;
        let url = self.endpoint(path);
        debug!(%method, %url, "Dispatching authenticated request");

        let mut request = self.http.request(method, &url).bearer_auth(&token);

        if let Some(query) = query.filter(|q| !q.is_empty()) {
            request = request.query(query.pairs());
        }

        if let Some(body) = body {
            request = request.json(&strip_null_fields(body));
        }

        Ok(request.send().await?)
    }

    /// Full URL for a path.
    pub fn endpoint(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }
}

/// Drop top-level `null` fields from an object body. Anything else passes through.
pub fn strip_null_fields(body: &Value) -> Cow<'_, Value> {
    match body {
        Value::Object(map) if map.values().any(Value::is_null) => Cow::Owned(Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )),
        _ => Cow::Borrowed(body),
    }
}
