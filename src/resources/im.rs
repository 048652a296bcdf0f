//! Instant messaging (im v1) and contact lookups.

use std::path::{Path, PathBuf};

use futures::{Stream, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde_json::{json, Value};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::Page;
use crate::client::{LarkClient, Query};
use crate::error::{LarkError, Result};
use crate::models::{ApiResponse, ReceiveIdType, UserIdType};

const IM_BASE: &str = "/im/v1";

/// Message sending and chat queries.
pub struct Messages<'a> {
    client: &'a LarkClient,
}

/// Time window and ordering for [`Messages::list_chat_messages`].
#[derive(Debug, Default, Clone)]
pub struct MessageWindow {
    /// Unix seconds, inclusive.
    pub start_time: Option<i64>,
    /// Unix seconds, inclusive.
    pub end_time: Option<i64>,
    /// `ByCreateTimeAsc` or `ByCreateTimeDesc`.
    pub sort_type: Option<String>,
    pub page: Page,
}

/// Messages gathered across pages by [`Messages::fetch_chat_messages`].
#[derive(Debug, Default)]
pub struct ChatHistory {
    pub items: Vec<Value>,
    pub has_more: bool,
    /// Token to continue from, when `has_more` is set.
    pub page_token: Option<String>,
    /// The page response that stopped paging because the vendor refused it.
    pub rejected: Option<ApiResponse>,
}

/// Result of a file download.
#[derive(Debug)]
pub enum DownloadOutcome {
    Saved { path: PathBuf, bytes: u64 },
    /// The vendor refused; its response is returned as is.
    Rejected(ApiResponse),
}

impl<'a> Messages<'a> {
    pub fn new(client: &'a LarkClient) -> Self {
        Self { client }
    }

    /// Send a message. `content` is the message-type specific object; it is
    /// serialized to a JSON string as the vendor expects.
    ///
    /// When `receive_id_type` is `None` it is inferred from the id prefix.
    pub async fn send(
        &self,
        receive_id: &str,
        receive_id_type: Option<ReceiveIdType>,
        msg_type: &str,
        content: &Value,
    ) -> Result<ApiResponse> {
        let id_type = receive_id_type.unwrap_or_else(|| ReceiveIdType::infer(receive_id));
        let query = Query::new().push("receive_id_type", id_type);
        let body = json!({
            "receive_id": receive_id,
            "msg_type": msg_type,
            "content": content.to_string(),
        });
        debug!(%id_type, msg_type, "Sending message");
        let response = self
            .client
            .call(
                Method::POST,
                &format!("{}/messages", IM_BASE),
                Some(&body),
                Some(&query),
            )
            .await?;
        self.remember(&response).await;
        Ok(response)
    }

    pub async fn send_text(
        &self,
        receive_id: &str,
        receive_id_type: Option<ReceiveIdType>,
        text: &str,
    ) -> Result<ApiResponse> {
        self.send(receive_id, receive_id_type, "text", &json!({ "text": text }))
            .await
    }

    pub async fn send_card(
        &self,
        receive_id: &str,
        receive_id_type: Option<ReceiveIdType>,
        card: &Value,
    ) -> Result<ApiResponse> {
        self.send(receive_id, receive_id_type, "interactive", card)
            .await
    }

    /// Reply in the thread of `message_id`.
    pub async fn reply(
        &self,
        message_id: &str,
        msg_type: &str,
        content: &Value,
    ) -> Result<ApiResponse> {
        let path = format!("{}/messages/{}/reply", IM_BASE, message_id);
        let body = json!({ "msg_type": msg_type, "content": content.to_string() });
        let response = self
            .client
            .call(Method::POST, &path, Some(&body), None)
            .await?;
        self.remember(&response).await;
        Ok(response)
    }

    /// Upload an image and send it. When the upload is refused its response
    /// is returned and nothing is sent.
    pub async fn send_image<P: AsRef<Path>>(
        &self,
        receive_id: &str,
        receive_id_type: Option<ReceiveIdType>,
        image: P,
    ) -> Result<ApiResponse> {
        let upload = self.upload_image(image).await?;
        let image_key = uploaded_key(&upload, "image_key").map(str::to_string);
        match image_key {
            Some(image_key) => {
                self.send(
                    receive_id,
                    receive_id_type,
                    "image",
                    &json!({ "image_key": image_key }),
                )
                .await
            }
            None => Ok(upload),
        }
    }

    /// Upload a file and send it. When the upload is refused its response is
    /// returned and nothing is sent.
    pub async fn send_file<P: AsRef<Path>>(
        &self,
        receive_id: &str,
        receive_id_type: Option<ReceiveIdType>,
        file: P,
        file_name: Option<&str>,
    ) -> Result<ApiResponse> {
        let upload = self.upload_file(file, file_name).await?;
        let file_key = uploaded_key(&upload, "file_key").map(str::to_string);
        match file_key {
            Some(file_key) => {
                self.send(
                    receive_id,
                    receive_id_type,
                    "file",
                    &json!({ "file_key": file_key }),
                )
                .await
            }
            None => Ok(upload),
        }
    }

    /// Recall a message sent by this app.
    pub async fn recall(&self, message_id: &str) -> Result<ApiResponse> {
        let path = format!("{}/messages/{}", IM_BASE, message_id);
        self.client.call(Method::DELETE, &path, None, None).await
    }

    /// Recall every message this client has sent or replied with, oldest
    /// first. Vendor refusals are logged and returned alongside the id.
    ///
    /// On a transport error the ids not yet recalled are kept for a later
    /// attempt.
    pub async fn recall_all(&self) -> Result<Vec<(String, ApiResponse)>> {
        let mut pending = self.client.take_sent().await.into_iter();
        let mut recalled = Vec::new();

        while let Some(message_id) = pending.next() {
            match self.recall(&message_id).await {
                Ok(response) => {
                    if response.code() != Some(0) {
                        warn!(
                            %message_id,
                            code = ?response.code(),
                            msg = ?response.msg(),
                            "Failed to recall message"
                        );
                    }
                    recalled.push((message_id, response));
                }
                Err(e) => {
                    for id in std::iter::once(message_id).chain(pending) {
                        self.client.record_sent(id).await;
                    }
                    return Err(e);
                }
            }
        }

        Ok(recalled)
    }

    /// One page of messages in a chat.
    pub async fn list_chat_messages(
        &self,
        chat_id: &str,
        window: &MessageWindow,
    ) -> Result<ApiResponse> {
        let query = Query::new()
            .push("container_id_type", "chat")
            .push("container_id", chat_id)
            .push_opt("start_time", window.start_time)
            .push_opt("end_time", window.end_time)
            .push_opt("sort_type", window.sort_type.as_deref())
            .push_opt("page_size", window.page.page_size)
            .push_opt("page_token", window.page.page_token.as_deref());
        self.client
            .call(
                Method::GET,
                &format!("{}/messages", IM_BASE),
                None,
                Some(&query),
            )
            .await
    }

    /// Follow `page_token` through up to `max_pages` pages of a chat.
    ///
    /// Paging stops early when a page is empty, shorter than the requested
    /// page size, or the last one. A refused page stops paging and is kept in
    /// [`ChatHistory::rejected`].
    pub async fn fetch_chat_messages(
        &self,
        chat_id: &str,
        window: &MessageWindow,
        max_pages: usize,
    ) -> Result<ChatHistory> {
        let mut window = window.clone();
        let mut history = ChatHistory {
            page_token: window.page.page_token.clone(),
            ..ChatHistory::default()
        };

        for _ in 0..max_pages {
            let response = self.list_chat_messages(chat_id, &window).await?;
            if !response.is_http_success() || response.code() != Some(0) {
                history.rejected = Some(response);
                break;
            }

            let data = response.data();
            let items = data
                .and_then(|d| d.get("items"))
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            if items.is_empty() {
                break;
            }

            let page_len = items.len();
            history.items.extend(items);
            history.has_more = data
                .and_then(|d| d.get("has_more"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            history.page_token = data
                .and_then(|d| d.get("page_token"))
                .and_then(Value::as_str)
                .map(str::to_string);

            let short_page = window
                .page
                .page_size
                .is_some_and(|size| page_len < size as usize);
            match &history.page_token {
                Some(token) if history.has_more && !short_page => {
                    window.page.page_token = Some(token.clone());
                }
                _ => break,
            }
        }

        debug!(chat_id, count = history.items.len(), "Fetched chat messages");
        Ok(history)
    }

    /// Chats the app is a member of.
    pub async fn list_chats(&self, sort_type: Option<&str>, page: &Page) -> Result<ApiResponse> {
        let query = Query::new()
            .push_opt("user_id_type", self.client.user_id_type())
            .push_opt("sort_type", sort_type)
            .push_opt("page_size", page.page_size)
            .push_opt("page_token", page.page_token.as_deref());
        self.client
            .call(Method::GET, &format!("{}/chats", IM_BASE), None, Some(&query))
            .await
    }

    pub async fn add_reaction(&self, message_id: &str, emoji_type: &str) -> Result<ApiResponse> {
        let path = format!("{}/messages/{}/reactions", IM_BASE, message_id);
        let body = json!({ "reaction_type": { "emoji_type": emoji_type } });
        self.client.call(Method::POST, &path, Some(&body), None).await
    }

    pub async fn list_reactions(&self, message_id: &str) -> Result<ApiResponse> {
        let path = format!("{}/messages/{}/reactions", IM_BASE, message_id);
        self.client.call(Method::GET, &path, None, None).await
    }

    pub async fn get_user(
        &self,
        user_id: &str,
        user_id_type: Option<UserIdType>,
    ) -> Result<ApiResponse> {
        let path = format!("/contact/v3/users/{}", user_id);
        let query =
            Query::new().push_opt("user_id_type", user_id_type.or(self.client.user_id_type()));
        self.client.call(Method::GET, &path, None, Some(&query)).await
    }

    /// Display name of a user, falling back to the id itself when the lookup
    /// is refused or the user has no name.
    pub async fn get_user_name(
        &self,
        user_id: &str,
        user_id_type: Option<UserIdType>,
    ) -> Result<String> {
        let response = self.get_user(user_id, user_id_type).await?;
        let name = response
            .data()
            .filter(|_| response.code() == Some(0))
            .and_then(|d| d.pointer("/user/name"))
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty());
        Ok(name.unwrap_or(user_id).to_string())
    }

    /// Upload an image for use in messages. The reply carries an `image_key`.
    pub async fn upload_image<P: AsRef<Path>>(&self, local_path: P) -> Result<ApiResponse> {
        let local_path = local_path.as_ref();
        let form = Form::new()
            .text("image_type", "message")
            .part("image", file_part(local_path).await?);
        self.client
            .call_multipart(&format!("{}/images", IM_BASE), form)
            .await
    }

    /// Upload a file for use in messages. The reply carries a `file_key`.
    pub async fn upload_file<P: AsRef<Path>>(
        &self,
        local_path: P,
        file_name: Option<&str>,
    ) -> Result<ApiResponse> {
        let local_path = local_path.as_ref();
        let name = match file_name {
            Some(name) => name.to_string(),
            None => file_name_of(local_path)?,
        };
        let form = Form::new()
            .text("file_type", upload_file_type(local_path))
            .text("file_name", name)
            .part("file", file_part(local_path).await?);
        self.client
            .call_multipart(&format!("{}/files", IM_BASE), form)
            .await
    }

    /// Download a file by key into `destination` (a file path, or a directory
    /// in which case the key is used as the file name).
    pub async fn download_file<P: AsRef<Path>>(
        &self,
        file_key: &str,
        destination: P,
    ) -> Result<DownloadOutcome> {
        let path = format!("{}/files/{}", IM_BASE, file_key);
        let response = self.client.call_raw(Method::GET, &path, None).await?;

        if !response.status().is_success() {
            return Ok(DownloadOutcome::Rejected(
                ApiResponse::from_response(response).await?,
            ));
        }

        let destination = destination.as_ref();
        let final_path = if destination.is_dir() {
            destination.join(file_key)
        } else {
            destination.to_path_buf()
        };

        let bytes = save_stream(response.bytes_stream(), &final_path).await?;

        Ok(DownloadOutcome::Saved {
            path: final_path,
            bytes,
        })
    }

    async fn remember(&self, response: &ApiResponse) {
        if response.code() != Some(0) {
            return;
        }
        if let Some(message_id) = response
            .data()
            .and_then(|d| d.get("message_id"))
            .and_then(Value::as_str)
        {
            self.client.record_sent(message_id.to_string()).await;
        }
    }
}

/// Key of a successful upload (`image_key` or `file_key`).
fn uploaded_key<'r>(response: &'r ApiResponse, field: &str) -> Option<&'r str> {
    response
        .data()
        .filter(|_| response.code() == Some(0))
        .and_then(|d| d.get(field))
        .and_then(Value::as_str)
}

/// Write a byte stream to `path`. A partly written file is removed on failure.
async fn save_stream<S, B, E>(stream: S, path: &Path) -> Result<u64>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<LarkError>,
{
    let mut file = File::create(path).await?;
    let written = write_chunks(stream, &mut file).await;
    drop(file);

    if written.is_err() {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %e, "Failed to remove partial download");
        }
    }
    written
}

async fn write_chunks<S, B, E>(stream: S, file: &mut File) -> Result<u64>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<LarkError>,
{
    let mut stream = std::pin::pin!(stream);
    let mut bytes = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(Into::into)?;
        let chunk = chunk.as_ref();
        bytes += chunk.len() as u64;
        file.write_all(chunk).await?;
    }

    file.flush().await?;
    Ok(bytes)
}

/// Vendor `file_type` for an upload, from the file extension.
pub fn upload_file_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("opus") => "opus",
        Some("mp4") => "mp4",
        Some("pdf") => "pdf",
        Some("doc") | Some("docx") => "doc",
        Some("xls") | Some("xlsx") => "xls",
        Some("ppt") | Some("pptx") => "ppt",
        _ => "stream",
    }
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| LarkError::ConfigError(format!("not a file path: {}", path.display())))
}

async fn file_part(path: &Path) -> Result<Part> {
    let content = tokio::fs::read(path).await?;
    let mime_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string();
    Ok(Part::bytes(content)
        .file_name(file_name_of(path)?)
        .mime_str(&mime_type)?)
}
