//! Cloud documents (docx v1).

use reqwest::Method;
use serde_json::{json, Value};

use super::Page;
use crate::client::{LarkClient, Query};
use crate::error::Result;
use crate::models::{ApiResponse, UserIdType};

const DOCX_BASE: &str = "/docx/v1/documents";

/// Revision id meaning "latest".
pub const LATEST_REVISION: i64 = -1;

/// Document and block operations.
pub struct Documents<'a> {
    client: &'a LarkClient,
}

impl<'a> Documents<'a> {
    pub fn new(client: &'a LarkClient) -> Self {
        Self { client }
    }

    /// Create an empty document, optionally inside a folder.
    pub async fn create_document(
        &self,
        title: &str,
        folder_token: Option<&str>,
    ) -> Result<ApiResponse> {
        let body = json!({ "title": title, "folder_token": folder_token });
        self.client
            .call(Method::POST, DOCX_BASE, Some(&body), None)
            .await
    }

    pub async fn get_document(&self, document_id: &str) -> Result<ApiResponse> {
        self.client
            .call(Method::GET, &format!("{}/{}", DOCX_BASE, document_id), None, None)
            .await
    }

    /// Plain text content of the whole document.
    pub async fn get_raw_content(&self, document_id: &str) -> Result<ApiResponse> {
        let path = format!("{}/{}/raw_content", DOCX_BASE, document_id);
        self.client.call(Method::GET, &path, None, None).await
    }

    /// One page of all blocks in the document.
    pub async fn list_blocks(&self, document_id: &str, page: &Page) -> Result<ApiResponse> {
        let path = format!("{}/{}/blocks", DOCX_BASE, document_id);
        let query = self.paged_query(page);
        self.client.call(Method::GET, &path, None, Some(&query)).await
    }

    pub async fn get_block(&self, document_id: &str, block_id: &str) -> Result<ApiResponse> {
        let path = format!("{}/{}/blocks/{}", DOCX_BASE, document_id, block_id);
        let query = Query::new().push("document_revision_id", LATEST_REVISION);
        self.client.call(Method::GET, &path, None, Some(&query)).await
    }

    pub async fn list_block_children(
        &self,
        document_id: &str,
        block_id: &str,
        page: &Page,
    ) -> Result<ApiResponse> {
        let path = format!("{}/{}/blocks/{}/children", DOCX_BASE, document_id, block_id);
        let query = self.paged_query(page);
        self.client.call(Method::GET, &path, None, Some(&query)).await
    }

    /// Insert child blocks under `block_id` (the document id addresses the root).
    ///
    /// `index` of `-1` appends.
    pub async fn create_blocks(
        &self,
        document_id: &str,
        block_id: &str,
        children: Vec<Value>,
        index: i64,
    ) -> Result<ApiResponse> {
        let path = format!("{}/{}/blocks/{}/children", DOCX_BASE, document_id, block_id);
        let query = Query::new().push("document_revision_id", LATEST_REVISION);
        let body = json!({ "children": children, "index": index });
        self.client
            .call(Method::POST, &path, Some(&body), Some(&query))
            .await
    }

    pub async fn update_block(
        &self,
        document_id: &str,
        block_id: &str,
        update: &Value,
        user_id_type: Option<UserIdType>,
    ) -> Result<ApiResponse> {
        let path = format!("{}/{}/blocks/{}", DOCX_BASE, document_id, block_id);
        let query = Query::new()
            .push("document_revision_id", LATEST_REVISION)
            .push_opt("user_id_type", user_id_type.or(self.client.user_id_type()));
        self.client
            .call(Method::PATCH, &path, Some(update), Some(&query))
            .await
    }

    /// Apply several block updates; each request names its own `block_id`.
    pub async fn batch_update_blocks(
        &self,
        document_id: &str,
        requests: Vec<Value>,
        user_id_type: Option<UserIdType>,
    ) -> Result<ApiResponse> {
        let path = format!("{}/{}/blocks/batch_update", DOCX_BASE, document_id);
        let query = Query::new()
            .push("document_revision_id", LATEST_REVISION)
            .push_opt("user_id_type", user_id_type.or(self.client.user_id_type()));
        let body = json!({ "requests": requests });
        self.client
            .call(Method::PATCH, &path, Some(&body), Some(&query))
            .await
    }

    /// Delete children `[start_index, end_index)` of `block_id`.
    pub async fn delete_blocks(
        &self,
        document_id: &str,
        block_id: &str,
        start_index: u32,
        end_index: u32,
    ) -> Result<ApiResponse> {
        let path = format!(
            "{}/{}/blocks/{}/children/batch_delete",
            DOCX_BASE, document_id, block_id
        );
        let query = Query::new().push("document_revision_id", LATEST_REVISION);
        let body = json!({ "start_index": start_index, "end_index": end_index });
        self.client
            .call(Method::DELETE, &path, Some(&body), Some(&query))
            .await
    }

    fn paged_query(&self, page: &Page) -> Query {
        Query::new()
            .push("document_revision_id", LATEST_REVISION)
            .push_opt("page_size", page.page_size)
            .push_opt("page_token", page.page_token.as_deref())
            .push_opt("user_id_type", self.client.user_id_type())
    }
}
