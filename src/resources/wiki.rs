//! Wiki spaces and nodes (wiki v2).

use reqwest::Method;
use serde_json::json;

use super::Page;
use crate::client::{LarkClient, Query};
use crate::error::Result;
use crate::models::ApiResponse;
use crate::url_parser::DocumentKind;

pub struct Wiki<'a> {
    client: &'a LarkClient,
}

impl<'a> Wiki<'a> {
    pub fn new(client: &'a LarkClient) -> Self {
        Self { client }
    }

    /// Look up a node by its token. The `obj_token` in the reply addresses
    /// the underlying document.
    pub async fn get_node(
        &self,
        token: &str,
        obj_type: Option<DocumentKind>,
    ) -> Result<ApiResponse> {
        let query = Query::new()
            .push("token", token)
            .push_opt("obj_type", obj_type);
        self.client
            .call(Method::GET, "/wiki/v2/spaces/get_node", None, Some(&query))
            .await
    }

    /// Create a new document node in a space, at the root when no parent is given.
    pub async fn create_node(
        &self,
        space_id: &str,
        obj_type: DocumentKind,
        title: &str,
        parent_node_token: Option<&str>,
    ) -> Result<ApiResponse> {
        let path = format!("/wiki/v2/spaces/{}/nodes", space_id);
        let body = json!({
            "obj_type": obj_type.as_str(),
            "node_type": "origin",
            "title": title,
            "parent_node_token": parent_node_token,
        });
        self.client.call(Method::POST, &path, Some(&body), None).await
    }

    pub async fn list_nodes(
        &self,
        space_id: &str,
        parent_node_token: Option<&str>,
        page: &Page,
    ) -> Result<ApiResponse> {
        let path = format!("/wiki/v2/spaces/{}/nodes", space_id);
        let query = Query::new()
            .push_opt("parent_node_token", parent_node_token)
            .push_opt("page_size", page.page_size)
            .push_opt("page_token", page.page_token.as_deref());
        self.client.call(Method::GET, &path, None, Some(&query)).await
    }
}
