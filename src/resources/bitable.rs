//! Bitable (multi-dimensional table) records.

use reqwest::Method;
use serde_json::{json, Value};

use super::Page;
use crate::client::{LarkClient, Query};
use crate::error::Result;
use crate::models::ApiResponse;

/// Record-level operations on a bitable app.
pub struct Bitable<'a> {
    client: &'a LarkClient,
}

/// Filters for [`Bitable::list_records`].
#[derive(Debug, Default, Clone)]
pub struct ListRecords {
    pub view_id: Option<String>,
    /// Formula filter, e.g. `CurrentValue.[Status]="Done"`.
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub page: Page,
}

impl<'a> Bitable<'a> {
    pub fn new(client: &'a LarkClient) -> Self {
        Self { client }
    }

    pub async fn list_tables(&self, app_token: &str, page: &Page) -> Result<ApiResponse> {
        let path = format!("/bitable/v1/apps/{}/tables", app_token);
        let query = paged(Query::new(), page);
        self.client.call(Method::GET, &path, None, Some(&query)).await
    }

    pub async fn list_fields(
        &self,
        app_token: &str,
        table_id: &str,
        page: &Page,
    ) -> Result<ApiResponse> {
        let path = format!("/bitable/v1/apps/{}/tables/{}/fields", app_token, table_id);
        let query = paged(Query::new(), page);
        self.client.call(Method::GET, &path, None, Some(&query)).await
    }

    pub async fn list_records(
        &self,
        app_token: &str,
        table_id: &str,
        options: &ListRecords,
    ) -> Result<ApiResponse> {
        let query = Query::new()
            .push_opt("view_id", options.view_id.as_deref())
            .push_opt("filter", options.filter.as_deref())
            .push_opt("sort", options.sort.as_deref())
            .push_opt("user_id_type", self.client.user_id_type());
        let query = paged(query, &options.page);
        self.client
            .call(
                Method::GET,
                &records_path(app_token, table_id),
                None,
                Some(&query),
            )
            .await
    }

    /// Search records. `search` is the request body as documented by the
    /// vendor (`view_id`, `filter`, `sort`, `field_names`, ...).
    pub async fn search_records(
        &self,
        app_token: &str,
        table_id: &str,
        search: &Value,
        page: &Page,
    ) -> Result<ApiResponse> {
        let path = format!("{}/search", records_path(app_token, table_id));
        let query = paged(
            Query::new().push_opt("user_id_type", self.client.user_id_type()),
            page,
        );
        self.client
            .call(Method::POST, &path, Some(search), Some(&query))
            .await
    }

    pub async fn get_record(
        &self,
        app_token: &str,
        table_id: &str,
        record_id: &str,
    ) -> Result<ApiResponse> {
        let path = format!("{}/{}", records_path(app_token, table_id), record_id);
        self.client.call(Method::GET, &path, None, None).await
    }

    /// Create one record from a field-name to value map.
    pub async fn create_record(
        &self,
        app_token: &str,
        table_id: &str,
        fields: Value,
    ) -> Result<ApiResponse> {
        let body = json!({ "fields": fields });
        self.client
            .call(
                Method::POST,
                &records_path(app_token, table_id),
                Some(&body),
                None,
            )
            .await
    }

    /// Create several records; each item is a field map.
    pub async fn batch_create_records(
        &self,
        app_token: &str,
        table_id: &str,
        records: Vec<Value>,
    ) -> Result<ApiResponse> {
        let path = format!("{}/batch_create", records_path(app_token, table_id));
        let records: Vec<Value> = records
            .into_iter()
            .map(|fields| json!({ "fields": fields }))
            .collect();
        let body = json!({ "records": records });
        self.client.call(Method::POST, &path, Some(&body), None).await
    }

    pub async fn update_record(
        &self,
        app_token: &str,
        table_id: &str,
        record_id: &str,
        fields: Value,
    ) -> Result<ApiResponse> {
        let path = format!("{}/{}", records_path(app_token, table_id), record_id);
        let body = json!({ "fields": fields });
        self.client.call(Method::PUT, &path, Some(&body), None).await
    }

    pub async fn delete_record(
        &self,
        app_token: &str,
        table_id: &str,
        record_id: &str,
    ) -> Result<ApiResponse> {
        let path = format!("{}/{}", records_path(app_token, table_id), record_id);
        self.client.call(Method::DELETE, &path, None, None).await
    }
}

fn records_path(app_token: &str, table_id: &str) -> String {
    format!("/bitable/v1/apps/{}/tables/{}/records", app_token, table_id)
}

fn paged(query: Query, page: &Page) -> Query {
    query
        .push_opt("page_size", page.page_size)
        .push_opt("page_token", page.page_token.as_deref())
}
