//! Tasks (task v2).

use reqwest::Method;

use super::Page;
use crate::client::{LarkClient, Query};
use crate::error::Result;
use crate::models::ApiResponse;

pub struct Tasks<'a> {
    client: &'a LarkClient,
}

/// Filters for [`Tasks::list_tasklist_tasks`].
#[derive(Debug, Default, Clone)]
pub struct TasklistFilter {
    pub completed: Option<bool>,
    /// Unix milliseconds.
    pub start_create_time: Option<i64>,
    /// Unix milliseconds.
    pub end_create_time: Option<i64>,
    pub page: Page,
}

impl<'a> Tasks<'a> {
    pub fn new(client: &'a LarkClient) -> Self {
        Self { client }
    }

    /// Tasks assigned to the caller. `completed` of `None` returns both.
    pub async fn list_tasks(&self, completed: Option<bool>, page: &Page) -> Result<ApiResponse> {
        let query = Query::new()
            .push("type", "my_tasks")
            .push_opt("completed", completed)
            .push_opt("page_size", page.page_size)
            .push_opt("page_token", page.page_token.as_deref())
            .push_opt("user_id_type", self.client.user_id_type());
        self.client
            .call(Method::GET, "/task/v2/tasks", None, Some(&query))
            .await
    }

    pub async fn list_tasklist_tasks(
        &self,
        tasklist_guid: &str,
        filter: &TasklistFilter,
    ) -> Result<ApiResponse> {
        let path = format!("/task/v2/tasklists/{}/tasks", tasklist_guid);
        let query = Query::new()
            .push_opt("completed", filter.completed)
            .push_opt("start_create_time", filter.start_create_time)
            .push_opt("end_create_time", filter.end_create_time)
            .push_opt("page_size", filter.page.page_size)
            .push_opt("page_token", filter.page.page_token.as_deref())
            .push_opt("user_id_type", self.client.user_id_type());
        self.client.call(Method::GET, &path, None, Some(&query)).await
    }
}
