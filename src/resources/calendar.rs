//! Calendar events (calendar v4).

use reqwest::Method;
use serde_json::Value;

use super::Page;
use crate::client::{LarkClient, Query};
use crate::error::Result;
use crate::models::ApiResponse;

pub struct Calendar<'a> {
    client: &'a LarkClient,
}

impl<'a> Calendar<'a> {
    pub fn new(client: &'a LarkClient) -> Self {
        Self { client }
    }

    /// The primary calendar of the app (or of the user for user tokens).
    pub async fn primary(&self) -> Result<ApiResponse> {
        let query = Query::new().push_opt("user_id_type", self.client.user_id_type());
        self.client
            .call(
                Method::POST,
                "/calendar/v4/calendars/primary",
                None,
                Some(&query),
            )
            .await
    }

    /// Events between two Unix-second timestamps.
    pub async fn list_events(
        &self,
        calendar_id: &str,
        start_time: Option<i64>,
        end_time: Option<i64>,
        page: &Page,
    ) -> Result<ApiResponse> {
        let query = Query::new()
            .push_opt("start_time", start_time)
            .push_opt("end_time", end_time)
            .push_opt("page_size", page.page_size)
            .push_opt("page_token", page.page_token.as_deref());
        self.client
            .call(Method::GET, &events_path(calendar_id), None, Some(&query))
            .await
    }

    pub async fn get_event(&self, calendar_id: &str, event_id: &str) -> Result<ApiResponse> {
        let path = format!("{}/{}", events_path(calendar_id), event_id);
        self.client.call(Method::GET, &path, None, None).await
    }

    /// Create an event. `event` carries `summary`, `start_time`, `end_time`, ...
    pub async fn create_event(&self, calendar_id: &str, event: &Value) -> Result<ApiResponse> {
        let query = Query::new().push_opt("user_id_type", self.client.user_id_type());
        self.client
            .call(
                Method::POST,
                &events_path(calendar_id),
                Some(event),
                Some(&query),
            )
            .await
    }

    pub async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        changes: &Value,
    ) -> Result<ApiResponse> {
        let path = format!("{}/{}", events_path(calendar_id), event_id);
        self.client
            .call(Method::PATCH, &path, Some(changes), None)
            .await
    }

    pub async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<ApiResponse> {
        let path = format!("{}/{}", events_path(calendar_id), event_id);
        self.client.call(Method::DELETE, &path, None, None).await
    }
}

fn events_path(calendar_id: &str) -> String {
    format!("/calendar/v4/calendars/{}/events", calendar_id)
}
