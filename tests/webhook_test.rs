//! Tests for the webhook bot against a mock server.

use lark_client::WebhookBot;
use mockito::{Matcher, Server};
use serde_json::json;

mod webhook {
    use super::*;

    #[tokio::test]
    async fn send_text_posts_without_token() {
        let mut server = Server::new_async().await;
        let hook = server
            .mock("POST", "/open-apis/bot/v2/hook/abc")
            .match_header("authorization", Matcher::Missing)
            .match_body(Matcher::Json(json!({
                "msg_type": "text",
                "content": { "text": "deploy finished" }
            })))
            .with_body(r#"{"code":0,"data":{},"msg":"success"}"#)
            .create_async()
            .await;

        let bot = WebhookBot::new(format!("{}/open-apis/bot/v2/hook/abc", server.url())).unwrap();
        let response = bot.send_text("deploy finished").await.unwrap();

        assert_eq!(response.code(), Some(0));
        hook.assert_async().await;
    }

    #[tokio::test]
    async fn send_card_wraps_card() {
        let mut server = Server::new_async().await;
        let hook = server
            .mock("POST", "/hook")
            .match_body(Matcher::PartialJson(json!({
                "msg_type": "interactive",
                "card": { "header": { "title": { "tag": "plain_text", "content": "Alert" } } }
            })))
            .with_body(r#"{"code":0}"#)
            .create_async()
            .await;

        let bot = WebhookBot::new(format!("{}/hook", server.url())).unwrap();
        let card = json!({
            "header": { "title": { "tag": "plain_text", "content": "Alert" } },
            "elements": []
        });
        bot.send_card(card).await.unwrap();

        hook.assert_async().await;
    }

    #[tokio::test]
    async fn vendor_rejection_is_returned_verbatim() {
        let mut server = Server::new_async().await;
        let _hook = server
            .mock("POST", "/hook")
            .with_body(r#"{"code":19021,"msg":"sign match fail or timestamp is not within one hour from current time"}"#)
            .create_async()
            .await;

        let bot = WebhookBot::new(format!("{}/hook", server.url())).unwrap();
        let response = bot.send_text("hello").await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.code(), Some(19021));
    }
}
