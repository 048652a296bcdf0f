//! lark_client - A client SDK for the Feishu/Lark open platform.
//!
//! This library provides:
//! - Tenant access token acquisition with expiry-aware caching
//! - A generic authenticated call primitive returning raw responses
//! - Thin facades for documents, wiki, bitable, messaging, calendar and tasks
//! - A webhook bot for group messages that needs no token
//!
//! # Example
//!
//! ```no_run
//! use lark_client::{Authenticator, Credentials, LarkClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let auth = Authenticator::new(Credentials::new("cli_xxx", "secret")?)?;
//!     let client = LarkClient::new(auth);
//!
//!     let response = client.im().send_text("oc_xxx", None, "Hello").await?;
//!     if response.code() != Some(0) {
//!         eprintln!("vendor refused: {:?}", response.msg());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod oauth;
pub mod resources;
pub mod url_parser;
pub mod webhook;

// Re-exports for convenience
pub use auth::{Authenticator, Clock, SystemClock, FEISHU_BASE_URL, LARK_BASE_URL};
pub use client::{LarkClient, Query};
pub use error::{LarkError, Result};
pub use models::{ApiResponse, Credentials, ReceiveIdType, UserIdType};
pub use oauth::{UserOAuth, UserToken};
pub use reqwest::Method;
pub use url_parser::{extract_token, parse_document_url, DocumentKind};
pub use webhook::WebhookBot;
