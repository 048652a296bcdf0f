//! lark CLI - Call the Feishu/Lark open platform from the command line.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use lark_client::{
    parse_document_url, Authenticator, Credentials, LarkClient, Method, Query, ReceiveIdType,
    WebhookBot, FEISHU_BASE_URL,
};

/// CLI tool for the Feishu/Lark open platform.
#[derive(Parser)]
#[command(name = "lark")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// App ID.
    #[arg(long, env = "LARK_APP_ID", global = true)]
    app_id: Option<String>,

    /// App secret.
    #[arg(long, env = "LARK_APP_SECRET", hide_env_values = true, global = true)]
    app_secret: Option<String>,

    /// Path to a JSON credentials file ({"app_id": ..., "app_secret": ...}).
    /// Takes precedence over --app-id/--app-secret.
    #[arg(long, env = "LARK_CREDENTIALS", global = true)]
    credentials: Option<PathBuf>,

    /// Open platform base URL.
    #[arg(long, env = "LARK_BASE_URL", default_value = FEISHU_BASE_URL, global = true)]
    base_url: String,

    /// HTTP timeout in seconds.
    #[arg(long, default_value_t = 30, global = true)]
    timeout: u64,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace). Overrides RUST_LOG.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a tenant access token and print it.
    Token,

    /// Perform an authenticated call and print the raw response.
    Call {
        /// HTTP method (GET, POST, PUT, PATCH, DELETE).
        method: String,

        /// Path relative to the base URL, e.g. /im/v1/chats.
        path: String,

        /// JSON request body.
        #[arg(long)]
        body: Option<String>,

        /// Query parameter as key=value. Repeatable.
        #[arg(long = "query", short = 'q', value_parser = parse_key_value)]
        query: Vec<(String, String)>,
    },

    /// Send a text message.
    SendText {
        /// Recipient id (open_id, union_id, user_id, email or chat_id).
        receive_id: String,

        /// Message text.
        text: String,

        /// Recipient id type; inferred from the id when omitted.
        #[arg(long)]
        id_type: Option<ReceiveIdType>,
    },

    /// Post a text message to a bot webhook (no credentials needed).
    Webhook {
        /// Webhook URL.
        url: String,

        /// Message text.
        text: String,
    },

    /// Print the token and kind of a document URL.
    ParseUrl {
        /// Document URL.
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::Token => {
            let client = build_client(&cli)?;
            let token = client
                .get_token()
                .await
                .context("Failed to fetch tenant access token")?;
            println!("{}", token);
        }

        Commands::Call {
            method,
            path,
            body,
            query,
        } => {
            let client = build_client(&cli)?;
            let method = Method::from_bytes(method.to_uppercase().as_bytes())
                .with_context(|| format!("Invalid HTTP method: {}", method))?;
            let body: Option<Value> = body
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .context("Request body is not valid JSON")?;
            let query = query
                .iter()
                .fold(Query::new(), |q, (key, value)| q.push(key, value));

            let response = client
                .call(method, path, body.as_ref(), Some(&query))
                .await
                .with_context(|| format!("Call to {} failed", path))?;
            println!("{}", response);
        }

        Commands::SendText {
            receive_id,
            text,
            id_type,
        } => {
            let client = build_client(&cli)?;
            let response = client
                .im()
                .send_text(receive_id, *id_type, text)
                .await
                .with_context(|| format!("Failed to send message to {}", receive_id))?;
            println!("{}", response);
        }

        Commands::Webhook { url, text } => {
            let bot = WebhookBot::new(url.as_str())?.with_http_client(http_client(cli.timeout)?);
            let response = bot
                .send_text(text)
                .await
                .context("Failed to post webhook message")?;
            println!("{}", response);
        }

        Commands::ParseUrl { url } => match parse_document_url(url) {
            Some((token, kind)) => println!("{}\t{}", kind, token),
            None => anyhow::bail!("Not a recognized document URL: {}", url),
        },
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn http_client(timeout: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout))
        .build()
        .context("Failed to build HTTP client")
}

fn build_client(cli: &Cli) -> Result<LarkClient> {
    let auth = match &cli.credentials {
        Some(path) => Authenticator::from_file(path)
            .with_context(|| format!("Failed to load credentials from {:?}", path))?,
        None => {
            let app_id = cli
                .app_id
                .clone()
                .context("Missing --app-id (or LARK_APP_ID)")?;
            let app_secret = cli
                .app_secret
                .clone()
                .context("Missing --app-secret (or LARK_APP_SECRET)")?;
            Authenticator::new(Credentials::new(app_id, app_secret)?)?
        }
    };

    let auth = auth
        .with_base_url(cli.base_url.as_str())
        .with_http_client(http_client(cli.timeout)?);

    Ok(LarkClient::new(auth))
}

/// Parse `key=value`.
fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{}`", s))?;
    if key.is_empty() {
        return Err(format!("empty key in `{}`", s));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("page_size=20").unwrap(),
            ("page_size".to_string(), "20".to_string())
        );
        assert_eq!(
            parse_key_value("filter=a=b").unwrap(),
            ("filter".to_string(), "a=b".to_string())
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn test_cli_parses_call() {
        let cli = Cli::try_parse_from([
            "lark",
            "--app-id",
            "a",
            "--app-secret",
            "s",
            "call",
            "get",
            "/im/v1/chats",
            "-q",
            "page_size=10",
        ])
        .unwrap();

        match cli.command {
            Commands::Call { method, query, .. } => {
                assert_eq!(method, "get");
                assert_eq!(query, vec![("page_size".to_string(), "10".to_string())]);
            }
            _ => panic!("expected call"),
        }
    }

    #[test]
    fn test_cli_verify() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
