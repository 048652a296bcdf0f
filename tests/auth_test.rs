//! Tests for the tenant access token lifecycle against a mocked token endpoint.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use lark_client::{Authenticator, Clock, Credentials, LarkError};
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::json;
use tempfile::NamedTempFile;

const TOKEN_PATH: &str = "/auth/v3/tenant_access_token/internal";

/// Clock that only moves when told to.
struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(UNIX_EPOCH + Duration::from_secs(1_700_000_000)),
        })
    }

    fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().unwrap()
    }
}

async fn mock_token(server: &mut ServerGuard, token: &str, expire: u64, hits: usize) -> Mock {
    server
        .mock("POST", TOKEN_PATH)
        .match_body(Matcher::Json(json!({
            "app_id": "app1",
            "app_secret": "secret1"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "code": 0,
                "msg": "ok",
                "tenant_access_token": token,
                "expire": expire
            })
            .to_string(),
        )
        .expect(hits)
        .create_async()
        .await
}

fn authenticator(server: &ServerGuard, clock: Arc<ManualClock>) -> Authenticator {
    Authenticator::new(Credentials::new("app1", "secret1").unwrap())
        .unwrap()
        .with_base_url(server.url())
        .with_clock(clock)
}

mod caching {
    use super::*;

    #[tokio::test]
    async fn second_call_hits_cache() {
        let mut server = Server::new_async().await;
        let mock = mock_token(&mut server, "tok-A", 7200, 1).await;
        let auth = authenticator(&server, ManualClock::new());

        let first = auth.get_access_token().await.unwrap();
        let second = auth.get_access_token().await.unwrap();

        assert_eq!(first, "tok-A");
        assert_eq!(second, first);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn construction_is_lazy() {
        let mut server = Server::new_async().await;
        let mock = mock_token(&mut server, "tok-A", 7200, 0).await;

        let auth = authenticator(&server, ManualClock::new());
        assert!(auth.cached_expiry().await.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn clones_share_the_cache() {
        let mut server = Server::new_async().await;
        let mock = mock_token(&mut server, "tok-A", 7200, 1).await;
        let auth = authenticator(&server, ManualClock::new());
        let clone = auth.clone();

        auth.get_access_token().await.unwrap();
        assert_eq!(clone.get_access_token().await.unwrap(), "tok-A");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn invalidate_forces_fetch() {
        let mut server = Server::new_async().await;
        let mock = mock_token(&mut server, "tok-A", 7200, 2).await;
        let auth = authenticator(&server, ManualClock::new());

        auth.get_access_token().await.unwrap();
        auth.invalidate().await;
        auth.get_access_token().await.unwrap();
        mock.assert_async().await;
    }
}

mod expiry {
    use super::*;

    #[tokio::test]
    async fn expired_token_is_fetched_again_once() {
        let mut server = Server::new_async().await;
        let clock = ManualClock::new();
        let auth = authenticator(&server, clock.clone());

        let first = mock_token(&mut server, "tok-A", 7200, 1).await;
        assert_eq!(auth.get_access_token().await.unwrap(), "tok-A");
        first.assert_async().await;
        first.remove_async().await;

        clock.advance(Duration::from_secs(7201));

        let second = mock_token(&mut server, "tok-B", 7200, 1).await;
        assert_eq!(auth.get_access_token().await.unwrap(), "tok-B");
        assert_eq!(auth.get_access_token().await.unwrap(), "tok-B");
        second.assert_async().await;
    }

    #[tokio::test]
    async fn safety_margin_is_applied() {
        let mut server = Server::new_async().await;
        let clock = ManualClock::new();
        let auth = authenticator(&server, clock.clone());

        let first = mock_token(&mut server, "tok-A", 7200, 1).await;
        auth.get_access_token().await.unwrap();

        let expiry = auth.cached_expiry().await.unwrap();
        assert_eq!(
            expiry.duration_since(clock.now()).unwrap(),
            Duration::from_secs(7200 - 60)
        );

        // Inside the margin: still cached.
        clock.advance(Duration::from_secs(7100));
        assert_eq!(auth.get_access_token().await.unwrap(), "tok-A");
        first.assert_async().await;
        first.remove_async().await;

        // Past vendor expiry minus margin, but before vendor expiry.
        clock.advance(Duration::from_secs(50));
        let second = mock_token(&mut server, "tok-B", 7200, 1).await;
        assert_eq!(auth.get_access_token().await.unwrap(), "tok-B");
        second.assert_async().await;
    }

    #[tokio::test]
    async fn lifetime_shorter_than_margin_is_never_cached() {
        let mut server = Server::new_async().await;
        let mock = mock_token(&mut server, "tok-short", 30, 2).await;
        let auth = authenticator(&server, ManualClock::new());

        auth.get_access_token().await.unwrap();
        auth.get_access_token().await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn cached_token_outlives_dispatch_time() {
        let mut server = Server::new_async().await;
        let clock = ManualClock::new();
        let _mock = mock_token(&mut server, "tok-A", 7200, 1).await;
        let auth = authenticator(&server, clock.clone());

        auth.get_access_token().await.unwrap();
        assert!(auth.cached_expiry().await.unwrap() > clock.now());
    }
}

mod failures {
    use super::*;

    #[tokio::test]
    async fn vendor_error_code_is_authentication_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", TOKEN_PATH)
            .with_status(200)
            .with_body(r#"{"code":10014,"msg":"app secret invalid"}"#)
            .create_async()
            .await;
        let auth = authenticator(&server, ManualClock::new());

        let err = auth.get_access_token().await.unwrap_err();
        match err {
            LarkError::AuthenticationError(message) => {
                assert!(message.contains("10014"));
                assert!(message.contains("app secret invalid"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_token() {
        let mut server = Server::new_async().await;
        let auth = authenticator(&server, ManualClock::new());

        let ok = mock_token(&mut server, "tok-A", 7200, 1).await;
        assert_eq!(auth.get_access_token().await.unwrap(), "tok-A");
        ok.assert_async().await;
        ok.remove_async().await;

        let failing = server
            .mock("POST", TOKEN_PATH)
            .with_status(200)
            .with_body(r#"{"code":99991663,"msg":"tenant token invalid"}"#)
            .expect(1)
            .create_async()
            .await;

        let err = auth.refresh_token().await.unwrap_err();
        assert!(matches!(err, LarkError::AuthenticationError(_)));

        assert_eq!(auth.get_access_token().await.unwrap(), "tok-A");
        failing.assert_async().await;
    }

    #[tokio::test]
    async fn http_error_status_is_authentication_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", TOKEN_PATH)
            .with_status(503)
            .with_body("upstream unavailable")
            .create_async()
            .await;
        let auth = authenticator(&server, ManualClock::new());

        let err = auth.get_access_token().await.unwrap_err();
        match err {
            LarkError::AuthenticationError(message) => assert!(message.contains("503")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_authentication_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", TOKEN_PATH)
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;
        let auth = authenticator(&server, ManualClock::new());

        assert!(matches!(
            auth.get_access_token().await,
            Err(LarkError::AuthenticationError(_))
        ));
    }

    #[tokio::test]
    async fn missing_token_field_is_authentication_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", TOKEN_PATH)
            .with_status(200)
            .with_body(r#"{"code":0,"msg":"ok","expire":7200}"#)
            .create_async()
            .await;
        let auth = authenticator(&server, ManualClock::new());

        assert!(matches!(
            auth.get_access_token().await,
            Err(LarkError::AuthenticationError(_))
        ));
    }

    #[tokio::test]
    async fn truncated_body_is_reported_as_read_failure() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !String::from_utf8_lossy(&request).contains("secret1\"}") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            // Promise more body than is sent, then hang up.
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 200\r\n\r\n{\"code\":0",
                )
                .await
                .unwrap();
        });

        let auth = Authenticator::new(Credentials::new("app1", "secret1").unwrap())
            .unwrap()
            .with_base_url(format!("http://{}", addr));

        match auth.get_access_token().await {
            Err(LarkError::AuthenticationError(message)) => {
                assert!(message.contains("failed to read token response"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_authentication_error() {
        let auth = Authenticator::new(Credentials::new("app1", "secret1").unwrap())
            .unwrap()
            .with_base_url("http://127.0.0.1:1");

        assert!(matches!(
            auth.get_access_token().await,
            Err(LarkError::AuthenticationError(_))
        ));
    }
}

mod configuration {
    use super::*;

    #[test]
    fn empty_credentials_are_rejected() {
        assert!(matches!(
            Credentials::new("", "secret1"),
            Err(LarkError::ConfigError(_))
        ));
        assert!(matches!(
            Credentials::new("app1", ""),
            Err(LarkError::ConfigError(_))
        ));
    }

    #[test]
    fn authenticator_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let creds_json = json!({ "app_id": "cli_a1", "app_secret": "s3cret" });
        temp_file
            .write_all(creds_json.to_string().as_bytes())
            .unwrap();

        let auth = Authenticator::from_file(temp_file.path()).unwrap();
        assert_eq!(auth.app_id(), Some("cli_a1"));
    }

    #[test]
    fn authenticator_from_file_with_empty_secret() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(br#"{"app_id": "cli_a1", "app_secret": ""}"#)
            .unwrap();

        assert!(matches!(
            Authenticator::from_file(temp_file.path()),
            Err(LarkError::ConfigError(_))
        ));
    }

    #[test]
    fn authenticator_from_missing_file() {
        assert!(matches!(
            Authenticator::from_file("/nonexistent/path/lark.json"),
            Err(LarkError::ConfigError(_))
        ));
    }

    #[test]
    fn authenticator_from_invalid_json() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"not valid json").unwrap();

        assert!(matches!(
            Authenticator::from_file(temp_file.path()),
            Err(LarkError::ConfigError(_))
        ));
    }
}

mod scenario {
    use super::*;

    #[tokio::test]
    async fn token_is_refetched_after_simulated_expiry() {
        let mut server = Server::new_async().await;
        let clock = ManualClock::new();
        let auth = authenticator(&server, clock.clone());

        let first = mock_token(&mut server, "tok-A", 7200, 1).await;
        assert_eq!(auth.get_access_token().await.unwrap(), "tok-A");
        first.assert_async().await;
        first.remove_async().await;

        clock.advance(Duration::from_secs(7201));

        let refetch = mock_token(&mut server, "tok-A", 7200, 1).await;
        auth.get_access_token().await.unwrap();
        refetch.assert_async().await;
    }
}
