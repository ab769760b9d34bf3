//! Refresh-and-retry behavior of the authenticated transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thesis_client::auth::{CredentialStore, LogoutHandler, MemoryCredentialStore};
use thesis_client::config::Settings;
use thesis_client::error::ClientError;
use thesis_client::jobs::JobFilter;
use thesis_client::ThesisClient;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct CountingLogout {
    count: AtomicUsize,
}

impl CountingLogout {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            count: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl LogoutHandler for CountingLogout {
    async fn on_logout(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

async fn client_with_stale_token(
    server: &MockServer,
    logout: Arc<CountingLogout>,
    store: Arc<MemoryCredentialStore>,
) -> ThesisClient {
    let settings = Settings::for_base_url(server.uri());
    let client = ThesisClient::with_session(&settings, store, logout).unwrap();
    client
        .transport()
        .install_credentials("stale".to_string(), "refresh-1".to_string())
        .await;
    client
}

#[tokio::test]
async fn concurrent_401s_issue_exactly_one_refresh() {
    let server = MockServer::start().await;

    // Requests carrying the refreshed token succeed; everything else is 401.
    Mock::given(method("GET"))
        .and(path("/progress"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/progress"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "accessToken": "fresh",
            "refreshToken": "refresh-2",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let logout = CountingLogout::new();
    let store = Arc::new(MemoryCredentialStore::new());
    let client = client_with_stale_token(&server, logout.clone(), store).await;

    let filter = JobFilter::default();
    let (a, b, c) = tokio::join!(
        client.jobs.fetch(&filter),
        client.jobs.fetch(&filter),
        client.jobs.fetch(&filter),
    );

    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(logout.count.load(Ordering::SeqCst), 0);
    // The .expect(1) on the refresh mock is verified when the server drops.
}

#[tokio::test]
async fn second_401_after_successful_refresh_is_terminal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/progress"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "accessToken": "fresh",
            "refreshToken": "refresh-2",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let logout = CountingLogout::new();
    let store = Arc::new(MemoryCredentialStore::new());
    let client = client_with_stale_token(&server, logout.clone(), store.clone()).await;

    let result = client.jobs.fetch(&JobFilter::default()).await;

    assert!(matches!(result, Err(ClientError::AuthExpired)));
    assert_eq!(logout.count.load(Ordering::SeqCst), 1);
    assert!(store.load().await.is_none());
}

#[tokio::test]
async fn failed_refresh_clears_credentials_and_fires_logout() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/progress"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let logout = CountingLogout::new();
    let store = Arc::new(MemoryCredentialStore::new());
    let client = client_with_stale_token(&server, logout.clone(), store.clone()).await;

    let result = client.jobs.fetch(&JobFilter::default()).await;

    assert!(matches!(result, Err(ClientError::AuthExpired)));
    assert_eq!(logout.count.load(Ordering::SeqCst), 1);
    assert!(store.load().await.is_none());
}

#[tokio::test]
async fn requests_without_credentials_go_out_unauthenticated() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/progress"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let settings = Settings::for_base_url(server.uri());
    let client = ThesisClient::new(&settings).unwrap();

    let jobs = client.jobs.fetch(&JobFilter::default()).await.unwrap();
    assert!(jobs.is_empty());
}
