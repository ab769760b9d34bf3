//! Authenticated HTTP transport.
//!
//! Wraps a shared `reqwest::Client` with bearer-token injection and a
//! single-flight refresh-and-retry protocol: when several in-flight requests
//! hit 401 at once, exactly one `POST /auth/refresh` is issued and every
//! waiter observes its outcome.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::auth::credentials::{CredentialStore, Credentials, LogoutHandler};
use crate::config::Settings;
use crate::error::ClientError;

/// Coarse upload progress, reported as 0-100 from transport-level byte
/// counters. A retried request restarts the counter, so values are not
/// guaranteed monotonic across retries.
#[derive(Clone)]
pub struct UploadProgress {
    callback: Arc<dyn Fn(u8) + Send + Sync>,
    sent: Arc<AtomicU64>,
    total: u64,
}

impl UploadProgress {
    pub fn new(total: u64, callback: Arc<dyn Fn(u8) + Send + Sync>) -> Self {
        Self {
            callback,
            sent: Arc::new(AtomicU64::new(0)),
            total,
        }
    }

    fn restart(&self) {
        self.sent.store(0, Ordering::Relaxed);
    }

    fn advance(&self, bytes: u64) {
        let sent = self.sent.fetch_add(bytes, Ordering::Relaxed) + bytes;
        let percent = if self.total == 0 {
            100
        } else {
            ((sent * 100) / self.total).min(100) as u8
        };
        (self.callback)(percent);
    }
}

/// One file entry in a multipart upload.
#[derive(Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl FilePart {
    fn streaming_part(&self, progress: UploadProgress) -> Part {
        const CHUNK: usize = 64 * 1024;
        let len = self.data.len() as u64;
        let chunks: Vec<Vec<u8>> = self.data.chunks(CHUNK).map(|c| c.to_vec()).collect();
        let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
            progress.advance(chunk.len() as u64);
            Ok::<_, std::io::Error>(chunk)
        }));
        Part::stream_with_length(reqwest::Body::wrap_stream(stream), len)
    }
}

/// Multipart body description owned by the request so a fresh `Form` can be
/// produced for every attempt (the retried request is a new value, never a
/// mutated copy of the original).
#[derive(Clone)]
pub struct MultipartBody {
    pub fields: Vec<(String, String)>,
    pub files: Vec<FilePart>,
    pub progress: Option<UploadProgress>,
}

impl MultipartBody {
    fn to_form(&self) -> Result<Form, ClientError> {
        if let Some(progress) = &self.progress {
            progress.restart();
        }
        let mut form = Form::new();
        for (name, value) in &self.fields {
            form = form.text(name.clone(), value.clone());
        }
        for file in &self.files {
            let part = match &self.progress {
                Some(progress) => file.streaming_part(progress.clone()),
                None => Part::bytes(file.data.clone()),
            };
            let part = part
                .file_name(file.file_name.clone())
                .mime_str(&file.mime_type)
                .map_err(|e| {
                    ClientError::Internal(anyhow!("invalid mime type {}: {}", file.mime_type, e))
                })?;
            form = form.part(file.field.clone(), part);
        }
        Ok(form)
    }
}

#[derive(Clone)]
pub enum RequestBody {
    Json(serde_json::Value),
    Multipart(MultipartBody),
}

/// A rebuildable request description. Every send attempt constructs a fresh
/// `reqwest` request from this value.
#[derive(Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn multipart(mut self, body: MultipartBody) -> Self {
        self.body = Some(RequestBody::Multipart(body));
        self
    }

    fn build(
        &self,
        http: &Client,
        base_url: &str,
        bearer: Option<&str>,
    ) -> Result<RequestBuilder, ClientError> {
        let url = format!("{}{}", base_url, self.path);
        let mut builder = http.request(self.method.clone(), &url);
        if !self.query.is_empty() {
            builder = builder.query(&self.query);
        }
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        match &self.body {
            Some(RequestBody::Json(value)) => builder = builder.json(value),
            Some(RequestBody::Multipart(body)) => builder = builder.multipart(body.to_form()?),
            None => {}
        }
        Ok(builder)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    refresh_token: String,
}

/// Bearer-injecting transport with single-flight token refresh.
pub struct AuthTransport {
    http: Client,
    base_url: String,
    refresh_path: String,
    access_token_ttl_minutes: i64,
    refresh_token_ttl_days: i64,
    store: Arc<dyn CredentialStore>,
    logout: Arc<dyn LogoutHandler>,
    refresh_gate: Mutex<()>,
    refresh_generation: AtomicU64,
}

impl AuthTransport {
    pub fn new(
        settings: &Settings,
        store: Arc<dyn CredentialStore>,
        logout: Arc<dyn LogoutHandler>,
    ) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.api.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: settings.api.base_url.trim_end_matches('/').to_string(),
            refresh_path: settings.auth.refresh_path.clone(),
            access_token_ttl_minutes: settings.auth.access_token_ttl_minutes,
            refresh_token_ttl_days: settings.auth.refresh_token_ttl_days,
            store,
            logout,
            refresh_gate: Mutex::new(()),
            refresh_generation: AtomicU64::new(0),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request with the current bearer token attached when present.
    ///
    /// On 401 the request is retried at most once, behind a shared refresh
    /// exchange. A 401 surviving the retry is terminal: credentials are
    /// cleared and the logout handler fires.
    pub async fn send(&self, request: &ApiRequest) -> Result<Response, ClientError> {
        let observed_generation = self.refresh_generation.load(Ordering::Acquire);
        let bearer = self.current_bearer().await;

        let response = request
            .build(&self.http, &self.base_url, bearer.as_deref())?
            .send()
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let token = self.refresh_credentials(observed_generation).await?;
        tracing::debug!(path = %request.path, "Retrying request with refreshed token");

        let retried = request
            .build(&self.http, &self.base_url, Some(token.expose_secret()))?
            .send()
            .await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(path = %request.path, "Refreshed token rejected, tearing down session");
            self.teardown_session().await;
            return Err(ClientError::AuthExpired);
        }
        Ok(retried)
    }

    /// Send and deserialize a JSON body, mapping non-2xx responses to
    /// `ClientError::Api`.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
    ) -> Result<T, ClientError> {
        let response = expect_success(self.send(request).await?).await?;
        Ok(response.json().await?)
    }

    /// Install a freshly issued token pair, stamping client-side expiries.
    pub async fn install_credentials(&self, access_token: String, refresh_token: String) {
        let credentials = Credentials::from_token_pair(
            access_token,
            refresh_token,
            self.access_token_ttl_minutes,
            self.refresh_token_ttl_days,
        );
        self.store.store(credentials).await;
    }

    /// Drop stored credentials without invoking the logout handler
    /// (user-initiated logout, not a failure teardown).
    pub async fn discard_credentials(&self) {
        self.store.clear().await;
    }

    async fn current_bearer(&self) -> Option<String> {
        self.store.load().await.and_then(|c| c.bearer())
    }

    /// Single-flight refresh. The generation counter distinguishes "I must
    /// refresh" from "someone refreshed while I waited on the gate"; only the
    /// first caller through performs the exchange.
    async fn refresh_credentials(
        &self,
        observed_generation: u64,
    ) -> Result<SecretString, ClientError> {
        let _gate = self.refresh_gate.lock().await;

        if self.refresh_generation.load(Ordering::Acquire) != observed_generation {
            // A concurrent request already completed the refresh; adopt its
            // outcome instead of issuing a second exchange.
            return match self.store.load().await {
                Some(credentials) => Ok(credentials.access_token),
                None => Err(ClientError::AuthExpired),
            };
        }

        let credentials = match self.store.load().await {
            Some(credentials) if credentials.refresh_token_valid() => credentials,
            _ => {
                self.refresh_generation.fetch_add(1, Ordering::Release);
                self.teardown_session().await;
                return Err(ClientError::AuthExpired);
            }
        };

        let result = self.exchange(&credentials.refresh_token).await;
        self.refresh_generation.fetch_add(1, Ordering::Release);

        match result {
            Ok(tokens) => {
                let refreshed = Credentials::from_token_pair(
                    tokens.access_token,
                    tokens.refresh_token,
                    self.access_token_ttl_minutes,
                    self.refresh_token_ttl_days,
                );
                let access = refreshed.access_token.clone();
                self.store.store(refreshed).await;
                tracing::info!("Access token refreshed");
                Ok(access)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed, tearing down session");
                self.teardown_session().await;
                Err(ClientError::AuthExpired)
            }
        }
    }

    async fn exchange(&self, refresh_token: &SecretString) -> Result<RefreshResponse, ClientError> {
        let url = format!("{}{}", self.base_url, self.refresh_path);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "refreshToken": refresh_token.expose_secret() }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: "refresh exchange rejected".to_string(),
            });
        }
        Ok(response.json().await?)
    }

    async fn teardown_session(&self) {
        self.store.clear().await;
        self.logout.on_logout().await;
    }
}

/// Map a non-2xx response to `ClientError::Api`, carrying the response body
/// as the opaque server message.
pub async fn expect_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}
