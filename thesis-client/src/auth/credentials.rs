use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;

/// Session tokens together with their client-enforced expiries.
///
/// Owned exclusively by the transport layer. Mutated only by whole-object
/// replacement after a successful refresh exchange; cleared entirely on
/// terminal auth failure.
#[derive(Clone)]
pub struct Credentials {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub access_expiry: DateTime<Utc>,
    pub refresh_expiry: DateTime<Utc>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_expiry", &self.access_expiry)
            .field("refresh_expiry", &self.refresh_expiry)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    /// Build credentials from a token pair, stamping expiries from the
    /// configured lifetimes (60 min access / 7 day refresh by default).
    pub fn from_token_pair(
        access_token: String,
        refresh_token: String,
        access_ttl_minutes: i64,
        refresh_ttl_days: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            access_token: SecretString::new(access_token),
            refresh_token: SecretString::new(refresh_token),
            access_expiry: now + Duration::minutes(access_ttl_minutes),
            refresh_expiry: now + Duration::days(refresh_ttl_days),
        }
    }

    pub fn access_token_valid(&self) -> bool {
        self.access_expiry > Utc::now()
    }

    pub fn refresh_token_valid(&self) -> bool {
        self.refresh_expiry > Utc::now()
    }

    /// The bearer value for outbound requests, `None` once the stored expiry
    /// has passed (the cookie-equivalent of the token disappearing).
    pub fn bearer(&self) -> Option<String> {
        if self.access_token_valid() {
            Some(self.access_token.expose_secret().clone())
        } else {
            None
        }
    }
}

/// Storage seam for credentials.
///
/// The browser client keeps these in two expiring cookies; here the store is
/// pluggable so hosts can persist tokens however they like.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> Option<Credentials>;
    async fn store(&self, credentials: Credentials);
    async fn clear(&self);
}

/// In-memory credential store, the default for a single session.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<Option<Credentials>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Option<Credentials> {
        let guard = self.inner.read().await;
        guard.as_ref().filter(|c| c.refresh_token_valid()).cloned()
    }

    async fn store(&self, credentials: Credentials) {
        let mut guard = self.inner.write().await;
        *guard = Some(credentials);
    }

    async fn clear(&self) {
        let mut guard = self.inner.write().await;
        *guard = None;
    }
}

/// Invoked exactly once when the session is torn down by a terminal auth
/// failure. Injected at transport construction rather than living in a
/// reassignable global.
#[async_trait]
pub trait LogoutHandler: Send + Sync {
    async fn on_logout(&self);
}

/// Default handler that only logs the teardown.
pub struct NoopLogoutHandler;

#[async_trait]
impl LogoutHandler for NoopLogoutHandler {
    async fn on_logout(&self) {
        tracing::info!("Session torn down after terminal auth failure");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn expired_access_token_yields_no_bearer() {
        let mut credentials =
            Credentials::from_token_pair("access".into(), "refresh".into(), 60, 7);
        assert!(credentials.bearer().is_some());

        credentials.access_expiry = Utc::now() - Duration::minutes(1);
        assert!(credentials.bearer().is_none());
        assert!(credentials.refresh_token_valid());
    }

    #[tokio::test]
    async fn store_drops_credentials_with_expired_refresh_token() {
        let store = MemoryCredentialStore::new();
        let mut credentials =
            Credentials::from_token_pair("access".into(), "refresh".into(), 60, 7);
        credentials.refresh_expiry = Utc::now() - Duration::minutes(1);

        store.store(credentials).await;
        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn clear_removes_stored_credentials() {
        let store = MemoryCredentialStore::new();
        store
            .store(Credentials::from_token_pair(
                "access".into(),
                "refresh".into(),
                60,
                7,
            ))
            .await;
        assert!(store.load().await.is_some());

        store.clear().await;
        assert!(store.load().await.is_none());
    }
}
