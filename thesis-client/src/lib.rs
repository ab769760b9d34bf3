//! Async client core for the thesis-management platform.
//!
//! Long-running server actions (student import/export, thesis document
//! generation, Drive/OneDrive synchronization) are fire-and-forget on the
//! wire; this crate tracks their completion by polling, presents a unified
//! navigable hierarchy over both storage providers, and keeps every call
//! authenticated across token expiry with a single-flight refresh.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod jobs;
pub mod observability;
pub mod selection;
pub mod transfer;

use std::sync::Arc;

use api::ApiClient;
use auth::{AuthTransport, CredentialStore, LogoutHandler, MemoryCredentialStore, NoopLogoutHandler};
use config::Settings;
use error::ClientError;
use hierarchy::AdapterRegistry;
use jobs::JobTracker;
use transfer::TransferManager;

/// Shared entry point bundling the typed API, the job tracker, and the
/// transfer manager over one authenticated transport.
pub struct ThesisClient {
    pub api: ApiClient,
    pub jobs: JobTracker,
    pub transfers: TransferManager,
    transport: Arc<AuthTransport>,
}

impl ThesisClient {
    /// Client with an in-memory credential store and a logging-only logout
    /// handler.
    pub fn new(settings: &Settings) -> Result<Self, ClientError> {
        Self::with_session(
            settings,
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(NoopLogoutHandler),
        )
    }

    /// Client with explicit credential storage and logout handling.
    pub fn with_session(
        settings: &Settings,
        store: Arc<dyn CredentialStore>,
        logout: Arc<dyn LogoutHandler>,
    ) -> Result<Self, ClientError> {
        let transport = Arc::new(AuthTransport::new(settings, store, logout)?);
        let registry = Arc::new(AdapterRegistry::new());

        Ok(Self {
            api: ApiClient::new(transport.clone(), registry.clone()),
            jobs: JobTracker::new(transport.clone(), &settings.jobs),
            transfers: TransferManager::new(transport.clone(), registry),
            transport,
        })
    }

    pub fn transport(&self) -> &Arc<AuthTransport> {
        &self.transport
    }
}
