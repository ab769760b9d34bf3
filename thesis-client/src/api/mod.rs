//! Typed wrapper over the thesis-management REST contract.
//!
//! Every long-running action is fire-and-forget on the wire: the server
//! acknowledges with a `processId` and the outcome is observed through the
//! job tracker, never inferred here.

use std::sync::Arc;

use serde::Deserialize;

use crate::auth::{expect_success, ApiRequest, AuthTransport, FilePart, MultipartBody};
use crate::error::ClientError;
use crate::hierarchy::{AdapterRegistry, HierarchyModel, Provider};
use crate::transfer::UploadFile;

/// Acknowledgement for an accepted long-running operation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AcceptedResponse {
    process_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenPairResponse {
    access_token: String,
    refresh_token: String,
}

pub struct ApiClient {
    transport: Arc<AuthTransport>,
    registry: Arc<AdapterRegistry>,
}

impl ApiClient {
    pub fn new(transport: Arc<AuthTransport>, registry: Arc<AdapterRegistry>) -> Self {
        Self {
            transport,
            registry,
        }
    }

    /// Exchange credentials for a token pair and seed the credential store.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ClientError> {
        let request = ApiRequest::post("/auth/login").json(serde_json::json!({
            "username": username,
            "password": password,
        }));
        let tokens: TokenPairResponse = self.transport.send_json(&request).await?;
        self.transport
            .install_credentials(tokens.access_token, tokens.refresh_token)
            .await;
        tracing::info!(username, "Logged in");
        Ok(())
    }

    /// Revoke the session server-side (best effort) and drop stored
    /// credentials.
    pub async fn logout(&self) -> Result<(), ClientError> {
        if let Err(e) = self.transport.send(&ApiRequest::post("/auth/logout")).await {
            // Local teardown proceeds even when revocation fails.
            tracing::warn!(error = %e, "Token revocation failed during logout");
        }
        self.transport.discard_credentials().await;
        tracing::info!("Logged out");
        Ok(())
    }

    /// Fetch the whole-tree snapshot for a class from one provider and build
    /// a fresh hierarchy model from it.
    pub async fn fetch_snapshot(
        &self,
        class_id: &str,
        provider: Provider,
    ) -> Result<HierarchyModel, ClientError> {
        let adapter = self
            .registry
            .find(provider)
            .ok_or_else(|| ClientError::Internal(anyhow::anyhow!("no adapter for provider")))?;

        let request = ApiRequest::get(adapter.snapshot_path(class_id));
        let raw: serde_json::Value = self.transport.send_json(&request).await?;

        let root = adapter.normalize(&raw)?;
        tracing::debug!(class_id, provider = %provider, "Snapshot reloaded");
        Ok(HierarchyModel::load(root))
    }

    /// Trigger provider synchronization for a set of classes. Fire and
    /// forget; completion is observed only through the progress endpoint.
    pub async fn trigger_sync(
        &self,
        class_ids: &[String],
        providers: &[Provider],
    ) -> Result<(), ClientError> {
        let types: Vec<&str> = providers.iter().map(|p| p.as_str()).collect();
        let request = ApiRequest::post("/class/drive-info/sync").json(serde_json::json!({
            "classIds": class_ids,
            "types": types,
        }));
        expect_success(self.transport.send(&request).await?).await?;
        tracing::info!(classes = class_ids.len(), "Sync triggered");
        Ok(())
    }

    /// Upload a student roster for import. Returns the accepted process id.
    pub async fn import_students(
        &self,
        class_id: &str,
        file: UploadFile,
    ) -> Result<String, ClientError> {
        let body = MultipartBody {
            fields: Vec::new(),
            files: vec![FilePart {
                field: "files".to_string(),
                file_name: file.name,
                mime_type: file.mime_type,
                data: file.data,
            }],
            progress: None,
        };
        let request =
            ApiRequest::post(format!("/class/{}/students/import", class_id)).multipart(body);
        let accepted: AcceptedResponse = self.transport.send_json(&request).await?;
        tracing::info!(class_id, process_id = %accepted.process_id, "Student import accepted");
        Ok(accepted.process_id)
    }

    /// Start a student export job. The artifact is fetched with a download
    /// once the job completes.
    pub async fn export_students(&self, class_id: &str) -> Result<String, ClientError> {
        let request = ApiRequest::post(format!("/class/{}/students/export", class_id));
        let accepted: AcceptedResponse = self.transport.send_json(&request).await?;
        tracing::info!(class_id, process_id = %accepted.process_id, "Student export accepted");
        Ok(accepted.process_id)
    }

    /// Start generation of thesis documents for a class.
    pub async fn generate_documents(
        &self,
        class_id: &str,
        thesis_ids: &[String],
    ) -> Result<String, ClientError> {
        let request = ApiRequest::post(format!("/class/{}/theses/generate", class_id))
            .json(serde_json::json!({ "thesisIds": thesis_ids }));
        let accepted: AcceptedResponse = self.transport.send_json(&request).await?;
        tracing::info!(
            class_id,
            theses = thesis_ids.len(),
            process_id = %accepted.process_id,
            "Document generation accepted"
        );
        Ok(accepted.process_id)
    }
}
