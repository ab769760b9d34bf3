//! Byte movement between the client and a provider.
//!
//! Uploads go through the authenticated transport as multipart requests with
//! coarse progress from transport-level byte counters. Downloads are either
//! authenticated blob fetches or, for providers issuing direct signed URLs
//! (OneDrive), a `DirectUrl` artifact handed back untouched - that URL is
//! opened without the bearer header, a deliberate exception to the
//! auth-wrapping rule.

use std::sync::Arc;

use thiserror::Error;

use crate::auth::{ApiRequest, AuthTransport, FilePart, MultipartBody, UploadProgress};
use crate::error::ClientError;
use crate::hierarchy::{AdapterRegistry, FileNode, Provider};

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("upload rejected ({status}): {message}")]
    UploadRejected { status: u16, message: String },

    #[error("download failed for {id} ({status}): {message}")]
    DownloadFailed {
        id: String,
        status: u16,
        message: String,
    },

    #[error("nothing to transfer")]
    Empty,

    #[error("unknown provider")]
    UnknownProvider,
}

/// One file queued for upload, fully buffered (the server owns consistency
/// of partially uploaded objects; nothing is cleaned up client-side).
#[derive(Clone)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Result of a download request.
#[derive(Debug)]
pub enum DownloadArtifact {
    /// Fetched bytes ready for a local save.
    Blob {
        name: String,
        mime_type: Option<String>,
        bytes: Vec<u8>,
    },
    /// Provider-issued signed URL to be opened directly, without the bearer
    /// header.
    DirectUrl { name: String, url: String },
}

impl DownloadArtifact {
    pub fn name(&self) -> &str {
        match self {
            DownloadArtifact::Blob { name, .. } => name,
            DownloadArtifact::DirectUrl { name, .. } => name,
        }
    }
}

pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

pub struct TransferManager {
    transport: Arc<AuthTransport>,
    registry: Arc<AdapterRegistry>,
}

impl TransferManager {
    pub fn new(transport: Arc<AuthTransport>, registry: Arc<AdapterRegistry>) -> Self {
        Self {
            transport,
            registry,
        }
    }

    /// Upload files into a provider folder.
    ///
    /// Returns the created nodes in the common shape. The snapshot is not
    /// patched incrementally; callers must refetch the hierarchy afterwards.
    pub async fn upload(
        &self,
        class_id: &str,
        provider: Provider,
        target_folder_id: &str,
        files: Vec<UploadFile>,
        progress: Option<ProgressCallback>,
    ) -> Result<Vec<FileNode>, ClientError> {
        if files.is_empty() {
            return Err(TransferError::Empty.into());
        }

        let total: u64 = files.iter().map(|f| f.data.len() as u64).sum();
        let file_count = files.len();
        let body = MultipartBody {
            fields: vec![("folderId".to_string(), target_folder_id.to_string())],
            files: files
                .into_iter()
                .map(|f| FilePart {
                    field: "files".to_string(),
                    file_name: f.name,
                    mime_type: f.mime_type,
                    data: f.data,
                })
                .collect(),
            progress: progress.map(|callback| UploadProgress::new(total, callback)),
        };

        let request = ApiRequest::post(self.upload_path(class_id, provider)?).multipart(body);

        tracing::info!(
            class_id,
            provider = %provider,
            files = file_count,
            bytes = total,
            "Starting upload"
        );
        metrics::counter!("transfer_upload_total", "provider" => provider.as_str()).increment(1);

        let response = self.transport.send(&request).await?;
        let status = response.status();
        if !status.is_success() {
            metrics::counter!("transfer_upload_failed", "provider" => provider.as_str())
                .increment(1);
            let message = response.text().await.unwrap_or_default();
            return Err(TransferError::UploadRejected {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let created: Vec<FileNode> = response.json().await?;
        tracing::info!(class_id, created = created.len(), "Upload finished");
        Ok(created)
    }

    /// Produce a download artifact for each node, using the direct signed
    /// URL when the provider supplied one and an authenticated blob fetch
    /// otherwise.
    pub async fn download(
        &self,
        class_id: &str,
        provider: Provider,
        nodes: &[&FileNode],
        suggested_name: Option<&str>,
    ) -> Result<Vec<DownloadArtifact>, ClientError> {
        if nodes.is_empty() {
            return Err(TransferError::Empty.into());
        }

        let mut artifacts = Vec::with_capacity(nodes.len());
        for node in nodes {
            let name = match (nodes.len(), suggested_name) {
                (1, Some(name)) => name.to_string(),
                _ => node.name.clone(),
            };
            artifacts.push(self.download_one(class_id, provider, node, name).await?);
        }
        Ok(artifacts)
    }

    async fn download_one(
        &self,
        class_id: &str,
        provider: Provider,
        node: &FileNode,
        name: String,
    ) -> Result<DownloadArtifact, ClientError> {
        if let Some(url) = &node.download_url {
            // Signed URL: no bearer header, by design.
            tracing::debug!(node_id = %node.id, "Using provider-issued direct URL");
            return Ok(DownloadArtifact::DirectUrl {
                name,
                url: url.clone(),
            });
        }

        let request = ApiRequest::get(self.content_path(class_id, provider, &node.id)?);
        let response = self.transport.send(&request).await?;

        let status = response.status();
        if !status.is_success() {
            metrics::counter!("transfer_download_failed", "provider" => provider.as_str())
                .increment(1);
            let message = response.text().await.unwrap_or_default();
            return Err(TransferError::DownloadFailed {
                id: node.id.clone(),
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| node.mime_type.clone());
        let bytes = response.bytes().await?.to_vec();

        metrics::counter!("transfer_download_total", "provider" => provider.as_str())
            .increment(1);
        tracing::debug!(node_id = %node.id, bytes = bytes.len(), "Blob download finished");

        Ok(DownloadArtifact::Blob {
            name,
            mime_type,
            bytes,
        })
    }

    fn upload_path(&self, class_id: &str, provider: Provider) -> Result<String, ClientError> {
        Ok(format!("{}/files", self.base_path(class_id, provider)?))
    }

    fn content_path(
        &self,
        class_id: &str,
        provider: Provider,
        node_id: &str,
    ) -> Result<String, ClientError> {
        Ok(format!(
            "{}/files/{}/content",
            self.base_path(class_id, provider)?,
            node_id
        ))
    }

    fn base_path(&self, class_id: &str, provider: Provider) -> Result<String, ClientError> {
        let adapter = self
            .registry
            .find(provider)
            .ok_or(TransferError::UnknownProvider)?;
        Ok(adapter.snapshot_path(class_id))
    }
}
