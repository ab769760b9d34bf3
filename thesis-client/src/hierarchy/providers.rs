//! Provider adapters normalizing native snapshot shapes into `FileNode`.
//!
//! The two storage backends return structurally different trees (Drive keys
//! file type off `mimeType`, OneDrive off `file`/`folder` facets). Everything
//! above this module is provider-agnostic; these adapters are the only
//! provider-specific code.

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::hierarchy::{FileNode, NodeKind, ROOT_ID};

const DRIVE_FOLDER_MIME: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Drive,
    #[serde(rename = "onedrive")]
    OneDrive,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Drive => "drive",
            Provider::OneDrive => "onedrive",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Drive => "Google Drive",
            Provider::OneDrive => "OneDrive",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps one provider's native snapshot JSON into the common tree shape.
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    /// Endpoint returning the whole-tree snapshot for a class.
    fn snapshot_path(&self, class_id: &str) -> String;

    /// Build the normalized tree under a synthetic root node.
    fn normalize(&self, snapshot: &serde_json::Value) -> Result<FileNode, ClientError>;
}

/// Google Drive-style snapshot: `{ "files": [...] }`, folders recognized by
/// their mime type.
pub struct DriveAdapter;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveEntry {
    id: String,
    name: String,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    modified_time: Option<DateTime<Utc>>,
    #[serde(default)]
    children: Option<Vec<DriveEntry>>,
}

#[derive(Deserialize)]
struct DriveSnapshot {
    #[serde(default)]
    files: Vec<DriveEntry>,
}

impl DriveEntry {
    fn into_node(self, parent_id: &str) -> FileNode {
        let is_folder = self.mime_type.as_deref() == Some(DRIVE_FOLDER_MIME);
        let children = if is_folder {
            let entries = self.children.unwrap_or_default();
            Some(
                entries
                    .into_iter()
                    .map(|e| e.into_node(&self.id))
                    .collect(),
            )
        } else {
            None
        };

        FileNode {
            id: self.id,
            name: self.name,
            kind: if is_folder {
                NodeKind::Folder
            } else {
                NodeKind::File
            },
            mime_type: self.mime_type,
            modified_at: self.modified_time,
            parent_id: Some(parent_id.to_string()),
            download_url: None,
            children,
        }
    }
}

impl ProviderAdapter for DriveAdapter {
    fn provider(&self) -> Provider {
        Provider::Drive
    }

    fn snapshot_path(&self, class_id: &str) -> String {
        format!("/class/{}/drive-info", class_id)
    }

    fn normalize(&self, snapshot: &serde_json::Value) -> Result<FileNode, ClientError> {
        let parsed: DriveSnapshot = serde_json::from_value(snapshot.clone())
            .map_err(|e| ClientError::Snapshot(anyhow!("malformed Drive snapshot: {}", e)))?;

        let mut root = FileNode::folder(ROOT_ID, Provider::Drive.display_name());
        root.children = Some(
            parsed
                .files
                .into_iter()
                .map(|e| e.into_node(ROOT_ID))
                .collect(),
        );
        Ok(root)
    }
}

/// OneDrive-style snapshot: `{ "value": [...] }`, folders recognized by the
/// presence of the `folder` facet, direct download URLs carried per file.
pub struct OneDriveAdapter;

#[derive(Deserialize)]
struct OneDriveFileFacet {
    #[serde(default, rename = "mimeType")]
    mime_type: Option<String>,
}

#[derive(Deserialize)]
struct OneDriveFolderFacet {
    #[serde(default, rename = "childCount")]
    #[allow(dead_code)]
    child_count: u64,
}

#[derive(Deserialize)]
struct OneDriveEntry {
    id: String,
    name: String,
    #[serde(default, rename = "lastModifiedDateTime")]
    last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    file: Option<OneDriveFileFacet>,
    #[serde(default)]
    folder: Option<OneDriveFolderFacet>,
    #[serde(default, rename = "@microsoft.graph.downloadUrl")]
    download_url: Option<String>,
    #[serde(default)]
    children: Option<Vec<OneDriveEntry>>,
}

#[derive(Deserialize)]
struct OneDriveSnapshot {
    #[serde(default)]
    value: Vec<OneDriveEntry>,
}

impl OneDriveEntry {
    fn into_node(self, parent_id: &str) -> FileNode {
        let is_folder = self.folder.is_some();
        let children = if is_folder {
            let entries = self.children.unwrap_or_default();
            Some(
                entries
                    .into_iter()
                    .map(|e| e.into_node(&self.id))
                    .collect(),
            )
        } else {
            None
        };

        FileNode {
            id: self.id,
            name: self.name,
            kind: if is_folder {
                NodeKind::Folder
            } else {
                NodeKind::File
            },
            mime_type: self.file.and_then(|f| f.mime_type),
            modified_at: self.last_modified,
            parent_id: Some(parent_id.to_string()),
            download_url: self.download_url,
            children,
        }
    }
}

impl ProviderAdapter for OneDriveAdapter {
    fn provider(&self) -> Provider {
        Provider::OneDrive
    }

    fn snapshot_path(&self, class_id: &str) -> String {
        format!("/class/{}/onedrive-info", class_id)
    }

    fn normalize(&self, snapshot: &serde_json::Value) -> Result<FileNode, ClientError> {
        let parsed: OneDriveSnapshot = serde_json::from_value(snapshot.clone())
            .map_err(|e| ClientError::Snapshot(anyhow!("malformed OneDrive snapshot: {}", e)))?;

        let mut root = FileNode::folder(ROOT_ID, Provider::OneDrive.display_name());
        root.children = Some(
            parsed
                .value
                .into_iter()
                .map(|e| e.into_node(ROOT_ID))
                .collect(),
        );
        Ok(root)
    }
}

/// Lookup of the adapter for a provider.
pub struct AdapterRegistry {
    adapters: Vec<Box<dyn ProviderAdapter>>,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: vec![Box::new(DriveAdapter), Box::new(OneDriveAdapter)],
        }
    }

    pub fn find(&self, provider: Provider) -> Option<&dyn ProviderAdapter> {
        self.adapters
            .iter()
            .find(|a| a.provider() == provider)
            .map(|b| b.as_ref())
    }
}
