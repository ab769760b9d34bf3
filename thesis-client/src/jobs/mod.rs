//! Server-side asynchronous job model and polling tracker.

pub mod backoff;
pub mod tracker;

pub use tracker::{JobSubscription, JobTracker};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hierarchy::Provider;

/// What a long-running server operation is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Import,
    Export,
    Generate,
    Sync,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Import => "import",
            JobKind::Export => "export",
            JobKind::Generate => "generate",
            JobKind::Sync => "sync",
        }
    }
}

/// Job lifecycle as reported by the server. `Completed` and `Failed` are
/// terminal; the client never infers a transition locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// One tracked server-side operation. Identity is `process_id`; `status` and
/// `error` are replaced wholesale on every poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub process_id: String,
    pub class_id: String,
    #[serde(rename = "action")]
    pub kind: JobKind,
    pub status: JobStatus,
    /// Opaque server-defined failure payload; rendered, never interpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

/// Filter for the `GET /progress` endpoint. Empty fields are omitted from
/// the query string; list values are comma-joined.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub class_ids: Vec<String>,
    pub types: Vec<Provider>,
    pub actions: Vec<JobKind>,
    pub process_ids: Vec<String>,
}

impl JobFilter {
    pub fn for_class(class_id: impl Into<String>) -> Self {
        Self {
            class_ids: vec![class_id.into()],
            ..Default::default()
        }
    }

    pub fn for_process(process_id: impl Into<String>) -> Self {
        Self {
            process_ids: vec![process_id.into()],
            ..Default::default()
        }
    }

    pub fn with_action(mut self, kind: JobKind) -> Self {
        self.actions.push(kind);
        self
    }

    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.types.push(provider);
        self
    }

    pub(crate) fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if !self.class_ids.is_empty() {
            query.push(("classIds".to_string(), self.class_ids.join(",")));
        }
        if !self.types.is_empty() {
            let types: Vec<&str> = self.types.iter().map(|p| p.as_str()).collect();
            query.push(("types".to_string(), types.join(",")));
        }
        if !self.actions.is_empty() {
            let actions: Vec<&str> = self.actions.iter().map(|a| a.as_str()).collect();
            query.push(("actions".to_string(), actions.join(",")));
        }
        if !self.process_ids.is_empty() {
            query.push(("processIds".to_string(), self.process_ids.join(",")));
        }
        query
    }
}
