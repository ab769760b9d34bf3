//! Cross-component workflow test infrastructure.
//!
//! Spins up a wiremock backend standing in for the thesis-management REST
//! server and hands out clients configured with fast polling, so complete
//! workflows (login, sync trigger, job polling, snapshot reload, transfer)
//! run end to end in milliseconds.

use std::sync::Once;

use thesis_client::config::Settings;
use thesis_client::ThesisClient;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

static INIT: Once = Once::new();

/// Initialize test logging once per process.
pub fn init_test_tracing() {
    INIT.call_once(|| {
        thesis_client::observability::init_tracing("info");
    });
}

/// Mock REST backend plus the settings pointing a client at it.
pub struct TestBackend {
    pub server: MockServer,
}

impl TestBackend {
    pub async fn start() -> Self {
        init_test_tracing();
        let server = MockServer::start().await;
        tracing::info!(uri = %server.uri(), "Mock backend started");
        Self { server }
    }

    /// Settings with polling tightened from 5 s to 40 ms.
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::for_base_url(self.server.uri());
        settings.jobs.poll_interval_ms = 40;
        settings.jobs.poll_backoff_cap_ms = 160;
        settings
    }

    pub fn client(&self) -> ThesisClient {
        ThesisClient::new(&self.settings()).expect("client construction")
    }

    /// `POST /auth/login` returning a fixed token pair.
    pub async fn seed_login(&self, username: &str, access_token: &str, refresh_token: &str) {
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_partial_json(serde_json::json!({ "username": username })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "accessToken": access_token,
                "refreshToken": refresh_token,
            })))
            .mount(&self.server)
            .await;
    }

    /// Sync trigger acknowledgement plus a progress sequence that reports
    /// `processing` for the first `processing_cycles` polls and `completed`
    /// afterwards.
    pub async fn seed_sync_job(&self, class_id: &str, process_id: &str, processing_cycles: u64) {
        Mock::given(method("POST"))
            .and(path("/class/drive-info/sync"))
            .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({
                "processId": process_id,
            })))
            .mount(&self.server)
            .await;

        Mock::given(method("GET"))
            .and(path("/progress"))
            .and(query_param("processIds", process_id))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([job(class_id, process_id, "processing")])),
            )
            .up_to_n_times(processing_cycles)
            .mount(&self.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/progress"))
            .and(query_param("processIds", process_id))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([job(class_id, process_id, "completed")])),
            )
            .mount(&self.server)
            .await;
    }

    /// `GET /class/{id}/drive-info` returning a Drive-native snapshot.
    pub async fn seed_drive_snapshot(&self, class_id: &str, snapshot: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(format!("/class/{}/drive-info", class_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(snapshot))
            .mount(&self.server)
            .await;
    }

    /// Authenticated blob content for one Drive file.
    pub async fn seed_file_content(&self, class_id: &str, file_id: &str, body: &[u8]) {
        Mock::given(method("GET"))
            .and(path(format!(
                "/class/{}/drive-info/files/{}/content",
                class_id, file_id
            )))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/octet-stream")
                    .set_body_bytes(body.to_vec()),
            )
            .mount(&self.server)
            .await;
    }
}

fn job(class_id: &str, process_id: &str, status: &str) -> serde_json::Value {
    serde_json::json!({
        "processId": process_id,
        "classId": class_id,
        "action": "sync",
        "status": status,
        "createdAt": "2026-03-01T10:00:00Z",
        "createdBy": "admin",
    })
}

/// A Drive-native snapshot with one folder holding one file.
pub fn drive_snapshot_fixture() -> serde_json::Value {
    serde_json::json!({
        "files": [
            {
                "id": "f1",
                "name": "Theses 2026",
                "mimeType": "application/vnd.google-apps.folder",
                "modifiedTime": "2026-02-20T12:00:00Z",
                "children": [
                    {
                        "id": "a1",
                        "name": "a.txt",
                        "mimeType": "text/plain",
                        "modifiedTime": "2026-02-21T09:30:00Z"
                    }
                ]
            }
        ]
    })
}
