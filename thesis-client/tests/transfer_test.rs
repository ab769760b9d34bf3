//! Upload and download behavior of the transfer manager.

use std::sync::{Arc, Mutex};

use thesis_client::config::Settings;
use thesis_client::error::ClientError;
use thesis_client::hierarchy::{FileNode, Provider};
use thesis_client::transfer::{DownloadArtifact, TransferError, UploadFile};
use thesis_client::ThesisClient;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ThesisClient {
    ThesisClient::new(&Settings::for_base_url(server.uri())).unwrap()
}

fn upload_file(name: &str, bytes: &[u8]) -> UploadFile {
    UploadFile {
        name: name.to_string(),
        mime_type: "text/plain".to_string(),
        data: bytes.to_vec(),
    }
}

#[tokio::test]
async fn upload_returns_created_nodes_and_finishes_progress() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/class/c1/drive-info/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "id": "new1", "name": "a.txt", "kind": "file", "parentId": "f1" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let reported: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = reported.clone();

    let created = client
        .transfers
        .upload(
            "c1",
            Provider::Drive,
            "f1",
            vec![upload_file("a.txt", b"hello world")],
            Some(Arc::new(move |percent| {
                sink.lock().unwrap().push(percent);
            })),
        )
        .await
        .unwrap();

    assert_eq!(created.len(), 1);
    assert_eq!(created[0].id, "new1");

    let reported = reported.lock().unwrap();
    assert!(!reported.is_empty());
    assert_eq!(*reported.last().unwrap(), 100);
}

#[tokio::test]
async fn upload_with_no_files_is_rejected_locally() {
    let server = MockServer::start().await;
    let client = client(&server);

    let result = client
        .transfers
        .upload("c1", Provider::Drive, "f1", Vec::new(), None)
        .await;

    assert!(matches!(
        result,
        Err(ClientError::Transfer(TransferError::Empty))
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn rejected_upload_surfaces_typed_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/class/c1/drive-info/files"))
        .respond_with(ResponseTemplate::new(507).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    let client = client(&server);
    let result = client
        .transfers
        .upload(
            "c1",
            Provider::Drive,
            "f1",
            vec![upload_file("a.txt", b"hi")],
            None,
        )
        .await;

    match result {
        Err(ClientError::Transfer(TransferError::UploadRejected { status, message })) => {
            assert_eq!(status, 507);
            assert_eq!(message, "quota exceeded");
        }
        other => panic!("expected UploadRejected, got {other:?}"),
    }
}

#[tokio::test]
async fn download_fetches_blob_with_content_type() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/class/c1/drive-info/files/a1/content"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .set_body_bytes(b"file body".to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let node = FileNode::file("a1", "a.txt");

    let artifacts = client
        .transfers
        .download("c1", Provider::Drive, &[&node], Some("report.txt"))
        .await
        .unwrap();

    assert_eq!(artifacts.len(), 1);
    match &artifacts[0] {
        DownloadArtifact::Blob {
            name,
            mime_type,
            bytes,
        } => {
            assert_eq!(name, "report.txt");
            assert_eq!(mime_type.as_deref(), Some("text/plain"));
            assert_eq!(bytes, b"file body");
        }
        other => panic!("expected a blob artifact, got {other:?}"),
    }
}

#[tokio::test]
async fn onedrive_direct_url_bypasses_the_transport() {
    let server = MockServer::start().await;
    let client = client(&server);

    let mut node = FileNode::file("od1", "b.pdf");
    node.download_url = Some("https://cdn.example/b.pdf?sig=abc".to_string());

    let artifacts = client
        .transfers
        .download("c1", Provider::OneDrive, &[&node], None)
        .await
        .unwrap();

    match &artifacts[0] {
        DownloadArtifact::DirectUrl { name, url } => {
            assert_eq!(name, "b.pdf");
            assert_eq!(url, "https://cdn.example/b.pdf?sig=abc");
        }
        other => panic!("expected a direct URL artifact, got {other:?}"),
    }

    // The signed URL is handed back untouched; no request reaches the API.
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_remote_file_surfaces_download_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/class/c1/drive-info/files/gone/content"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let client = client(&server);
    let node = FileNode::file("gone", "gone.txt");

    let result = client
        .transfers
        .download("c1", Provider::Drive, &[&node], None)
        .await;

    match result {
        Err(ClientError::Transfer(TransferError::DownloadFailed { id, status, .. })) => {
            assert_eq!(id, "gone");
            assert_eq!(status, 404);
        }
        other => panic!("expected DownloadFailed, got {other:?}"),
    }
}
