//! HTTP framing tests against a scripted transport

use assert_matches::assert_matches;
use ddi_agent::ddi::identity::CredentialKind;
use ddi_agent::errors::{DdiError, InstallError};
use ddi_agent::http::client::{HttpClient, MAX_DOCUMENT_SIZE};
use ddi_agent::http::headers::HeaderFactory;
use ddi_agent::http::href::Href;
use ddi_agent::installer::FirmwareInstaller;
use secrecy::SecretString;
use serde_json::{json, Value};
use tokio_test::assert_ok;

use crate::support::{MockInstaller, MockTransport, HOST};

fn http(transport: MockTransport) -> HttpClient<MockTransport> {
    let headers = HeaderFactory::new(CredentialKind::GatewayToken, SecretString::from("gw"));
    HttpClient::new(transport, headers)
}

fn href(path: &str) -> Href {
    Href::new(HOST, 443, path)
}

#[tokio::test]
async fn test_get_reads_chunked_document() {
    let body = r#"{"config":{"polling":{"sleep":"00:01:00"}},"_links":{}}"#;
    let mut http = http(MockTransport::new().chunked_json(body, 7));

    let value: Value = assert_ok!(http.get(&href("DEFAULT/controller/v1/dev01")).await);

    assert_eq!(value["config"]["polling"]["sleep"], "00:01:00");
    let request = http.transport().last_request();
    assert_eq!(
        request.request_line(),
        "GET /DEFAULT/controller/v1/dev01 HTTP/1.1"
    );
    assert_eq!(
        request.header("Authorization").as_deref(),
        Some("GatewayToken gw")
    );
    assert_eq!(
        request.header("Accept").as_deref(),
        Some("application/hal+json")
    );
    assert_eq!(http.transport().closes, 1);
}

#[tokio::test]
async fn test_get_error_status_is_reported() {
    let mut http = http(MockTransport::new().json(404, r#"{"message":"gone"}"#));

    let result = http.get::<Value>(&href("missing")).await;

    assert_matches!(result, Err(DdiError::HttpStatus { status: 404, ref body }) if body.contains("gone"));
    assert_eq!(http.transport().closes, 1);
}

#[tokio::test]
async fn test_get_rejects_oversized_document() {
    let body = format!(r#"{{"pad":"{}"}}"#, "x".repeat(MAX_DOCUMENT_SIZE));
    let mut http = http(MockTransport::new().json(200, &body));

    let result = http.get::<Value>(&href("big")).await;

    assert_matches!(result, Err(DdiError::DocumentTooLarge(_)));
}

#[tokio::test]
async fn test_get_rejects_bad_status_line() {
    let mut http = http(MockTransport::new().raw(b"SSH-2.0-OpenSSH\r\n\r\n"));

    let result = http.get::<Value>(&href("x")).await;

    assert_matches!(result, Err(DdiError::ParseError(_)));
    assert_eq!(http.transport().closes, 1);
}

#[tokio::test]
async fn test_get_fails_on_refused_connection() {
    let mut http = http(MockTransport::new().refuse());

    let result = http.get::<Value>(&href("x")).await;

    assert_matches!(result, Err(DdiError::TransportError(_)));
    assert!(http.transport().requests.is_empty());
}

#[tokio::test]
async fn test_post_sends_json_body() {
    let mut http = http(MockTransport::new().ok());
    let body = json!({"id": "3", "status": {"execution": "closed"}});

    let status = assert_ok!(http.post(&href("feedback"), &body).await);

    assert!(status.is_success());
    let request = http.transport().last_request();
    assert_eq!(request.method(), "POST");
    assert_eq!(
        request.header("Content-Type").as_deref(),
        Some("application/json")
    );
    let length: usize = request.header("Content-Length").unwrap().parse().unwrap();
    assert_eq!(length, serde_json::to_vec(&body).unwrap().len());
    assert_eq!(request.json(), body);

    // Host comes first and the connection is never kept alive
    let text = String::from_utf8_lossy(&request.raw).into_owned();
    let host_at = text.find("Host:").unwrap();
    let auth_at = text.find("Authorization:").unwrap();
    assert!(host_at < auth_at);
    assert_eq!(request.header("Connection").as_deref(), Some("close"));
}

#[tokio::test]
async fn test_put_error_status_is_reported() {
    let mut http = http(MockTransport::new().json(500, ""));

    let result = http.put(&href("configData"), &json!({})).await;

    assert_matches!(result, Err(DdiError::HttpStatus { status: 500, .. }));
}

#[tokio::test]
async fn test_download_streams_into_installer() {
    let image: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    let mut http = http(MockTransport::new().binary(&image));
    let mut installer = MockInstaller::default();

    let written = assert_ok!(
        http.download(&href("artifacts/fw.bin"), image.len() as u64, &mut installer)
            .await
    );

    assert_eq!(written, image.len() as u64);
    assert_eq!(installer.image, image);
    assert!(installer.is_finished());
    assert_eq!(
        http.transport().last_request().header("Accept").as_deref(),
        Some("application/octet-stream")
    );
}

#[tokio::test]
async fn test_download_reads_until_close() {
    let mut http = http(MockTransport::new().raw(b"HTTP/1.1 200 OK\r\n\r\nfirmware"));
    let mut installer = MockInstaller::default();

    let written = assert_ok!(http.download(&href("fw"), 8, &mut installer).await);

    assert_eq!(written, 8);
    assert_eq!(installer.image, b"firmware");
}

#[tokio::test]
async fn test_short_download_is_a_size_mismatch() {
    let mut http = http(
        MockTransport::new().raw(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nfirm"),
    );
    let mut installer = MockInstaller::default();

    let result = http.download(&href("fw"), 10, &mut installer).await;

    assert_matches!(
        result,
        Err(DdiError::InstallError(InstallError::SizeMismatch {
            expected: 10,
            written: 4
        }))
    );
    assert!(!installer.is_finished());
}

#[tokio::test]
async fn test_refused_download_never_starts_installer() {
    let mut http = http(MockTransport::new().json(404, ""));
    let mut installer = MockInstaller::default();

    let result = http.download(&href("fw"), 4, &mut installer).await;

    assert_matches!(
        result,
        Err(DdiError::InstallError(InstallError::Refused(404)))
    );
    assert!(installer.expected.is_none());
}

#[tokio::test]
async fn test_broken_stream_aborts_installer() {
    let mut http = http(MockTransport::new().raw(
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n8\r\nfirm",
    ));
    let mut installer = MockInstaller::default();

    let result = http.download(&href("fw"), 8, &mut installer).await;

    assert_matches!(
        result,
        Err(DdiError::InstallError(InstallError::Stream { written: 4, .. }))
    );
    assert!(installer.aborted);
    assert!(installer.image.is_empty());
    assert!(!installer.is_finished());
}

#[tokio::test]
async fn test_oversized_head_is_rejected() {
    let mut reply = b"HTTP/1.1 200 OK\r\n".to_vec();
    for i in 0..2_000 {
        reply.extend_from_slice(format!("X-Pad-{}: padding\r\n", i).as_bytes());
    }
    reply.extend_from_slice(b"\r\n{}");
    let mut http = http(MockTransport::new().raw(&reply));

    let result = http.get::<Value>(&href("x")).await;

    assert_matches!(result, Err(DdiError::DocumentTooLarge(_)));
}
