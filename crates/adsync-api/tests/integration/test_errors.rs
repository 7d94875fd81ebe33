//! Error mapping for failed requests

use adsync_api::ApiError;
use adsync_core::ports::IPerformanceSource;

use crate::common;

#[tokio::test]
async fn test_unauthorized() {
    let (server, client) = common::setup().await;
    common::mount_status(&server, 401, "token expired").await;

    let err = client
        .fetch_rows(&common::customer(), common::range("2025-09-01", "2025-09-01"))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Unauthorized(ref body) if body == "token expired"));
}

#[tokio::test]
async fn test_server_error_keeps_status_and_body() {
    let (server, client) = common::setup().await;
    common::mount_status(&server, 503, "maintenance").await;

    let err = client
        .fetch_rows(&common::customer(), common::range("2025-09-01", "2025-09-01"))
        .await
        .unwrap_err();

    match err {
        ApiError::Status { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "maintenance");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let (server, client) = common::setup().await;
    common::mount_status(&server, 200, "{\"rows\": [{\"date\": \"not-a-date\"}]}").await;

    let err = client
        .fetch_rows(&common::customer(), common::range("2025-09-01", "2025-09-01"))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_port_error_carries_context() {
    let (server, client) = common::setup().await;
    common::mount_status(&server, 500, "boom").await;

    let err = client
        .fetch(&common::customer(), common::range("2025-09-01", "2025-09-03"))
        .await
        .unwrap_err();

    let message = format!("{err:#}");
    assert!(message.contains("fetching campaign performance for 413-902-2884 2025-09-01..2025-09-03"));
    assert!(message.contains("HTTP 500: boom"));
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let client = adsync_api::client::ReportingClient::with_base_url("t", "http://127.0.0.1:9");

    let err = client
        .fetch_rows(&common::customer(), common::range("2025-09-01", "2025-09-01"))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Network(_)));
}
