//! Shared test helpers for reporting API integration tests

use adsync_api::client::ReportingClient;
use adsync_core::domain::{CustomerId, DateRange};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "test-access-token";
pub const CUSTOMER_PATH: &str = "/customers/4139022884/campaign-performance";

/// Starts a mock server and returns a client pointed at it
pub async fn setup() -> (MockServer, ReportingClient) {
    let server = MockServer::start().await;
    let client = ReportingClient::with_base_url(TOKEN, server.uri());
    (server, client)
}

pub fn customer() -> CustomerId {
    CustomerId::new("413-902-2884").unwrap()
}

pub fn range(start: &str, end: &str) -> DateRange {
    DateRange::parse(start, end).unwrap()
}

/// Mounts the performance endpoint for `range`, answering with `rows`
pub async fn mount_rows(server: &MockServer, range: DateRange, rows: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(CUSTOMER_PATH))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .and(query_param("start_date", range.start.to_string().as_str()))
        .and(query_param("end_date", range.end.to_string().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "rows": rows })))
        .expect(1)
        .mount(server)
        .await;
}

/// Mounts the performance endpoint answering every request with `status`
pub async fn mount_status(server: &MockServer, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(CUSTOMER_PATH))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}
