//! Integration tests for adsync-api
//!
//! Uses wiremock to simulate the reporting API and verifies request shape,
//! response decoding and error mapping of the ReportingClient.

mod common;

mod test_errors;
mod test_fetch;
