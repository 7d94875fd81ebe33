//! Successful fetches against the campaign performance endpoint

use adsync_core::domain::DataSource;
use adsync_core::ports::IPerformanceSource;

use crate::common;

#[tokio::test]
async fn test_fetch_decodes_rows_and_converts_micros() {
    let (server, client) = common::setup().await;
    let range = common::range("2025-09-01", "2025-09-02");
    common::mount_rows(
        &server,
        range,
        serde_json::json!([
            {
                "date": "2025-09-01",
                "campaign_id": "111",
                "campaign_name": "Brand",
                "campaign_status": "ENABLED",
                "impressions": 1000,
                "clicks": 50,
                "cost_micros": 12_340_000,
                "conversions": 3.0,
                "conversions_value": 450.0,
                "all_conversions": 4.0,
                "view_through_conversions": 2
            },
            {
                "date": "2025-09-02",
                "campaign_id": "111",
                "impressions": 800,
                "clicks": 0
            }
        ]),
    )
    .await;

    let rows = client
        .fetch_rows(&common::customer(), range)
        .await
        .expect("fetch failed");

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].data_source, DataSource::GoogleAds);
    assert_eq!(rows[0].cost, 12.34);
    assert_eq!(rows[0].conversions_value, 450.0);
    assert_eq!(rows[0].view_through_conversions, 2);
    assert_eq!(rows[1].cost, 0.0);
    assert_eq!(rows[1].campaign_name, "");
}

#[tokio::test]
async fn test_fetch_through_port_trait() {
    let (server, client) = common::setup().await;
    let range = common::range("2025-09-01", "2025-09-01");
    common::mount_rows(&server, range, serde_json::json!([])).await;

    let source: &dyn IPerformanceSource = &client;
    let rows = source.fetch(&common::customer(), range).await.unwrap();

    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_rows_outside_range_are_dropped() {
    let (server, client) = common::setup().await;
    let range = common::range("2025-09-01", "2025-09-01");
    common::mount_rows(
        &server,
        range,
        serde_json::json!([
            { "date": "2025-08-31", "campaign_id": "111" },
            { "date": "2025-09-01", "campaign_id": "111" },
            { "date": "2025-09-02", "campaign_id": "111" }
        ]),
    )
    .await;

    let rows = client.fetch_rows(&common::customer(), range).await.unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].date, range.start);
}

#[tokio::test]
async fn test_explicit_data_source_is_kept() {
    let (server, client) = common::setup().await;
    let range = common::range("2025-09-01", "2025-09-01");
    common::mount_rows(
        &server,
        range,
        serde_json::json!([
            { "data_source": "google_lsa", "date": "2025-09-01", "campaign_id": "lsa-1" }
        ]),
    )
    .await;

    let rows = client.fetch_rows(&common::customer(), range).await.unwrap();

    assert_eq!(rows[0].data_source, DataSource::GoogleLsa);
}
