//! Contract Test: Cloudflare Record Store
//!
//! Drives the store against a mock Cloudflare API.
//!
//! Constraints verified:
//! - Reads list one name/type and never touch the other family
//! - Upserts replace the value set through a single batch call
//! - An unchanged set makes no write call
//! - HTTP failures map onto the transient/permanent taxonomy

use dynr_core::Error;
use dynr_core::traits::{RecordStore, RecordType, ZoneRecord};
use dynr_store_cloudflare::CloudflareRecordStore;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::net::IpAddr;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "test-token";
const ZONE_ID: &str = "023e105f4ecef8ad9ca31a8372d0c353";

fn store(server: &MockServer) -> CloudflareRecordStore {
    let zone_ids = BTreeMap::from([("example.com".to_string(), ZONE_ID.to_string())]);
    CloudflareRecordStore::with_base_url(TOKEN, zone_ids, server.uri()).unwrap()
}

fn ok(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "errors": [],
        "messages": [],
        "result": result,
    }))
}

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

async fn mount_records(server: &MockServer, record_type: &str, records: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/zones/{}/dns_records", ZONE_ID)))
        .and(query_param("name", "vpn.example.com"))
        .and(query_param("type", record_type))
        .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
        .respond_with(ok(records))
        .mount(server)
        .await;
}

async fn batch_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path().ends_with("/dns_records/batch"))
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

#[tokio::test]
async fn get_record_reads_values_and_ttl() {
    let server = MockServer::start().await;
    mount_records(
        &server,
        "A",
        json!([
            {"id": "r1", "type": "A", "name": "vpn.example.com", "content": "203.0.113.5", "ttl": 60},
            {"id": "r2", "type": "A", "name": "vpn.example.com", "content": "203.0.113.6", "ttl": 60},
        ]),
    )
    .await;

    let record = store(&server)
        .get_record("example.com", "vpn", RecordType::A)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(record.ttl, 60);
    assert_eq!(
        record.values.into_iter().collect::<Vec<_>>(),
        vec![ip("203.0.113.5"), ip("203.0.113.6")]
    );
}

#[tokio::test]
async fn get_record_absent_is_none() {
    let server = MockServer::start().await;
    mount_records(&server, "AAAA", json!([])).await;

    let record = store(&server)
        .get_record("example.com", "vpn", RecordType::Aaaa)
        .await
        .unwrap();

    assert!(record.is_none());
}

#[tokio::test]
async fn zone_id_is_looked_up_when_not_configured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/zones"))
        .and(query_param("name", "example.com"))
        .respond_with(ok(json!([{"id": ZONE_ID, "name": "example.com"}])))
        .expect(1)
        .mount(&server)
        .await;
    mount_records(&server, "A", json!([])).await;

    let store =
        CloudflareRecordStore::with_base_url(TOKEN, BTreeMap::new(), server.uri()).unwrap();
    let record = store
        .get_record("example.com", "vpn", RecordType::A)
        .await
        .unwrap();

    assert!(record.is_none());
}

#[tokio::test]
async fn unknown_zone_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/zones"))
        .respond_with(ok(json!([])))
        .mount(&server)
        .await;

    let store =
        CloudflareRecordStore::with_base_url(TOKEN, BTreeMap::new(), server.uri()).unwrap();
    let err = store
        .get_record("example.org", "vpn", RecordType::A)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotFound(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn upsert_creates_missing_record() {
    let server = MockServer::start().await;
    mount_records(&server, "A", json!([])).await;
    Mock::given(method("POST"))
        .and(path(format!("/zones/{}/dns_records/batch", ZONE_ID)))
        .respond_with(ok(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let record = ZoneRecord::new("example.com", "vpn", RecordType::A, [ip("203.0.113.5")], 60);
    store(&server).upsert_record(&record).await.unwrap();

    let bodies = batch_bodies(&server).await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(
        bodies[0]["posts"],
        json!([{
            "name": "vpn.example.com",
            "type": "A",
            "content": "203.0.113.5",
            "ttl": 60,
            "proxied": false,
        }])
    );
    assert!(bodies[0].get("deletes").is_none());
}

#[tokio::test]
async fn upsert_replaces_whole_value_set() {
    let server = MockServer::start().await;
    mount_records(
        &server,
        "A",
        json!([
            {"id": "r1", "content": "198.51.100.1", "ttl": 60},
            {"id": "r2", "content": "198.51.100.2", "ttl": 60},
        ]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path(format!("/zones/{}/dns_records/batch", ZONE_ID)))
        .respond_with(ok(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let record = ZoneRecord::new("example.com", "vpn", RecordType::A, [ip("203.0.113.5")], 60);
    store(&server).upsert_record(&record).await.unwrap();

    let bodies = batch_bodies(&server).await;
    assert_eq!(
        bodies[0]["patches"],
        json!([{"id": "r1", "content": "203.0.113.5", "ttl": 60}])
    );
    assert_eq!(bodies[0]["deletes"], json!([{"id": "r2"}]));
}

#[tokio::test]
async fn unchanged_upsert_makes_no_write() {
    let server = MockServer::start().await;
    mount_records(
        &server,
        "AAAA",
        json!([{"id": "r1", "content": "2001:db8::1", "ttl": 60}]),
    )
    .await;
    Mock::given(method("POST"))
        .respond_with(ok(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let record = ZoneRecord::new(
        "example.com",
        "vpn",
        RecordType::Aaaa,
        [ip("2001:db8::1")],
        60,
    );
    store(&server).upsert_record(&record).await.unwrap();
}

#[tokio::test]
async fn status_codes_map_to_error_classes() {
    let cases = [
        (429, true),
        (503, true),
        (403, false),
        (400, false),
    ];

    for (status, transient) in cases {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "success": false,
                "errors": [{"code": 10000, "message": "failure"}],
                "result": null,
            })))
            .mount(&server)
            .await;

        let err = store(&server)
            .get_record("example.com", "vpn", RecordType::A)
            .await
            .unwrap_err();

        assert_eq!(err.is_transient(), transient, "status {}: {}", status, err);
    }
}

#[tokio::test]
async fn unsuccessful_envelope_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "errors": [{"code": 9109, "message": "Invalid access token"}],
            "result": null,
        })))
        .mount(&server)
        .await;

    let err = store(&server)
        .get_record("example.com", "vpn", RecordType::A)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Invalid access token"));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn token_never_in_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = store(&server)
        .get_record("example.com", "vpn", RecordType::A)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Authentication(_)));
    assert!(!err.to_string().contains(TOKEN));
}
