//! Contract Test: Idempotency
//!
//! Replaying an update must not rewrite the store, and concurrent identical
//! updates must converge on the same final state.
//!
//! Constraints verified:
//! - First update creates the record and answers `good`
//! - Identical replays answer `nochg` without an upsert
//! - The stored value set equals the requested one, nothing more

mod common;

use common::*;
use dynr_core::UpdateQuery;
use dynr_core::traits::{RecordType, ZoneRecord};
use http::StatusCode;
use std::sync::Arc;

#[tokio::test]
async fn first_update_creates_record() {
    let store = Arc::new(ScriptedRecordStore::new());
    let handler = handler(&example_config(), store.clone());

    let reply = handler
        .handle(&UpdateQuery::new("vpn.example.com", "203.0.113.5"), admin(), None)
        .await;

    assert_eq!(reply.body, "good 203.0.113.5");
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        store.values("example.com", "vpn", RecordType::A),
        vec![ip("203.0.113.5")]
    );
    assert_eq!(store.upsert_calls(), 1);
}

#[tokio::test]
async fn replay_answers_nochg_without_upsert() {
    let store = Arc::new(ScriptedRecordStore::new());
    let handler = handler(&example_config(), store.clone());
    let query = UpdateQuery::new("vpn.example.com", "203.0.113.5");

    handler.handle(&query, admin(), None).await;
    for _ in 0..5 {
        let reply = handler.handle(&query, admin(), None).await;
        assert_eq!(reply.body, "nochg 203.0.113.5");
        assert_eq!(reply.status, StatusCode::OK);
    }

    assert_eq!(store.upsert_calls(), 1, "replays must not issue upserts");
}

#[tokio::test]
async fn extra_values_are_collapsed_to_requested_set() {
    let mut existing = ZoneRecord::new(
        "example.com",
        "vpn",
        RecordType::A,
        [ip("203.0.113.5")],
        60,
    );
    existing.values.insert(ip("198.51.100.1"));
    let store = Arc::new(ScriptedRecordStore::with_records([existing]));
    let handler = handler(&example_config(), store.clone());

    let reply = handler
        .handle(&UpdateQuery::new("vpn.example.com", "203.0.113.5"), admin(), None)
        .await;

    assert_eq!(reply.body, "good 203.0.113.5");
    assert_eq!(
        store.values("example.com", "vpn", RecordType::A),
        vec![ip("203.0.113.5")]
    );
}

#[tokio::test]
async fn ttl_comes_from_configuration() {
    let store = Arc::new(ScriptedRecordStore::new());
    let mut config = example_config();
    config.update.ttl = 300;
    let handler = handler(&config, store.clone());

    handler
        .handle(&UpdateQuery::new("vpn.example.com", "203.0.113.5"), admin(), None)
        .await;

    assert_eq!(store.records()[0].ttl, 300);
}

#[tokio::test]
async fn concurrent_identical_updates_converge() {
    let store = Arc::new(ScriptedRecordStore::new());
    let handler = handler(&example_config(), store.clone());

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let handler = handler.clone();
        tasks.push(tokio::spawn(async move {
            handler
                .handle(&UpdateQuery::new("vpn.example.com", "203.0.113.5"), admin(), None)
                .await
        }));
    }

    for task in tasks {
        let reply = task.await.unwrap();
        assert!(
            reply.body == "good 203.0.113.5" || reply.body == "nochg 203.0.113.5",
            "unexpected reply: {}",
            reply.body
        );
    }

    assert_eq!(store.records().len(), 1);
    assert_eq!(
        store.values("example.com", "vpn", RecordType::A),
        vec![ip("203.0.113.5")]
    );
}
