//! Contract Test: Address Family Isolation
//!
//! A and AAAA never cross-contaminate: an update for one family neither
//! reads, clears, nor writes the other.

mod common;

use common::*;
use dynr_core::UpdateQuery;
use dynr_core::traits::{RecordType, ZoneRecord};
use std::sync::Arc;

fn existing_aaaa() -> ZoneRecord {
    ZoneRecord::new("example.com", "vpn", RecordType::Aaaa, [ip("2001:db8::1")], 60)
}

fn existing_a() -> ZoneRecord {
    ZoneRecord::new("example.com", "vpn", RecordType::A, [ip("203.0.113.5")], 60)
}

#[tokio::test]
async fn ipv4_update_leaves_aaaa_alone() {
    let store = Arc::new(ScriptedRecordStore::with_records([existing_aaaa()]));
    let handler = handler(&example_config(), store.clone());

    let reply = handler
        .handle(&UpdateQuery::new("vpn.example.com", "203.0.113.9"), admin(), None)
        .await;

    assert_eq!(reply.body, "good 203.0.113.9");
    assert_eq!(store.get_calls(), 1, "only the A record set is read");
    assert_eq!(store.upserted(), vec![("vpn.example.com".to_string(), RecordType::A)]);
    assert_eq!(
        store.values("example.com", "vpn", RecordType::Aaaa),
        vec![ip("2001:db8::1")]
    );
}

#[tokio::test]
async fn ipv6_update_leaves_a_alone() {
    let store = Arc::new(ScriptedRecordStore::with_records([existing_a()]));
    let handler = handler(&example_config(), store.clone());

    let reply = handler
        .handle(&UpdateQuery::new("vpn.example.com", "2001:db8::9"), admin(), None)
        .await;

    assert_eq!(reply.body, "good 2001:db8::9");
    assert_eq!(
        store.upserted(),
        vec![("vpn.example.com".to_string(), RecordType::Aaaa)]
    );
    assert_eq!(
        store.values("example.com", "vpn", RecordType::A),
        vec![ip("203.0.113.5")]
    );
}

#[tokio::test]
async fn dual_stack_writes_only_changed_family() {
    let store = Arc::new(ScriptedRecordStore::with_records([existing_a(), existing_aaaa()]));
    let handler = handler(&example_config(), store.clone());

    let query = UpdateQuery {
        hostname: Some("vpn.example.com".into()),
        myip: Some("203.0.113.5".into()),
        myip6: Some("2001:db8::2".into()),
        ..UpdateQuery::default()
    };
    let reply = handler.handle(&query, admin(), None).await;

    assert_eq!(reply.body, "good 203.0.113.5,2001:db8::2");
    assert_eq!(
        store.upserted(),
        vec![("vpn.example.com".to_string(), RecordType::Aaaa)]
    );
}

#[tokio::test]
async fn dual_stack_unchanged_is_nochg() {
    let store = Arc::new(ScriptedRecordStore::with_records([existing_a(), existing_aaaa()]));
    let handler = handler(&example_config(), store.clone());

    let reply = handler
        .handle(
            &UpdateQuery::new("vpn.example.com", "2001:db8::1,203.0.113.5"),
            admin(),
            None,
        )
        .await;

    assert_eq!(reply.body, "nochg 203.0.113.5,2001:db8::1");
    assert_eq!(store.upsert_calls(), 0);
}
