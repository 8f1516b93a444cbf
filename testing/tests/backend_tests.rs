//! Tests for the in-memory registration backend

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use registration_core::{
    CollectionHandle, EventName, RegistrationBackend, RegistrationId, RegistrationNumber, RegistrationQuery,
    RegistrationRecord, RegistrationStatus,
};
use registration_testing::InMemoryRegistrationBackend;
use serde_json::json;

fn record(index: u32, status: &str, team: &str) -> RegistrationRecord {
    let submitted = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(i64::from(index));
    serde_json::from_value(json!({
        "id": RegistrationId::new(),
        "registrationNumber": format!("TEC-{index}-AAA"),
        "eventName": "Tech Hunt",
        "registrationStatus": status,
        "teamName": team,
        "submittedAt": submitted,
        "createdAt": submitted,
        "updatedAt": submitted,
    }))
    .expect("valid record")
}

async fn collection(backend: &InMemoryRegistrationBackend) -> CollectionHandle {
    backend
        .create_collection(EventName::parse("Tech Hunt").unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn collections_are_isolated_per_event() {
    let backend = InMemoryRegistrationBackend::new();
    let tech_hunt = collection(&backend).await;
    let fifa = backend
        .create_collection(EventName::parse("FIFA Mobile").unwrap())
        .await
        .unwrap();
    assert_ne!(tech_hunt.name(), fifa.name());

    let r = record(1, "pending", "Alpha");
    backend.insert(tech_hunt.clone(), r.clone()).await.unwrap();

    // Same number in another event does not collide.
    let mut other = record(1, "pending", "Beta");
    other.event_name = EventName::parse("FIFA Mobile").unwrap();
    backend.insert(fifa.clone(), other).await.unwrap();

    assert!(backend.fetch(fifa, r.id).await.unwrap().is_none());
    assert!(
        backend
            .fetch_by_number(tech_hunt, RegistrationNumber::new("TEC-1-AAA"))
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn query_filters_and_orders_newest_first() {
    let backend = InMemoryRegistrationBackend::new();
    let handle = collection(&backend).await;
    for (i, status) in ["pending", "confirmed", "pending", "rejected"].iter().enumerate() {
        let index = u32::try_from(i).unwrap();
        backend
            .insert(handle.clone(), record(index, status, "Alpha"))
            .await
            .unwrap();
    }

    let pending = backend
        .query(handle.clone(), RegistrationQuery::all().with_status(RegistrationStatus::Pending))
        .await
        .unwrap();
    let numbers: Vec<_> = pending.iter().map(|r| r.registration_number.to_string()).collect();
    assert_eq!(numbers, vec!["TEC-2-AAA", "TEC-0-AAA"]);

    let latest = backend
        .query(handle, RegistrationQuery::all().with_limit(1))
        .await
        .unwrap();
    assert_eq!(latest[0].registration_number.as_str(), "TEC-3-AAA");
}

#[tokio::test]
async fn latency_still_returns_results() {
    let backend = InMemoryRegistrationBackend::new().with_latency(std::time::Duration::from_millis(2));
    let handle = collection(&backend).await;
    backend
        .insert(handle.clone(), record(7, "waitlist", "Gamma"))
        .await
        .unwrap();
    let all = backend.query(handle, RegistrationQuery::all()).await.unwrap();
    assert_eq!(all.len(), 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn query_limit_never_exceeds_matches(count in 0u32..12, limit in 0usize..15) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let (returned, total) = runtime.block_on(async {
            let backend = InMemoryRegistrationBackend::new();
            let handle = collection(&backend).await;
            for i in 0..count {
                backend.insert(handle.clone(), record(i, "pending", "Alpha")).await.unwrap();
            }
            let limited = backend
                .query(handle.clone(), RegistrationQuery::all().with_limit(limit))
                .await
                .unwrap();
            (limited, usize::try_from(count).unwrap())
        });
        prop_assert_eq!(returned.len(), limit.min(total));
        prop_assert!(returned.windows(2).all(|w| w[0].submitted_at >= w[1].submitted_at));
    }
}
