use chrono::{Duration, Utc};
use pulsewatch::db::Store;
use pulsewatch::models::{CreateTarget, ReasonCode};
use sqlx::PgPool;

async fn seed_target(store: &Store) -> i64 {
    let target = store
        .insert_target(&CreateTarget {
            name: "api".into(),
            url: "https://example.test/health".into(),
            interval_seconds: 60,
            timeout_seconds: 8,
            expected_substring: None,
            expected_json_keys: None,
            max_latency_ms: None,
        })
        .await
        .unwrap();
    target.id
}

// Invariant 1 — up -> down transition opens exactly one incident.
#[sqlx::test]
async fn up_to_down_opens_incident(pool: PgPool) {
    let store = Store::from_pool(pool).await.unwrap();
    let target_id = seed_target(&store).await;
    let t0 = Utc::now();

    store
        .record_check(target_id, t0, Some(200), Some(10), true, None, None)
        .await
        .unwrap();
    store
        .record_check(
            target_id,
            t0 + Duration::seconds(60),
            None,
            None,
            false,
            Some(ReasonCode::Timeout),
            Some("timed out".into()),
        )
        .await
        .unwrap();

    let incidents = store.select_incidents(target_id, 10).await.unwrap();
    assert_eq!(incidents.len(), 1);
    assert!(!incidents[0].is_resolved);
    assert_eq!(incidents[0].reason_code, Some(ReasonCode::Timeout));
}

// Invariant 2 — a subsequent recovery closes the incident with a
// non-negative floored duration and records the recovery check id.
#[sqlx::test]
async fn down_to_up_closes_incident_with_duration(pool: PgPool) {
    let store = Store::from_pool(pool).await.unwrap();
    let target_id = seed_target(&store).await;
    let t0 = Utc::now();

    store
        .record_check(
            target_id,
            t0,
            None,
            None,
            false,
            Some(ReasonCode::ConnectionError),
            Some("refused".into()),
        )
        .await
        .unwrap();
    let recovery = store
        .record_check(target_id, t0 + Duration::seconds(90), Some(200), Some(5), true, None, None)
        .await
        .unwrap();

    let incidents = store.select_incidents(target_id, 10).await.unwrap();
    assert_eq!(incidents.len(), 1);
    assert!(incidents[0].is_resolved);
    assert_eq!(incidents[0].duration_seconds, Some(90));
    assert_eq!(incidents[0].recovery_check_id, Some(recovery.id));
}

// Invariant 6 — consecutive down checks do not open a second incident.
#[sqlx::test]
async fn consecutive_down_checks_reuse_open_incident(pool: PgPool) {
    let store = Store::from_pool(pool).await.unwrap();
    let target_id = seed_target(&store).await;
    let t0 = Utc::now();

    for i in 0..3 {
        store
            .record_check(
                target_id,
                t0 + Duration::seconds(i * 60),
                None,
                None,
                false,
                Some(ReasonCode::Http5xx),
                Some("server error".into()),
            )
            .await
            .unwrap();
    }

    let incidents = store.select_incidents(target_id, 10).await.unwrap();
    assert_eq!(incidents.len(), 1);
}

// Invariant 7 — a manual check and a scheduler tick on the same target
// serialize rather than double-open an incident (advisory lock).
#[sqlx::test]
async fn concurrent_checks_on_same_target_serialize(pool: PgPool) {
    let store = Store::from_pool(pool).await.unwrap();
    let target_id = seed_target(&store).await;
    let t0 = Utc::now();

    store
        .record_check(target_id, t0, Some(200), Some(10), true, None, None)
        .await
        .unwrap();

    let a = store.clone();
    let b = store.clone();
    let t1 = t0 + Duration::seconds(30);
    let t2 = t0 + Duration::seconds(31);

    let (r1, r2) = tokio::join!(
        a.record_check(
            target_id,
            t1,
            None,
            None,
            false,
            Some(ReasonCode::Timeout),
            Some("timed out".into()),
        ),
        b.record_check(
            target_id,
            t2,
            None,
            None,
            false,
            Some(ReasonCode::Timeout),
            Some("timed out".into()),
        ),
    );
    r1.unwrap();
    r2.unwrap();

    let incidents = store.select_incidents(target_id, 10).await.unwrap();
    assert_eq!(incidents.len(), 1, "two concurrent down checks must share one incident");
}

// Duplicate URL is rejected with a conflict, not a generic db error.
#[sqlx::test]
async fn duplicate_target_url_rejected(pool: PgPool) {
    let store = Store::from_pool(pool).await.unwrap();
    let input = CreateTarget {
        name: "api".into(),
        url: "https://example.test/dup".into(),
        interval_seconds: 60,
        timeout_seconds: 8,
        expected_substring: None,
        expected_json_keys: None,
        max_latency_ms: None,
    };
    store.insert_target(&input).await.unwrap();
    let err = store.insert_target(&input).await.unwrap_err();
    assert!(matches!(err, pulsewatch::errors::StoreError::DuplicateUrl));
}

// select_due_targets only returns targets whose interval has elapsed.
#[sqlx::test]
async fn due_targets_respect_interval(pool: PgPool) {
    let store = Store::from_pool(pool).await.unwrap();
    let target_id = seed_target(&store).await;
    let now = Utc::now();

    let due = store.select_due_targets(now).await.unwrap();
    assert_eq!(due.len(), 1, "never-checked target is immediately due");

    store
        .record_check(target_id, now, Some(200), Some(5), true, None, None)
        .await
        .unwrap();

    let due = store.select_due_targets(now + Duration::seconds(1)).await.unwrap();
    assert!(due.is_empty(), "freshly checked target is not due yet");

    let due = store
        .select_due_targets(now + Duration::seconds(61))
        .await
        .unwrap();
    assert_eq!(due.len(), 1, "target becomes due again after its interval elapses");
}

// MTBF only averages positive gaps between resolved incidents.
#[sqlx::test]
async fn mtbf_uses_only_positive_gaps(pool: PgPool) {
    let store = Store::from_pool(pool).await.unwrap();
    let target_id = seed_target(&store).await;
    let t0 = Utc::now();

    store
        .record_check(target_id, t0, None, None, false, Some(ReasonCode::Timeout), None)
        .await
        .unwrap();
    store
        .record_check(target_id, t0 + Duration::seconds(30), Some(200), Some(5), true, None, None)
        .await
        .unwrap();

    store
        .record_check(
            target_id,
            t0 + Duration::seconds(130),
            None,
            None,
            false,
            Some(ReasonCode::Timeout),
            None,
        )
        .await
        .unwrap();
    store
        .record_check(
            target_id,
            t0 + Duration::seconds(160),
            Some(200),
            Some(5),
            true,
            None,
            None,
        )
        .await
        .unwrap();

    let summary = store.select_reliability(Some(target_id)).await.unwrap();
    assert_eq!(summary.mtbf_seconds, Some(100.0));
    assert_eq!(summary.mttr_seconds, Some(30.0));
}
