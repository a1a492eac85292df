use httpmock::Method::GET;
use httpmock::MockServer;
use pulsewatch::classifier::classify;
use pulsewatch::models::{CreateTargetRequest, ReasonCode, Target};
use pulsewatch::prober::probe;

fn target_for(url: String, overrides: impl FnOnce(&mut Target)) -> Target {
    let mut t = Target {
        id: 1,
        name: "t".into(),
        url,
        interval_seconds: 60,
        timeout_seconds: 2,
        expected_substring: None,
        expected_json_keys: None,
        max_latency_ms: None,
        created_at: chrono::Utc::now(),
    };
    overrides(&mut t);
    t
}

// S1 — first probe on a healthy target is recorded up, no reason.
#[tokio::test]
async fn s1_first_probe_up() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/ok");
            then.status(200).body("hello");
        })
        .await;

    let client = reqwest::Client::new();
    let target = target_for(format!("{}/ok", server.base_url()), |_| {});
    let outcome = probe(&client, &target).await;
    let result = classify(&target, &outcome);

    mock.assert();
    assert!(result.is_up);
    assert!(result.reason_code.is_none());
}

// S3 — content rule failure opens an incident (classified down).
#[tokio::test]
async fn s3_content_rule_failure() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/starting");
            then.status(200).body("starting up");
        })
        .await;

    let client = reqwest::Client::new();
    let target = target_for(format!("{}/starting", server.base_url()), |t| {
        t.expected_substring = Some("ready".into());
    });
    let outcome = probe(&client, &target).await;
    let result = classify(&target, &outcome);

    assert!(!result.is_up);
    assert_eq!(result.reason_code, Some(ReasonCode::ContentMismatch));
}

// S4 — JSON path rule distinguishes invalid_json, json_schema_mismatch, and success.
#[tokio::test]
async fn s4_json_path_rule_distinguishes_outcomes() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/not-json");
            then.status(200).body("<html></html>");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/missing-key");
            then.status(200).body(r#"{"status":"ok"}"#);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/present");
            then.status(200).body(r#"{"status":"ok","region":"us"}"#);
        })
        .await;

    let client = reqwest::Client::new();

    let keys = Some(serde_json::json!(["region"]));

    let invalid = target_for(format!("{}/not-json", server.base_url()), |t| {
        t.expected_json_keys = keys.clone();
    });
    let outcome = probe(&client, &invalid).await;
    assert_eq!(
        classify(&invalid, &outcome).reason_code,
        Some(ReasonCode::InvalidJson)
    );

    let missing = target_for(format!("{}/missing-key", server.base_url()), |t| {
        t.expected_json_keys = keys.clone();
    });
    let outcome = probe(&client, &missing).await;
    assert_eq!(
        classify(&missing, &outcome).reason_code,
        Some(ReasonCode::JsonSchemaMismatch)
    );

    let present = target_for(format!("{}/present", server.base_url()), |t| {
        t.expected_json_keys = keys.clone();
    });
    let outcome = probe(&client, &present).await;
    assert!(classify(&present, &outcome).is_up);
}

// S5 — latency cap produces the exact "Xms > Yms" message.
#[tokio::test]
async fn s5_latency_exceeded_message() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/slow");
            then.status(200)
                .delay(std::time::Duration::from_millis(150));
        })
        .await;

    let client = reqwest::Client::new();
    let target = target_for(format!("{}/slow", server.base_url()), |t| {
        t.max_latency_ms = Some(50);
    });
    let outcome = probe(&client, &target).await;
    let result = classify(&target, &outcome);

    assert_eq!(result.reason_code, Some(ReasonCode::LatencyExceeded));
    let msg = result.error_message.unwrap();
    assert!(msg.starts_with("Latencia acima do maximo ("));
    assert!(msg.contains("ms > 50ms)."));
}

// Interval/timeout are left unset by the wire deserializer when the
// caller omits them; the route applies config defaults afterward, not
// serde.
#[test]
fn create_target_request_leaves_omitted_fields_unset() {
    let json = r#"{"name":"api","url":"https://example.test"}"#;
    let parsed: CreateTargetRequest = serde_json::from_str(json).unwrap();
    assert_eq!(parsed.interval_seconds, None);
    assert_eq!(parsed.timeout_seconds, None);
}
