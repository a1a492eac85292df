use std::time::{Duration, Instant};

use futures_util::StreamExt;

use crate::models::Target;

/// Body reads are capped so a misbehaving target can't exhaust memory.
pub const MAX_BODY_BYTES: usize = 1_000_000;

const USER_AGENT: &str = "GenTrack/1.0";

/// Transport-level classification of how the probe went, independent of
/// any target-specific content rules. The classifier layer turns this
/// into a reason code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Ok,
    Timeout,
    Dns,
    Tls,
    Connection,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub latency_ms: i64,
    pub kind: TransportKind,
    pub status_code: Option<u16>,
    pub body_bytes: Vec<u8>,
    pub raw_error: Option<String>,
}

/// Performs one GET against `target.url`, bounded by `target.timeout_seconds`.
/// Never panics; all failure modes are captured in the returned outcome.
pub async fn probe(client: &reqwest::Client, target: &Target) -> ProbeOutcome {
    let started_at = chrono::Utc::now();
    let start = Instant::now();

    let result = client
        .get(&target.url)
        .header("User-Agent", USER_AGENT)
        .header("Accept", "*/*")
        .timeout(Duration::from_secs(target.timeout_seconds.max(1) as u64))
        .send()
        .await;

    match result {
        Ok(resp) => {
            let status_code = resp.status().as_u16();
            let body_bytes = read_capped_body(resp).await;
            ProbeOutcome {
                started_at,
                latency_ms: start.elapsed().as_millis() as i64,
                kind: TransportKind::Ok,
                status_code: Some(status_code),
                body_bytes,
                raw_error: None,
            }
        }
        Err(e) => ProbeOutcome {
            started_at,
            latency_ms: start.elapsed().as_millis() as i64,
            kind: classify_reqwest_error(&e),
            status_code: None,
            body_bytes: Vec::new(),
            raw_error: Some(e.to_string()),
        },
    }
}

/// Reads the response body up to `MAX_BODY_BYTES`, discarding the remainder
/// without buffering it — a slow-loris or oversized body can't blow up
/// memory or latency here.
async fn read_capped_body(resp: reqwest::Response) -> Vec<u8> {
    let mut out = Vec::new();
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        if out.len() >= MAX_BODY_BYTES {
            continue;
        }
        let remaining = MAX_BODY_BYTES - out.len();
        if chunk.len() <= remaining {
            out.extend_from_slice(&chunk);
        } else {
            out.extend_from_slice(&chunk[..remaining]);
        }
    }
    out
}

/// Maps a `reqwest::Error` onto the transport taxonomy. DNS and TLS
/// failures surface as connect errors in reqwest, so the error chain's
/// text is inspected to tell them apart.
fn classify_reqwest_error(e: &reqwest::Error) -> TransportKind {
    if e.is_timeout() {
        return TransportKind::Timeout;
    }
    if e.is_connect() {
        let text = format!("{e:?}").to_lowercase();
        if text.contains("dns") || text.contains("resolve") || text.contains("name or service") {
            return TransportKind::Dns;
        }
        if text.contains("certificate") || text.contains("tls") || text.contains("ssl") {
            return TransportKind::Tls;
        }
        return TransportKind::Connection;
    }
    TransportKind::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(url: &str) -> Target {
        Target {
            id: 1,
            name: "t".into(),
            url: url.into(),
            interval_seconds: 60,
            timeout_seconds: 1,
            expected_substring: None,
            expected_json_keys: None,
            max_latency_ms: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn connection_error_on_unroutable_port() {
        let client = reqwest::Client::new();
        let t = target("http://127.0.0.1:1");
        let outcome = probe(&client, &t).await;
        assert_eq!(outcome.status_code, None);
        assert!(matches!(
            outcome.kind,
            TransportKind::Connection | TransportKind::Timeout | TransportKind::Unknown
        ));
    }
}
