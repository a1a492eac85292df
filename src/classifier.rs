use serde_json::Value;

use crate::models::{ReasonCode, Target};
use crate::prober::{ProbeOutcome, TransportKind};

/// Result of classifying one probe outcome against a target's validation
/// rules. Pure function of its inputs — no I/O, no clock reads.
pub struct Classification {
    pub is_up: bool,
    pub reason_code: Option<ReasonCode>,
    pub error_message: Option<String>,
}

pub fn classify(target: &Target, outcome: &ProbeOutcome) -> Classification {
    match outcome.kind {
        TransportKind::Timeout => {
            return down(ReasonCode::Timeout, "Timeout de conexao.".to_string());
        }
        TransportKind::Dns => {
            return down(ReasonCode::DnsError, "Erro de DNS.".to_string());
        }
        TransportKind::Tls => {
            return down(ReasonCode::SslError, "Erro SSL/TLS.".to_string());
        }
        TransportKind::Connection => {
            let detail = outcome.raw_error.clone().unwrap_or_default();
            return down(
                ReasonCode::ConnectionError,
                format!("Falha de conexao: {detail}"),
            );
        }
        TransportKind::Unknown => {
            let msg = outcome
                .raw_error
                .clone()
                .unwrap_or_else(|| "Erro desconhecido.".to_string());
            return down(ReasonCode::UnknownError, msg);
        }
        TransportKind::Ok => {}
    }

    let code = outcome.status_code.unwrap_or(0);
    if !(200..400).contains(&code) {
        return if code >= 500 {
            down(ReasonCode::Http5xx, format!("HTTP {code}"))
        } else {
            down(ReasonCode::Http4xx, format!("HTTP {code}"))
        };
    }

    if let Some(max_latency) = target.max_latency_ms {
        if outcome.latency_ms > max_latency as i64 {
            return down(
                ReasonCode::LatencyExceeded,
                format!(
                    "Latencia acima do maximo ({}ms > {}ms).",
                    outcome.latency_ms, max_latency
                ),
            );
        }
    }

    let body_text = || String::from_utf8_lossy(&outcome.body_bytes).into_owned();

    if let Some(expected) = &target.expected_substring {
        if !body_text().contains(expected.as_str()) {
            return down(
                ReasonCode::ContentMismatch,
                format!("Conteudo esperado nao encontrado: '{expected}'."),
            );
        }
    }

    if let Some(paths) = &target.expected_json_keys {
        let paths = match paths.as_array() {
            Some(a) => a,
            None => return down(ReasonCode::InvalidJson, "Resposta nao e JSON valido.".to_string()),
        };
        let parsed: Result<Value, _> = serde_json::from_slice(&outcome.body_bytes);
        let root = match parsed {
            Ok(v) => v,
            Err(_) => {
                return down(ReasonCode::InvalidJson, "Resposta nao e JSON valido.".to_string());
            }
        };
        for path in paths {
            let Some(path_str) = path.as_str() else { continue };
            if !json_path_exists(&root, path_str) {
                return down(
                    ReasonCode::JsonSchemaMismatch,
                    format!("Chave JSON ausente: {path_str}"),
                );
            }
        }
    }

    Classification {
        is_up: true,
        reason_code: None,
        error_message: None,
    }
}

fn down(reason: ReasonCode, message: String) -> Classification {
    Classification {
        is_up: false,
        reason_code: Some(reason),
        error_message: Some(message),
    }
}

/// Walks a dotted path through a JSON value. Dispatch is on the
/// container's runtime type: objects are indexed by key, arrays by a
/// non-negative integer segment. A segment that looks numeric is still
/// tried as an object key first if the container at that point is an
/// object — dispatch never guesses from the segment text alone.
fn json_path_exists(root: &Value, path: &str) -> bool {
    let mut current = root;
    for segment in path.split('.') {
        match current {
            Value::Object(map) => match map.get(segment) {
                Some(v) => current = v,
                None => return false,
            },
            Value::Array(items) => match segment.parse::<usize>() {
                Ok(idx) => match items.get(idx) {
                    Some(v) => current = v,
                    None => return false,
                },
                Err(_) => return false,
            },
            _ => return false,
        }
    }
    true
}
