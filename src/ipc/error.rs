use crate::error::DomainError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub fn domain_err(id: &str, e: &DomainError) -> serde_json::Value {
    err(id, e.code(), e.to_string(), None)
}

/// Maps a failure to its envelope. Domain errors keep their own code;
/// anything else is reported under `fallback_code`.
pub fn fail(id: &str, e: &anyhow::Error, fallback_code: &str) -> serde_json::Value {
    match e.downcast_ref::<DomainError>() {
        Some(d) => domain_err(id, d),
        None => err(id, fallback_code, format!("{e:#}"), None),
    }
}
