//! Fetch functions - retrieve raw JSON records from JSONBin

use crate::pipeline::error::PipelineError;
use reqwest::Client;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::info;

const JSONBIN_BASE: &str = "https://api.jsonbin.io/v3/b";

/// Every external call in one run fails after this long.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared HTTP client with the pipeline-wide timeout.
pub fn http_client() -> Result<Client, PipelineError> {
    Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| PipelineError::SourceUnavailable {
            source_id: "http".to_string(),
            reason: e.to_string(),
        })
}

/// Fetch one bin and decode it as a JSON array of record objects.
///
/// No retries: a transient failure surfaces as `SourceUnavailable` and the
/// run fails. Empty data is never substituted for a failed fetch.
pub async fn fetch_bin(
    client: &Client,
    access_key: &str,
    bin_id: &str,
) -> Result<Vec<Map<String, Value>>, PipelineError> {
    let url = bin_url(bin_id);
    info!("Fetching {}", url);

    let response = client
        .get(&url)
        .header("X-Access-Key", access_key)
        .send()
        .await
        .map_err(|e| PipelineError::SourceUnavailable {
            source_id: bin_id.to_string(),
            reason: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(PipelineError::SourceUnavailable {
            source_id: bin_id.to_string(),
            reason: format!("HTTP {}", status),
        });
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| PipelineError::MalformedPayload {
            source_id: bin_id.to_string(),
            reason: format!("body is not JSON: {}", e),
        })?;

    let records = decode_records(bin_id, body)?;
    info!("Fetched {} records from bin {}", records.len(), bin_id);
    Ok(records)
}

/// `meta=false` asks JSONBin for the bare stored document, no envelope.
fn bin_url(bin_id: &str) -> String {
    format!("{}/{}/latest?meta=false", JSONBIN_BASE, bin_id)
}

/// A valid payload is a JSON array whose every element is an object.
fn decode_records(
    source_id: &str,
    body: Value,
) -> Result<Vec<Map<String, Value>>, PipelineError> {
    let items = match body {
        Value::Array(items) => items,
        other => {
            return Err(PipelineError::MalformedPayload {
                source_id: source_id.to_string(),
                reason: format!("expected a JSON array, got {}", json_kind(&other)),
            })
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(map) => Ok(map),
            other => Err(PipelineError::MalformedPayload {
                source_id: source_id.to_string(),
                reason: format!("element {} is not an object, got {}", index, json_kind(&other)),
            }),
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bin_url() {
        assert_eq!(
            bin_url("65f1c0e2266cfc3fde8e7b9a"),
            "https://api.jsonbin.io/v3/b/65f1c0e2266cfc3fde8e7b9a/latest?meta=false"
        );
    }

    #[test]
    fn test_decode_array_of_objects() {
        let body = json!([{"a": 1}, {"b": 2}]);
        let records = decode_records("bin", body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["a"], json!(1));
    }

    #[test]
    fn test_decode_rejects_non_array() {
        let err = decode_records("bin", json!({"record": []})).unwrap_err();
        match err {
            PipelineError::MalformedPayload { source_id, reason } => {
                assert_eq!(source_id, "bin");
                assert!(reason.contains("expected a JSON array"));
            }
            other => panic!("expected MalformedPayload, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_non_object_element() {
        let err = decode_records("bin", json!([{"a": 1}, 42])).unwrap_err();
        match err {
            PipelineError::MalformedPayload { reason, .. } => {
                assert!(reason.contains("element 1"));
                assert!(reason.contains("a number"));
            }
            other => panic!("expected MalformedPayload, got {:?}", other),
        }
    }

    #[tokio::test]
    #[ignore] // Ignore by default since it hits the real API
    async fn test_fetch_bin_live() {
        let key = std::env::var("JSONBIN_KEY").expect("JSONBIN_KEY must be set");
        let bin = std::env::var("BIN_MEDIA").expect("BIN_MEDIA must be set");
        let client = http_client().unwrap();

        let records = fetch_bin(&client, &key, &bin).await.unwrap();
        assert!(!records.is_empty());
    }
}
