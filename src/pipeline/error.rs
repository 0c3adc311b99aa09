//! Typed failures for the pipeline stages

use thiserror::Error;

/// Everything that can go wrong between fetch and publish.
///
/// Fetch and normalize errors carry enough context (source, record index,
/// field) to point at the offending input without re-running anything.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source {source_id}: unavailable: {reason}")]
    SourceUnavailable { source_id: String, reason: String },

    #[error("source {source_id}: malformed payload: {reason}")]
    MalformedPayload { source_id: String, reason: String },

    #[error("{dataset}: record {index}: field \"{field}\": value \"{value}\" is not a valid {expected}")]
    Coercion {
        dataset: String,
        index: usize,
        field: String,
        value: String,
        expected: &'static str,
    },

    #[error("{dataset}: record {index}: missing field \"{field}\"")]
    SchemaMismatch {
        dataset: String,
        index: usize,
        field: String,
    },

    #[error("export: {0}")]
    Export(String),

    #[error("publish: {operation} timed out")]
    PublishTimeout { operation: String },

    #[error("publish: {operation} rejected: {detail}")]
    PublishRejected { operation: String, detail: String },
}
