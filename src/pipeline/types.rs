//! Core data types for the pipeline
//! Pure data structures with no behavior

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// One typed cell of a normalized row.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(Decimal),
    Int(i64),
    Null,
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Number(d) => write!(f, "{}", d),
            CellValue::Int(i) => write!(f, "{}", i),
            CellValue::Null => Ok(()),
        }
    }
}

/// How a source field is coerced into its target column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// JSON string, trimmed and passed through.
    Text,
    /// JSON number, validated finite.
    Number,
    /// Decimal serialized as a JSON string ("184.51"), parsed strictly.
    NumberText,
    /// JSON number with no fractional part.
    Int,
}

impl FieldKind {
    /// Human name used in coercion diagnostics.
    pub fn expected(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Number => "finite number",
            FieldKind::NumberText => "decimal number",
            FieldKind::Int => "integer",
        }
    }
}

/// One (source key, target column, kind) entry of a dataset schema.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub source_key: &'static str,
    pub column: &'static str,
    pub kind: FieldKind,
}

/// A column recomputed as numerator / denominator instead of trusted
/// from the source. The source key must still be present in each record.
#[derive(Debug, Clone, Copy)]
pub struct RatioColumn {
    pub target: &'static str,
    pub numerator: &'static str,
    pub denominator: &'static str,
}

/// Fixed target schema for one dataset.
#[derive(Debug, Clone, Copy)]
pub struct DatasetSpec {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
    pub recompute: Option<RatioColumn>,
}

impl DatasetSpec {
    pub fn columns(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.column.to_string()).collect()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.column == column)
    }
}

/// Rectangular table: header plus rows, ready for CSV export or upload.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

/// What one dataset run produced. Serialized into the run summary file.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub dataset: String,
    pub records: usize,
    pub csv_path: Option<PathBuf>,
    pub fetched_at: DateTime<Utc>,
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} records, csv: {}",
            self.dataset,
            self.records,
            self.csv_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string())
        )
    }
}
