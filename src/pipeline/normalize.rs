//! Normalize functions - coerce raw source records into typed, schema-ordered rows

use crate::pipeline::error::PipelineError;
use crate::pipeline::types::{CellValue, DatasetSpec, FieldKind, FieldSpec, RatioColumn};
use crate::revenue_per_lead;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;
use tracing::info;

/// Campaign performance dataset. `Revenue Per Lead` is recomputed from
/// `Revenue Prediction / Leads` rather than trusted from the source.
pub const CAMPAIGN: DatasetSpec = DatasetSpec {
    name: "Campaign Performance Data",
    fields: &[
        FieldSpec { source_key: "Platform", column: "Platform", kind: FieldKind::Text },
        FieldSpec { source_key: "offer", column: "Offer", kind: FieldKind::Text },
        FieldSpec { source_key: "country", column: "Country", kind: FieldKind::Text },
        FieldSpec { source_key: "adtitle", column: "Ad Title", kind: FieldKind::Text },
        FieldSpec { source_key: "Revenue", column: "Revenue Prediction", kind: FieldKind::Number },
        FieldSpec { source_key: "Leads", column: "Leads", kind: FieldKind::Int },
        FieldSpec { source_key: "Revenue Per Leads", column: "Revenue Per Lead", kind: FieldKind::Number },
        FieldSpec { source_key: "top_10_keywords", column: "Top 10 Keywords", kind: FieldKind::Text },
    ],
    recompute: Some(RatioColumn {
        target: "Revenue Per Lead",
        numerator: "Revenue Prediction",
        denominator: "Leads",
    }),
};

/// Media buyer campaign dataset. Revenue and Spend arrive as strings.
pub const MEDIA_BUYER: DatasetSpec = DatasetSpec {
    name: "Media Buyer Campaign Data",
    fields: &[
        FieldSpec { source_key: "Media Buyer", column: "Media Buyer", kind: FieldKind::Text },
        FieldSpec { source_key: "Country Code", column: "Country Code", kind: FieldKind::Text },
        FieldSpec { source_key: "Campaign Name", column: "Campaign Name", kind: FieldKind::Text },
        FieldSpec { source_key: "Revenue", column: "Revenue", kind: FieldKind::NumberText },
        FieldSpec { source_key: "Spend", column: "Spend", kind: FieldKind::NumberText },
    ],
    recompute: None,
};

/// Normalize a raw record sequence against a dataset schema.
///
/// Abort-all policy: the first record that is missing a field or fails
/// coercion fails the whole dataset. Output row count always equals input
/// record count on success.
pub fn normalize(
    spec: &DatasetSpec,
    records: &[Map<String, Value>],
) -> Result<Vec<Vec<CellValue>>, PipelineError> {
    let mut rows = Vec::with_capacity(records.len());

    for (index, record) in records.iter().enumerate() {
        let mut row = Vec::with_capacity(spec.fields.len());
        for field in spec.fields {
            let value = record.get(field.source_key).ok_or_else(|| {
                PipelineError::SchemaMismatch {
                    dataset: spec.name.to_string(),
                    index,
                    field: field.source_key.to_string(),
                }
            })?;
            row.push(coerce(spec.name, index, field, value)?);
        }
        if let Some(ratio) = &spec.recompute {
            apply_ratio(spec, ratio, &mut row);
        }
        rows.push(row);
    }

    info!("Normalized {} rows for {}", rows.len(), spec.name);

    Ok(rows)
}

/// Coerce one raw value to its declared kind.
fn coerce(
    dataset: &str,
    index: usize,
    field: &FieldSpec,
    value: &Value,
) -> Result<CellValue, PipelineError> {
    let fail = |value: &Value| PipelineError::Coercion {
        dataset: dataset.to_string(),
        index,
        field: field.source_key.to_string(),
        value: render_raw(value),
        expected: field.kind.expected(),
    };

    match field.kind {
        FieldKind::Text => match value {
            Value::String(s) => Ok(CellValue::Text(s.trim().to_string())),
            other => Err(fail(other)),
        },
        FieldKind::Number => match value.as_f64() {
            Some(f) if f.is_finite() => {
                Decimal::from_f64_retain(f)
                    .map(|d| CellValue::Number(d.round_dp(10).normalize()))
                    .ok_or_else(|| fail(value))
            }
            _ => Err(fail(value)),
        },
        FieldKind::NumberText => match value {
            Value::String(s) => Decimal::from_str(s.trim())
                .map(CellValue::Number)
                .map_err(|_| fail(value)),
            other => Err(fail(other)),
        },
        FieldKind::Int => match value.as_i64() {
            Some(i) => Ok(CellValue::Int(i)),
            None => Err(fail(value)),
        },
    }
}

/// Overwrite the ratio column with numerator / denominator. A zero
/// denominator yields a null cell, never an error.
fn apply_ratio(spec: &DatasetSpec, ratio: &RatioColumn, row: &mut [CellValue]) {
    // Schema constants are fixed; the named columns always resolve.
    let (Some(target), Some(num), Some(den)) = (
        spec.column_index(ratio.target),
        spec.column_index(ratio.numerator),
        spec.column_index(ratio.denominator),
    ) else {
        return;
    };

    let recomputed = match (&row[num], &row[den]) {
        (CellValue::Number(revenue), CellValue::Int(leads)) => {
            revenue_per_lead(*revenue, *leads)
        }
        _ => None,
    };

    row[target] = match recomputed {
        Some(d) => CellValue::Number(d),
        None => CellValue::Null,
    };
}

/// Compact rendering of a raw JSON value for diagnostics.
fn render_raw(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{campaign_records, media_records};
    use super::*;
    use serde_json::json;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_media_revenue_text_parses_to_number() {
        let rows = normalize(&MEDIA_BUYER, &media_records()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][3], CellValue::Number(dec("184.51")));
        assert_eq!(rows[0][4], CellValue::Number(dec("95.03")));
    }

    #[test]
    fn test_campaign_numeric_passthrough() {
        let rows = normalize(&CAMPAIGN, &campaign_records()).unwrap();
        assert_eq!(rows[0][4], CellValue::Number(dec("121125.5455")));
        assert_eq!(rows[0][5], CellValue::Int(7327));
    }

    #[test]
    fn test_revenue_per_lead_recomputed_not_trusted() {
        let rows = normalize(&CAMPAIGN, &campaign_records()).unwrap();
        // 121125.5455 / 7327, not the 16.53 the source claims
        assert_eq!(rows[0][6], CellValue::Number(dec("16.531397")));
    }

    #[test]
    fn test_zero_leads_gives_null_ratio() {
        let rows = normalize(&CAMPAIGN, &campaign_records()).unwrap();
        assert_eq!(rows[1][6], CellValue::Null);
    }

    #[test]
    fn test_text_fields_trimmed() {
        let mut records = media_records();
        records[0].insert("Media Buyer".to_string(), json!("  Aria Blake "));
        let rows = normalize(&MEDIA_BUYER, &records).unwrap();
        assert_eq!(rows[0][0], CellValue::Text("Aria Blake".to_string()));
    }

    #[test]
    fn test_missing_field_is_schema_mismatch() {
        let mut records = media_records();
        records[1].remove("Country Code");
        let err = normalize(&MEDIA_BUYER, &records).unwrap_err();
        match err {
            PipelineError::SchemaMismatch { dataset, index, field } => {
                assert_eq!(dataset, "Media Buyer Campaign Data");
                assert_eq!(index, 1);
                assert_eq!(field, "Country Code");
            }
            other => panic!("expected SchemaMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_text_is_coercion_error() {
        let mut records = media_records();
        records[0].insert("Spend".to_string(), json!("n/a"));
        let err = normalize(&MEDIA_BUYER, &records).unwrap_err();
        match err {
            PipelineError::Coercion { index, field, value, expected, .. } => {
                assert_eq!(index, 0);
                assert_eq!(field, "Spend");
                assert_eq!(value, "n/a");
                assert_eq!(expected, "decimal number");
            }
            other => panic!("expected Coercion, got {:?}", other),
        }
    }

    #[test]
    fn test_thousands_separator_rejected() {
        let mut records = media_records();
        records[0].insert("Revenue".to_string(), json!("1,184.51"));
        assert!(matches!(
            normalize(&MEDIA_BUYER, &records),
            Err(PipelineError::Coercion { .. })
        ));
    }

    #[test]
    fn test_fractional_leads_rejected() {
        let mut records = campaign_records();
        records[0].insert("Leads".to_string(), json!(12.5));
        let err = normalize(&CAMPAIGN, &records).unwrap_err();
        match err {
            PipelineError::Coercion { field, expected, .. } => {
                assert_eq!(field, "Leads");
                assert_eq!(expected, "integer");
            }
            other => panic!("expected Coercion, got {:?}", other),
        }
    }

    #[test]
    fn test_row_count_preserved() {
        let records = campaign_records();
        let rows = normalize(&CAMPAIGN, &records).unwrap();
        assert_eq!(rows.len(), records.len());
    }

    #[test]
    fn test_abort_all_on_first_bad_record() {
        let mut records = media_records();
        records[0].insert("Revenue".to_string(), json!("broken"));
        // Second record is fine but the whole dataset still fails.
        assert!(normalize(&MEDIA_BUYER, &records).is_err());
    }
}
