//! Emit functions - render normalized rows as tables, CSV files, and value grids

use crate::pipeline::error::PipelineError;
use crate::pipeline::types::{CellValue, DatasetSpec, Table};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Assemble the final table for a dataset: fixed column order, one row per
/// normalized record.
pub fn build_table(spec: &DatasetSpec, rows: Vec<Vec<CellValue>>) -> Table {
    Table {
        name: spec.name.to_string(),
        columns: spec.columns(),
        rows,
    }
}

impl Table {
    /// Render every cell as text, header row first. This is the exact grid
    /// handed to the publisher.
    pub fn to_values(&self) -> Vec<Vec<String>> {
        let mut values = Vec::with_capacity(self.rows.len() + 1);
        values.push(self.columns.clone());
        for row in &self.rows {
            values.push(row.iter().map(|cell| cell.to_string()).collect());
        }
        values
    }

    /// Serialize as CSV. Quoting follows the csv crate's defaults: fields
    /// containing the delimiter, quotes, or line breaks are quoted, with
    /// embedded quotes doubled. Output is byte-stable for identical input.
    pub fn to_csv(&self) -> Result<String, PipelineError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for record in self.to_values() {
            writer
                .write_record(&record)
                .map_err(|e| PipelineError::Export(e.to_string()))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| PipelineError::Export(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| PipelineError::Export(e.to_string()))
    }

    /// Write `<name>.csv` (UTF-8) into `dir`, creating it if needed.
    pub fn write_csv(&self, dir: &Path) -> Result<PathBuf, PipelineError> {
        fs::create_dir_all(dir).map_err(|e| PipelineError::Export(e.to_string()))?;
        let path = dir.join(format!("{}.csv", self.name));
        fs::write(&path, self.to_csv()?).map_err(|e| PipelineError::Export(e.to_string()))?;
        info!("Wrote {} rows to {:?}", self.rows.len(), path);
        Ok(path)
    }
}
