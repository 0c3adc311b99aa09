//! Configuration loaded from environment variables

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// Everything one run needs, resolved once at startup so the pipeline
/// stages never read the environment themselves.
#[derive(Debug, Clone)]
pub struct Config {
    pub jsonbin_key: String,
    pub bin_campaign: String,
    pub bin_media: String,
    pub export_dir: PathBuf,
    /// Absent when the Google side is not configured; the run then stops
    /// after CSV export.
    pub sheets: Option<SheetsConfig>,
}

/// Google Drive/Sheets destination settings.
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub folder_id: String,
    pub source_sheet_name: String,
    pub target_sheet_name: String,
    pub tab_media: String,
    pub tab_campaign: String,
    pub tab_report_buyer: String,
    pub tab_report_campaign: String,
    pub top_n: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            jsonbin_key: env::var("JSONBIN_KEY").context("JSONBIN_KEY must be set")?,
            bin_campaign: env::var("BIN_CAMPAIGN").context("BIN_CAMPAIGN must be set")?,
            bin_media: env::var("BIN_MEDIA").context("BIN_MEDIA must be set")?,

            export_dir: env::var("EXPORT_DIR")
                .unwrap_or_else(|_| "export".to_string())
                .into(),

            sheets: SheetsConfig::from_env(),
        })
    }
}

impl SheetsConfig {
    /// Publishing needs a folder and both spreadsheet names; anything less
    /// means CSV-only mode.
    fn from_env() -> Option<Self> {
        let folder_id = env::var("FOLDER_ID").ok()?;
        let source_sheet_name = env::var("SOURCE_SHEET_NAME").ok()?;
        let target_sheet_name = env::var("TARGET_SHEET_NAME").ok()?;

        Some(SheetsConfig {
            folder_id,
            source_sheet_name,
            target_sheet_name,

            tab_media: env::var("TAB_MEDIA").unwrap_or_else(|_| "MediaBuyerData".to_string()),
            tab_campaign: env::var("TAB_CAMPAIGN")
                .unwrap_or_else(|_| "CampaignData".to_string()),
            tab_report_buyer: env::var("TAB_REPORT_BUYER")
                .unwrap_or_else(|_| "Report_MediaBuyerSummary".to_string()),
            tab_report_campaign: env::var("TAB_REPORT_CAMP")
                .unwrap_or_else(|_| "Report_CampaignPerformance".to_string()),

            top_n: env::var("TOP_N")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(25),
        })
    }

    /// Tab order matters: the first name renames the spreadsheet's default
    /// tab, the rest are added after it.
    pub fn tab_names(&self) -> Vec<String> {
        vec![
            self.tab_media.clone(),
            self.tab_campaign.clone(),
            self.tab_report_buyer.clone(),
            self.tab_report_campaign.clone(),
        ]
    }
}
