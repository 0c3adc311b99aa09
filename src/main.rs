//! One-shot pipeline orchestrator - fetch both datasets, emit CSVs, publish to Sheets

use anyhow::{Context, Result};
use campaign_sync::config::Config;
use campaign_sync::pipeline::publish::{self, SheetsPublisher};
use campaign_sync::pipeline::{emit, fetch, normalize, DatasetSpec, DatasetSummary, Table};
use chrono::Utc;
use reqwest::Client;
use std::env;
use std::path::Path;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    dotenvy::dotenv().ok();

    info!("Starting campaign sync pipeline");

    let force = env::args().skip(1).any(|arg| arg == "--force");
    let config = Config::from_env()?;
    info!("Configuration loaded");

    let client = fetch::http_client().context("building HTTP client")?;

    info!("=== Media Buyer Pipeline ===");
    let (media_table, media_summary) = run_dataset(
        &client,
        &config.jsonbin_key,
        &config.bin_media,
        &normalize::MEDIA_BUYER,
        &config.export_dir,
    )
    .await?;

    info!("=== Campaign Pipeline ===");
    let (campaign_table, campaign_summary) = run_dataset(
        &client,
        &config.jsonbin_key,
        &config.bin_campaign,
        &normalize::CAMPAIGN,
        &config.export_dir,
    )
    .await?;

    match &config.sheets {
        None => {
            info!("Google Sheets configuration absent, CSV export only");
        }
        Some(sheets) => {
            info!("=== Publishing to Google Sheets ===");
            let token = publish::access_token().context("publish stage failed (auth)")?;
            let publisher =
                SheetsPublisher::new(client.clone(), token, sheets.folder_id.clone());
            let outcome =
                publish::publish_run(&publisher, sheets, &media_table, &campaign_table, force)
                    .await
                    .context("publish stage failed")?;

            info!(
                "Source: https://docs.google.com/spreadsheets/d/{}",
                outcome.source_id
            );
            info!(
                "Target: https://docs.google.com/spreadsheets/d/{}",
                outcome.target_id
            );
        }
    }

    write_run_summary(&config.export_dir, &[&media_summary, &campaign_summary])?;

    info!("✓ {}", media_summary);
    info!("✓ {}", campaign_summary);
    info!("Campaign sync pipeline complete");

    Ok(())
}

/// Machine-readable record of what the run produced.
fn write_run_summary(export_dir: &Path, summaries: &[&DatasetSummary]) -> Result<()> {
    let path = export_dir.join("run_summary.json");
    let body = serde_json::to_string_pretty(summaries)?;
    std::fs::write(&path, body).with_context(|| format!("writing {:?}", path))?;
    Ok(())
}

/// Fetch, normalize, and emit one dataset. Any stage error aborts the run
/// with a diagnostic naming the dataset and stage.
async fn run_dataset(
    client: &Client,
    access_key: &str,
    bin_id: &str,
    spec: &DatasetSpec,
    export_dir: &Path,
) -> Result<(Table, DatasetSummary)> {
    info!("Step 1/3: Fetching {}...", spec.name);
    let fetched_at = Utc::now();
    let records = fetch::fetch_bin(client, access_key, bin_id)
        .await
        .with_context(|| format!("{}: fetch stage failed", spec.name))?;
    info!("✓ Fetched {} records", records.len());

    info!("Step 2/3: Normalizing...");
    let rows = normalize::normalize(spec, &records)
        .with_context(|| format!("{}: normalize stage failed", spec.name))?;
    info!("✓ Normalized {} rows", rows.len());

    info!("Step 3/3: Emitting CSV...");
    let table = emit::build_table(spec, rows);
    let csv_path = table
        .write_csv(export_dir)
        .with_context(|| format!("{}: emit stage failed", spec.name))?;
    info!("✓ Wrote {:?}", csv_path);

    let summary = DatasetSummary {
        dataset: spec.name.to_string(),
        records: table.rows.len(),
        csv_path: Some(csv_path),
        fetched_at,
    };

    Ok((table, summary))
}
