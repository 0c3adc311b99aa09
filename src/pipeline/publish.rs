//! Publish functions - hand finished tables to Google Sheets
//!
//! The pipeline core only depends on the `Publisher` capability trait;
//! `SheetsPublisher` implements it over the Drive v3 / Sheets v4 REST APIs.

use crate::config::SheetsConfig;
use crate::pipeline::error::PipelineError;
use crate::pipeline::reports;
use crate::pipeline::types::Table;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::env;
use std::process::Command;
use tracing::info;

const DRIVE_FILES: &str = "https://www.googleapis.com/drive/v3/files";
const SHEETS_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

/// What the pipeline needs from a spreadsheet backend. Every table is
/// written in a single call per tab; the core never retries a failure.
#[allow(async_fn_in_trait)]
pub trait Publisher {
    /// Create a named spreadsheet and return its document id. With `force`,
    /// an existing same-named document is deleted first.
    async fn create_document(&self, name: &str, force: bool) -> Result<String, PipelineError>;

    /// Rename the default tab to the first name and add the rest.
    async fn set_up_tabs(&self, document_id: &str, tab_names: &[String])
        -> Result<(), PipelineError>;

    /// Upload a whole table (header plus rows) into one tab, atomically.
    async fn write_table(&self, document_id: &str, tab: &str, table: &Table)
        -> Result<(), PipelineError>;

    /// Copy a tab into another document, keeping its name.
    async fn duplicate_tab(&self, source_id: &str, tab: &str, target_id: &str)
        -> Result<(), PipelineError>;

    /// Fill the report tabs with summary formulas and number formats.
    async fn write_reports(&self, document_id: &str, cfg: &SheetsConfig)
        -> Result<(), PipelineError>;

    /// Add the buyer and campaign charts on their own chart sheets.
    async fn write_charts(
        &self,
        document_id: &str,
        cfg: &SheetsConfig,
        buyers_count: usize,
    ) -> Result<(), PipelineError>;
}

/// Where both spreadsheets ended up.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub source_id: String,
    pub target_id: String,
}

/// Publish both tables: build the source spreadsheet with data and report
/// tabs, then mirror all four tabs into the target and chart it.
pub async fn publish_run<P: Publisher>(
    publisher: &P,
    cfg: &SheetsConfig,
    media: &Table,
    campaign: &Table,
    force: bool,
) -> Result<PublishOutcome, PipelineError> {
    let source_id = publisher.create_document(&cfg.source_sheet_name, force).await?;
    info!("Created source document {}", source_id);

    publisher.set_up_tabs(&source_id, &cfg.tab_names()).await?;
    publisher.write_table(&source_id, &cfg.tab_media, media).await?;
    publisher.write_table(&source_id, &cfg.tab_campaign, campaign).await?;
    publisher.write_reports(&source_id, cfg).await?;

    let target_id = publisher.create_document(&cfg.target_sheet_name, force).await?;
    info!("Created target document {}", target_id);

    for tab in cfg.tab_names() {
        publisher.duplicate_tab(&source_id, &tab, &target_id).await?;
    }
    publisher
        .write_charts(&target_id, cfg, distinct_buyers(media))
        .await?;

    Ok(PublishOutcome { source_id, target_id })
}

/// Number of unique media buyers, used to size the buyer chart range.
pub fn distinct_buyers(media: &Table) -> usize {
    media
        .rows
        .iter()
        .filter_map(|row| row.first())
        .map(|cell| cell.to_string())
        .collect::<HashSet<_>>()
        .len()
}

/// OAuth bearer token: `GOOGLE_ACCESS_TOKEN` if set, otherwise the gcloud
/// CLI, same as the manual workflow this tool replaces.
pub fn access_token() -> Result<String, PipelineError> {
    if let Ok(token) = env::var("GOOGLE_ACCESS_TOKEN") {
        let token = token.trim().to_string();
        if !token.is_empty() {
            return Ok(token);
        }
    }

    let output = Command::new("gcloud")
        .args(["auth", "print-access-token"])
        .output()
        .map_err(|e| rejected("auth", format!("gcloud not available: {}", e)))?;

    if !output.status.success() {
        return Err(rejected("auth", format!("gcloud exited with {}", output.status)));
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(rejected("auth", "gcloud returned an empty token".to_string()));
    }
    Ok(token)
}

fn rejected(operation: &str, detail: String) -> PipelineError {
    PipelineError::PublishRejected {
        operation: operation.to_string(),
        detail,
    }
}

/// Google Sheets/Drive REST implementation.
pub struct SheetsPublisher {
    client: Client,
    token: String,
    folder_id: String,
}

impl SheetsPublisher {
    pub fn new(client: Client, token: String, folder_id: String) -> Self {
        SheetsPublisher {
            client,
            token,
            folder_id,
        }
    }

    /// Send one API call, mapping timeouts and non-2xx replies to the
    /// pipeline's publish errors. Returns the parsed JSON reply, or null
    /// for empty bodies (Drive deletes reply with 204).
    async fn send(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Value, PipelineError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PipelineError::PublishTimeout {
                        operation: operation.to_string(),
                    }
                } else {
                    rejected(operation, e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| rejected(operation, e.to_string()))?;

        if !status.is_success() {
            return Err(rejected(
                operation,
                format!("HTTP {}: {}", status, excerpt(&body)),
            ));
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body)
            .map_err(|e| rejected(operation, format!("unparseable reply: {}", e)))
    }

    async fn batch_update(
        &self,
        operation: &str,
        document_id: &str,
        requests: Vec<Value>,
    ) -> Result<Value, PipelineError> {
        let url = format!("{}/{}:batchUpdate", SHEETS_BASE, document_id);
        self.send(
            operation,
            self.client.post(&url).json(&json!({ "requests": requests })),
        )
        .await
    }

    async fn find_existing(&self, name: &str) -> Result<Option<String>, PipelineError> {
        let reply = self
            .send(
                "find document",
                self.client.get(DRIVE_FILES).query(&[
                    ("q", drive_query(name, &self.folder_id).as_str()),
                    ("fields", "files(id, name)"),
                ]),
            )
            .await?;

        Ok(reply["files"]
            .as_array()
            .and_then(|files| files.first())
            .and_then(|file| file["id"].as_str())
            .map(str::to_string))
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), PipelineError> {
        let url = format!("{}/{}", DRIVE_FILES, file_id);
        self.send("delete document", self.client.delete(&url)).await?;
        Ok(())
    }

    /// Look up a tab's numeric sheet id by its title, if the tab exists.
    async fn find_sheet_id(
        &self,
        document_id: &str,
        title: &str,
    ) -> Result<Option<i64>, PipelineError> {
        let url = format!("{}/{}", SHEETS_BASE, document_id);
        let reply = self
            .send(
                "get document",
                self.client.get(&url).query(&[("fields", "sheets.properties")]),
            )
            .await?;

        Ok(reply["sheets"]
            .as_array()
            .into_iter()
            .flatten()
            .find(|sheet| sheet["properties"]["title"] == title)
            .and_then(|sheet| sheet["properties"]["sheetId"].as_i64()))
    }

    async fn sheet_id_by_title(
        &self,
        document_id: &str,
        title: &str,
    ) -> Result<i64, PipelineError> {
        self.find_sheet_id(document_id, title)
            .await?
            .ok_or_else(|| rejected("get document", format!("no tab named \"{}\"", title)))
    }

    /// Return the sheet id for `title`, creating the tab if absent.
    async fn ensure_sheet(&self, document_id: &str, title: &str) -> Result<i64, PipelineError> {
        if let Some(sheet_id) = self.find_sheet_id(document_id, title).await? {
            return Ok(sheet_id);
        }

        let reply = self
            .batch_update(
                "add sheet",
                document_id,
                vec![json!({ "addSheet": { "properties": { "title": title } } })],
            )
            .await?;
        reply["replies"][0]["addSheet"]["properties"]["sheetId"]
            .as_i64()
            .ok_or_else(|| rejected("add sheet", "reply missing sheetId".to_string()))
    }
}

impl Publisher for SheetsPublisher {
    async fn create_document(&self, name: &str, force: bool) -> Result<String, PipelineError> {
        if force {
            if let Some(existing) = self.find_existing(name).await? {
                info!("Deleting existing '{}' ({})", name, existing);
                self.delete_file(&existing).await?;
            }
        }

        let body = json!({
            "name": name,
            "mimeType": SPREADSHEET_MIME,
            "parents": [self.folder_id.clone()]
        });
        let reply = self
            .send(
                "create document",
                self.client
                    .post(DRIVE_FILES)
                    .query(&[("fields", "id")])
                    .json(&body),
            )
            .await?;

        reply["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| rejected("create document", "reply missing id".to_string()))
    }

    async fn set_up_tabs(
        &self,
        document_id: &str,
        tab_names: &[String],
    ) -> Result<(), PipelineError> {
        self.batch_update("set up tabs", document_id, tab_setup_requests(tab_names))
            .await?;
        Ok(())
    }

    async fn write_table(
        &self,
        document_id: &str,
        tab: &str,
        table: &Table,
    ) -> Result<(), PipelineError> {
        let url = format!(
            "{}/{}/values/{}",
            SHEETS_BASE,
            document_id,
            encode_range(tab)
        );
        let body = json!({ "values": table.to_values() });
        self.send(
            "write table",
            self.client
                .put(&url)
                .query(&[("valueInputOption", "USER_ENTERED")])
                .json(&body),
        )
        .await?;

        info!("Uploaded {} rows to tab {}", table.rows.len(), tab);
        Ok(())
    }

    async fn duplicate_tab(
        &self,
        source_id: &str,
        tab: &str,
        target_id: &str,
    ) -> Result<(), PipelineError> {
        let sheet_id = self.sheet_id_by_title(source_id, tab).await?;

        let url = format!("{}/{}/sheets/{}:copyTo", SHEETS_BASE, source_id, sheet_id);
        let reply = self
            .send(
                "copy tab",
                self.client
                    .post(&url)
                    .json(&json!({ "destinationSpreadsheetId": target_id })),
            )
            .await?;
        let copied_id = reply["sheetId"]
            .as_i64()
            .ok_or_else(|| rejected("copy tab", "reply missing sheetId".to_string()))?;

        // The copy arrives named "Copy of <tab>"; restore the original name.
        self.batch_update(
            "rename tab",
            target_id,
            vec![json!({
                "updateSheetProperties": {
                    "properties": { "sheetId": copied_id, "title": tab },
                    "fields": "title"
                }
            })],
        )
        .await?;

        info!("Copied tab {} into {}", tab, target_id);
        Ok(())
    }

    async fn write_reports(
        &self,
        document_id: &str,
        cfg: &SheetsConfig,
    ) -> Result<(), PipelineError> {
        let buyer_sheet_id = self
            .sheet_id_by_title(document_id, &cfg.tab_report_buyer)
            .await?;
        let campaign_sheet_id = self
            .sheet_id_by_title(document_id, &cfg.tab_report_campaign)
            .await?;

        self.batch_update(
            "write reports",
            document_id,
            reports::report_formula_requests(cfg, buyer_sheet_id, campaign_sheet_id),
        )
        .await?;
        self.batch_update(
            "format reports",
            document_id,
            reports::number_format_requests(buyer_sheet_id, campaign_sheet_id),
        )
        .await?;
        Ok(())
    }

    async fn write_charts(
        &self,
        document_id: &str,
        cfg: &SheetsConfig,
        buyers_count: usize,
    ) -> Result<(), PipelineError> {
        let buyer_sheet_id = self
            .sheet_id_by_title(document_id, &cfg.tab_report_buyer)
            .await?;
        let campaign_sheet_id = self
            .sheet_id_by_title(document_id, &cfg.tab_report_campaign)
            .await?;
        let chart_buyer_id = self.ensure_sheet(document_id, "Chart_Buyer").await?;
        let chart_campaign_id = self.ensure_sheet(document_id, "Chart_Campaign").await?;

        self.batch_update(
            "add buyer chart",
            document_id,
            vec![reports::buyer_chart_request(
                buyer_sheet_id,
                chart_buyer_id,
                buyers_count,
            )],
        )
        .await?;
        self.batch_update(
            "add campaign chart",
            document_id,
            vec![reports::campaign_chart_request(
                campaign_sheet_id,
                chart_campaign_id,
                cfg.top_n,
            )],
        )
        .await?;
        Ok(())
    }
}

/// batchUpdate requests that rename the default tab and add the rest.
fn tab_setup_requests(tab_names: &[String]) -> Vec<Value> {
    let mut requests = Vec::with_capacity(tab_names.len());
    if let Some(first) = tab_names.first() {
        requests.push(json!({
            "updateSheetProperties": {
                "properties": { "sheetId": 0, "title": first },
                "fields": "title"
            }
        }));
    }
    for name in tab_names.iter().skip(1) {
        requests.push(json!({ "addSheet": { "properties": { "title": name } } }));
    }
    requests
}

/// A1 range for a whole-tab write, safe as a URL path segment.
fn encode_range(tab: &str) -> String {
    format!("{}!A1", tab.replace(' ', "%20"))
}

/// Drive search for a live file with this name inside the folder.
fn drive_query(name: &str, folder_id: &str) -> String {
    format!(
        "name='{}' and '{}' in parents and trashed=false",
        name.replace('\'', "\\'"),
        folder_id
    )
}

fn excerpt(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    &body[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::emit::build_table;
    use crate::pipeline::normalize::{self, MEDIA_BUYER};
    use std::cell::RefCell;

    #[test]
    fn test_tab_setup_first_renames_rest_add() {
        let tabs = vec![
            "MediaBuyerData".to_string(),
            "CampaignData".to_string(),
            "Report_MediaBuyerSummary".to_string(),
        ];
        let requests = tab_setup_requests(&tabs);
        assert_eq!(requests.len(), 3);
        assert_eq!(
            requests[0]["updateSheetProperties"]["properties"]["sheetId"],
            0
        );
        assert_eq!(
            requests[0]["updateSheetProperties"]["properties"]["title"],
            "MediaBuyerData"
        );
        assert_eq!(
            requests[1]["addSheet"]["properties"]["title"],
            "CampaignData"
        );
    }

    #[test]
    fn test_encode_range() {
        assert_eq!(encode_range("MediaBuyerData"), "MediaBuyerData!A1");
        assert_eq!(encode_range("My Tab"), "My%20Tab!A1");
    }

    #[test]
    fn test_drive_query_escapes_quotes() {
        let q = drive_query("Bob's Sheet", "folder123");
        assert_eq!(
            q,
            "name='Bob\\'s Sheet' and 'folder123' in parents and trashed=false"
        );
    }

    #[test]
    fn test_distinct_buyers() {
        let records = normalize::fixtures::media_records();
        let table = build_table(
            &MEDIA_BUYER,
            normalize::normalize(&MEDIA_BUYER, &records).unwrap(),
        );
        assert_eq!(distinct_buyers(&table), 2);
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "x".repeat(500);
        assert_eq!(excerpt(&long).len(), 200);
        assert_eq!(excerpt("short"), "short");
    }

    /// Records every capability call so the orchestration order is checkable.
    struct RecordingPublisher {
        calls: RefCell<Vec<String>>,
        created: RefCell<usize>,
    }

    impl RecordingPublisher {
        fn new() -> Self {
            RecordingPublisher {
                calls: RefCell::new(Vec::new()),
                created: RefCell::new(0),
            }
        }

        fn log(&self, call: String) {
            self.calls.borrow_mut().push(call);
        }
    }

    impl Publisher for RecordingPublisher {
        async fn create_document(&self, name: &str, force: bool) -> Result<String, PipelineError> {
            self.log(format!("create:{}:{}", name, force));
            let mut created = self.created.borrow_mut();
            *created += 1;
            Ok(format!("doc-{}", *created))
        }

        async fn set_up_tabs(
            &self,
            document_id: &str,
            tab_names: &[String],
        ) -> Result<(), PipelineError> {
            self.log(format!("tabs:{}:{}", document_id, tab_names.join(",")));
            Ok(())
        }

        async fn write_table(
            &self,
            document_id: &str,
            tab: &str,
            table: &Table,
        ) -> Result<(), PipelineError> {
            self.log(format!("write:{}:{}:{}", document_id, tab, table.rows.len()));
            Ok(())
        }

        async fn duplicate_tab(
            &self,
            source_id: &str,
            tab: &str,
            target_id: &str,
        ) -> Result<(), PipelineError> {
            self.log(format!("copy:{}:{}:{}", source_id, tab, target_id));
            Ok(())
        }

        async fn write_reports(
            &self,
            document_id: &str,
            _cfg: &SheetsConfig,
        ) -> Result<(), PipelineError> {
            self.log(format!("reports:{}", document_id));
            Ok(())
        }

        async fn write_charts(
            &self,
            document_id: &str,
            _cfg: &SheetsConfig,
            buyers_count: usize,
        ) -> Result<(), PipelineError> {
            self.log(format!("charts:{}:{}", document_id, buyers_count));
            Ok(())
        }
    }

    fn cfg() -> SheetsConfig {
        SheetsConfig {
            folder_id: "folder".to_string(),
            source_sheet_name: "Source".to_string(),
            target_sheet_name: "Target".to_string(),
            tab_media: "MediaBuyerData".to_string(),
            tab_campaign: "CampaignData".to_string(),
            tab_report_buyer: "Report_MediaBuyerSummary".to_string(),
            tab_report_campaign: "Report_CampaignPerformance".to_string(),
            top_n: 25,
        }
    }

    #[tokio::test]
    async fn test_publish_run_order() {
        let publisher = RecordingPublisher::new();
        let records = normalize::fixtures::media_records();
        let media = build_table(
            &MEDIA_BUYER,
            normalize::normalize(&MEDIA_BUYER, &records).unwrap(),
        );
        let campaign_records = normalize::fixtures::campaign_records();
        let campaign = build_table(
            &normalize::CAMPAIGN,
            normalize::normalize(&normalize::CAMPAIGN, &campaign_records).unwrap(),
        );

        let outcome = publish_run(&publisher, &cfg(), &media, &campaign, false)
            .await
            .unwrap();
        assert_eq!(outcome.source_id, "doc-1");
        assert_eq!(outcome.target_id, "doc-2");

        let calls = publisher.calls.borrow();
        assert_eq!(
            *calls,
            vec![
                "create:Source:false",
                "tabs:doc-1:MediaBuyerData,CampaignData,Report_MediaBuyerSummary,Report_CampaignPerformance",
                "write:doc-1:MediaBuyerData:2",
                "write:doc-1:CampaignData:2",
                "reports:doc-1",
                "create:Target:false",
                "copy:doc-1:MediaBuyerData:doc-2",
                "copy:doc-1:CampaignData:doc-2",
                "copy:doc-1:Report_MediaBuyerSummary:doc-2",
                "copy:doc-1:Report_CampaignPerformance:doc-2",
                "charts:doc-2:2",
            ]
        );
    }
}
