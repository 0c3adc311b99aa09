//! Report and chart request bodies for the Sheets batchUpdate API
//!
//! Everything here is a pure builder returning the JSON request list, so the
//! formulas and chart specs are testable without touching the network.

use crate::config::SheetsConfig;
use serde_json::{json, Value};

/// Summary QUERY formulas for the two report tabs, plus the composite-label
/// helper column the campaign chart uses as its domain.
pub fn report_formula_requests(
    cfg: &SheetsConfig,
    buyer_sheet_id: i64,
    campaign_sheet_id: i64,
) -> Vec<Value> {
    let buyer_query = format!(
        "=QUERY({}!A2:E, \"select Col1, sum(Col4), sum(Col5), \
         (sum(Col4)-sum(Col5))/sum(Col5) \
         where Col1 is not null \
         group by Col1 \
         order by (sum(Col4)-sum(Col5))/sum(Col5) desc \
         label sum(Col4) 'Total Revenue', \
         sum(Col5) 'Total Spend', \
         (sum(Col4)-sum(Col5))/sum(Col5) 'ROI'\", 0)",
        cfg.tab_media
    );

    let campaign_query = format!(
        "=QUERY({}!A2:H, \"select Col1, Col2, Col3, sum(Col5), \
         sum(Col6), sum(Col5)/sum(Col6) \
         where Col1 is not null \
         group by Col1, Col2, Col3 \
         order by sum(Col5) desc limit {} \
         label sum(Col5) 'Total Revenue', \
         sum(Col6) 'Total Leads', \
         sum(Col5)/sum(Col6) 'RPL'\", 0)",
        cfg.tab_campaign, cfg.top_n
    );

    vec![
        json!({
            "updateCells": {
                "range": {
                    "sheetId": buyer_sheet_id,
                    "startRowIndex": 0,
                    "startColumnIndex": 0
                },
                "rows": [
                    { "values": [ { "userEnteredValue": {
                        "stringValue": "Media Buyer Summary (Revenue, Spend, ROI)"
                    } } ] },
                    { "values": [] },
                    { "values": [ { "userEnteredValue": { "formulaValue": buyer_query } } ] }
                ],
                "fields": "userEnteredValue"
            }
        }),
        json!({
            "updateCells": {
                "range": {
                    "sheetId": campaign_sheet_id,
                    "startRowIndex": 0,
                    "startColumnIndex": 0
                },
                "rows": [
                    { "values": [ { "userEnteredValue": {
                        "stringValue": format!(
                            "Campaign Performance (Revenue, Leads, RPL) - Top {}",
                            cfg.top_n
                        )
                    } } ] },
                    { "values": [] },
                    { "values": [ { "userEnteredValue": { "formulaValue": campaign_query } } ] }
                ],
                "fields": "userEnteredValue"
            }
        }),
        json!({
            "updateCells": {
                "range": {
                    "sheetId": campaign_sheet_id,
                    "startRowIndex": 2,
                    "startColumnIndex": 6
                },
                "rows": [
                    { "values": [ { "userEnteredValue": { "formulaValue":
                        "=ARRAYFORMULA(IF(A3:A=\"\",\"\", A3:A & \" | \" & B3:B & \" | \" & C3:C))"
                    } } ] }
                ],
                "fields": "userEnteredValue"
            }
        }),
    ]
}

/// Money and percent number formats for the report tabs.
pub fn number_format_requests(buyer_sheet_id: i64, campaign_sheet_id: i64) -> Vec<Value> {
    fn repeat_cell(sheet_id: i64, start_col: i64, end_col: i64, kind: &str, pattern: &str) -> Value {
        json!({
            "repeatCell": {
                "range": {
                    "sheetId": sheet_id,
                    "startRowIndex": 2,
                    "startColumnIndex": start_col,
                    "endColumnIndex": end_col
                },
                "cell": {
                    "userEnteredFormat": {
                        "numberFormat": { "type": kind, "pattern": pattern }
                    }
                },
                "fields": "userEnteredFormat.numberFormat"
            }
        })
    }

    vec![
        repeat_cell(buyer_sheet_id, 1, 3, "NUMBER", "#,##0.00"),
        repeat_cell(buyer_sheet_id, 3, 4, "PERCENT", "0.00%"),
        repeat_cell(campaign_sheet_id, 3, 4, "NUMBER", "#,##0.00"),
        repeat_cell(campaign_sheet_id, 4, 5, "NUMBER", "#,##0"),
        repeat_cell(campaign_sheet_id, 5, 6, "PERCENT", "0.00%"),
    ]
}

fn source_range(sheet_id: i64, start_row: i64, end_row: i64, start_col: i64, end_col: i64) -> Value {
    json!({
        "sourceRange": {
            "sources": [ {
                "sheetId": sheet_id,
                "startRowIndex": start_row,
                "endRowIndex": end_row,
                "startColumnIndex": start_col,
                "endColumnIndex": end_col
            } ]
        }
    })
}

/// Combo chart: revenue and spend columns with an ROI line, one cluster per
/// media buyer, anchored on its own chart sheet.
pub fn buyer_chart_request(buyer_sheet_id: i64, anchor_sheet_id: i64, buyers_count: usize) -> Value {
    let start = 2_i64;
    let end = start + 1 + buyers_count as i64;

    json!({
        "addChart": {
            "chart": {
                "spec": {
                    "title": "Revenue & Spend with ROI by Media Buyer",
                    "basicChart": {
                        "chartType": "COMBO",
                        "legendPosition": "BOTTOM_LEGEND",
                        "domains": [
                            { "domain": source_range(buyer_sheet_id, start, end, 0, 1) }
                        ],
                        "series": [
                            { "series": source_range(buyer_sheet_id, start, end, 1, 2),
                              "type": "COLUMN" },
                            { "series": source_range(buyer_sheet_id, start, end, 2, 3),
                              "type": "COLUMN" },
                            { "series": source_range(buyer_sheet_id, start, end, 3, 4),
                              "targetAxis": "RIGHT_AXIS",
                              "type": "LINE" }
                        ],
                        "headerCount": 1
                    }
                },
                "position": {
                    "overlayPosition": {
                        "anchorCell": {
                            "sheetId": anchor_sheet_id,
                            "rowIndex": 0,
                            "columnIndex": 0
                        }
                    }
                }
            }
        }
    })
}

/// Horizontal bar chart of the top campaigns by revenue, with an RPL line,
/// keyed by the composite Platform | Offer | Country label column.
pub fn campaign_chart_request(campaign_sheet_id: i64, anchor_sheet_id: i64, top_n: usize) -> Value {
    let start = 2_i64;
    let end = start + 1 + top_n as i64;

    json!({
        "addChart": {
            "chart": {
                "spec": {
                    "title": "Top Campaigns by Revenue (Platform | Offer | Country)",
                    "basicChart": {
                        "chartType": "BAR",
                        "legendPosition": "BOTTOM_LEGEND",
                        "domains": [
                            { "domain": source_range(campaign_sheet_id, start, end, 6, 7) }
                        ],
                        "series": [
                            { "series": source_range(campaign_sheet_id, start, end, 3, 4) },
                            { "series": source_range(campaign_sheet_id, start, end, 5, 6),
                              "type": "LINE" }
                        ],
                        "headerCount": 1
                    }
                },
                "position": {
                    "overlayPosition": {
                        "anchorCell": {
                            "sheetId": anchor_sheet_id,
                            "rowIndex": 0,
                            "columnIndex": 0
                        }
                    }
                }
            }
        }
    })
}
