//! Review-sheet Google Sheets infrastructure adapter.
//!
//! Implements [`review::SheetStore`] over the Sheets v4 REST API and creates
//! new spreadsheets for `init`. The adapter speaks JSON only; OAuth token
//! acquisition is out of scope and the caller hands in a bearer token.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Translates [`review::FormatRequest`] into `batchUpdate`
//! request objects and A1 ranges into sheet-qualified ranges. Nothing here
//! knows what a row means.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use review::{Color, FormatRequest, ServiceError, SheetStore, SpreadsheetId};

/// Public Sheets v4 endpoint.
pub const DEFAULT_API_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Connection settings for [`SheetsClient`].
#[derive(Debug, Clone)]
pub struct SheetsSettings {
    pub api_url: String,
    /// OAuth access token with the spreadsheets scope.
    pub token: String,
    pub timeout: Duration,
}

/// Authenticated handle on the Sheets API.
#[derive(Clone)]
pub struct SheetsClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl SheetsClient {
    pub fn new(settings: SheetsSettings) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            token: settings.token,
        })
    }

    /// Creates an empty spreadsheet and returns its id.
    pub async fn create_spreadsheet(&self, title: &str) -> Result<SpreadsheetId, ServiceError> {
        let body = json!({ "properties": { "title": title } });
        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        let created: Created = decode(response).await?;
        SpreadsheetId::new(created.spreadsheet_id)
            .ok_or_else(|| ServiceError::Decode("empty spreadsheetId in create response".into()))
    }

    /// Binds the client to one sheet (tab) of a spreadsheet.
    pub fn sheet(&self, spreadsheet: SpreadsheetId, sheet: SheetRef) -> Spreadsheet {
        Spreadsheet {
            client: self.clone(),
            spreadsheet,
            sheet,
        }
    }
}

/// Name and numeric grid id of a sheet. Values are addressed by name,
/// formatting by grid id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRef {
    pub name: String,
    pub gid: u64,
}

/// One sheet of one spreadsheet.
pub struct Spreadsheet {
    client: SheetsClient,
    spreadsheet: SpreadsheetId,
    sheet: SheetRef,
}

impl Spreadsheet {
    pub fn id(&self) -> &SpreadsheetId {
        &self.spreadsheet
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/{}/values/{}",
            self.client.api_url,
            self.spreadsheet,
            urlencoding::encode(&qualified_range(&self.sheet.name, range))
        )
    }

    /// Formulas come back as formulas so links survive the round trip; dates
    /// come back as displayed so they are not rewritten as serial numbers.
    fn read_url(&self, range: &str) -> String {
        format!(
            "{}?valueRenderOption=FORMULA&dateTimeRenderOption=FORMATTED_STRING",
            self.values_url(range)
        )
    }
}

#[async_trait]
impl SheetStore for Spreadsheet {
    async fn read_range(&self, range: &str) -> Result<Vec<Vec<String>>, ServiceError> {
        let url = self.read_url(range);
        let response = self
            .client
            .http
            .get(&url)
            .bearer_auth(&self.client.token)
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        let body: ValueRange = decode(response).await?;
        let rows = cell_text(body.values);
        debug!(range, rows = rows.len(), "read sheet values");
        Ok(rows)
    }

    async fn write_range(&self, range: &str, rows: &[Vec<String>]) -> Result<(), ServiceError> {
        let qualified = qualified_range(&self.sheet.name, range);
        let url = format!("{}?valueInputOption=USER_ENTERED", self.values_url(range));
        let body = json!({
            "range": qualified,
            "majorDimension": "ROWS",
            "values": rows,
        });

        let response = self
            .client
            .http
            .put(&url)
            .bearer_auth(&self.client.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        let _: Value = decode(response).await?;
        debug!(range = %qualified, rows = rows.len(), "wrote sheet values");
        Ok(())
    }

    async fn apply_formatting(&self, requests: &[FormatRequest]) -> Result<(), ServiceError> {
        if requests.is_empty() {
            return Ok(());
        }

        let url = format!("{}/{}:batchUpdate", self.client.api_url, self.spreadsheet);
        let body = json!({
            "requests": requests
                .iter()
                .map(|r| format_request_json(r, self.sheet.gid))
                .collect::<Vec<_>>(),
        });

        let response = self
            .client
            .http
            .post(&url)
            .bearer_auth(&self.client.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        let _: Value = decode(response).await?;
        debug!(requests = requests.len(), "applied batch update");
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Created {
    spreadsheet_id: String,
}

#[derive(Deserialize)]
struct ValueRange {
    /// Omitted entirely when the range is empty.
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

async fn decode<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, ServiceError> {
    let status = response.status();
    if status.as_u16() == 429 {
        return Err(ServiceError::RateLimited {
            retry_after: response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs),
        });
    }
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ServiceError::Status {
            status: status.as_u16(),
            message,
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| ServiceError::Transport(e.to_string()))?;
    serde_json::from_slice(&body).map_err(|e| ServiceError::Decode(e.to_string()))
}

/// Prefixes `range` with the quoted sheet name; an empty range names the
/// whole sheet.
fn qualified_range(sheet: &str, range: &str) -> String {
    let quoted = format!("'{}'", sheet.replace('\'', "''"));
    if range.is_empty() {
        quoted
    } else {
        format!("{quoted}!{range}")
    }
}

/// Flattens the API's JSON cells to text.
fn cell_text(values: Vec<Vec<Value>>) -> Vec<Vec<String>> {
    values
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| match cell {
                    Value::String(s) => s,
                    Value::Bool(true) => "TRUE".to_string(),
                    Value::Bool(false) => "FALSE".to_string(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect()
        })
        .collect()
}

fn grid_range(gid: u64, rows: (usize, usize), columns: (usize, usize)) -> Value {
    json!({
        "sheetId": gid,
        "startRowIndex": rows.0,
        "endRowIndex": rows.1,
        "startColumnIndex": columns.0,
        "endColumnIndex": columns.1,
    })
}

/// Background of an unformatted cell.
const WHITE: Color = Color {
    red: 1.0,
    green: 1.0,
    blue: 1.0,
    alpha: 1.0,
};

fn color_json(color: Color) -> Value {
    json!({
        "red": color.red,
        "green": color.green,
        "blue": color.blue,
        "alpha": color.alpha,
    })
}

/// The `batchUpdate` request object for one formatting change on sheet `gid`.
pub fn format_request_json(request: &FormatRequest, gid: u64) -> Value {
    match request {
        FormatRequest::ColumnWidth { column, pixels } => json!({
            "updateDimensionProperties": {
                "range": {
                    "sheetId": gid,
                    "dimension": "COLUMNS",
                    "startIndex": column,
                    "endIndex": column + 1,
                },
                "properties": { "pixelSize": pixels },
                "fields": "pixelSize",
            }
        }),
        FormatRequest::ColumnAlignment {
            column,
            align,
            start_row,
            end_row,
        } => json!({
            "repeatCell": {
                "range": grid_range(gid, (*start_row, *end_row), (*column, column + 1)),
                "cell": {
                    "userEnteredFormat": { "horizontalAlignment": align.as_str() }
                },
                "fields": "userEnteredFormat",
            }
        }),
        FormatRequest::OneOfList {
            column,
            values,
            start_row,
            end_row,
        } => json!({
            "setDataValidation": {
                "range": grid_range(gid, (*start_row, *end_row), (*column, column + 1)),
                "rule": {
                    "condition": {
                        "type": "ONE_OF_LIST",
                        "values": values
                            .iter()
                            .map(|v| json!({ "userEnteredValue": v }))
                            .collect::<Vec<_>>(),
                    },
                    "showCustomUi": true,
                    "strict": true,
                },
            }
        }),
        FormatRequest::TitleRow { columns } => json!({
            "repeatCell": {
                "range": grid_range(gid, (0, 1), (0, *columns)),
                "cell": {
                    "userEnteredFormat": {
                        "horizontalAlignment": "CENTER",
                        "textFormat": { "bold": true },
                    }
                },
                "fields": "userEnteredFormat(textFormat,horizontalAlignment)",
            }
        }),
        FormatRequest::CellBackground { row, column, color } => json!({
            "repeatCell": {
                "range": grid_range(gid, (*row, row + 1), (*column, column + 1)),
                "cell": {
                    "userEnteredFormat": {
                        "backgroundColor": color_json(*color),
                        "horizontalAlignment": "CENTER",
                    }
                },
                "fields": "userEnteredFormat(backgroundColor,horizontalAlignment)",
            }
        }),
        FormatRequest::ClearBackground {
            column,
            start_row,
            end_row,
        } => json!({
            "repeatCell": {
                "range": grid_range(gid, (*start_row, *end_row), (*column, column + 1)),
                "cell": {
                    "userEnteredFormat": { "backgroundColor": color_json(WHITE) }
                },
                "fields": "userEnteredFormat.backgroundColor",
            }
        }),
    }
}
