use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;
use tracker_core::model::{CellValue, ColumnIndex, RowIndex, Snapshot};

use crate::repository::{SheetStore, StorageError};

pub const DEFAULT_SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4";

#[derive(Clone, Debug)]
pub struct SheetsApiConfig {
    pub base_url: String,
    pub spreadsheet_id: String,
    pub worksheet: String,
    pub token: String,
    pub header_rows: usize,
}

/// Hosted spreadsheet reached over its REST values API.
///
/// The configured tab is looked up by title on every call; when it is gone the
/// first tab is used instead.
#[derive(Clone)]
pub struct SheetsApiStore {
    client: Client,
    config: SheetsApiConfig,
}

impl SheetsApiStore {
    #[must_use]
    pub fn new(config: SheetsApiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SheetsApiConfig {
        &self.config
    }

    fn url(&self, tail: &[&str]) -> Result<Url, StorageError> {
        let mut url = Url::parse(self.config.base_url.trim_end_matches('/'))
            .map_err(|err| StorageError::Serialization(format!("invalid base url: {err}")))?;
        url.path_segments_mut()
            .map_err(|()| StorageError::Serialization("base url cannot hold a path".into()))?
            .push("spreadsheets")
            .push(&self.config.spreadsheet_id)
            .extend(tail);
        Ok(url)
    }

    async fn resolve_tab(&self) -> Result<String, StorageError> {
        let mut url = self.url(&[])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties.title");
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.config.token)
            .send()
            .await
            .map_err(transport)?;
        let body: SpreadsheetMeta = check(response).await?.json().await.map_err(decode)?;

        let titles: Vec<String> = body
            .sheets
            .into_iter()
            .map(|sheet| sheet.properties.title)
            .collect();
        if titles.iter().any(|title| title == &self.config.worksheet) {
            return Ok(self.config.worksheet.clone());
        }
        let first = titles.into_iter().next().ok_or(StorageError::NotFound)?;
        debug!(
            requested = %self.config.worksheet,
            fallback = %first,
            "worksheet missing, using first worksheet"
        );
        Ok(first)
    }

    async fn get_values(&self, range: &str) -> Result<Vec<Vec<CellValue>>, StorageError> {
        let mut url = self.url(&["values", range])?;
        url.query_pairs_mut()
            .append_pair("valueRenderOption", "UNFORMATTED_VALUE");
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.config.token)
            .send()
            .await
            .map_err(transport)?;
        let body: ValueRange = check(response).await?.json().await.map_err(decode)?;
        Ok(body.values)
    }

    async fn put_value(&self, range: String, value: CellValue) -> Result<(), StorageError> {
        let mut url = self.url(&["values", &range])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let value = match value {
            CellValue::Empty => CellValue::Text(String::new()),
            other => other,
        };
        let payload = ValueRange {
            range: Some(range),
            values: vec![vec![value]],
        };
        let response = self
            .client
            .put(url)
            .bearer_auth(&self.config.token)
            .json(&payload)
            .send()
            .await
            .map_err(transport)?;
        check(response).await?;
        Ok(())
    }

    fn header_row_number(&self) -> usize {
        self.config.header_rows.max(1)
    }
}

#[async_trait]
impl SheetStore for SheetsApiStore {
    async fn read_snapshot(&self) -> Result<Snapshot, StorageError> {
        let tab = self.resolve_tab().await?;
        let mut values = self.get_values(&quote_tab(&tab)).await?.into_iter();

        let header_rows = self.header_row_number();
        let headers = values
            .by_ref()
            .take(header_rows)
            .last()
            .unwrap_or_default()
            .into_iter()
            .map(|cell| cell.to_display_string())
            .collect();
        Ok(Snapshot::new(headers, values.collect()))
    }

    async fn write_cell(
        &self,
        row: RowIndex,
        column: ColumnIndex,
        value: CellValue,
    ) -> Result<(), StorageError> {
        let tab = self.resolve_tab().await?;
        let range = a1_cell(
            &tab,
            row.remote_row(self.header_row_number()),
            column.remote_column(),
        );
        debug!(range = %range, "writing cell");
        self.put_value(range, value).await
    }

    async fn append_header(&self, name: &str) -> Result<ColumnIndex, StorageError> {
        let tab = self.resolve_tab().await?;
        let header_row = self.header_row_number();
        let header_range = format!("{}!{header_row}:{header_row}", quote_tab(&tab));
        let headers = self
            .get_values(&header_range)
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        if let Some(position) = headers
            .iter()
            .position(|cell| cell.to_display_string() == name)
        {
            return Ok(ColumnIndex::new(position));
        }
        let column = ColumnIndex::new(headers.len());
        let range = a1_cell(&tab, header_row, column.remote_column());
        self.put_value(range, CellValue::Text(name.to_string()))
            .await?;
        Ok(column)
    }
}

fn transport(err: reqwest::Error) -> StorageError {
    StorageError::Connection(err.to_string())
}

fn decode(err: reqwest::Error) -> StorageError {
    StorageError::Serialization(err.to_string())
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, &body))
}

fn status_error(status: StatusCode, body: &str) -> StorageError {
    match status {
        StatusCode::NOT_FOUND => StorageError::NotFound,
        StatusCode::BAD_REQUEST => StorageError::Serialization(format!("{status}: {body}")),
        _ => StorageError::Connection(format!("{status}: {body}")),
    }
}

/// Spreadsheet column letters for a 1-based column number (`1` is `A`, `27` is `AA`).
#[must_use]
pub fn column_letters(column: usize) -> String {
    let mut letters = Vec::new();
    let mut remaining = column;
    while remaining > 0 {
        let offset = (remaining - 1) % 26;
        letters.push(char::from(b'A' + offset as u8));
        remaining = (remaining - 1) / 26;
    }
    letters.iter().rev().collect()
}

fn quote_tab(tab: &str) -> String {
    format!("'{}'", tab.replace('\'', "''"))
}

fn a1_cell(tab: &str, row: usize, column: usize) -> String {
    format!("{}!{}{row}", quote_tab(tab), column_letters(column))
}

#[derive(Debug, Serialize, Deserialize)]
struct ValueRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    range: Option<String>,
    #[serde(default)]
    values: Vec<Vec<CellValue>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SheetsApiStore {
        SheetsApiStore::new(SheetsApiConfig {
            base_url: "https://sheets.example.test/v4/".into(),
            spreadsheet_id: "abc123".into(),
            worksheet: "Progress".into(),
            token: "secret".into(),
            header_rows: 1,
        })
    }

    #[test]
    fn column_letters_follow_spreadsheet_naming() {
        assert_eq!(column_letters(1), "A");
        assert_eq!(column_letters(26), "Z");
        assert_eq!(column_letters(27), "AA");
        assert_eq!(column_letters(52), "AZ");
        assert_eq!(column_letters(703), "AAA");
    }

    #[test]
    fn first_data_row_sits_under_the_header() {
        let range = a1_cell("Progress", RowIndex::new(0).remote_row(1), ColumnIndex::new(4).remote_column());
        assert_eq!(range, "'Progress'!E2");
    }

    #[test]
    fn tab_names_are_quoted() {
        assert_eq!(quote_tab("Ana's tab"), "'Ana''s tab'");
    }

    #[test]
    fn urls_escape_ranges() {
        let url = store().url(&["values", "'My Tab'!A1"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.example.test/v4/spreadsheets/abc123/values/'My%20Tab'!A1"
        );
    }

    #[test]
    fn status_codes_map_to_storage_errors() {
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, ""),
            StorageError::NotFound
        ));
        assert!(!status_error(StatusCode::BAD_REQUEST, "bad range").is_transient());
        assert!(status_error(StatusCode::SERVICE_UNAVAILABLE, "").is_transient());
        assert!(status_error(StatusCode::UNAUTHORIZED, "").is_transient());
    }

    #[test]
    fn value_ranges_accept_mixed_cells() {
        let body: ValueRange = serde_json::from_str(
            r#"{"range":"Progress!A1:C2","values":[["Subject","Week","Ana"],["Cardiology",1,true]]}"#,
        )
        .unwrap();
        assert_eq!(body.values[1][1], CellValue::Number(1.0));
        assert_eq!(body.values[1][2], CellValue::Bool(true));
    }
}
