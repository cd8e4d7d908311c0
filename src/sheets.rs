//! Spreadsheet addressing and the Google Sheets values API

use a1_notation::Address;
use anyhow::{Context, Result};
use reqwest::blocking::{Client, Response};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::SyncError;
use crate::types::MajorDimension;

const SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Zero-based column index to its letters: 0 -> "A", 25 -> "Z", 26 -> "AA"
pub fn column_letter(index: u32) -> String {
    // Row 1 of that column, without the row number
    a1_notation::cell(index as usize, 0)
        .to_string()
        .trim_end_matches('1')
        .to_string()
}

/// `a1_notation` addresses are zero-based in both directions
fn address(col: u32, row: u32) -> Address {
    Address::new(col as usize, row.saturating_sub(1) as usize)
}

/// A rectangle of cells. Columns are zero-based, rows one-based as in A1
/// notation. An open end runs to the edge of the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetRange {
    pub col_start: u32,
    pub col_end: Option<u32>,
    pub row_start: u32,
    pub row_end: Option<u32>,
}

impl SheetRange {
    pub fn new(col_start: u32, col_end: u32, row_start: u32, row_end: u32) -> Self {
        Self {
            col_start,
            col_end: Some(col_end),
            row_start,
            row_end: Some(row_end),
        }
    }

    /// Every row of one column from `row_start` down, e.g. `C2:C`
    pub fn column_from(col: u32, row_start: u32) -> Self {
        Self {
            col_start: col,
            col_end: Some(col),
            row_start,
            row_end: None,
        }
    }

    /// One row from `col_start` to the right, e.g. `B1:1`
    pub fn row_from(col_start: u32, row: u32) -> Self {
        Self {
            col_start,
            col_end: None,
            row_start: row,
            row_end: Some(row),
        }
    }

    pub fn cell(col: u32, row: u32) -> Self {
        Self::new(col, col, row, row)
    }

    /// Address of this range on `sheet_name`, e.g. `'Cards - MTG API'!B2:I100001`
    pub fn a1(&self, sheet_name: &str) -> String {
        format!("{}!{}", quote_sheet_name(sheet_name), self)
    }
}

impl fmt::Display for SheetRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.col_end, self.row_end) {
            (Some(col_end), Some(row_end))
                if col_end == self.col_start && row_end == self.row_start =>
            {
                let row = self.row_start.saturating_sub(1);
                write!(f, "{}", a1_notation::cell(self.col_start as usize, row as usize))
            }
            (Some(col_end), Some(row_end)) => write!(
                f,
                "{}",
                a1_notation::range(
                    address(self.col_start, self.row_start),
                    address(col_end, row_end)
                )
            ),
            // Open-ended ranges (`A2:Z`, `C2:C`, `B1:1`) have no A1 value
            (col_end, row_end) => {
                write!(f, "{}{}:", column_letter(self.col_start), self.row_start)?;
                if let Some(col_end) = col_end {
                    write!(f, "{}", column_letter(col_end))?;
                }
                if let Some(row_end) = row_end {
                    write!(f, "{}", row_end)?;
                }
                Ok(())
            }
        }
    }
}

fn quote_sheet_name(name: &str) -> String {
    if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

/// What the API reports back after an update
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSummary {
    #[serde(default)]
    pub updated_range: String,
    #[serde(default)]
    pub updated_cells: u64,
}

/// The three value operations the jobs need from a spreadsheet
pub trait SheetsApi {
    /// Read a range, row-major. Trailing empty rows and cells are omitted.
    fn get(&self, range: &str) -> Result<Vec<Vec<Value>>>;

    fn clear(&self, range: &str) -> Result<()>;

    fn update(
        &self,
        range: &str,
        dimension: MajorDimension,
        values: Vec<Vec<Value>>,
    ) -> Result<UpdateSummary>;
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBody<'a> {
    range: &'a str,
    major_dimension: &'a str,
    values: Vec<Vec<Value>>,
}

/// Google Sheets v4 client for one spreadsheet
pub struct GoogleSheets {
    client: Client,
    access_token: String,
    spreadsheet_id: String,
}

impl GoogleSheets {
    pub fn new(client: Client, access_token: String, spreadsheet_id: &str) -> Self {
        Self {
            client,
            access_token,
            spreadsheet_id: spreadsheet_id.to_string(),
        }
    }

    /// `.../spreadsheets/{id}/values/{range}{suffix}` with the range percent-encoded
    fn values_url(&self, range: &str, suffix: &str) -> Result<Url> {
        let mut url = Url::parse(SHEETS_API_URL)?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Invalid sheets API base URL"))?
            .push(&self.spreadsheet_id)
            .push("values")
            .push(&format!("{}{}", range, suffix));
        Ok(url)
    }

    fn check(response: Response) -> Result<Response> {
        log::debug!("{} {}", response.status(), response.url());
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(SyncError::SheetsApi {
            status: status.as_u16(),
            body,
        }
        .into())
    }
}

impl SheetsApi for GoogleSheets {
    fn get(&self, range: &str) -> Result<Vec<Vec<Value>>> {
        let url = self.values_url(range, "")?;
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .with_context(|| format!("Failed to get range: {}", range))?;
        let body: ValueRange = Self::check(response)?
            .json()
            .with_context(|| format!("Failed to parse range: {}", range))?;
        Ok(body.values)
    }

    fn clear(&self, range: &str) -> Result<()> {
        let url = self.values_url(range, ":clear")?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({}))
            .send()
            .with_context(|| format!("Failed to clear range: {}", range))?;
        Self::check(response)?;
        Ok(())
    }

    fn update(
        &self,
        range: &str,
        dimension: MajorDimension,
        values: Vec<Vec<Value>>,
    ) -> Result<UpdateSummary> {
        let url = self.values_url(range, "")?;
        let body = UpdateBody {
            range,
            major_dimension: dimension.as_str(),
            values,
        };
        let response = self
            .client
            .put(url)
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .with_context(|| format!("Failed to update range: {}", range))?;
        let summary: UpdateSummary = Self::check(response)?
            .json()
            .with_context(|| format!("Failed to parse update response: {}", range))?;
        Ok(summary)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(1), "B");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn test_range_formatting() {
        assert_eq!(SheetRange::new(1, 8, 2, 100_001).to_string(), "B2:I100001");
        assert_eq!(SheetRange::column_from(2, 2).to_string(), "C2:C");
        assert_eq!(SheetRange::row_from(1, 1).to_string(), "B1:1");
        assert_eq!(SheetRange::cell(0, 2).to_string(), "A2");
        assert_eq!(SheetRange::new(27, 27, 5, 9).to_string(), "AB5:AB9");
        let all_data = SheetRange {
            col_start: 0,
            col_end: Some(25),
            row_start: 2,
            row_end: None,
        };
        assert_eq!(all_data.to_string(), "A2:Z");
    }

    #[test]
    fn test_a1_quotes_sheet_names() {
        let range = SheetRange::new(0, 4, 1, 10);
        assert_eq!(range.a1("Collection"), "Collection!A1:E10");
        assert_eq!(range.a1("Cards - MTG API"), "'Cards - MTG API'!A1:E10");
        assert_eq!(range.a1("Bob's Cards"), "'Bob''s Cards'!A1:E10");
    }

    #[test]
    fn test_values_url_encodes_range() {
        let sheets = GoogleSheets::new(Client::new(), "token".to_string(), "sheet-id");
        let url = sheets.values_url("'Cards - MTG API'!A2:Z", ":clear").unwrap();
        assert!(url
            .as_str()
            .starts_with("https://sheets.googleapis.com/v4/spreadsheets/sheet-id/values/"));
        assert!(url.as_str().ends_with(":clear"));
        assert!(!url.path().contains(' '));
    }

    #[test]
    fn test_update_summary_parses() {
        let summary: UpdateSummary = serde_json::from_value(serde_json::json!({
            "spreadsheetId": "abc",
            "updatedRange": "Collection!C2:C4",
            "updatedRows": 3,
            "updatedColumns": 1,
            "updatedCells": 3
        }))
        .unwrap();
        assert_eq!(summary.updated_range, "Collection!C2:C4");
        assert_eq!(summary.updated_cells, 3);
    }
}
