//! Writing card columns into a sheet in row chunks
//!
//! The whole catalog does not fit in one update request, so records are
//! pushed in fixed-height windows starting at row 2, each window writing
//! every target column at once, column-major.

use anyhow::Result;
use serde_json::Value;

use crate::error::SyncError;
use crate::projector::project;
use crate::sheets::{column_letter, SheetRange, SheetsApi, UpdateSummary};
use crate::types::{CardRecord, MajorDimension};

/// First data row, below the header
pub const FIRST_DATA_ROW: u32 = 2;

/// A header label and the zero-based column it sits in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnTarget {
    pub field: String,
    pub column: u32,
}

/// Outcome of a chunked sync
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub chunks_written: usize,
    pub chunks_failed: usize,
    pub rows_written: usize,
}

pub struct RangeWriter<'a, S: SheetsApi + ?Sized> {
    sheets: &'a S,
    sheet_name: &'a str,
}

impl<'a, S: SheetsApi + ?Sized> RangeWriter<'a, S> {
    pub fn new(sheets: &'a S, sheet_name: &'a str) -> Self {
        Self { sheets, sheet_name }
    }

    pub fn get(&self, range: &SheetRange) -> Result<Vec<Vec<Value>>> {
        self.sheets.get(&range.a1(self.sheet_name))
    }

    pub fn clear(&self, range: &SheetRange) -> Result<()> {
        let a1 = range.a1(self.sheet_name);
        self.sheets.clear(&a1)?;
        log::info!("Cleared {}", a1);
        Ok(())
    }

    /// Push one block of values into `range` with a single update
    pub fn write(
        &self,
        range: &SheetRange,
        values: Vec<Vec<Value>>,
        dimension: MajorDimension,
    ) -> Result<UpdateSummary> {
        let a1 = range.a1(self.sheet_name);
        let summary = self.sheets.update(&a1, dimension, values)?;
        log::info!(
            "Wrote {} ({} cells)",
            if summary.updated_range.is_empty() { &a1 } else { &summary.updated_range },
            summary.updated_cells
        );
        Ok(summary)
    }

    /// Read the header row starting at `col_offset` and pair each label with its column
    pub fn header_columns(&self, col_offset: u32) -> Result<Vec<ColumnTarget>> {
        let range = SheetRange::row_from(col_offset, 1);
        let rows = self.get(&range)?;
        let header = match rows.into_iter().next() {
            Some(row) if !row.is_empty() => row,
            _ => return Err(SyncError::EmptyHeader(range.a1(self.sheet_name)).into()),
        };

        let columns: Vec<ColumnTarget> = header
            .iter()
            .zip(col_offset..)
            .map(|(label, column)| ColumnTarget {
                field: cell_text(label),
                column,
            })
            .collect();

        let mapping: Vec<String> = columns
            .iter()
            .map(|c| format!("{}={}", column_letter(c.column), c.field))
            .collect();
        log::info!("Target columns: {}", mapping.join(", "));
        Ok(columns)
    }

    /// Write `records` under the header, `chunk_rows` records per update.
    ///
    /// The window advances until it holds no records. A failed chunk is
    /// logged and skipped so the rest of the sheet still updates.
    pub fn sync_all(
        &self,
        records: &[CardRecord],
        columns: &[ColumnTarget],
        chunk_rows: usize,
    ) -> SyncReport {
        let mut report = SyncReport::default();
        let (Some(first), Some(last)) = (
            columns.iter().map(|c| c.column).min(),
            columns.iter().map(|c| c.column).max(),
        ) else {
            log::warn!("No target columns, nothing to write");
            return report;
        };
        let chunk_rows = chunk_rows.max(1);

        let mut offset = 0usize;
        loop {
            let start = offset.min(records.len());
            let end = offset.saturating_add(chunk_rows).min(records.len());
            let chunk = &records[start..end];
            if chunk.is_empty() {
                break;
            }

            let row_start = FIRST_DATA_ROW + offset as u32;
            let range = SheetRange::new(first, last, row_start, row_start + chunk.len() as u32 - 1);
            let values = chunk_columns(chunk, columns, first, last);

            match self.write(&range, values, MajorDimension::Columns) {
                Ok(_) => {
                    report.chunks_written += 1;
                    report.rows_written += chunk.len();
                }
                Err(e) => {
                    log::warn!("Failed to write {}: {:#}", range.a1(self.sheet_name), e);
                    report.chunks_failed += 1;
                }
            }
            offset = offset.saturating_add(chunk_rows);
        }

        report
    }
}

/// Column-major block spanning `first..=last`. Columns with no target stay empty.
fn chunk_columns(
    chunk: &[CardRecord],
    columns: &[ColumnTarget],
    first: u32,
    last: u32,
) -> Vec<Vec<Value>> {
    (first..=last)
        .map(|column| match columns.iter().find(|c| c.column == column) {
            Some(target) if !target.field.is_empty() => {
                chunk.iter().map(|card| project(card, &target.field)).collect()
            }
            _ => vec![Value::Null; chunk.len()],
        })
        .collect()
}

/// A cell as the text a user sees
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::testing::FakeSheets;
    use serde_json::json;

    fn cards(n: usize) -> Vec<CardRecord> {
        (0..n)
            .map(|i| {
                json!({"name": format!("Card {}", i), "colors": ["Blue", "Red"], "cmc": i})
                    .as_object()
                    .unwrap()
                    .clone()
            })
            .collect()
    }

    fn targets() -> Vec<ColumnTarget> {
        vec![
            ColumnTarget { field: "name".to_string(), column: 1 },
            ColumnTarget { field: "colors".to_string(), column: 2 },
            ColumnTarget { field: "cmc".to_string(), column: 3 },
        ]
    }

    #[test]
    fn test_chunk_count_and_ranges() {
        let sheets = FakeSheets::default();
        let writer = RangeWriter::new(&sheets, "Cards");
        let report = writer.sync_all(&cards(7), &targets(), 3);

        assert_eq!(
            report,
            SyncReport { chunks_written: 3, chunks_failed: 0, rows_written: 7 }
        );
        let ranges: Vec<String> = sheets.updates.borrow().iter().map(|u| u.range.clone()).collect();
        assert_eq!(ranges, vec!["Cards!B2:D4", "Cards!B5:D7", "Cards!B8:D8"]);
    }

    #[test]
    fn test_exact_multiple_of_chunk() {
        let sheets = FakeSheets::default();
        let writer = RangeWriter::new(&sheets, "Cards");
        let report = writer.sync_all(&cards(6), &targets(), 3);

        assert_eq!(report.chunks_written, 2);
        let last = sheets.updates.borrow().last().unwrap().range.clone();
        assert_eq!(last, "Cards!B5:D7");
    }

    #[test]
    fn test_oversized_chunk_writes_once() {
        let sheets = FakeSheets::default();
        let writer = RangeWriter::new(&sheets, "Cards");
        let report = writer.sync_all(&cards(4), &targets(), usize::MAX);

        assert_eq!(
            report,
            SyncReport { chunks_written: 1, chunks_failed: 0, rows_written: 4 }
        );
        assert_eq!(sheets.updates.borrow()[0].range, "Cards!B2:D5");
    }

    #[test]
    fn test_values_are_column_major() {
        let sheets = FakeSheets::default();
        let writer = RangeWriter::new(&sheets, "Cards");
        writer.sync_all(&cards(2), &targets(), 100);

        let updates = sheets.updates.borrow();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].dimension, MajorDimension::Columns);
        assert_eq!(
            updates[0].values,
            vec![
                vec![json!("Card 0"), json!("Card 1")],
                vec![json!("Blue"), json!("Blue")],
                vec![json!(0), json!(1)],
            ]
        );
    }

    #[test]
    fn test_empty_catalog_writes_nothing() {
        let sheets = FakeSheets::default();
        let writer = RangeWriter::new(&sheets, "Cards");
        let report = writer.sync_all(&[], &targets(), 10);
        assert_eq!(report, SyncReport::default());
        assert!(sheets.updates.borrow().is_empty());
    }

    #[test]
    fn test_failed_chunk_does_not_stop_sync() {
        let sheets = FakeSheets {
            fail_on: vec!["B4:".to_string()],
            ..Default::default()
        };
        let writer = RangeWriter::new(&sheets, "Cards");
        let report = writer.sync_all(&cards(5), &targets(), 2);

        assert_eq!(
            report,
            SyncReport { chunks_written: 2, chunks_failed: 1, rows_written: 3 }
        );
    }

    #[test]
    fn test_header_columns() {
        let mut sheets = FakeSheets::default();
        sheets.ranges.insert(
            "Cards!B1:1".to_string(),
            vec![vec![json!("name"), json!(""), json!("type_line")]],
        );
        let writer = RangeWriter::new(&sheets, "Cards");
        let columns = writer.header_columns(1).unwrap();

        assert_eq!(
            columns,
            vec![
                ColumnTarget { field: "name".to_string(), column: 1 },
                ColumnTarget { field: "".to_string(), column: 2 },
                ColumnTarget { field: "type_line".to_string(), column: 3 },
            ]
        );
    }

    #[test]
    fn test_missing_header_is_fatal() {
        let sheets = FakeSheets::default();
        let writer = RangeWriter::new(&sheets, "Cards");
        let err = writer.header_columns(1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SyncError>(),
            Some(SyncError::EmptyHeader(_))
        ));
    }

    #[test]
    fn test_blank_header_column_stays_empty() {
        let sheets = FakeSheets::default();
        let writer = RangeWriter::new(&sheets, "Cards");
        let columns = vec![
            ColumnTarget { field: "name".to_string(), column: 1 },
            ColumnTarget { field: "".to_string(), column: 2 },
        ];
        writer.sync_all(&cards(1), &columns, 10);
        assert_eq!(
            sheets.updates.borrow()[0].values,
            vec![vec![json!("Card 0")], vec![Value::Null]]
        );
    }
}
