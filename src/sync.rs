//! The batch jobs: catalog -> sheet, and the collection price refresh

use anyhow::Result;
use chrono::Local;
use serde_json::Value;
use std::thread;
use std::time::Duration;

use crate::auth::obtain_access_token;
use crate::catalog::load_catalog;
use crate::collection;
use crate::config::{CatalogJob, Config, PriceJob};
use crate::dedupe::dedupe_by_name;
use crate::error::SyncError;
use crate::prices::{self, CardSearch, ScryfallSearch};
use crate::projector::project;
use crate::sheets::{GoogleSheets, SheetRange, SheetsApi};
use crate::types::{CardRecord, MajorDimension};
use crate::utils::{http_client, osc8_link};
use crate::writer::{cell_text, ColumnTarget, RangeWriter, SyncReport, FIRST_DATA_ROW};

/// Catalog sheets are cleared at least through this column (Z)
const LAST_CLEARED_COLUMN: u32 = 25;

/// Load the catalog and reduce it to the rows the sheet shows
fn prepare_catalog(client: &reqwest::blocking::Client, job: &CatalogJob) -> Result<Vec<CardRecord>> {
    let records = load_catalog(client, job)?;
    if !job.dedupe {
        return Ok(records);
    }
    Ok(dedupe_by_name(records, &job.name_field, job.image_field.as_deref()))
}

pub fn run_catalog_sync(config: &Config, name: &str) -> Result<()> {
    let job = config.catalog(name)?;
    let client = http_client()?;

    let records = prepare_catalog(&client, job)?;
    let access_token = obtain_access_token(&client, &config.auth)?;
    let sheets = GoogleSheets::new(client, access_token, &job.sheet.spreadsheet_id);

    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string();
    let report = sync_catalog_sheet(&sheets, job, &records, &timestamp)?;

    println!(
        "Done! Wrote {} cards to {} in {} chunks ({} failed)",
        report.rows_written,
        osc8_link(&job.sheet.url(), &job.sheet.sheet_name),
        report.chunks_written,
        report.chunks_failed
    );
    Ok(())
}

/// Clear the data area, stamp the refresh time and write every header column
pub fn sync_catalog_sheet(
    sheets: &dyn SheetsApi,
    job: &CatalogJob,
    records: &[CardRecord],
    timestamp: &str,
) -> Result<SyncReport> {
    let writer = RangeWriter::new(sheets, &job.sheet.sheet_name);
    let columns = writer.header_columns(job.sheet.header_col_offset)?;

    let last_column = columns
        .iter()
        .map(|c| c.column)
        .max()
        .unwrap_or(0)
        .max(LAST_CLEARED_COLUMN);
    writer.clear(&SheetRange {
        col_start: 0,
        col_end: Some(last_column),
        row_start: FIRST_DATA_ROW,
        row_end: None,
    })?;

    // The timestamp lives left of the header; with no room it is skipped
    if job.sheet.header_col_offset > 0 {
        writer.write(
            &SheetRange::cell(0, FIRST_DATA_ROW),
            vec![vec![Value::from(timestamp)]],
            MajorDimension::Rows,
        )?;
    }

    Ok(writer.sync_all(records, &columns, job.chunk_rows))
}

pub fn run_fetch(config: &Config, name: &str) -> Result<()> {
    let job = config.catalog(name)?;
    let client = http_client()?;
    let records = load_catalog(&client, job)?;

    println!("Loaded {} cards from '{}'", records.len(), name);
    if let (Some(first), Some(image_field)) = (records.first(), job.image_field.as_deref()) {
        let card_name = cell_text(&project(first, &job.name_field));
        match project(first, image_field) {
            Value::String(uri) => println!("Link to image for '{}': {}", card_name, osc8_link(&uri, &uri)),
            _ => println!("No image for '{}'", card_name),
        }
    }
    Ok(())
}

/// Counts from one price refresh
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PriceReport {
    pub rows: usize,
    pub priced: usize,
    pub unpriced: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub fn run_price_refresh(config: &Config) -> Result<()> {
    let job = &config.prices;
    let client = http_client()?;

    let access_token = obtain_access_token(&client, &config.auth)?;
    let sheets = GoogleSheets::new(client.clone(), access_token, &job.sheet.spreadsheet_id);
    let search = ScryfallSearch::new(client, &job.search_endpoint);

    let report = refresh_prices(&sheets, &search, job)?;
    println!(
        "Done! Priced {} of {} rows in {} ({} without a price, {} incomplete, {} failed)",
        report.priced,
        report.rows,
        osc8_link(&job.sheet.url(), &job.sheet.sheet_name),
        report.unpriced,
        report.skipped,
        report.failed
    );
    Ok(())
}

fn find_column(columns: &[ColumnTarget], label: &str) -> Option<u32> {
    columns.iter().find(|c| c.field == label).map(|c| c.column)
}

/// Resolve every collection row, look up its price and write the price
/// (and matched name) columns. One bad row never stops the batch.
pub fn refresh_prices(
    sheets: &dyn SheetsApi,
    search: &dyn CardSearch,
    job: &PriceJob,
) -> Result<PriceReport> {
    let writer = RangeWriter::new(sheets, &job.sheet.sheet_name);
    let offset = job.sheet.header_col_offset;
    let header = writer.header_columns(offset)?;

    let price_column = find_column(&header, &job.price_column)
        .ok_or_else(|| SyncError::MissingColumn(job.price_column.clone()))?;
    let name_column = job.name_column.as_deref().and_then(|label| {
        let column = find_column(&header, label);
        if column.is_none() {
            log::warn!("No '{}' column, matched names will not be written", label);
        }
        column
    });

    let last_column = header.iter().map(|c| c.column).max().unwrap_or(offset);
    let info_range = SheetRange {
        col_start: offset,
        col_end: Some(last_column),
        row_start: 1,
        row_end: None,
    };
    let rows = writer.get(&info_range)?;
    let Some((header_row, data_rows)) = rows.split_first() else {
        return Err(SyncError::EmptyHeader(info_range.a1(&job.sheet.sheet_name)).into());
    };
    let entries = collection::resolve(&job.labels, header_row, data_rows)?;

    // Only wipe old prices once every row is known to be readable
    writer.clear(&SheetRange::column_from(price_column, FIRST_DATA_ROW))?;
    if let Some(column) = name_column {
        writer.clear(&SheetRange::column_from(column, FIRST_DATA_ROW))?;
    }

    let mut report = PriceReport {
        rows: entries.len(),
        ..Default::default()
    };
    let mut price_cells = Vec::with_capacity(entries.len());
    let mut name_cells = Vec::with_capacity(entries.len());
    let delay = Duration::from_millis(job.request_delay_ms);
    let mut searched = false;

    for entry in &entries {
        let Some(entry) = entry else {
            report.skipped += 1;
            price_cells.push(Value::from(""));
            name_cells.push(Value::from(""));
            continue;
        };

        if searched && !delay.is_zero() {
            thread::sleep(delay);
        }
        searched = true;

        match prices::lookup(search, entry) {
            Ok(Some(quote)) => {
                report.priced += 1;
                price_cells.push(quote.price);
                name_cells.push(Value::from(quote.name));
            }
            Ok(None) => {
                log::warn!(
                    "No price found for {} ({} #{}, {}, {})",
                    entry.card_name,
                    entry.set_id,
                    entry.collector_number,
                    entry.language,
                    entry.foil_type.as_str()
                );
                report.unpriced += 1;
                price_cells.push(Value::from(""));
                name_cells.push(Value::from(""));
            }
            Err(e) => {
                log::warn!("Failed to look up the price of {}: {:#}", entry.card_name, e);
                report.failed += 1;
                price_cells.push(Value::from(""));
                name_cells.push(Value::from(""));
            }
        }
    }

    if !entries.is_empty() {
        let row_end = FIRST_DATA_ROW + entries.len() as u32 - 1;
        writer.write(
            &SheetRange::new(price_column, price_column, FIRST_DATA_ROW, row_end),
            vec![price_cells],
            MajorDimension::Columns,
        )?;
        if let Some(column) = name_column {
            writer.write(
                &SheetRange::new(column, column, FIRST_DATA_ROW, row_end),
                vec![name_cells],
                MajorDimension::Columns,
            )?;
        }
    }

    Ok(report)
}
