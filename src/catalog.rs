//! Catalog downloads: page-by-page or a single bulk snapshot

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::cache::CatalogCache;
use crate::config::{CatalogJob, SourceKind};
use crate::error::SyncError;
use crate::types::CardRecord;
use crate::utils::try_remove_file;

// Catalog API response types
#[derive(Debug, Deserialize)]
struct CardsPage {
    #[serde(default)]
    cards: Vec<CardRecord>,
}

#[derive(Debug, Deserialize)]
pub struct BulkDirectory {
    pub data: Vec<BulkEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub download_uri: String,
}

/// Return the job's catalog, from the cache when one exists.
/// A fresh download is cached before it is returned.
pub fn load_catalog(client: &Client, job: &CatalogJob) -> Result<Vec<CardRecord>> {
    load_or_fetch(job, || match job.source {
        SourceKind::Paginated => {
            log::info!("Fetching all pages from {}", job.endpoint);
            fetch_paginated(|page| fetch_page(client, &job.endpoint, page))
        }
        SourceKind::Bulk => {
            log::info!("Fetching '{}' bulk data via {}", job.bulk_kind, job.endpoint);
            fetch_bulk(client, job)
        }
    })
}

/// Cache-or-fetch around any download strategy. Nothing is cached when
/// `fetch` fails, and a bulk download is removed only once the cache is written.
pub fn load_or_fetch<F>(job: &CatalogJob, fetch: F) -> Result<Vec<CardRecord>>
where
    F: FnOnce() -> Result<Vec<CardRecord>>,
{
    let cache = CatalogCache::new(&job.cache_path);
    if let Some(records) = cache.load()? {
        log::info!(
            "Loaded {} cards from cache {}",
            records.len(),
            cache.path().display()
        );
        return Ok(records);
    }

    let records = fetch()?;
    cache.save(&records)?;
    if job.source == SourceKind::Bulk {
        try_remove_file(&job.download_path);
    }

    log::info!("Fetched {} cards", records.len());
    Ok(records)
}

/// Request pages 0, 1, 2, ... until one comes back empty, keeping request order
pub fn fetch_paginated<F>(mut fetch_page: F) -> Result<Vec<CardRecord>>
where
    F: FnMut(u32) -> Result<Vec<CardRecord>>,
{
    let mut records = Vec::new();
    let mut page = 0u32;
    loop {
        let cards = fetch_page(page)?;
        if cards.is_empty() {
            break;
        }
        log::debug!("Page {}: {} cards", page, cards.len());
        records.extend(cards);
        page += 1;
    }
    Ok(records)
}

fn fetch_page(client: &Client, endpoint: &str, page: u32) -> Result<Vec<CardRecord>> {
    let response = client
        .get(endpoint)
        .query(&[("page", page)])
        .send()
        .with_context(|| format!("Failed to fetch page {} of {}", page, endpoint))?;
    log::debug!("{} {}", response.status(), response.url());

    let body: CardsPage = response
        .error_for_status()?
        .json()
        .with_context(|| format!("Failed to parse page {} of {}", page, endpoint))?;
    Ok(body.cards)
}

/// Pick the directory entry of the requested type
pub fn select_bulk_entry<'a>(
    directory: &'a BulkDirectory,
    kind: &str,
) -> Result<&'a BulkEntry, SyncError> {
    directory
        .data
        .iter()
        .find(|entry| entry.kind == kind)
        .ok_or_else(|| SyncError::MissingBulkEntry(kind.to_string()))
}

fn fetch_bulk(client: &Client, job: &CatalogJob) -> Result<Vec<CardRecord>> {
    let response = client
        .get(&job.endpoint)
        .send()
        .with_context(|| format!("Failed to fetch bulk data directory: {}", job.endpoint))?;
    log::debug!("{} {}", response.status(), response.url());

    let directory: BulkDirectory = response
        .error_for_status()?
        .json()
        .context("Failed to parse bulk data directory")?;
    let entry = select_bulk_entry(&directory, &job.bulk_kind)?;

    download_to_file(client, &entry.download_uri, &job.download_path)?;
    read_bulk_file(&job.download_path)
}

fn download_to_file(client: &Client, url: &str, path: &Path) -> Result<()> {
    log::info!("Downloading {} to {}", url, path.display());
    let mut response = client
        .get(url)
        .send()
        .with_context(|| format!("Failed to fetch: {}", url))?
        .error_for_status()?;

    let file = File::create(path)
        .with_context(|| format!("Failed to create download file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let bytes = response
        .copy_to(&mut writer)
        .with_context(|| format!("Failed to read response: {}", url))?;
    writer.flush()?;

    log::info!("Downloaded {} bytes", bytes);
    Ok(())
}

/// Parse a downloaded bulk file as one complete list of cards
pub fn read_bulk_file(path: &Path) -> Result<Vec<CardRecord>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open bulk file: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse bulk file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use serde_json::json;

    use crate::config::SheetTarget;

    fn card(name: &str) -> CardRecord {
        json!({ "name": name }).as_object().unwrap().clone()
    }

    #[test]
    fn test_pages_concatenate_until_empty() {
        let pages = vec![
            vec![card("A"), card("B")],
            vec![card("C")],
            vec![],
            vec![card("never requested")],
        ];
        let mut requested = Vec::new();

        let records = fetch_paginated(|page| {
            requested.push(page);
            Ok(pages[page as usize].clone())
        })
        .unwrap();

        let names: Vec<_> = records.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(requested, vec![0, 1, 2]);
    }

    #[test]
    fn test_page_failure_propagates() {
        let result = fetch_paginated(|page| {
            if page == 1 {
                bail!("connection reset");
            }
            Ok(vec![card("A")])
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_select_bulk_entry() {
        let directory: BulkDirectory = serde_json::from_value(json!({
            "object": "list",
            "data": [
                {"type": "oracle_cards", "download_uri": "https://example.com/oracle.json"},
                {"type": "all_cards", "download_uri": "https://example.com/all.json"}
            ]
        }))
        .unwrap();

        let entry = select_bulk_entry(&directory, "all_cards").unwrap();
        assert_eq!(entry.download_uri, "https://example.com/all.json");
        assert!(matches!(
            select_bulk_entry(&directory, "rulings"),
            Err(SyncError::MissingBulkEntry(_))
        ));
    }

    #[test]
    fn test_read_bulk_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all-cards.json");
        std::fs::write(&path, r#"[{"name": "Bolt"}, {"name": "Opt", "cmc": 1}]"#).unwrap();

        let records = read_bulk_file(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["cmc"], json!(1));
    }

    fn job(dir: &Path, source: SourceKind) -> CatalogJob {
        CatalogJob {
            source,
            // Unroutable: any request that escapes the fetch closure fails
            endpoint: "http://127.0.0.1:9/cards".to_string(),
            cache_path: dir.join("cards.json"),
            bulk_kind: "all_cards".to_string(),
            download_path: dir.join("all-cards.json"),
            name_field: "name".to_string(),
            image_field: None,
            dedupe: true,
            chunk_rows: 10,
            sheet: SheetTarget {
                spreadsheet_id: "id".to_string(),
                sheet_name: "Sheet".to_string(),
                header_col_offset: 1,
            },
        }
    }

    #[test]
    fn test_load_catalog_prefers_cache() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path(), SourceKind::Paginated);
        CatalogCache::new(&job.cache_path).save(&[card("Cached")]).unwrap();

        let records = load_catalog(&Client::new(), &job).unwrap();
        assert_eq!(records, vec![card("Cached")]);
    }

    #[test]
    fn test_fresh_fetch_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path(), SourceKind::Paginated);

        let records = load_or_fetch(&job, || {
            fetch_paginated(|page| Ok(if page == 0 { vec![card("Bolt")] } else { vec![] }))
        })
        .unwrap();

        assert_eq!(records, vec![card("Bolt")]);
        let cached = CatalogCache::new(&job.cache_path).load().unwrap();
        assert_eq!(cached, Some(vec![card("Bolt")]));

        // A second load never calls the fetcher
        let again = load_or_fetch(&job, || bail!("should have used the cache")).unwrap();
        assert_eq!(again, records);
    }

    #[test]
    fn test_failed_fetch_leaves_no_cache() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path(), SourceKind::Paginated);

        let result = load_or_fetch(&job, || {
            fetch_paginated(|page| {
                if page == 1 {
                    bail!("connection reset");
                }
                Ok(vec![card("Bolt")])
            })
        });

        assert!(result.is_err());
        assert!(!job.cache_path.exists());
    }

    #[test]
    fn test_bulk_download_removed_after_caching() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path(), SourceKind::Bulk);

        let records = load_or_fetch(&job, || {
            std::fs::write(&job.download_path, r#"[{"name": "Bolt"}, {"name": "Opt"}]"#)?;
            read_bulk_file(&job.download_path)
        })
        .unwrap();

        assert_eq!(records.len(), 2);
        assert!(job.cache_path.exists());
        assert!(!job.download_path.exists());
    }

    #[test]
    fn test_failed_bulk_parse_keeps_download() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path(), SourceKind::Bulk);

        let result = load_or_fetch(&job, || {
            std::fs::write(&job.download_path, "[{\"name\": ")?;
            read_bulk_file(&job.download_path)
        });

        assert!(result.is_err());
        assert!(!job.cache_path.exists());
        assert!(job.download_path.exists());
    }
}
