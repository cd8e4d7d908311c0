//! Run configuration, loaded from a CONL file
//!
//! Every job reads its spreadsheet, sheet name and column layout from here
//! instead of module constants, so several targets can coexist.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SyncError;

pub const DEFAULT_CONFIG_PATH: &str = "cardsheets.conl";

const MTG_API_ENDPOINT_CARDS: &str = "https://api.magicthegathering.io/v1/cards";
const SCRYFALL_API_ENDPOINT_BULK_DATA: &str = "https://api.scryfall.com/bulk-data";
const SCRYFALL_API_ENDPOINT_CARD_SEARCH: &str = "https://api.scryfall.com/cards/search";
const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

const CATALOG_SPREADSHEET_ID: &str = "1c9XOUGjgSvjcJ_dOG1nCdsLlAP5YFavsFhzEPJIhaKI";
const COLLECTION_SPREADSHEET_ID: &str = "12BXt6lJo7ianQ6jLRUhm4_LWBtvs7sOqH9fncMbAw8k";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub auth: AuthConfig,
    pub catalogs: BTreeMap<String, CatalogJob>,
    pub prices: PriceJob,
}

impl Config {
    /// Load the configuration at `path`, or the built-in defaults if there is no such file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("No config at {}, using built-in defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_conl::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn catalog(&self, name: &str) -> Result<&CatalogJob, SyncError> {
        self.catalogs
            .get(name)
            .ok_or_else(|| SyncError::UnknownCatalog(name.to_string()))
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut catalogs = BTreeMap::new();
        catalogs.insert(
            "mtg".to_string(),
            CatalogJob {
                source: SourceKind::Paginated,
                endpoint: MTG_API_ENDPOINT_CARDS.to_string(),
                cache_path: PathBuf::from("mtg_cards.json"),
                bulk_kind: default_bulk_kind(),
                download_path: default_download_path(),
                name_field: default_name_field(),
                image_field: Some("imageUrl".to_string()),
                dedupe: true,
                chunk_rows: default_chunk_rows(),
                sheet: SheetTarget {
                    spreadsheet_id: CATALOG_SPREADSHEET_ID.to_string(),
                    sheet_name: "Cards - MTG API".to_string(),
                    header_col_offset: 1,
                },
            },
        );
        catalogs.insert(
            "scryfall".to_string(),
            CatalogJob {
                source: SourceKind::Bulk,
                endpoint: SCRYFALL_API_ENDPOINT_BULK_DATA.to_string(),
                cache_path: PathBuf::from("scryfall_cards.json"),
                bulk_kind: default_bulk_kind(),
                download_path: default_download_path(),
                name_field: default_name_field(),
                image_field: Some("image_uris".to_string()),
                dedupe: true,
                chunk_rows: default_chunk_rows(),
                sheet: SheetTarget {
                    spreadsheet_id: CATALOG_SPREADSHEET_ID.to_string(),
                    sheet_name: "Cards - Scryfall API".to_string(),
                    header_col_offset: 1,
                },
            },
        );

        Self {
            auth: AuthConfig::default(),
            catalogs,
            prices: PriceJob::default(),
        }
    }
}

/// Where OAuth client secrets and the cached user token live
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
    pub scope: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("credentials.json"),
            token_path: PathBuf::from("token.json"),
            scope: SHEETS_SCOPE.to_string(),
        }
    }
}

/// A spreadsheet tab the tool writes to
#[derive(Debug, Clone, Deserialize)]
pub struct SheetTarget {
    pub spreadsheet_id: String,
    pub sheet_name: String,
    /// Zero-based column where the header row starts (1 = column B)
    #[serde(default)]
    pub header_col_offset: u32,
}

impl SheetTarget {
    pub fn url(&self) -> String {
        format!("https://docs.google.com/spreadsheets/d/{}", self.spreadsheet_id)
    }
}

/// How a catalog is downloaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum SourceKind {
    /// `GET endpoint?page=N` until a page comes back empty
    Paginated,
    /// One file listed in a bulk-data directory
    Bulk,
}

impl TryFrom<String> for SourceKind {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "paginated" => Ok(SourceKind::Paginated),
            "bulk" => Ok(SourceKind::Bulk),
            other => Err(format!(
                "unknown catalog source '{}', expected 'paginated' or 'bulk'",
                other
            )),
        }
    }
}

/// One catalog -> sheet sync
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogJob {
    pub source: SourceKind,
    pub endpoint: String,
    pub cache_path: PathBuf,
    /// Bulk directory entry type to download (bulk sources only)
    #[serde(default = "default_bulk_kind")]
    pub bulk_kind: String,
    /// Temporary file for the bulk download (bulk sources only)
    #[serde(default = "default_download_path")]
    pub download_path: PathBuf,
    #[serde(default = "default_name_field")]
    pub name_field: String,
    /// Field that marks a printing as having display data, preferred when deduplicating
    #[serde(default)]
    pub image_field: Option<String>,
    #[serde(default = "default_true")]
    pub dedupe: bool,
    #[serde(default = "default_chunk_rows")]
    pub chunk_rows: usize,
    pub sheet: SheetTarget,
}

/// Header labels of the collection sheet
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectionLabels {
    pub card_name: String,
    pub collector_number: String,
    pub set: String,
    pub language: String,
    pub foil: String,
}

impl Default for CollectionLabels {
    fn default() -> Self {
        Self {
            card_name: "Card Name".to_string(),
            collector_number: "Collector Number".to_string(),
            set: "Set".to_string(),
            language: "Language".to_string(),
            foil: "Foil Type / Art Stamp".to_string(),
        }
    }
}

/// The collection price refresh
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PriceJob {
    pub sheet: SheetTarget,
    pub labels: CollectionLabels,
    pub price_column: String,
    /// Optional column that receives the matched printing's name
    pub name_column: Option<String>,
    pub search_endpoint: String,
    pub request_delay_ms: u64,
}

impl Default for PriceJob {
    fn default() -> Self {
        Self {
            sheet: SheetTarget {
                spreadsheet_id: COLLECTION_SPREADSHEET_ID.to_string(),
                sheet_name: "Collection".to_string(),
                header_col_offset: 0,
            },
            labels: CollectionLabels::default(),
            price_column: "Prices".to_string(),
            name_column: Some("Scryfall Name".to_string()),
            search_endpoint: SCRYFALL_API_ENDPOINT_CARD_SEARCH.to_string(),
            request_delay_ms: 100,
        }
    }
}

fn default_bulk_kind() -> String {
    "all_cards".to_string()
}

fn default_download_path() -> PathBuf {
    PathBuf::from("scryfall-all-cards.json")
}

fn default_name_field() -> String {
    "name".to_string()
}

fn default_true() -> bool {
    true
}

fn default_chunk_rows() -> usize {
    100_000
}
