//! Market price lookups for collected printings

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Number, Value};

use crate::types::{CardRecord, CollectionEntry, FoilType};

/// Search response. A search with no hits may omit both fields.
#[derive(Debug, Default, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub total_cards: u64,
    #[serde(default)]
    pub data: Vec<CardRecord>,
}

/// Finds the printings matching a collection entry
pub trait CardSearch {
    fn search(&self, entry: &CollectionEntry) -> Result<SearchResults>;
}

/// Scryfall `/cards/search`, scoped to set, collector number and language
pub struct ScryfallSearch {
    client: Client,
    endpoint: String,
}

impl ScryfallSearch {
    pub fn new(client: Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }
}

/// Scryfall query for exactly one printing
pub fn search_query(entry: &CollectionEntry) -> String {
    format!(
        "e:{} cn:{} lang:{}",
        entry.set_id, entry.collector_number, entry.language
    )
    .to_lowercase()
}

impl CardSearch for ScryfallSearch {
    fn search(&self, entry: &CollectionEntry) -> Result<SearchResults> {
        let query = search_query(entry);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("include_extras", "true"),
                ("include_multilingual", "true"),
                ("include_variations", "true"),
                ("unique", "prints"),
                ("q", query.as_str()),
            ])
            .send()
            .with_context(|| format!("Failed to search for: {}", query))?;
        log::debug!("{} {}", response.status(), response.url());

        // Scryfall answers a search without matches with a 404 error object
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(SearchResults::default());
        }

        response
            .error_for_status()?
            .json()
            .with_context(|| format!("Failed to parse search results for: {}", query))
    }
}

/// A matched printing's canonical name and its price cell
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    pub name: String,
    pub price: Value,
}

/// Price of the first printing matching `entry`, or `None` when nothing
/// matches or that printing has no price for the entry's finish
pub fn lookup(search: &dyn CardSearch, entry: &CollectionEntry) -> Result<Option<PriceQuote>> {
    let results = search.search(entry)?;
    if results.total_cards == 0 {
        return Ok(None);
    }
    Ok(results
        .data
        .first()
        .and_then(|printing| quote_for(printing, entry.foil_type)))
}

/// `usd` for non-foils, `usd_foil` for every foil treatment
pub fn quote_for(printing: &CardRecord, foil_type: FoilType) -> Option<PriceQuote> {
    let field = if foil_type.is_foil() { "usd_foil" } else { "usd" };
    let price = printing.get("prices")?.get(field)?.as_str()?;
    let name = printing
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Some(PriceQuote {
        name,
        price: price_cell(price),
    })
}

/// Prices arrive as strings; write them as numbers when they parse
fn price_cell(price: &str) -> Value {
    price
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(price.to_string()))
}
