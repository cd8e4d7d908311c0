//! Reading the user's collection sheet into lookup keys

use serde_json::Value;

use crate::config::CollectionLabels;
use crate::error::SyncError;
use crate::types::{CollectionEntry, FoilType};
use crate::writer::cell_text;

/// Resolve every data row to a [`CollectionEntry`], positionally matching
/// cells to `header` labels.
///
/// Incomplete rows resolve to `None` so row indices stay aligned with the
/// sheet. A foil cell with an unknown label fails the whole batch.
pub fn resolve(
    labels: &CollectionLabels,
    header: &[Value],
    rows: &[Vec<Value>],
) -> Result<Vec<Option<CollectionEntry>>, SyncError> {
    let header: Vec<String> = header.iter().map(cell_text).collect();
    rows.iter()
        .enumerate()
        .map(|(i, row)| -> Result<Option<CollectionEntry>, SyncError> {
            let entry = resolve_row(labels, &header, row)?;
            if entry.is_none() && row.iter().any(|cell| !cell_text(cell).trim().is_empty()) {
                log::warn!("Skipping incomplete collection row {}", i + 2);
            }
            Ok(entry)
        })
        .collect()
}

fn resolve_row(
    labels: &CollectionLabels,
    header: &[String],
    row: &[Value],
) -> Result<Option<CollectionEntry>, SyncError> {
    let mut card_name = None;
    let mut collector_number = None;
    let mut set_id = None;
    let mut language = None;
    let mut foil_type = None;

    for (label, cell) in header.iter().zip(row) {
        let text = cell_text(cell);
        let value = text.trim();
        if value.is_empty() {
            continue;
        }

        if *label == labels.card_name {
            card_name = Some(value.to_string());
        } else if *label == labels.collector_number {
            collector_number = Some(value.to_string());
        } else if *label == labels.set {
            set_id = Some(value.to_string());
        } else if *label == labels.language {
            language = Some(value.to_string());
        } else if *label == labels.foil {
            foil_type = Some(FoilType::from_label(value)?);
        }
    }

    Ok(match (card_name, set_id, collector_number, language, foil_type) {
        (Some(card_name), Some(set_id), Some(collector_number), Some(language), Some(foil_type)) => {
            Some(CollectionEntry {
                card_name,
                set_id,
                collector_number,
                language,
                foil_type,
            })
        }
        _ => None,
    })
}
