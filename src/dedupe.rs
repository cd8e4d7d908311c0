//! One representative record per card name
//!
//! Catalog APIs return every printing of a card separately. The sheets want
//! one row per name, preferring the printing that has an image.

use serde_json::Value;

use crate::types::CardRecord;

/// Collapse records sharing a name, sorted by name.
///
/// The first record seen for a name is kept unless a later one has a
/// non-empty `image_field`, which then replaces it. Records without a
/// string name are dropped.
pub fn dedupe_by_name(
    records: Vec<CardRecord>,
    name_field: &str,
    image_field: Option<&str>,
) -> Vec<CardRecord> {
    let total = records.len();
    let mut named: Vec<(String, CardRecord)> = records
        .into_iter()
        .filter_map(|record| {
            let name = record.get(name_field)?.as_str()?.to_string();
            Some((name, record))
        })
        .collect();
    if named.len() < total {
        log::debug!("Dropped {} cards without a '{}'", total - named.len(), name_field);
    }

    // Stable, so printings of one name keep their API order
    named.sort_by(|(a, _), (b, _)| a.cmp(b));

    let deduped = named
        .into_iter()
        .fold(Vec::<(String, CardRecord)>::new(), |mut kept, (name, record)| {
            match kept.last_mut() {
                Some((last_name, last)) if *last_name == name => {
                    if image_field.is_some_and(|field| has_value(&record, field)) {
                        *last = record;
                    }
                }
                _ => kept.push((name, record)),
            }
            kept
        });

    log::info!("Deduplicated {} cards into {} names", total, deduped.len());
    deduped.into_iter().map(|(_, record)| record).collect()
}

fn has_value(record: &CardRecord, field: &str) -> bool {
    match record.get(field) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> CardRecord {
        value.as_object().unwrap().clone()
    }

    fn names(records: &[CardRecord]) -> Vec<&str> {
        records.iter().map(|r| r["name"].as_str().unwrap()).collect()
    }

    #[test]
    fn test_later_printing_with_image_wins() {
        let records = vec![
            record(json!({"name": "Bolt", "imageUrl": null})),
            record(json!({"name": "Bolt", "imageUrl": "x.png"})),
        ];
        let deduped = dedupe_by_name(records, "name", Some("imageUrl"));
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0]["imageUrl"], json!("x.png"));
    }

    #[test]
    fn test_first_printing_kept_without_image() {
        let records = vec![
            record(json!({"name": "Opt", "set": "XLN", "imageUrl": "first.png"})),
            record(json!({"name": "Opt", "set": "DOM"})),
            record(json!({"name": "Opt", "set": "ELD", "imageUrl": ""})),
        ];
        let deduped = dedupe_by_name(records, "name", Some("imageUrl"));
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0]["set"], json!("XLN"));
    }

    #[test]
    fn test_one_record_per_name_sorted() {
        let records = vec![
            record(json!({"name": "Shock"})),
            record(json!({"name": "Abrade"})),
            record(json!({"name": "Shock"})),
            record(json!({"name": "Msg"})),
            record(json!({"name": "Abrade"})),
            record(json!({"id": "no name"})),
        ];
        let deduped = dedupe_by_name(records, "name", Some("image_uris"));
        assert_eq!(names(&deduped), vec!["Abrade", "Msg", "Shock"]);
    }

    #[test]
    fn test_image_objects() {
        let records = vec![
            record(json!({"name": "Island", "image_uris": {}})),
            record(json!({"name": "Island", "image_uris": {"normal": "n.jpg"}})),
            record(json!({"name": "Island", "image_uris": {"normal": "other.jpg"}})),
        ];
        let deduped = dedupe_by_name(records, "name", Some("image_uris"));
        assert_eq!(deduped[0]["image_uris"]["normal"], json!("other.jpg"));
    }

    #[test]
    fn test_no_image_field_keeps_first() {
        let records = vec![
            record(json!({"name": "Bolt", "set": "LEA"})),
            record(json!({"name": "Bolt", "set": "M10", "imageUrl": "x.png"})),
        ];
        let deduped = dedupe_by_name(records, "name", None);
        assert_eq!(deduped[0]["set"], json!("LEA"));
    }
}
