//! Card, collection and sheet types shared by the sync jobs

use serde_json::{Map, Value};

use crate::error::SyncError;

/// A raw card as returned by a catalog API. There is no fixed schema,
/// consumers read fields by name and tolerate absence.
pub type CardRecord = Map<String, Value>;

/// Foil treatment of a collected card (determines which price applies)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoilType {
    None,
    Traditional,
    Surge,
    GoldStamp,
}

impl FoilType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FoilType::None => "None",
            FoilType::Traditional => "Traditional",
            FoilType::Surge => "Surge",
            FoilType::GoldStamp => "Gold Stamp",
        }
    }

    /// Parse the label a user types into the collection sheet.
    /// Unknown labels are an error, not a missing value.
    pub fn from_label(s: &str) -> Result<Self, SyncError> {
        match s.trim() {
            "None" => Ok(FoilType::None),
            "Traditional" => Ok(FoilType::Traditional),
            "Surge" => Ok(FoilType::Surge),
            "Gold Stamp" => Ok(FoilType::GoldStamp),
            other => Err(SyncError::UnknownFoilType(other.to_string())),
        }
    }

    pub fn is_foil(&self) -> bool {
        !matches!(self, FoilType::None)
    }
}

/// One fully specified row of the collection sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionEntry {
    pub card_name: String,
    pub set_id: String,
    pub collector_number: String,
    pub language: String,
    pub foil_type: FoilType,
}

/// Payload layout of a range update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MajorDimension {
    Rows,
    Columns,
}

impl MajorDimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            MajorDimension::Rows => "ROWS",
            MajorDimension::Columns => "COLUMNS",
        }
    }
}
