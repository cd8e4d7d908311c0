use thiserror::Error;

/// Failures a caller needs to tell apart from plain I/O errors
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("could not match foil type string to a known type: '{0}'")]
    UnknownFoilType(String),

    #[error("failed to find the '{0}' column in the spreadsheet header")]
    MissingColumn(String),

    #[error("no header row found in range {0}")]
    EmptyHeader(String),

    #[error("no catalog named '{0}' in the configuration")]
    UnknownCatalog(String),

    #[error("bulk data directory has no entry of type '{0}'")]
    MissingBulkEntry(String),

    #[error("sheets API returned {status}: {body}")]
    SheetsApi { status: u16, body: String },
}
