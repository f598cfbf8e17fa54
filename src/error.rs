//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Store refused access (permissions, read-only media).
    #[error("Access to database {database} denied")]
    ConnectionDenied { database: String },

    /// Store file does not exist.
    #[error("Database {database} does not exist")]
    DatabaseMissing { database: String },

    /// Any other failure while opening a store.
    #[error("Cannot connect to database {database}: {source}")]
    Connection {
        database: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Requested source root or target table is not in the registry.
    #[error("Unknown table {0}")]
    UnknownTable(String),

    /// No row with a non-empty first cell was found.
    #[error("No header row detected in sheet \"{sheet}\"")]
    HeaderNotFound { sheet: String },

    /// Header row does not fit the workbook layout.
    #[error("Unknown agenda structure in sheet \"{sheet}\"")]
    UnrecognizedSchema { sheet: String },

    /// A cell's detected type disagrees with its column.
    #[error("Ignored cell \"{sheet}!{address}\" with unexpected data type \"{detected}\" for column \"{column}\"")]
    CellTypeMismatch {
        sheet: String,
        address: String,
        detected: String,
        column: String,
    },

    /// Insert, update or truncate failed against the target.
    #[error("{op} failed for table {table}: {source}")]
    Write {
        table: String,
        op: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// Workbook could not be opened or read.
    #[error("Workbook error: {0}")]
    Workbook(String),

    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Query or statement error outside the write path.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Write error
    pub fn write(table: impl Into<String>, op: &'static str, source: rusqlite::Error) -> Self {
        MigrateError::Write {
            table: table.into(),
            op,
            source,
        }
    }

    /// True for the failures that reject a whole sheet.
    pub fn is_sheet_rejection(&self) -> bool {
        matches!(
            self,
            MigrateError::HeaderNotFound { .. } | MigrateError::UnrecognizedSchema { .. }
        )
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
