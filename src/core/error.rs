/// Tablescope Error Module
///
/// This module defines the error type shared by the data-access layer, the
/// reporting helper and the front ends.
use thiserror::Error;

/// Error type for the data-access layer and the applications built on it.
///
/// Driver failures (opening, preparing, executing) all surface as
/// `Database` or `Query`; the remaining variants describe misuse of the
/// wrapper or failures around it (configuration, terminal, I/O).
#[derive(Error, Debug)]
pub enum DalError {
    /// Errors raised by the SQLite driver
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// SQL command errors (unknown procedures, bad command text, ...)
    #[error("Query error: {0}")]
    Query(String),

    /// Command parameter errors (missing names, impossible coercions)
    #[error("Parameter error: {0}")]
    Parameter(String),

    /// An operation needed an open connection but the manager has none
    #[error("Connection is not open")]
    NotConnected,

    /// Output parameters were requested before the command ran
    #[error("Can't get output parameter before the query is executed")]
    OutputNotAvailable,

    /// No output parameter with this name was captured
    #[error("Unknown output parameter: {0}")]
    UnknownParameter(String),

    /// A database value could not be converted into the requested type
    #[error("Cannot convert {found} value to {expected}")]
    Conversion {
        expected: &'static str,
        found: &'static str,
    },

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Terminal UI and export errors
    #[error("UI error: {0}")]
    Ui(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A blocking driver task or reader worker died
    #[error("Task error: {0}")]
    Task(String),
}

/// Type alias for Result to use DalError as the error type.
pub type Result<T> = std::result::Result<T, DalError>;
