//! Error taxonomy for the report pipeline.
//!
//! Decorative assets degrade gracefully and never surface here; what does
//! surface is either contained to one record (`MalformedInput`) or aborts the
//! whole run before any status is committed.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A file the run depends on is not where it should be.
    #[error("missing asset '{name}': {reason}")]
    MissingAsset { name: String, reason: String },

    /// Record data that cannot be interpreted (e.g. the connections list is not JSON).
    #[error("malformed input in '{field}': {reason}")]
    MalformedInput { field: String, reason: String },

    /// Credentials missing, invalid or rejected by the token endpoint.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// A row store or object store call failed.
    #[error("{operation} failed: {message}")]
    RemoteIo { operation: String, message: String },

    /// The template could not be read or the artifact could not be written.
    #[error("workbook error: {0}")]
    Workbook(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn remote(operation: impl Into<String>, message: impl ToString) -> Self {
        Error::RemoteIo {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    pub fn malformed(field: impl Into<String>, reason: impl ToString) -> Self {
        Error::MalformedInput {
            field: field.into(),
            reason: reason.to_string(),
        }
    }

    pub fn missing_asset(name: impl Into<String>, reason: impl ToString) -> Self {
        Error::MissingAsset {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for Error {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        Error::Workbook(err.to_string())
    }
}

impl From<calamine::XlsxError> for Error {
    fn from(err: calamine::XlsxError) -> Self {
        Error::Workbook(err.to_string())
    }
}
