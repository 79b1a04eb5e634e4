//! Error types for the nfe-core library.

use thiserror::Error;

/// Main error type for the nfe library.
///
/// A single document import surfaces at most one of these kinds.
#[derive(Error, Debug)]
pub enum NfeError {
    /// The input is not well-formed XML.
    #[error("malformed XML document: {0}")]
    MalformedDocument(String),

    /// Well-formed XML without a resolvable 44-character access key.
    #[error("no 44-character access key (chNFe) found in document")]
    MissingAccessKey,

    /// Any other failure while extracting invoice fields.
    #[error("{message}")]
    ParseFailure {
        /// User-facing message.
        message: String,
        /// Underlying cause, kept for diagnostics.
        #[source]
        source: ExtractionError,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl NfeError {
    /// Short machine-friendly label for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            NfeError::MalformedDocument(_) => "malformed_document",
            NfeError::MissingAccessKey => "missing_access_key",
            NfeError::ParseFailure { .. } => "parse_failure",
            NfeError::Io(_) => "io",
            NfeError::Config(_) => "config",
        }
    }
}

/// Errors raised inside structured field extraction.
///
/// These never leave the extractor directly; they are wrapped into
/// [`NfeError::ParseFailure`].
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// A section the record cannot be built without is absent.
    #[error("missing required section <{0}>")]
    MissingSection(&'static str),
}

/// Errors reported by a supplier configuration source.
#[derive(Error, Debug)]
pub enum ConfigSourceError {
    /// The backing store could not be reached or read.
    #[error("failed to fetch supplier configs: {0}")]
    Fetch(String),

    /// The store returned data that is not a config list.
    #[error("invalid supplier config data: {0}")]
    Decode(#[from] serde_json::Error),

    /// I/O error while reading a local store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for the nfe library.
pub type Result<T> = std::result::Result<T, NfeError>;
