//! Error types for ipbase.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Error type for ipbase operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Prefix vector carries a prefix length outside the valid range
    #[error("invalid prefix bits")]
    InvalidPrefixBits,

    /// Country code is not exactly two ASCII characters
    #[error("invalid country code: {0:?}")]
    InvalidCountryCode(String),

    /// CSV row with an unexpected number of fields
    #[error("csv row {line}: expected {want} fields, got {got}")]
    CsvArity { line: usize, want: usize, got: usize },

    /// Record stream ended in the middle of a record
    #[error("truncated record: expected {want} bytes, got {got}")]
    TruncatedRecord { want: usize, got: usize },

    /// Base reader was used after close
    #[error("base reader is closed")]
    ReaderClosed,

    /// Interning table ran out of ids
    #[error("metadata table overflow: more than 2^24 unique entries")]
    InternOverflow,

    /// No range in the index contains the address
    #[error("failed lookup")]
    LookupFailed,

    /// Address does not belong to any known network class
    #[error("unknown network area")]
    UnknownNetworkArea,

    /// Operation was cancelled by the caller
    #[error("operation cancelled")]
    Cancelled,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// IO error bound to a file path
    #[error("{}: {source}", path.display())]
    File {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Error {
    /// Wrap an IO error with the file path it happened on.
    pub fn file(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::File {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Result type alias for ipbase operations.
pub type Result<T> = std::result::Result<T, Error>;
