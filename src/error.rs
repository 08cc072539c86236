use std::{io, path::StripPrefixError, sync::mpsc::SendError};

use regex::Error as RegexError;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;
use url::ParseError as UrlParseError;

use crate::event::IndexEvent;

/// Errors raised by the ambient layers of the crate (configuration, workspace loading, query
/// construction, consistency checks).
///
/// The index and query operations themselves never fail: degenerate inputs resolve to empty
/// results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum IndexError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Custom error: {0}")]
    Custom(String),
    #[error("Index tables are inconsistent: {0}")]
    Inconsistent(String),
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("Invalid document URI: {0}")]
    InvalidUri(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("You do not have permission to access this resource")]
    PermissionDenied,
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
}

impl From<StripPrefixError> for IndexError {
    fn from(src: StripPrefixError) -> IndexError {
        IndexError::NotFound(format!("Strip prefix failed for path. Error: {src}"))
    }
}

impl From<toml::de::Error> for IndexError {
    fn from(src: toml::de::Error) -> IndexError {
        IndexError::Config(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for IndexError {
    fn from(src: toml::ser::Error) -> IndexError {
        IndexError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for IndexError {
    fn from(src: JsonError) -> IndexError {
        IndexError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<UrlParseError> for IndexError {
    fn from(src: UrlParseError) -> IndexError {
        IndexError::InvalidUri(format!("{src}"))
    }
}

impl From<RegexError> for IndexError {
    fn from(x: RegexError) -> Self {
        IndexError::InvalidQuery(format!("Regex parse failed: {x}"))
    }
}

impl From<io::Error> for IndexError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => IndexError::NotFound(format!("{x}")),
            io::ErrorKind::PermissionDenied => IndexError::PermissionDenied,
            _ => IndexError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<walkdir::Error> for IndexError {
    fn from(x: walkdir::Error) -> Self {
        let path = x.path().map(|p| p.display().to_string()).unwrap_or_default();
        match x.into_io_error() {
            Some(io_error) => {
                tracing::debug!("walkdir failed at {path:?}: {io_error}");
                IndexError::from(io_error)
            }
            None => IndexError::Io(format!("Filesystem loop detected at {path}")),
        }
    }
}

impl From<SendError<IndexEvent>> for IndexError {
    fn from(x: SendError<IndexEvent>) -> Self {
        IndexError::Io(format!(
            "Channel update send Error, could not transmit index event {:?}",
            x.0
        ))
    }
}
