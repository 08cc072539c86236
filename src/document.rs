//! The document capability the index consumes.
//!
//! Anything that can report a URI, its full text and a [Fingerprint] can be indexed. Editors
//! typically hand out a monotonic version number; the filesystem loader fingerprints content
//! with a SHA-256 digest instead.

use sha2::{Digest, Sha256};
use std::path::Path;
use url::Url;

use crate::{properties::Fingerprint, IndexError};

pub trait TextDocument {
    fn uri(&self) -> &Url;
    fn text(&self) -> &str;
    fn fingerprint(&self) -> Fingerprint;
}

/// Hex encoded SHA-256 digest of `text`.
pub fn content_digest(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// An owned document snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    uri: Url,
    text: String,
    fingerprint: Fingerprint,
}

impl SourceDocument {
    /// A document at an editor-supplied `version`.
    pub fn new(uri: Url, text: impl Into<String>, version: i64) -> Self {
        SourceDocument {
            uri,
            text: text.into(),
            fingerprint: Fingerprint::Version(version),
        }
    }

    /// A document fingerprinted by the digest of its content.
    pub fn from_content(uri: Url, text: impl Into<String>) -> Self {
        let text = text.into();
        let fingerprint = Fingerprint::Digest(content_digest(&text));
        SourceDocument {
            uri,
            text,
            fingerprint,
        }
    }

    /// Reads `path` from disk into a digest-fingerprinted document.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, IndexError> {
        let path = path.as_ref();
        let canonical = path.canonicalize()?;
        let uri = Url::from_file_path(&canonical).map_err(|_| {
            IndexError::InvalidUri(format!("cannot express {canonical:?} as a file URI"))
        })?;
        tracing::debug!("Reading {:?}", path);
        let text = std::fs::read_to_string(&canonical)?;
        Ok(SourceDocument::from_content(uri, text))
    }

    /// Replaces the content. Version fingerprints are incremented, digests recomputed.
    pub fn edit(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.fingerprint = match &self.fingerprint {
            Fingerprint::Version(v) => Fingerprint::Version(v + 1),
            Fingerprint::Digest(_) => Fingerprint::Digest(content_digest(&self.text)),
        };
    }
}

impl TextDocument for SourceDocument {
    fn uri(&self) -> &Url {
        &self.uri
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn fingerprint(&self) -> Fingerprint {
        self.fingerprint.clone()
    }
}

impl<T: TextDocument + ?Sized> TextDocument for &T {
    fn uri(&self) -> &Url {
        (**self).uri()
    }

    fn text(&self) -> &str {
        (**self).text()
    }

    fn fingerprint(&self) -> Fingerprint {
        (**self).fingerprint()
    }
}
