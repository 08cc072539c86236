use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter},
    sync::Arc,
};
use url::Url;

use crate::{
    codec::UnresolvedReference,
    properties::{Fingerprint, Position, Reference, Section, SectionKey},
};

/// Lifecycle of a document within a [crate::index::CorpusIndex].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentState {
    Untracked,
    /// Indexed, and its references reflect the corpus as of its last resolution.
    Indexed,
    /// Indexed, but a declaration it depends on changed since it was last resolved. It is
    /// re-resolved before the next query or request.
    Stale,
}

impl Display for DocumentState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DocumentState::Untracked => "untracked",
            DocumentState::Indexed => "indexed",
            DocumentState::Stale => "stale",
        };
        write!(f, "{label}")
    }
}

/// Immutable snapshot of one indexed document.
///
/// `sections`, `references` and `unresolved` always describe `text`, the content the document had
/// at `fingerprint`. Entries are never edited in place: every re-index produces a new entry that
/// replaces the old one wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentIndexEntry {
    pub uri: Url,
    pub fingerprint: Fingerprint,
    pub text: Arc<str>,
    /// Sections in document order
    pub sections: Vec<Section>,
    /// Resolved references in source order
    pub references: Vec<Reference>,
    pub unresolved: Vec<UnresolvedReference>,
    /// Commit counter value at which this entry was stored
    pub generation: u64,
}

impl DocumentIndexEntry {
    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    /// The innermost section whose body contains `pos`.
    pub fn section_at(&self, pos: Position) -> Option<&Section> {
        self.sections
            .iter()
            .filter(|s| s.body.contains(pos))
            .max_by_key(|s| s.body.start)
    }

    /// The reference expression covering `pos`, if any.
    pub fn reference_at(&self, pos: Position) -> Option<&Reference> {
        self.references
            .iter()
            .find(|r| r.location.range.contains(pos))
    }

    pub fn references_to<'a>(
        &'a self,
        target: &'a SectionKey,
    ) -> impl Iterator<Item = &'a Reference> + 'a {
        self.references.iter().filter(move |r| r.target == *target)
    }

    pub fn declared_ids(&self) -> BTreeSet<&str> {
        self.sections.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn unresolved_ids(&self) -> BTreeSet<&str> {
        self.unresolved.iter().map(|u| u.target_id.as_str()).collect()
    }
}

impl Display for DocumentIndexEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} @ {} ({} sections, {} references, {} unresolved)",
            self.uri,
            self.fingerprint,
            self.sections.len(),
            self.references.len(),
            self.unresolved.len()
        )
    }
}
