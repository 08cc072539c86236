//! The corpus index: per-document entries, the inverted reference index and the query API.
//!
//! ## Architecture
//!
//! ```text
//! TextDocument ──parse──▶ Vec<Section> ──resolve──▶ Vec<Reference>
//!                                                        │
//!                          DocumentIndexEntry ◀──────────┘
//!                                  │ commit (write lock)
//!                                  ▼
//!   entries: uri → entry     inverted: SectionKey → {Reference}
//!   declarations: id → {uri} pending: unresolved id → {uri}     stale: {uri}
//!                                  │
//!                                  ▼
//!                   on_did_change handlers / IndexEvent channel
//! ```
//!
//! [CorpusIndex::get_or_index_document] is idempotent for an unchanged fingerprint. Documents
//! whose references may have been invalidated by another document's commit are marked
//! [DocumentState::Stale] and re-resolved lazily, so a commit never performs work on behalf of
//! other documents.

mod corpus;
mod entry;

pub use corpus::{module_of, CorpusIndex, IndexStats};
pub use entry::{DocumentIndexEntry, DocumentState};
