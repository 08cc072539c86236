//! # tfindex
//!
//! A live cross-reference index over Terraform/HCL configuration documents.
//!
//! ## Overview
//!
//! tfindex parses each document of a corpus into addressable **sections** (resources, data
//! sources, modules, variables, outputs and locals), detects **references** from any section to
//! any other, within a document or across documents, and answers two questions efficiently while
//! documents keep changing:
//!
//! - "who refers to section X" ([`index::CorpusIndex::query_references`])
//! - "what does this document currently contain" ([`index::CorpusIndex::get_or_index_document`])
//!
//! ### Key Features
//!
//! - **Incremental indexing**: documents are re-parsed only when their fingerprint changes
//! - **Forward-reference tolerance**: references to sections indexed later resolve once the
//!   declaration appears, without re-parsing the referencing document
//! - **Consistent snapshots**: entries are immutable and replaced atomically, so readers never see
//!   a half-applied update
//! - **Change notification**: scoped subscriptions plus an optional typed event channel
//! - **Error tolerance**: malformed blocks degrade to fewer sections, never to errors
//!
//! ## Architecture
//!
//! - **[`codec`]**: Tokenizer, section parser and reference resolver (`DocCodec` trait)
//! - **[`properties`]**: Positions, sections, section identities and references
//! - **[`index`]**: Document entries and the corpus index with its query API
//! - **[`query`]**: Query scopes and filters
//! - **[`event`]**: Change notification
//! - **[`lens`]**: Editor-independent "N references" annotations
//! - **[`workspace`]**: Filesystem discovery and bulk indexing
//! - **[`config`]**: `tfindex.toml` configuration
//!
//! ## Quick Start
//!
//! ```rust
//! use tfindex::{
//!     document::SourceDocument,
//!     index::CorpusIndex,
//!     properties::SectionKey,
//!     query::{ReferenceQuery, Scope},
//! };
//! use url::Url;
//!
//! let index = CorpusIndex::new();
//! let a = Url::parse("file:///infra/a.tf").unwrap();
//! let b = Url::parse("file:///infra/b.tf").unwrap();
//!
//! index.get_or_index_document(&SourceDocument::new(
//!     a.clone(),
//!     "resource \"aws_instance\" \"foo\" {\n}\n",
//!     1,
//! ));
//! index.get_or_index_document(&SourceDocument::new(
//!     b.clone(),
//!     "output \"ip\" {\n  value = aws_instance.foo.private_ip\n}\n",
//!     1,
//! ));
//!
//! let refs = index.query_references(
//!     &Scope::AllFiles,
//!     &ReferenceQuery::new(SectionKey::new(a, "aws_instance.foo")),
//! );
//! assert_eq!(refs.len(), 1);
//! assert_eq!(refs[0].location.uri, b);
//! ```
//!
//! ## Resolution scope
//!
//! A reference that does not resolve within its own document is looked up among the other
//! documents of its Terraform module, i.e. the same directory. Setting `resolve_scope = "corpus"`
//! in `tfindex.toml` makes every tracked document a candidate. When several documents declare the
//! same id, the one with the smallest URI wins.
//!
//! ## Features
//!
//! - **default**: The library
//! - **bin**: The `tfindex` command line tool (`clap`, `tracing-subscriber`)
// The EnumSetType derive on SectionType expands `Self::Output`, which collides with its `Output` variant.
#![allow(ambiguous_associated_items)]
pub mod codec;
pub mod config;
pub mod document;
pub mod error;
pub mod event;
pub mod index;
pub mod lens;
pub mod properties;
pub mod query;
pub mod workspace;
pub use error::*;
