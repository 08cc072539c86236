//! Document parsing and reference resolution.
//!
//! This module turns document text into the records the index stores.
//!
//! ## Key Components
//!
//! - [`DocCodec`] trait - recognises sections and reference expressions for one syntax
//! - [`HclCodec`] - the built-in Terraform/HCL implementation
//! - [`resolver`] - resolves reference expressions to [`Section`](crate::properties::Section)
//!   identities, locally first and then through a [`CorpusLookup`]
//! - [`UnresolvedReference`] - expressions whose target is not (yet) declared
//!
//! ## Parse policy
//!
//! Codecs are total: malformed input degrades to fewer sections or references, never to an
//! error. Identical text always yields identical section ids, which the index relies on to
//! detect renames and stale references.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::properties::{Range, Section};

pub mod diagnostic;
pub mod hcl;
pub mod lexer;
pub mod lines;
pub mod resolver;

pub use diagnostic::UnresolvedReference;
pub use hcl::HclCodec;
pub use resolver::{resolve, CorpusLookup, NoCorpus, Resolution};

/// A syntactic reference to a section, before resolution.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReferenceExpression {
    /// The section id the expression denotes, e.g. `aws_instance.web` for
    /// `aws_instance.web.private_ip`.
    pub target_id: String,
    /// Span of the part of the expression naming the section.
    pub range: Range,
}

pub trait DocCodec: Send + Sync {
    /// Ordered sections declared by `text`, with locations in document `uri`.
    fn parse(&self, uri: &Url, text: &str) -> Vec<Section>;

    /// Reference expressions in `text`, in source order.
    fn reference_expressions(&self, text: &str) -> Vec<ReferenceExpression>;
}
