//! Diagnostic types for reference resolution.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::properties::Location;

/// A reference expression whose target could not be found.
///
/// An unresolved reference is not an error: in a live-editing session the target may simply not
/// be declared (or indexed) yet. The index keeps these per document so the document can be
/// re-resolved once a declaration for `target_id` appears.
///
/// # Examples
///
/// ```
/// # use tfindex::{codec::UnresolvedReference, properties::{Location, Position, Range}};
/// # use url::Url;
/// // main.tf reads var.region before variables.tf is indexed:
/// let unresolved = UnresolvedReference {
///     target_id: "var.region".to_string(),
///     location: Location::new(
///         Url::parse("file:///work/main.tf").unwrap(),
///         Range::new(Position::new(4, 11), Position::new(4, 21)),
///     ),
/// };
/// assert!(unresolved.to_string().contains("var.region"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnresolvedReference {
    /// The section id the expression denotes
    pub target_id: String,
    /// Location of the expression in the referencing document
    pub location: Location,
}

impl Display for UnresolvedReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unresolved {} at {}", self.target_id, self.location)
    }
}
