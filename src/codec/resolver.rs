//! Maps reference expressions to the sections they denote.

use std::collections::BTreeMap;
use url::Url;

use crate::{
    codec::{DocCodec, UnresolvedReference},
    properties::{Location, Reference, Section, SectionKey},
};

/// Finds declarations outside the document being resolved.
pub trait CorpusLookup {
    /// The section with identity `id` visible from document `from`, if one is declared in
    /// another indexed document.
    fn lookup(&self, from: &Url, id: &str) -> Option<SectionKey>;
}

/// A [CorpusLookup] that knows no other documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCorpus;

impl CorpusLookup for NoCorpus {
    fn lookup(&self, _from: &Url, _id: &str) -> Option<SectionKey> {
        None
    }
}

impl<T: CorpusLookup + ?Sized> CorpusLookup for &T {
    fn lookup(&self, from: &Url, id: &str) -> Option<SectionKey> {
        (**self).lookup(from, id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Resolved references in source order
    pub references: Vec<Reference>,
    /// Expressions with no matching declaration, in source order
    pub unresolved: Vec<UnresolvedReference>,
}

/// Resolves every reference expression in `text`.
///
/// Sections declared by the document itself take precedence over declarations elsewhere in the
/// corpus. Expressions whose target cannot be found are reported in
/// [Resolution::unresolved] and produce no [Reference].
pub fn resolve(
    uri: &Url,
    sections: &[Section],
    text: &str,
    codec: &dyn DocCodec,
    lookup: &dyn CorpusLookup,
) -> Resolution {
    let local: BTreeMap<&str, &Section> = sections.iter().map(|s| (s.id.as_str(), s)).collect();
    let mut resolution = Resolution::default();
    for expression in codec.reference_expressions(text) {
        let location = Location::new(uri.clone(), expression.range);
        let target = match local.get(expression.target_id.as_str()) {
            Some(section) => Some(section.key()),
            None => lookup.lookup(uri, &expression.target_id),
        };
        match target {
            Some(target) => resolution.references.push(Reference::new(target, location)),
            None => {
                tracing::trace!("{} is unresolved at {}", expression.target_id, location);
                resolution.unresolved.push(UnresolvedReference {
                    target_id: expression.target_id,
                    location,
                });
            }
        }
    }
    resolution
}
