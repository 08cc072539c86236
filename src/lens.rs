//! Host-independent reference annotations ("N references" above each section).
//!
//! [ReferenceLensProvider] adapts the [CorpusIndex] query API to the two-phase
//! produce/resolve protocol editors use for code lenses: producing annotations is cheap (one per
//! section, no reference counting), resolving one runs an [Scope::AllFiles] reference query.
//! Nothing here depends on a particular editor; hosts translate [SectionLens],
//! [DisplayCommand] and [ReferencePick] into their own types.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    document::TextDocument,
    event::{ChangeNotifier, Subscription},
    index::CorpusIndex,
    properties::{Location, Range, Reference, Section, SectionKey},
    query::{ReferenceQuery, Scope},
};

/// Command id hosts bind to [show_references].
pub const SHOW_REFERENCES_COMMAND: &str = "terraform.showReferences";

/// A command rendered on an annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayCommand {
    pub title: String,
    pub command: String,
    pub tooltip: String,
    pub arguments: Vec<SectionKey>,
}

/// An annotation placed on the first line of a section. `command` is `None` until resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionLens {
    pub range: Range,
    pub section: SectionKey,
    pub command: Option<DisplayCommand>,
}

/// One entry of the reference picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencePick {
    /// Id of the referenced section
    pub label: String,
    /// Kind of the referenced section
    pub description: String,
    pub reference: Reference,
}

impl ReferencePick {
    /// Where selecting the pick navigates to.
    pub fn location(&self) -> &Location {
        &self.reference.location
    }
}

pub struct ReferenceLensProvider {
    index: Arc<CorpusIndex>,
    notifier: Arc<ChangeNotifier>,
    _forward: Subscription,
}

impl ReferenceLensProvider {
    pub fn new(index: Arc<CorpusIndex>) -> Self {
        let notifier = Arc::new(ChangeNotifier::new());
        let forward = notifier.clone();
        let subscription = index.on_did_change(move || forward.notify());
        ReferenceLensProvider {
            index,
            notifier,
            _forward: subscription,
        }
    }

    pub fn index(&self) -> &Arc<CorpusIndex> {
        &self.index
    }

    /// One unresolved annotation per section of `doc`, indexing it if needed.
    pub fn produce_annotations<D: TextDocument + ?Sized>(&self, doc: &D) -> Vec<SectionLens> {
        self.index
            .get_or_index_document(doc)
            .sections
            .iter()
            .map(|section| SectionLens {
                range: section.first_line_range(),
                section: section.key(),
                command: None,
            })
            .collect()
    }

    /// Fills in the annotation's command with the current reference count.
    pub fn resolve_annotation(&self, mut lens: SectionLens) -> SectionLens {
        let references = self.index.query_references(
            &Scope::AllFiles,
            &ReferenceQuery::new(lens.section.clone()),
        );
        lens.command = Some(DisplayCommand {
            title: format!("{} references", references.len()),
            command: SHOW_REFERENCES_COMMAND.to_string(),
            tooltip: format!("Show all references to {}", lens.section.id),
            arguments: vec![lens.section.clone()],
        });
        lens
    }

    /// Registers `handler` to be told when previously produced annotations may be outdated.
    #[must_use = "dropping the Subscription unsubscribes the handler immediately"]
    pub fn on_did_change_annotations<F>(&self, handler: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.notifier.subscribe(handler)
    }
}

/// Picker items for every reference to `section` in the corpus.
pub fn show_references(index: &CorpusIndex, section: &Section) -> Vec<ReferencePick> {
    index
        .query_references(&Scope::AllFiles, &ReferenceQuery::target(section))
        .into_iter()
        .map(|reference| ReferencePick {
            label: section.id.clone(),
            description: section.section_type.to_string(),
            reference,
        })
        .collect()
}
