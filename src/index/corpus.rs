use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        mpsc::Sender,
        Arc,
    },
};
use url::Url;

use crate::{
    codec::{resolve, CorpusLookup, DocCodec, HclCodec},
    config::{IndexConfig, ResolveScope},
    document::TextDocument,
    event::{ChangeNotifier, IndexEvent, Subscription},
    index::{DocumentIndexEntry, DocumentState},
    properties::{Fingerprint, Position, Reference, Section, SectionKey},
    query::{ReferenceQuery, Scope, SectionQuery},
    IndexError,
};

/// The module a document belongs to: the directory containing it. URIs without a path hierarchy
/// (e.g. `untitled:Untitled-1`) form a module of their own.
pub fn module_of(uri: &Url) -> Url {
    if uri.cannot_be_a_base() {
        return uri.clone();
    }
    uri.join(".").unwrap_or_else(|_| uri.clone())
}

/// Work counters, for observing the incremental behavior of an index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Documents parsed into sections
    pub parsed: usize,
    /// Resolution passes, including re-resolution of stale documents
    pub resolved: usize,
    /// Entries stored
    pub commits: usize,
    pub removals: usize,
}

#[derive(Debug, Default)]
struct Counters {
    parsed: AtomicUsize,
    resolved: AtomicUsize,
    commits: AtomicUsize,
    removals: AtomicUsize,
}

#[derive(Debug, Default)]
struct CorpusTables {
    entries: BTreeMap<Url, Arc<DocumentIndexEntry>>,
    /// target -> every reference to it, across the corpus
    inverted: BTreeMap<SectionKey, BTreeSet<Reference>>,
    /// section id -> documents declaring it
    declarations: BTreeMap<String, BTreeSet<Url>>,
    /// unresolved section id -> documents waiting for a declaration
    pending: BTreeMap<String, BTreeSet<Url>>,
    stale: BTreeSet<Url>,
}

/// CorpusIndex: the live cross-reference index over a set of documents.
///
/// Invariants that hold between commits (checked by [CorpusIndex::check_consistency]):
///
/// 0. Every reference in an entry's forward list appears in the inverted index under its target,
///    and every reference in the inverted index appears in exactly one entry's forward list.
///
/// 1. The declaration table lists a document under an id iff the document's entry declares a
///    section with that id. The pending table likewise mirrors each entry's unresolved ids.
///
/// 2. Every target of a document that is not stale is declared by the document it points at.
///
/// Operational rules:
///
/// 1. Parsing and resolution never run under the table lock. The write lock is held only to
///    commit one document's new entry and its derived table rows.
///
/// 2. A commit never re-resolves other documents. It marks documents whose resolution it may have
///    invalidated as stale; those are re-resolved, from their stored text, before the next query
///    answer or when they are next requested.
///
/// 3. Re-indexes of one document are serialized by a per-document lock.
///
/// 4. Change handlers run after every lock has been released.
pub struct CorpusIndex {
    config: IndexConfig,
    codec: Arc<dyn DocCodec>,
    tables: RwLock<CorpusTables>,
    doc_locks: Mutex<HashMap<Url, Arc<Mutex<()>>>>,
    notifier: ChangeNotifier,
    events: Option<Sender<IndexEvent>>,
    counters: Counters,
    generation: AtomicU64,
}

impl std::fmt::Debug for CorpusIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.read();
        f.debug_struct("CorpusIndex")
            .field("config", &self.config)
            .field("documents", &tables.entries.len())
            .field("stale", &tables.stale.len())
            .field("notifier", &self.notifier)
            .finish()
    }
}

impl Default for CorpusIndex {
    fn default() -> Self {
        CorpusIndex::new()
    }
}

impl CorpusIndex {
    pub fn new() -> Self {
        CorpusIndex::with_config(IndexConfig::default())
    }

    pub fn with_config(config: IndexConfig) -> Self {
        CorpusIndex {
            config,
            codec: Arc::new(HclCodec),
            tables: RwLock::new(CorpusTables::default()),
            doc_locks: Mutex::new(HashMap::new()),
            notifier: ChangeNotifier::new(),
            events: None,
            counters: Counters::default(),
            generation: AtomicU64::new(0),
        }
    }

    /// Replaces the syntax used to parse and scan documents.
    pub fn with_codec<C: DocCodec + 'static>(mut self, codec: C) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Forwards an [IndexEvent] to `tx` for every entry replacement or removal.
    pub fn with_event_sender(mut self, tx: Sender<IndexEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            parsed: self.counters.parsed.load(Ordering::SeqCst),
            resolved: self.counters.resolved.load(Ordering::SeqCst),
            commits: self.counters.commits.load(Ordering::SeqCst),
            removals: self.counters.removals.load(Ordering::SeqCst),
        }
    }

    /// Registers a payload-free handler called after every entry replacement or removal.
    #[must_use = "dropping the Subscription unsubscribes the handler immediately"]
    pub fn on_did_change<F>(&self, handler: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.notifier.subscribe(handler)
    }

    pub fn subscriber_count(&self) -> usize {
        self.notifier.subscriber_count()
    }

    /// Returns the entry for `doc`, (re)indexing it first if it is untracked, its fingerprint
    /// changed, or it was marked stale.
    ///
    /// When the stored entry already matches the document's fingerprint and is not stale, the
    /// cached entry is returned without parsing, resolving or notifying.
    #[tracing::instrument(skip_all, fields(uri = %doc.uri()))]
    pub fn get_or_index_document<D: TextDocument + ?Sized>(
        &self,
        doc: &D,
    ) -> Arc<DocumentIndexEntry> {
        let uri = doc.uri();
        let fingerprint = doc.fingerprint();
        if let Some(entry) = self.current_entry(uri, &fingerprint) {
            return entry;
        }

        let doc_lock = self.document_lock(uri);
        let guard = doc_lock.lock();
        // Another caller may have indexed this fingerprint while we waited for the lock.
        let observed = {
            let tables = self.tables.read();
            let observed = tables.entries.get(uri).cloned();
            if let Some(entry) = &observed {
                if entry.fingerprint == fingerprint && !tables.stale.contains(uri) {
                    return entry.clone();
                }
            }
            observed
        };
        let (entry, event) = match observed {
            Some(current) if current.fingerprint == fingerprint => self.re_resolve(current),
            observed => {
                let entry = self.index_text(uri, fingerprint, doc.text(), observed);
                let event = IndexEvent::DocumentIndexed {
                    uri: uri.clone(),
                    fingerprint: entry.fingerprint.clone(),
                };
                (entry, Some(event))
            }
        };
        drop(guard);

        if let Some(event) = event {
            self.announce(event);
        }
        entry
    }

    /// Deletes the entry for `uri` and every reference, declaration and pending id derived from
    /// it. Returns the removed entry, or `None` if the document was not tracked.
    #[tracing::instrument(skip_all, fields(uri = %uri))]
    pub fn remove_document(&self, uri: &Url) -> Option<Arc<DocumentIndexEntry>> {
        let doc_lock = self.document_lock(uri);
        let guard = doc_lock.lock();
        let removed = {
            let mut tables = self.tables.write();
            let Some(removed) = tables.entries.remove(uri) else {
                drop(tables);
                drop(guard);
                drop(doc_lock);
                self.prune_document_locks();
                return None;
            };
            unlink(&mut tables, &removed);
            let mut dependents = BTreeSet::new();
            for id in removed.declared_ids() {
                collect_referrers(&tables, &SectionKey::new(uri.clone(), id), uri, &mut dependents);
            }
            tables.stale.remove(uri);
            mark_stale(&mut tables, dependents);
            removed
        };
        self.counters.removals.fetch_add(1, Ordering::SeqCst);
        drop(guard);
        drop(doc_lock);
        self.prune_document_locks();

        tracing::info!("Removed {} from the corpus", uri);
        self.announce(IndexEvent::DocumentRemoved(uri.clone()));
        Some(removed)
    }

    pub fn document_state(&self, uri: &Url) -> DocumentState {
        let tables = self.tables.read();
        if !tables.entries.contains_key(uri) {
            DocumentState::Untracked
        } else if tables.stale.contains(uri) {
            DocumentState::Stale
        } else {
            DocumentState::Indexed
        }
    }

    /// References to `query.target`, sorted by referencing document then position.
    ///
    /// [Scope::AllFiles] reads the inverted index; [Scope::Document] filters that document's own
    /// forward list. Untracked documents and undeclared targets yield an empty result.
    #[tracing::instrument(skip_all, fields(target = %query.target))]
    pub fn query_references(&self, scope: &Scope, query: &ReferenceQuery) -> Vec<Reference> {
        self.refresh_stale();
        let tables = self.tables.read();
        match scope {
            Scope::AllFiles => tables
                .inverted
                .get(&query.target)
                .map(|refs| refs.iter().cloned().collect())
                .unwrap_or_default(),
            Scope::Document(uri) => {
                let Some(entry) = tables.entries.get(uri) else {
                    return Vec::new();
                };
                let mut refs: Vec<Reference> =
                    entry.references_to(&query.target).cloned().collect();
                refs.sort();
                refs
            }
        }
    }

    /// Sections matching `query`, sorted by document then position.
    pub fn query_sections(&self, scope: &Scope, query: &SectionQuery) -> Vec<Section> {
        self.refresh_stale();
        let tables = self.tables.read();
        tables
            .entries
            .iter()
            .filter(|(uri, _)| scope.includes(uri))
            .flat_map(|(_, entry)| entry.sections.iter())
            .filter(|section| query.matches(section))
            .cloned()
            .collect()
    }

    /// The current declaration of `key`, if its document is tracked and still declares it.
    pub fn section(&self, key: &SectionKey) -> Option<Section> {
        let tables = self.tables.read();
        tables.entries.get(&key.uri)?.section(&key.id).cloned()
    }

    /// The stored entry for `uri`. Unlike [CorpusIndex::get_or_index_document] this never
    /// re-indexes, so the entry may be stale (see [CorpusIndex::document_state]).
    pub fn entry(&self, uri: &Url) -> Option<Arc<DocumentIndexEntry>> {
        self.tables.read().entries.get(uri).cloned()
    }

    /// Tracked documents, in URI order.
    pub fn documents(&self) -> Vec<Url> {
        self.tables.read().entries.keys().cloned().collect()
    }

    pub fn section_at(&self, uri: &Url, pos: Position) -> Option<Section> {
        let tables = self.tables.read();
        tables.entries.get(uri)?.section_at(pos).cloned()
    }

    pub fn reference_at(&self, uri: &Url, pos: Position) -> Option<Reference> {
        let entry = self.refresh(uri)?;
        entry.reference_at(pos).cloned()
    }

    /// The section referenced by the expression at `pos`.
    pub fn find_definition(&self, uri: &Url, pos: Position) -> Option<Section> {
        let reference = self.reference_at(uri, pos)?;
        self.section(&reference.target)
    }

    /// Re-resolves every document currently marked stale.
    ///
    /// Each document is processed once per call. A commit racing with this pass may leave new
    /// marks behind; those are handled by the next pass.
    pub fn refresh_stale(&self) {
        let stale: Vec<Url> = self.tables.read().stale.iter().cloned().collect();
        if stale.is_empty() {
            return;
        }
        tracing::debug!("Re-resolving {} stale document(s)", stale.len());
        for uri in stale {
            self.refresh(&uri);
        }
    }

    /// Verifies the table invariants listed on [CorpusIndex].
    ///
    /// Caution! This walks every table and is meant for tests and diagnostics.
    pub fn check_consistency(&self) -> Result<(), IndexError> {
        let errors = self.consistency_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            for error in errors.iter() {
                tracing::warn!("{error}");
            }
            Err(IndexError::Inconsistent(errors.join("; ")))
        }
    }

    fn consistency_errors(&self) -> Vec<String> {
        let tables = self.tables.read();
        let mut errors = Vec::new();

        let mut forward_count = 0;
        for (uri, entry) in tables.entries.iter() {
            if entry.uri != *uri {
                errors.push(format!(
                    "[CorpusIndex::check_consistency] entry for {uri} carries uri {}",
                    entry.uri
                ));
            }
            if entry.declared_ids().len() != entry.sections.len() {
                errors.push(format!(
                    "[CorpusIndex::check_consistency] {uri} declares duplicate section ids"
                ));
            }
            for reference in entry.references.iter() {
                forward_count += 1;
                let indexed = tables
                    .inverted
                    .get(&reference.target)
                    .is_some_and(|refs| refs.contains(reference));
                if !indexed {
                    errors.push(format!(
                        "[CorpusIndex::check_consistency invariant 0] {reference} is missing from \
                         the inverted index"
                    ));
                }
                if tables.stale.contains(uri) {
                    continue;
                }
                let declared = tables
                    .entries
                    .get(&reference.target.uri)
                    .is_some_and(|target| target.section(&reference.target.id).is_some());
                if !declared {
                    errors.push(format!(
                        "[CorpusIndex::check_consistency invariant 2] {reference} points at an \
                         undeclared section"
                    ));
                }
            }
            for id in entry.declared_ids() {
                if !tables.declarations.get(id).is_some_and(|d| d.contains(uri)) {
                    errors.push(format!(
                        "[CorpusIndex::check_consistency invariant 1] declaration {id} of {uri} \
                         is not in the declaration table"
                    ));
                }
            }
            for id in entry.unresolved_ids() {
                if !tables.pending.get(id).is_some_and(|d| d.contains(uri)) {
                    errors.push(format!(
                        "[CorpusIndex::check_consistency invariant 1] unresolved {id} of {uri} \
                         is not in the pending table"
                    ));
                }
            }
        }

        let mut inverted_count = 0;
        for (target, refs) in tables.inverted.iter() {
            for reference in refs.iter() {
                inverted_count += 1;
                if reference.target != *target {
                    errors.push(format!(
                        "[CorpusIndex::check_consistency invariant 0] {reference} is filed under \
                         {target}"
                    ));
                }
                let owned = tables
                    .entries
                    .get(&reference.location.uri)
                    .is_some_and(|entry| entry.references.contains(reference));
                if !owned {
                    errors.push(format!(
                        "[CorpusIndex::check_consistency invariant 0] {reference} has no \
                         originating entry"
                    ));
                }
            }
        }
        if inverted_count != forward_count {
            errors.push(format!(
                "[CorpusIndex::check_consistency invariant 0] {forward_count} forward references \
                 but {inverted_count} inverted references"
            ));
        }

        for (table, rows) in [("declaration", &tables.declarations), ("pending", &tables.pending)] {
            for (id, uris) in rows.iter() {
                for uri in uris.iter() {
                    let listed = tables.entries.get(uri).is_some_and(|entry| {
                        if table == "declaration" {
                            entry.section(id).is_some()
                        } else {
                            entry.unresolved.iter().any(|u| u.target_id == *id)
                        }
                    });
                    if !listed {
                        errors.push(format!(
                            "[CorpusIndex::check_consistency invariant 1] {table} table lists \
                             {uri} under {id}"
                        ));
                    }
                }
            }
        }

        for uri in tables.stale.iter() {
            if !tables.entries.contains_key(uri) {
                errors.push(format!(
                    "[CorpusIndex::check_consistency] untracked document {uri} is marked stale"
                ));
            }
        }
        errors
    }

    fn current_entry(&self, uri: &Url, fingerprint: &Fingerprint) -> Option<Arc<DocumentIndexEntry>> {
        let tables = self.tables.read();
        let entry = tables.entries.get(uri)?;
        (entry.fingerprint == *fingerprint && !tables.stale.contains(uri)).then(|| entry.clone())
    }

    fn document_lock(&self, uri: &Url) -> Arc<Mutex<()>> {
        self.doc_locks
            .lock()
            .entry(uri.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    #[cfg(test)]
    pub(crate) fn document_lock_count(&self) -> usize {
        self.doc_locks.lock().len()
    }

    /// Drops per-document locks nobody holds.
    fn prune_document_locks(&self) {
        self.doc_locks
            .lock()
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// Parses and resolves `text`, then commits the new entry. Caller holds the document lock.
    fn index_text(
        &self,
        uri: &Url,
        fingerprint: Fingerprint,
        text: &str,
        observed: Option<Arc<DocumentIndexEntry>>,
    ) -> Arc<DocumentIndexEntry> {
        let sections = self.codec.parse(uri, text);
        self.counters.parsed.fetch_add(1, Ordering::SeqCst);
        let resolution = resolve(uri, &sections, text, self.codec.as_ref(), self);
        self.counters.resolved.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            "Indexed {} sections, {} references ({} unresolved) at {}",
            sections.len(),
            resolution.references.len(),
            resolution.unresolved.len(),
            fingerprint
        );
        let entry = DocumentIndexEntry {
            uri: uri.clone(),
            fingerprint,
            text: Arc::from(text),
            sections,
            references: resolution.references,
            unresolved: resolution.unresolved,
            generation: 0,
        };
        self.commit(entry, observed.as_ref())
    }

    /// Re-resolves a stale entry from its stored text. Caller holds the document lock.
    ///
    /// Returns an event only if the resolution changed and a new entry was committed.
    fn re_resolve(
        &self,
        current: Arc<DocumentIndexEntry>,
    ) -> (Arc<DocumentIndexEntry>, Option<IndexEvent>) {
        let uri = &current.uri;
        let resolution = resolve(
            uri,
            &current.sections,
            &current.text,
            self.codec.as_ref(),
            self,
        );
        self.counters.resolved.fetch_add(1, Ordering::SeqCst);

        if resolution.references == current.references && resolution.unresolved == current.unresolved
        {
            let mut tables = self.tables.write();
            let unchanged = tables
                .entries
                .get(uri)
                .is_some_and(|stored| Arc::ptr_eq(stored, &current));
            if unchanged && !needs_resolution(&tables, &self.config, &current) {
                tables.stale.remove(uri);
                tracing::debug!("Re-resolution of {} is unchanged", uri);
            }
            return (current, None);
        }

        tracing::debug!(
            "Re-resolved {}: {} references ({} unresolved)",
            uri,
            resolution.references.len(),
            resolution.unresolved.len()
        );
        let entry = DocumentIndexEntry {
            uri: uri.clone(),
            fingerprint: current.fingerprint.clone(),
            text: current.text.clone(),
            sections: current.sections.clone(),
            references: resolution.references,
            unresolved: resolution.unresolved,
            generation: 0,
        };
        let entry = self.commit(entry, Some(&current));
        let event = IndexEvent::DocumentIndexed {
            uri: entry.uri.clone(),
            fingerprint: entry.fingerprint.clone(),
        };
        (entry, Some(event))
    }

    /// Re-resolves `uri` if it is stale and returns its current entry.
    fn refresh(&self, uri: &Url) -> Option<Arc<DocumentIndexEntry>> {
        // Untracked or fresh documents never need the document lock.
        {
            let tables = self.tables.read();
            let current = tables.entries.get(uri)?;
            if !tables.stale.contains(uri) {
                return Some(current.clone());
            }
        }
        let doc_lock = self.document_lock(uri);
        let guard = doc_lock.lock();
        let current = {
            let tables = self.tables.read();
            let current = tables.entries.get(uri).cloned();
            match current {
                Some(current) if tables.stale.contains(uri) => current,
                current => {
                    // Refreshed or removed while waiting for the lock.
                    drop(tables);
                    drop(guard);
                    drop(doc_lock);
                    if current.is_none() {
                        self.prune_document_locks();
                    }
                    return current;
                }
            }
        };
        let (entry, event) = self.re_resolve(current);
        drop(guard);
        if let Some(event) = event {
            self.announce(event);
        }
        Some(entry)
    }

    /// Stores `entry`, replacing the document's previous entry and all rows derived from it, and
    /// marks dependents stale. `observed` is the entry the caller saw under the document lock.
    fn commit(
        &self,
        mut entry: DocumentIndexEntry,
        observed: Option<&Arc<DocumentIndexEntry>>,
    ) -> Arc<DocumentIndexEntry> {
        let uri = entry.uri.clone();
        let mut tables = self.tables.write();
        let previous = tables.entries.remove(&uri);

        let overlapping = match (previous.as_ref(), observed) {
            (Some(stored), Some(seen)) => !Arc::ptr_eq(stored, seen),
            (None, None) => false,
            _ => true,
        };
        debug_assert!(
            !overlapping,
            "overlapping re-index of {uri}: the stored entry changed under the document lock"
        );
        if overlapping {
            tracing::error!(
                "Overlapping re-index of {}: applying the latest commit over an unobserved entry",
                uri
            );
        }

        let old_ids: BTreeSet<String> = previous
            .as_ref()
            .map(|prev| prev.sections.iter().map(|s| s.id.clone()).collect())
            .unwrap_or_default();
        if let Some(prev) = previous.as_ref() {
            unlink(&mut tables, prev);
        }
        let new_ids: BTreeSet<String> = entry.sections.iter().map(|s| s.id.clone()).collect();

        let mut dependents = BTreeSet::new();
        for removed in old_ids.difference(&new_ids) {
            collect_referrers(
                &tables,
                &SectionKey::new(uri.clone(), removed.clone()),
                &uri,
                &mut dependents,
            );
        }
        for added in new_ids.difference(&old_ids) {
            if let Some(waiting) = tables.pending.get(added) {
                dependents.extend(
                    waiting
                        .iter()
                        .filter(|doc| **doc != uri && in_scope(&self.config, doc, &uri))
                        .cloned(),
                );
            }
            // A declaration in a smaller URI takes precedence over ones already resolved to.
            let shadowed: Vec<Url> = tables
                .declarations
                .get(added)
                .map(|decls| decls.iter().filter(|d| **d > uri).cloned().collect())
                .unwrap_or_default();
            for other in shadowed {
                let key = SectionKey::new(other, added.clone());
                if let Some(refs) = tables.inverted.get(&key) {
                    dependents.extend(
                        refs.iter()
                            .map(|r| &r.location.uri)
                            .filter(|doc| **doc != uri && in_scope(&self.config, doc, &uri))
                            .cloned(),
                    );
                }
            }
        }

        entry.generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let entry = Arc::new(entry);
        link(&mut tables, &entry);
        tables.entries.insert(uri.clone(), entry.clone());
        tables.stale.remove(&uri);
        if !dependents.is_empty() {
            tracing::debug!("Commit of {} marks {} dependent(s) stale", uri, dependents.len());
        }
        mark_stale(&mut tables, dependents);
        if needs_resolution(&tables, &self.config, &entry) {
            tracing::debug!("{} changed under resolution, marking stale", uri);
            tables.stale.insert(uri.clone());
        }
        self.counters.commits.fetch_add(1, Ordering::SeqCst);
        entry
    }

    fn announce(&self, event: IndexEvent) {
        tracing::debug!("{} {}", event, event.uri());
        if let Err(e) = self.emit(event) {
            tracing::warn!("Could not forward index event: {e}");
        }
        self.notifier.notify();
    }

    fn emit(&self, event: IndexEvent) -> Result<(), IndexError> {
        if let Some(tx) = self.events.as_ref() {
            tx.send(event)?;
        }
        Ok(())
    }
}

impl CorpusLookup for CorpusIndex {
    fn lookup(&self, from: &Url, id: &str) -> Option<SectionKey> {
        let tables = self.tables.read();
        lookup_in(&tables, &self.config, from, id)
    }
}

fn in_scope(config: &IndexConfig, from: &Url, candidate: &Url) -> bool {
    match config.resolve_scope {
        ResolveScope::Corpus => true,
        ResolveScope::Module => module_of(from) == module_of(candidate),
    }
}

/// Smallest in-scope document other than `from` declaring `id`.
fn lookup_in(
    tables: &CorpusTables,
    config: &IndexConfig,
    from: &Url,
    id: &str,
) -> Option<SectionKey> {
    tables
        .declarations
        .get(id)?
        .iter()
        .find(|uri| *uri != from && in_scope(config, from, uri))
        .map(|uri| SectionKey::new(uri.clone(), id))
}

/// True if resolving `entry` against the current tables would give a different result.
fn needs_resolution(tables: &CorpusTables, config: &IndexConfig, entry: &DocumentIndexEntry) -> bool {
    let moved = entry.references.iter().any(|r| {
        r.target.uri != entry.uri
            && lookup_in(tables, config, &entry.uri, &r.target.id).as_ref() != Some(&r.target)
    });
    moved
        || entry
            .unresolved
            .iter()
            .any(|u| lookup_in(tables, config, &entry.uri, &u.target_id).is_some())
}

/// Documents other than `except` holding references to `key`.
fn collect_referrers(
    tables: &CorpusTables,
    key: &SectionKey,
    except: &Url,
    into: &mut BTreeSet<Url>,
) {
    if let Some(refs) = tables.inverted.get(key) {
        into.extend(
            refs.iter()
                .map(|r| &r.location.uri)
                .filter(|doc| *doc != except)
                .cloned(),
        );
    }
}

fn mark_stale(tables: &mut CorpusTables, dependents: BTreeSet<Url>) {
    for uri in dependents {
        if tables.entries.contains_key(&uri) {
            tables.stale.insert(uri);
        }
    }
}

fn link(tables: &mut CorpusTables, entry: &DocumentIndexEntry) {
    for reference in entry.references.iter() {
        tables
            .inverted
            .entry(reference.target.clone())
            .or_default()
            .insert(reference.clone());
    }
    for section in entry.sections.iter() {
        tables
            .declarations
            .entry(section.id.clone())
            .or_default()
            .insert(entry.uri.clone());
    }
    for unresolved in entry.unresolved.iter() {
        tables
            .pending
            .entry(unresolved.target_id.clone())
            .or_default()
            .insert(entry.uri.clone());
    }
}

fn unlink(tables: &mut CorpusTables, entry: &DocumentIndexEntry) {
    for reference in entry.references.iter() {
        if let Some(refs) = tables.inverted.get_mut(&reference.target) {
            refs.remove(reference);
            if refs.is_empty() {
                tables.inverted.remove(&reference.target);
            }
        }
    }
    for section in entry.sections.iter() {
        remove_row(&mut tables.declarations, &section.id, &entry.uri);
    }
    for unresolved in entry.unresolved.iter() {
        remove_row(&mut tables.pending, &unresolved.target_id, &entry.uri);
    }
}

fn remove_row(table: &mut BTreeMap<String, BTreeSet<Url>>, id: &str, uri: &Url) {
    if let Some(uris) = table.get_mut(id) {
        uris.remove(uri);
        if uris.is_empty() {
            table.remove(id);
        }
    }
}
