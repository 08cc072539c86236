//! Change notification for the corpus index.
//!
//! Each [crate::index::CorpusIndex] owns a [ChangeNotifier]. Subscribers register a payload-free
//! handler and receive a [Subscription] guard; the handler stays registered until the guard is
//! dropped. Notifications are delivered synchronously, in registration order, on the thread that
//! performed the update. No debouncing is performed: every entry replacement or removal fires.
//!
//! Tools that need to know *what* changed can additionally attach a channel receiving
//! [IndexEvent]s via [crate::index::CorpusIndex::with_event_sender].

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
};
use url::Url;

use crate::properties::Fingerprint;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexEvent {
    /// A document entry was created or replaced
    DocumentIndexed {
        uri: Url,
        fingerprint: Fingerprint,
    },
    /// A document entry was removed from the corpus
    DocumentRemoved(Url),
}

impl IndexEvent {
    pub fn uri(&self) -> &Url {
        match self {
            IndexEvent::DocumentIndexed { uri, .. } => uri,
            IndexEvent::DocumentRemoved(uri) => uri,
        }
    }
}

impl Display for IndexEvent {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            IndexEvent::DocumentIndexed { .. } => write!(f, "DocumentIndexed"),
            IndexEvent::DocumentRemoved(_) => write!(f, "DocumentRemoved"),
        }
    }
}

type Handler = Arc<dyn Fn() + Send + Sync>;
type HandlerMap = RwLock<BTreeMap<u64, Handler>>;

/// Registry of change handlers.
#[derive(Default)]
pub struct ChangeNotifier {
    handlers: Arc<HandlerMap>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ChangeNotifier({} subscribers)", self.subscriber_count())
    }
}

impl ChangeNotifier {
    pub fn new() -> Self {
        ChangeNotifier::default()
    }

    /// Registers `handler`. It is called on every notification until the returned
    /// [Subscription] is dropped.
    #[must_use = "dropping the Subscription unsubscribes the handler immediately"]
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.write().insert(id, Arc::new(handler));
        tracing::trace!("[ChangeNotifier] subscriber {id} registered");
        Subscription {
            id,
            handlers: Arc::downgrade(&self.handlers),
        }
    }

    /// Calls every registered handler.
    ///
    /// The handler list is copied before delivery so that handlers may subscribe, unsubscribe or
    /// trigger further notifications without deadlocking.
    pub fn notify(&self) {
        let handlers: Vec<Handler> = self.handlers.read().values().cloned().collect();
        for handler in handlers {
            handler();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }
}

/// Scoped registration of a change handler. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    handlers: Weak<HandlerMap>,
}

impl Subscription {
    /// Explicitly unsubscribe. Equivalent to dropping the guard.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(handlers) = self.handlers.upgrade() {
            handlers.write().remove(&self.id);
            tracing::trace!("[ChangeNotifier] subscriber {} released", self.id);
        }
    }
}
