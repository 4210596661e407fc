//! Discovering trigger types and attaching delegated listeners.
//!
//! A scan queries a subtree for actionable elements, unions their declared
//! trigger types (always including `click`), and attaches the dispatcher to
//! the configured root for every type not yet listened to. Attachment is
//! idempotent per type; the [`ListenedTriggers`] set only grows until the
//! engine is torn down.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::config::Config;
use crate::dom::{Document, Listener, ListenerId, NodeId};
use crate::trigger::DEFAULT_TRIGGER;

/// Tracing target for scan operations.
pub(crate) const SCAN_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::scan");

/// Unions the triggers declared by actionable elements in a subtree.
///
/// The result always contains [`DEFAULT_TRIGGER`], so elements inserted
/// later without a trigger attribute still dispatch on click.
#[must_use]
pub fn collect_triggers(document: &Document, subtree: NodeId, config: &Config) -> BTreeSet<String> {
    let mut triggers = BTreeSet::from([DEFAULT_TRIGGER.to_owned()]);
    for element in document.query_with_attribute(subtree, config.action_attr()) {
        if let Some(raw) = document.attribute(element, config.trigger_attr()) {
            triggers.extend(raw.split_whitespace().map(str::to_owned));
        }
    }
    triggers
}

/// Trigger types with a delegated listener attached to the root.
#[derive(Debug, Default)]
pub struct ListenedTriggers {
    listeners: BTreeMap<String, ListenerId>,
}

impl ListenedTriggers {
    /// Returns whether a listener is attached for the trigger.
    #[must_use]
    pub fn contains(&self, trigger: &str) -> bool {
        self.listeners.contains_key(trigger)
    }

    /// Returns the listened trigger types in sorted order.
    #[must_use]
    pub fn triggers(&self) -> Vec<String> {
        self.listeners.keys().cloned().collect()
    }

    /// Returns the number of listened trigger types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Returns `true` when nothing is listened to.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    fn insert(&mut self, trigger: String, id: ListenerId) {
        self.listeners.insert(trigger, id);
    }

    fn take(&mut self) -> BTreeMap<String, ListenerId> {
        std::mem::take(&mut self.listeners)
    }
}

/// Walks subtrees and keeps delegated listeners in step with the markup.
pub struct Scanner {
    document: Document,
    config: Rc<Config>,
    listener: Listener,
    listened: RefCell<ListenedTriggers>,
}

impl fmt::Debug for Scanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scanner")
            .field("root", &self.config.root())
            .field("listened", &self.listened.borrow())
            .finish_non_exhaustive()
    }
}

impl Scanner {
    /// Creates a scanner attaching `listener` for each discovered trigger.
    #[must_use]
    pub fn new(document: Document, config: Rc<Config>, listener: Listener) -> Self {
        Self {
            document,
            config,
            listener,
            listened: RefCell::new(ListenedTriggers::default()),
        }
    }

    /// Scans `subtree` and attaches listeners for new trigger types.
    ///
    /// Returns the trigger types that were newly attached.
    pub fn scan(&self, subtree: NodeId) -> Vec<String> {
        let triggers = collect_triggers(&self.document, subtree, &self.config);
        let mut listened = self.listened.borrow_mut();
        let mut attached = Vec::new();
        for trigger in triggers {
            if listened.contains(&trigger) {
                continue;
            }
            let id = self.document.add_event_listener(
                self.config.root(),
                trigger.clone(),
                true,
                Rc::clone(&self.listener),
            );
            debug!(target: SCAN_TARGET, trigger = %trigger, "attached delegated listener");
            listened.insert(trigger.clone(), id);
            attached.push(trigger);
        }
        debug!(
            target: SCAN_TARGET,
            subtree = %subtree,
            attached = attached.len(),
            listened = listened.len(),
            "scan complete"
        );
        attached
    }

    /// Detaches every delegated listener and clears the listened set.
    ///
    /// Returns how many listeners were detached.
    pub fn detach_all(&self) -> usize {
        let mut listened = self.listened.borrow_mut();
        let mut detached = 0;
        for (trigger, id) in listened.take() {
            if self.document.remove_event_listener(id) {
                detached += 1;
            }
            debug!(target: SCAN_TARGET, trigger = %trigger, "detached delegated listener");
        }
        detached
    }

    /// Returns the listened trigger types in sorted order.
    #[must_use]
    pub fn listened_triggers(&self) -> Vec<String> {
        self.listened.borrow().triggers()
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the scanned document.
    #[must_use]
    pub const fn document(&self) -> &Document {
        &self.document
    }
}
