//! Re-scanning subtrees inserted after initialisation.
//!
//! The [`Watcher`] subscribes to child-list mutations under the configured
//! root. Each batch is classified by [`inserted_action_roots`]: inserted
//! elements that carry the action attribute, or contain a descendant that
//! does, are re-scanned; text nodes and unrelated elements are skipped.
//!
//! Classification only needs the records, so hosts and tests can feed
//! synthetic batches through [`rescan_inserted`] without a live observer.

use std::rc::{Rc, Weak};

use tracing::debug;

use crate::config::Config;
use crate::dom::{Document, MutationRecord, NodeId, ObserverId};
use crate::scanner::Scanner;

/// Tracing target for watcher operations.
pub(crate) const WATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::watch");

/// Selects inserted elements whose subtree holds actionable elements.
///
/// Nodes appear once, in record order.
#[must_use]
pub fn inserted_action_roots(
    document: &Document,
    records: &[MutationRecord],
    config: &Config,
) -> Vec<NodeId> {
    let mut roots: Vec<NodeId> = Vec::new();
    for node in records.iter().flat_map(|record| &record.added_nodes) {
        if roots.contains(node) || !document.is_element(*node) {
            continue;
        }
        // Inclusive query: covers the node itself and its descendants.
        if !document
            .query_with_attribute(*node, config.action_attr())
            .is_empty()
        {
            roots.push(*node);
        }
    }
    roots
}

/// Re-scans every qualifying inserted subtree; returns the scanned roots.
pub fn rescan_inserted(scanner: &Scanner, records: &[MutationRecord]) -> Vec<NodeId> {
    let roots = inserted_action_roots(scanner.document(), records, scanner.config());
    for root in &roots {
        let attached = scanner.scan(*root);
        debug!(
            target: WATCH_TARGET,
            subtree = %root,
            attached = ?attached,
            "re-scanned inserted subtree"
        );
    }
    roots
}

/// Live subscription to mutations under the configured root.
///
/// Dropping the watcher disconnects the observer.
#[derive(Debug)]
pub struct Watcher {
    document: Document,
    observer: ObserverId,
}

impl Watcher {
    /// Starts observing the scanner's root.
    ///
    /// The subscription holds a weak reference, so it never keeps the
    /// scanner alive.
    #[must_use]
    pub fn start(scanner: &Rc<Scanner>) -> Self {
        let document = scanner.document().clone();
        let root = scanner.config().root();
        let weak: Weak<Scanner> = Rc::downgrade(scanner);
        let observer = document.observe(
            root,
            Rc::new(move |records: &[MutationRecord]| {
                if let Some(scanner) = weak.upgrade() {
                    rescan_inserted(&scanner, records);
                }
            }),
        );
        debug!(target: WATCH_TARGET, root = %root, "watching for inserted subtrees");
        Self { document, observer }
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        if self.document.disconnect(self.observer) {
            debug!(target: WATCH_TARGET, "stopped watching");
        }
    }
}
