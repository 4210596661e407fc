//! Child-list mutation observation.

use std::rc::Rc;

use super::{Document, NodeId};

/// Callback receiving one batch of mutation records.
pub type MutationCallback = Rc<dyn Fn(&[MutationRecord])>;

/// Handle identifying a mutation observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// A single child-list change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// Node whose child list changed.
    pub target: NodeId,
    /// Nodes inserted under `target`.
    pub added_nodes: Vec<NodeId>,
    /// Nodes removed from `target`.
    pub removed_nodes: Vec<NodeId>,
}

impl MutationRecord {
    /// Record for a single insertion.
    #[must_use]
    pub fn added(target: NodeId, node: NodeId) -> Self {
        Self {
            target,
            added_nodes: vec![node],
            removed_nodes: Vec::new(),
        }
    }

    /// Record for a single removal.
    #[must_use]
    pub fn removed(target: NodeId, node: NodeId) -> Self {
        Self {
            target,
            added_nodes: Vec::new(),
            removed_nodes: vec![node],
        }
    }
}

struct ObserverEntry {
    id: ObserverId,
    target: NodeId,
    pending: Vec<MutationRecord>,
    callback: MutationCallback,
}

#[derive(Default)]
pub(super) struct ObserverTable {
    next_id: u64,
    entries: Vec<ObserverEntry>,
}

impl Document {
    /// Observes child-list changes anywhere in the subtree rooted at `target`.
    pub fn observe(&self, target: NodeId, callback: MutationCallback) -> ObserverId {
        let mut table = self.shared.observers.borrow_mut();
        let id = ObserverId(table.next_id);
        table.next_id += 1;
        table.entries.push(ObserverEntry {
            id,
            target,
            pending: Vec::new(),
            callback,
        });
        id
    }

    /// Stops an observer and drops its undelivered records; returns whether
    /// it was connected.
    pub fn disconnect(&self, id: ObserverId) -> bool {
        let mut table = self.shared.observers.borrow_mut();
        let before = table.entries.len();
        table.entries.retain(|entry| entry.id != id);
        table.entries.len() != before
    }

    /// Delivers every pending mutation batch.
    ///
    /// Callbacks may edit the tree; records produced meanwhile are delivered
    /// in a further round before this returns.
    pub fn flush_mutations(&self) {
        loop {
            let batches: Vec<(ObserverId, MutationCallback, Vec<MutationRecord>)> = self
                .shared
                .observers
                .borrow_mut()
                .entries
                .iter_mut()
                .filter(|entry| !entry.pending.is_empty())
                .map(|entry| {
                    (
                        entry.id,
                        Rc::clone(&entry.callback),
                        std::mem::take(&mut entry.pending),
                    )
                })
                .collect();
            if batches.is_empty() {
                return;
            }
            for (id, callback, records) in batches {
                if self.is_observing(id) {
                    callback(&records);
                }
            }
        }
    }

    fn is_observing(&self, id: ObserverId) -> bool {
        self.shared
            .observers
            .borrow()
            .entries
            .iter()
            .any(|entry| entry.id == id)
    }

    pub(super) fn queue_mutation(&self, record: MutationRecord) {
        let tree = self.shared.tree.borrow();
        let mut table = self.shared.observers.borrow_mut();
        for entry in &mut table.entries {
            if tree.contains(entry.target, record.target) {
                entry.pending.push(record.clone());
            }
        }
    }
}
