//! Events, listeners and propagation.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use super::{Document, DomError, NodeId};

/// Callback attached to a node for one event type.
pub type Listener = Rc<dyn Fn(&Event)>;

/// Handle identifying an attached listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Propagation phase an event is currently in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EventPhase {
    /// Not being dispatched.
    #[default]
    None,
    /// Travelling from the document node towards the target.
    Capturing,
    /// Being delivered to listeners on the target itself.
    AtTarget,
    /// Travelling from the target back towards the document node.
    Bubbling,
}

#[derive(Debug)]
struct EventState {
    event_type: String,
    target: NodeId,
    current_target: Cell<Option<NodeId>>,
    phase: Cell<EventPhase>,
    propagation_stopped: Cell<bool>,
    immediate_stopped: Cell<bool>,
    default_prevented: Cell<bool>,
}

/// A dispatched event.
///
/// Clones share state, so a listener that stops propagation on its copy
/// stops the dispatch in progress.
#[derive(Clone)]
pub struct Event {
    state: Rc<EventState>,
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("type", &self.state.event_type)
            .field("target", &self.state.target)
            .field("phase", &self.state.phase.get())
            .finish_non_exhaustive()
    }
}

impl Event {
    /// Creates an event of the given type aimed at `target`.
    pub fn new(event_type: impl Into<String>, target: NodeId) -> Self {
        Self {
            state: Rc::new(EventState {
                event_type: event_type.into(),
                target,
                current_target: Cell::new(None),
                phase: Cell::new(EventPhase::None),
                propagation_stopped: Cell::new(false),
                immediate_stopped: Cell::new(false),
                default_prevented: Cell::new(false),
            }),
        }
    }

    /// Returns the event type, e.g. `click`.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.state.event_type
    }

    /// Returns the node the event was dispatched at.
    #[must_use]
    pub fn target(&self) -> NodeId {
        self.state.target
    }

    /// Returns the node whose listeners are currently running.
    #[must_use]
    pub fn current_target(&self) -> Option<NodeId> {
        self.state.current_target.get()
    }

    /// Returns the current propagation phase.
    #[must_use]
    pub fn phase(&self) -> EventPhase {
        self.state.phase.get()
    }

    /// Prevents the event from reaching further nodes.
    pub fn stop_propagation(&self) {
        self.state.propagation_stopped.set(true);
    }

    /// Prevents the event from reaching further listeners, including those on
    /// the current node.
    pub fn stop_immediate_propagation(&self) {
        self.state.propagation_stopped.set(true);
        self.state.immediate_stopped.set(true);
    }

    /// Returns whether propagation was stopped.
    #[must_use]
    pub fn propagation_stopped(&self) -> bool {
        self.state.propagation_stopped.get()
    }

    /// Marks the default action as cancelled.
    pub fn prevent_default(&self) {
        self.state.default_prevented.set(true);
    }

    /// Returns whether the default action was cancelled.
    #[must_use]
    pub fn default_prevented(&self) -> bool {
        self.state.default_prevented.get()
    }

    fn enter(&self, node: Option<NodeId>, phase: EventPhase) {
        self.state.current_target.set(node);
        self.state.phase.set(phase);
    }
}

struct ListenerEntry {
    id: ListenerId,
    target: NodeId,
    event_type: String,
    capture: bool,
    callback: Listener,
}

#[derive(Default)]
pub(super) struct ListenerTable {
    next_id: u64,
    entries: Vec<ListenerEntry>,
}

impl ListenerTable {
    fn matching(&self, target: NodeId, event_type: &str, capture: bool) -> Vec<(ListenerId, Listener)> {
        self.entries
            .iter()
            .filter(|entry| {
                entry.target == target && entry.capture == capture && entry.event_type == event_type
            })
            .map(|entry| (entry.id, Rc::clone(&entry.callback)))
            .collect()
    }

    fn is_attached(&self, id: ListenerId) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }
}

impl Document {
    /// Attaches a listener for `event_type` on `target`.
    ///
    /// Capturing listeners run while the event travels down towards its
    /// target; the others run at the target and while it bubbles back up.
    pub fn add_event_listener(
        &self,
        target: NodeId,
        event_type: impl Into<String>,
        capture: bool,
        callback: Listener,
    ) -> ListenerId {
        let mut table = self.shared.listeners.borrow_mut();
        let id = ListenerId(table.next_id);
        table.next_id += 1;
        table.entries.push(ListenerEntry {
            id,
            target,
            event_type: event_type.into(),
            capture,
            callback,
        });
        id
    }

    /// Detaches a listener; returns whether it was attached.
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut table = self.shared.listeners.borrow_mut();
        let before = table.entries.len();
        table.entries.retain(|entry| entry.id != id);
        table.entries.len() != before
    }

    /// Returns how many listeners are attached to `target` for `event_type`.
    #[must_use]
    pub fn listener_count(&self, target: NodeId, event_type: &str) -> usize {
        self.shared
            .listeners
            .borrow()
            .entries
            .iter()
            .filter(|entry| entry.target == target && entry.event_type == event_type)
            .count()
    }

    /// Dispatches an event at `target` through capture, target and bubble
    /// phases, returning the event once propagation has finished.
    ///
    /// # Errors
    ///
    /// Returns [`DomError::UnknownNode`] for identifiers outside this
    /// document.
    pub fn dispatch_event(
        &self,
        target: NodeId,
        event_type: impl Into<String>,
    ) -> Result<Event, DomError> {
        self.shared.tree.borrow().node(target)?;
        self.flush_mutations();

        let event = Event::new(event_type, target);
        let path = self.propagation_path(target);

        for node in path.iter().rev() {
            if event.propagation_stopped() {
                break;
            }
            self.invoke(*node, &event, EventPhase::Capturing, true);
        }
        if !event.propagation_stopped() {
            self.invoke(target, &event, EventPhase::AtTarget, true);
        }
        if !event.propagation_stopped() {
            self.invoke(target, &event, EventPhase::AtTarget, false);
        }
        for node in &path {
            if event.propagation_stopped() {
                break;
            }
            self.invoke(*node, &event, EventPhase::Bubbling, false);
        }

        event.enter(None, EventPhase::None);
        Ok(event)
    }

    /// Ancestors of `target`, nearest first, excluding `target`.
    fn propagation_path(&self, target: NodeId) -> Vec<NodeId> {
        let tree = self.shared.tree.borrow();
        let mut path = Vec::new();
        let mut cursor = tree.parent(target);
        while let Some(node) = cursor {
            path.push(node);
            cursor = tree.parent(node);
        }
        path
    }

    fn invoke(&self, node: NodeId, event: &Event, phase: EventPhase, capture: bool) {
        let listeners = self
            .shared
            .listeners
            .borrow()
            .matching(node, event.event_type(), capture);
        if listeners.is_empty() {
            return;
        }

        event.enter(Some(node), phase);
        for (id, callback) in listeners {
            if event.state.immediate_stopped.get() {
                break;
            }
            if !self.shared.listeners.borrow().is_attached(id) {
                continue;
            }
            callback(event);
            self.flush_mutations();
        }
    }
}
