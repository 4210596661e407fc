//! In-memory host document.
//!
//! The dispatch engine treats the document tree as an external collaborator:
//! it reads attributes, walks ancestors, attaches delegated listeners and
//! subscribes to child-list mutations. [`Document`] provides exactly that
//! surface over a single-threaded arena so that a browser binding or a test
//! harness can drive the engine without a real DOM.
//!
//! A [`Document`] is a cheap handle; clones share the same tree, listener
//! table, observer table and task queue. Nothing here is `Send`: the model is
//! a single UI thread driven by discrete events.
//!
//! Mutation records are not delivered synchronously. They queue per observer
//! and are handed over at the next checkpoint: before an event is dispatched,
//! after every listener callback, or when [`Document::flush_mutations`] is
//! called explicitly.

mod event;
mod mutation;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use futures::executor::{LocalPool, LocalSpawner};
use thiserror::Error;

pub use self::event::{Event, EventPhase, Listener, ListenerId};
pub use self::mutation::{MutationCallback, MutationRecord, ObserverId};

use self::event::ListenerTable;
use self::mutation::ObserverTable;

/// Identifier of a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Coarse classification of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// The document node at the top of the tree.
    Document,
    /// An element carrying a tag name and attributes.
    Element,
    /// A text node.
    Text,
}

/// Errors raised by tree edits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    /// The node identifier does not belong to this document.
    #[error("unknown node {node}")]
    UnknownNode {
        /// Identifier that was looked up.
        node: NodeId,
    },

    /// The edit would produce an invalid tree.
    #[error("cannot insert {child} under {parent}: {reason}")]
    HierarchyRequest {
        /// Prospective parent.
        parent: NodeId,
        /// Node being inserted.
        child: NodeId,
        /// Why the insertion was refused.
        reason: &'static str,
    },

    /// An element-only operation was attempted on another node kind.
    #[error("node {node} is not an element")]
    NotAnElement {
        /// Offending node.
        node: NodeId,
    },

    /// The node is not a child of the given parent.
    #[error("node {child} is not a child of {parent}")]
    NotAChild {
        /// Parent that was named.
        parent: NodeId,
        /// Node that was expected among its children.
        child: NodeId,
    },
}

impl DomError {
    fn hierarchy(parent: NodeId, child: NodeId, reason: &'static str) -> Self {
        Self::HierarchyRequest {
            parent,
            child,
            reason,
        }
    }
}

#[derive(Debug)]
enum NodeData {
    Document,
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

#[derive(Debug)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                data: NodeData::Document,
            }],
        }
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            data,
        });
        id
    }

    fn node(&self, id: NodeId) -> Result<&Node, DomError> {
        self.nodes.get(id.0).ok_or(DomError::UnknownNode { node: id })
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DomError> {
        self.nodes
            .get_mut(id.0)
            .ok_or(DomError::UnknownNode { node: id })
    }

    fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|node| node.parent)
    }

    fn attributes(&self, id: NodeId) -> Option<&[(String, String)]> {
        match &self.nodes.get(id.0)?.data {
            NodeData::Element { attributes, .. } => Some(attributes),
            NodeData::Document | NodeData::Text(_) => None,
        }
    }

    fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)?
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    fn detach(&mut self, child: NodeId) -> Result<Option<NodeId>, DomError> {
        let Some(parent) = self.node(child)?.parent else {
            return Ok(None);
        };
        self.node_mut(parent)?.children.retain(|id| *id != child);
        self.node_mut(child)?.parent = None;
        Ok(Some(parent))
    }

    /// Preorder walk over an explicit stack; nesting depth is unbounded.
    fn collect_with_attribute(&self, subtree: NodeId, name: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut pending = vec![subtree];
        while let Some(id) = pending.pop() {
            if self.attribute(id, name).is_some() {
                found.push(id);
            }
            if let Some(node) = self.nodes.get(id.0) {
                // Reversed so the first child is visited next.
                pending.extend(node.children.iter().rev().copied());
            }
        }
        found
    }
}

struct Shared {
    tree: RefCell<Tree>,
    listeners: RefCell<ListenerTable>,
    observers: RefCell<ObserverTable>,
    tasks: RefCell<LocalPool>,
    spawner: LocalSpawner,
}

/// Shared handle to an in-memory document tree.
///
/// # Example
///
/// ```
/// use tl_actions::dom::Document;
///
/// let document = Document::new();
/// let button = document.create_element("button");
/// document.set_attribute(button, "data-tl-action", "cart:add")?;
/// document.append_child(document.root(), button)?;
/// assert!(document.contains(document.root(), button));
/// # Ok::<(), tl_actions::dom::DomError>(())
/// ```
#[derive(Clone)]
pub struct Document {
    shared: Rc<Shared>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.shared.tree.borrow().nodes.len())
            .finish_non_exhaustive()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates an empty document containing only the document node.
    #[must_use]
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            shared: Rc::new(Shared {
                tree: RefCell::new(Tree::new()),
                listeners: RefCell::new(ListenerTable::default()),
                observers: RefCell::new(ObserverTable::default()),
                tasks: RefCell::new(pool),
                spawner,
            }),
        }
    }

    /// Returns the document node.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Creates a detached element.
    pub fn create_element(&self, tag: impl Into<String>) -> NodeId {
        self.shared.tree.borrow_mut().push(NodeData::Element {
            tag: tag.into(),
            attributes: Vec::new(),
        })
    }

    /// Creates a detached element with the given attributes, in order.
    pub fn create_element_with<'a>(
        &self,
        tag: impl Into<String>,
        attributes: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> NodeId {
        let element = self.create_element(tag);
        let mut tree = self.shared.tree.borrow_mut();
        if let Ok(Node {
            data: NodeData::Element { attributes: slot, .. },
            ..
        }) = tree.node_mut(element)
        {
            for (name, value) in attributes {
                upsert(slot, name, value);
            }
        }
        element
    }

    /// Creates a detached text node.
    pub fn create_text(&self, text: impl Into<String>) -> NodeId {
        self.shared.tree.borrow_mut().push(NodeData::Text(text.into()))
    }

    /// Returns the kind of a node, or `None` for foreign identifiers.
    #[must_use]
    pub fn kind(&self, node: NodeId) -> Option<NodeKind> {
        let tree = self.shared.tree.borrow();
        let kind = match tree.node(node).ok()?.data {
            NodeData::Document => NodeKind::Document,
            NodeData::Element { .. } => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
        };
        Some(kind)
    }

    /// Returns `true` when the node is an element.
    #[must_use]
    pub fn is_element(&self, node: NodeId) -> bool {
        self.kind(node) == Some(NodeKind::Element)
    }

    /// Returns the tag name of an element.
    #[must_use]
    pub fn tag_name(&self, node: NodeId) -> Option<String> {
        match &self.shared.tree.borrow().node(node).ok()?.data {
            NodeData::Element { tag, .. } => Some(tag.clone()),
            NodeData::Document | NodeData::Text(_) => None,
        }
    }

    /// Returns the contents of a text node.
    #[must_use]
    pub fn text(&self, node: NodeId) -> Option<String> {
        match &self.shared.tree.borrow().node(node).ok()?.data {
            NodeData::Text(text) => Some(text.clone()),
            NodeData::Document | NodeData::Element { .. } => None,
        }
    }

    /// Returns the parent of a node.
    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.shared.tree.borrow().parent(node)
    }

    /// Returns the children of a node in document order.
    #[must_use]
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.shared
            .tree
            .borrow()
            .node(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Returns `true` when `node` is `ancestor` or one of its descendants.
    #[must_use]
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.shared.tree.borrow().contains(ancestor, node)
    }

    /// Returns the value of an attribute.
    #[must_use]
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.shared
            .tree
            .borrow()
            .attribute(node, name)
            .map(str::to_owned)
    }

    /// Returns `true` when the element carries the attribute.
    #[must_use]
    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.shared.tree.borrow().attribute(node, name).is_some()
    }

    /// Returns every attribute of an element as ordered name/value pairs.
    #[must_use]
    pub fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
        self.shared
            .tree
            .borrow()
            .attributes(node)
            .map(<[(String, String)]>::to_vec)
            .unwrap_or_default()
    }

    /// Sets an attribute, replacing an existing value in place.
    ///
    /// # Errors
    ///
    /// Returns [`DomError::UnknownNode`] or [`DomError::NotAnElement`].
    pub fn set_attribute(
        &self,
        node: NodeId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), DomError> {
        let attr_name: String = name.into();
        let attr_value: String = value.into();
        let mut tree = self.shared.tree.borrow_mut();
        match &mut tree.node_mut(node)?.data {
            NodeData::Element { attributes, .. } => {
                upsert(attributes, &attr_name, &attr_value);
                Ok(())
            }
            NodeData::Document | NodeData::Text(_) => Err(DomError::NotAnElement { node }),
        }
    }

    /// Removes an attribute; returns whether it was present.
    ///
    /// # Errors
    ///
    /// Returns [`DomError::UnknownNode`] or [`DomError::NotAnElement`].
    pub fn remove_attribute(&self, node: NodeId, name: &str) -> Result<bool, DomError> {
        let mut tree = self.shared.tree.borrow_mut();
        match &mut tree.node_mut(node)?.data {
            NodeData::Element { attributes, .. } => {
                let before = attributes.len();
                attributes.retain(|(key, _)| key != name);
                Ok(attributes.len() != before)
            }
            NodeData::Document | NodeData::Text(_) => Err(DomError::NotAnElement { node }),
        }
    }

    /// Finds the nearest inclusive ancestor element carrying the attribute.
    #[must_use]
    pub fn closest_with_attribute(&self, node: NodeId, name: &str) -> Option<NodeId> {
        let tree = self.shared.tree.borrow();
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if tree.attribute(current, name).is_some() {
                return Some(current);
            }
            cursor = tree.parent(current);
        }
        None
    }

    /// Lists elements carrying the attribute within a subtree, in document
    /// order, including the subtree root itself.
    #[must_use]
    pub fn query_with_attribute(&self, subtree: NodeId, name: &str) -> Vec<NodeId> {
        self.shared.tree.borrow().collect_with_attribute(subtree, name)
    }

    /// Appends `child` to `parent`, detaching it from any previous parent.
    ///
    /// # Errors
    ///
    /// Returns [`DomError::HierarchyRequest`] when the parent cannot hold
    /// children, when the child is the document node, or when the insertion
    /// would create a cycle.
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let previous = {
            let mut tree = self.shared.tree.borrow_mut();
            if matches!(tree.node(parent)?.data, NodeData::Text(_)) {
                return Err(DomError::hierarchy(parent, child, "text nodes have no children"));
            }
            if matches!(tree.node(child)?.data, NodeData::Document) {
                return Err(DomError::hierarchy(parent, child, "the document node cannot move"));
            }
            if tree.contains(child, parent) {
                return Err(DomError::hierarchy(parent, child, "insertion would create a cycle"));
            }
            let previous = tree.detach(child)?;
            tree.node_mut(parent)?.children.push(child);
            tree.node_mut(child)?.parent = Some(parent);
            previous
        };

        if let Some(old_parent) = previous {
            self.queue_mutation(MutationRecord::removed(old_parent, child));
        }
        self.queue_mutation(MutationRecord::added(parent, child));
        Ok(())
    }

    /// Removes `child` from `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`DomError::NotAChild`] when `child` is not a child of `parent`.
    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        {
            let mut tree = self.shared.tree.borrow_mut();
            if tree.node(child)?.parent != Some(parent) {
                return Err(DomError::NotAChild { parent, child });
            }
            tree.detach(child)?;
        }
        self.queue_mutation(MutationRecord::removed(parent, child));
        Ok(())
    }

    /// Returns a spawner for the document's local task queue.
    #[must_use]
    pub fn spawner(&self) -> LocalSpawner {
        self.shared.spawner.clone()
    }

    /// Runs queued tasks until none can make progress.
    ///
    /// Re-entrant calls from inside a running task are ignored.
    pub fn run_until_stalled(&self) {
        let Ok(mut tasks) = self.shared.tasks.try_borrow_mut() else {
            return;
        };
        tasks.run_until_stalled();
        drop(tasks);
        self.flush_mutations();
    }
}

fn upsert(attributes: &mut Vec<(String, String)>, name: &str, value: &str) {
    if let Some(slot) = attributes.iter_mut().find(|(key, _)| key == name) {
        value.clone_into(&mut slot.1);
    } else {
        attributes.push((name.to_owned(), value.to_owned()));
    }
}
