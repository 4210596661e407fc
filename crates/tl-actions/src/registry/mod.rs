//! Handler registry keyed by `(action, mode)`.
//!
//! The [`HandlerRegistry`] maps an [`ActionKey`] to a [`Handler`]. A second
//! registration for the same key replaces the first; the last one wins.
//! Lookup is a pure read and returns `None` for unknown keys.
//!
//! Handlers declare their return kind up front. [`Handler::sync`] wraps a
//! closure that finishes before dispatch returns, while [`Handler::future`]
//! wraps a closure producing a future that is spawned and never awaited by
//! the dispatcher.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use tracing::debug;

use crate::dispatch::ActionContext;
use crate::error::ActionError;

/// Tracing target for registry operations.
pub(crate) const REGISTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::registry");

/// Result type returned by handlers.
pub type HandlerResult = anyhow::Result<()>;

/// Closure type behind [`Handler::Sync`].
pub type SyncHandlerFn = dyn Fn(&ActionContext) -> HandlerResult;

/// Closure type behind [`Handler::Async`].
pub type AsyncHandlerFn = dyn Fn(ActionContext) -> LocalBoxFuture<'static, HandlerResult>;

/// Typed `(action, mode)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionKey {
    action: String,
    mode: String,
}

impl ActionKey {
    /// Creates a key without validating it.
    #[must_use]
    pub fn new(action: impl Into<String>, mode: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            mode: mode.into(),
        }
    }

    /// Action half of the key.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Mode half of the key.
    #[must_use]
    pub fn mode(&self) -> &str {
        &self.mode
    }

    /// Checks that markup could name this key.
    ///
    /// Markup values are split on their first colon and trimmed, so a key
    /// with an empty side, surrounding whitespace, or a colon in the action
    /// can never be resolved.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::InvalidHandler`] naming the offending pair.
    pub fn validate(&self) -> Result<(), ActionError> {
        let reason = if self.action.is_empty() {
            "action is empty"
        } else if self.mode.is_empty() {
            "mode is empty"
        } else if self.action.contains(':') {
            "action contains ':'"
        } else if self.action.trim() != self.action {
            "action has surrounding whitespace"
        } else if self.mode.trim() != self.mode {
            "mode has surrounding whitespace"
        } else {
            return Ok(());
        };
        Err(ActionError::invalid_handler(&self.action, &self.mode, reason))
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.action, self.mode)
    }
}

/// Which isolation wrapper a handler needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// Runs to completion inside dispatch.
    Sync,
    /// Returns a future that is spawned on the document's task queue.
    Async,
}

/// A registered handler.
#[derive(Clone)]
pub enum Handler {
    /// Synchronous handler.
    Sync(Rc<SyncHandlerFn>),
    /// Handler returning a future.
    Async(Rc<AsyncHandlerFn>),
}

impl Handler {
    /// Wraps a synchronous closure.
    #[must_use]
    pub fn sync<F>(handler: F) -> Self
    where
        F: Fn(&ActionContext) -> HandlerResult + 'static,
    {
        Self::Sync(Rc::new(handler))
    }

    /// Wraps a closure returning a future.
    #[must_use]
    pub fn future<F, Fut>(handler: F) -> Self
    where
        F: Fn(ActionContext) -> Fut + 'static,
        Fut: Future<Output = HandlerResult> + 'static,
    {
        Self::Async(Rc::new(move |context| handler(context).boxed_local()))
    }

    /// Returns the handler's declared kind.
    #[must_use]
    pub const fn kind(&self) -> HandlerKind {
        match self {
            Self::Sync(_) => HandlerKind::Sync,
            Self::Async(_) => HandlerKind::Async,
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.kind()).finish()
    }
}

/// Two-level action/mode handler table.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<ActionKey, Handler>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a handler, returning the one it replaced.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::InvalidHandler`] when the key cannot be named
    /// from markup.
    pub fn register(
        &mut self,
        key: ActionKey,
        handler: Handler,
    ) -> Result<Option<Handler>, ActionError> {
        key.validate()?;
        debug!(
            target: REGISTRY_TARGET,
            action = key.action(),
            mode = key.mode(),
            kind = ?handler.kind(),
            "registering handler"
        );
        let previous = self.handlers.insert(key, handler);
        if previous.is_some() {
            debug!(target: REGISTRY_TARGET, "replaced existing handler");
        }
        Ok(previous)
    }

    /// Looks up the handler for a key.
    #[must_use]
    pub fn resolve(&self, key: &ActionKey) -> Option<&Handler> {
        self.handlers.get(key)
    }

    /// Returns whether a handler is registered for the key.
    #[must_use]
    pub fn contains(&self, key: &ActionKey) -> bool {
        self.handlers.contains_key(key)
    }

    /// Returns registered keys in sorted order.
    #[must_use]
    pub fn keys(&self) -> Vec<&ActionKey> {
        let mut keys: Vec<&ActionKey> = self.handlers.keys().collect();
        keys.sort();
        keys
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` when no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
