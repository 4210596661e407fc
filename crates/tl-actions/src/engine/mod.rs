//! Engine facade tying registry, dispatcher, scanner and watcher together.
//!
//! ## Lifecycle
//!
//! An [`ActionEngine`] starts uninitialised. [`ActionEngine::init`] scans
//! the root, attaches delegated listeners and starts watching for inserted
//! subtrees. [`ActionEngine::destroy`] detaches every listener and stops the
//! watcher but keeps the registered handlers, so a later `init` restores
//! dispatch without re-registration. Registration is valid in any state.
//!
//! Dropping the engine destroys it.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::config::{Config, EngineOptions};
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::dom::{Document, Event, MutationRecord, NodeId};
use crate::error::ActionError;
use crate::registry::{ActionKey, Handler, HandlerRegistry};
use crate::scanner::Scanner;
use crate::watcher::{Watcher, rescan_inserted};

/// Tracing target for lifecycle operations.
pub(crate) const ENGINE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::engine");

/// Declarative action dispatch over one root.
///
/// Several engines may share a document or even a root; each keeps its own
/// registry, listeners and watcher.
///
/// # Example
///
/// ```
/// use tl_actions::{ActionEngine, EngineOptions, Handler};
/// use tl_actions::dom::Document;
///
/// let document = Document::new();
/// let button = document.create_element_with(
///     "button",
///     [("data-tl-action", "cart:add"), ("data-tl-params-sku", "A-1")],
/// );
/// document.append_child(document.root(), button)?;
///
/// let engine = ActionEngine::new(&document, EngineOptions::new())?;
/// engine
///     .register("cart", "add", Handler::sync(|ctx| {
///         assert_eq!(ctx.param("sku"), Some("A-1"));
///         Ok(())
///     }))?
///     .init();
///
/// document.dispatch_event(button, "click")?;
/// # Ok::<(), tl_actions::ActionError>(())
/// ```
#[derive(Debug)]
pub struct ActionEngine {
    document: Document,
    config: Rc<Config>,
    registry: Rc<RefCell<HandlerRegistry>>,
    dispatcher: Rc<Dispatcher>,
    scanner: Rc<Scanner>,
    watcher: RefCell<Option<Watcher>>,
}

impl ActionEngine {
    /// Creates an uninitialised engine over `document`.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Config`] when the options do not resolve.
    pub fn new(document: &Document, options: EngineOptions) -> Result<Self, ActionError> {
        let config = Rc::new(options.resolve(document)?);
        let registry = Rc::new(RefCell::new(HandlerRegistry::new()));
        let dispatcher = Rc::new(Dispatcher::new(
            document.clone(),
            Rc::clone(&config),
            Rc::clone(&registry),
        ));
        let scanner = Rc::new(Scanner::new(
            document.clone(),
            Rc::clone(&config),
            dispatcher.listener(),
        ));
        Ok(Self {
            document: document.clone(),
            config,
            registry,
            dispatcher,
            scanner,
            watcher: RefCell::new(None),
        })
    }

    /// Creates an uninitialised engine with default options.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Config`] when the defaults do not resolve.
    pub fn with_defaults(document: &Document) -> Result<Self, ActionError> {
        Self::new(document, EngineOptions::new())
    }

    /// Registers a handler for `action:mode`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::InvalidHandler`] when markup could never name
    /// the pair.
    pub fn register(
        &self,
        action: impl Into<String>,
        mode: impl Into<String>,
        handler: Handler,
    ) -> Result<&Self, ActionError> {
        self.registry
            .borrow_mut()
            .register(ActionKey::new(action, mode), handler)?;
        Ok(self)
    }

    /// Registers every handler of a nested `action -> mode -> handler`
    /// mapping, in iteration order.
    ///
    /// # Errors
    ///
    /// Stops at the first invalid pair; earlier entries stay registered.
    pub fn define<A, M, Modes>(
        &self,
        mapping: impl IntoIterator<Item = (A, Modes)>,
    ) -> Result<&Self, ActionError>
    where
        A: Into<String>,
        M: Into<String>,
        Modes: IntoIterator<Item = (M, Handler)>,
    {
        for (action, modes) in mapping {
            let action_name: String = action.into();
            for (mode, handler) in modes {
                self.register(action_name.clone(), mode, handler)?;
            }
        }
        Ok(self)
    }

    /// Scans the root, attaches listeners and starts the watcher.
    ///
    /// Calling it again while active re-scans; listeners are never attached
    /// twice for one trigger type.
    pub fn init(&self) -> &Self {
        let attached = self.scanner.scan(self.config.root());
        let mut watcher = self.watcher.borrow_mut();
        if watcher.is_none() {
            *watcher = Some(Watcher::start(&self.scanner));
        }
        debug!(
            target: ENGINE_TARGET,
            root = %self.config.root(),
            attached = ?attached,
            handlers = self.registry.borrow().len(),
            "engine initialised"
        );
        self
    }

    /// Detaches every listener and stops the watcher; handlers are kept.
    ///
    /// Does nothing when the engine is not initialised.
    pub fn destroy(&self) {
        let watcher = self.watcher.borrow_mut().take();
        let detached = self.scanner.detach_all();
        if watcher.is_some() || detached > 0 {
            drop(watcher);
            debug!(target: ENGINE_TARGET, detached, "engine destroyed");
        }
    }

    /// Returns `true` between `init` and `destroy`.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.watcher.borrow().is_some()
    }

    /// Scans a subtree on demand, returning newly attached trigger types.
    pub fn scan(&self, subtree: NodeId) -> Vec<String> {
        self.scanner.scan(subtree)
    }

    /// Feeds a mutation batch through the watcher's classification,
    /// returning the subtrees that were re-scanned.
    pub fn apply_mutations(&self, records: &[MutationRecord]) -> Vec<NodeId> {
        rescan_inserted(&self.scanner, records)
    }

    /// Runs the dispatch algorithm for one event.
    ///
    /// The delegated listeners call this; it is exposed so hosts can route
    /// events from their own listeners and inspect the outcome.
    pub fn dispatch(&self, event: &Event) -> DispatchOutcome {
        self.dispatcher.dispatch(event)
    }

    /// Returns trigger types with an attached listener, sorted.
    #[must_use]
    pub fn listened_triggers(&self) -> Vec<String> {
        self.scanner.listened_triggers()
    }

    /// Returns whether a handler is registered for `action:mode`.
    #[must_use]
    pub fn has_handler(&self, action: &str, mode: &str) -> bool {
        self.registry
            .borrow()
            .contains(&ActionKey::new(action, mode))
    }

    /// Returns the resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the document this engine is bound to.
    #[must_use]
    pub const fn document(&self) -> &Document {
        &self.document
    }
}

impl Drop for ActionEngine {
    fn drop(&mut self) {
        self.destroy();
    }
}
