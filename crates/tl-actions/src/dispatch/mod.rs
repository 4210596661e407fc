//! Delegated event dispatch.
//!
//! One [`Dispatcher`] serves every trigger type an engine listens for. It is
//! attached to the configured root in the capturing phase, so it sees each
//! event before any bubbling listener below the root can stop it.
//!
//! ## Algorithm
//!
//! For each event the dispatcher:
//!
//! 1. ignores events whose target is not an element;
//! 2. finds the nearest inclusive ancestor carrying the action attribute, so
//!    only the innermost actionable element handles the event;
//! 3. ignores elements outside the configured root;
//! 4. ignores event types the element does not declare as triggers;
//! 5. parses `action:mode`, warning and stopping on malformed values;
//! 6. resolves the handler, warning and stopping on unknown keys;
//! 7. builds an [`ActionContext`] and invokes the handler.
//!
//! Handler failures never leave the dispatcher. A synchronous handler that
//! returns an error or panics is logged at `error` level; an asynchronous
//! handler is spawned on the document's task queue wrapped so that its
//! eventual error or panic is logged the same way.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use futures::task::LocalSpawnExt;
use tracing::{error, trace, warn};

use crate::attributes::{parse_action_spec, read_action, read_params};
use crate::config::Config;
use crate::dom::{Document, Event, Listener, NodeId};
use crate::registry::{ActionKey, Handler, HandlerRegistry, HandlerResult};
use crate::trigger;

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Values handed to a handler for one dispatched event.
#[derive(Debug, Clone)]
pub struct ActionContext {
    /// The actionable element that matched.
    pub element: NodeId,
    /// The triggering event.
    pub event: Event,
    /// Parameters read from the element's parameter attributes.
    pub params: HashMap<String, String>,
    /// The engine's configured root.
    pub root: NodeId,
    /// The key the handler was resolved under.
    pub key: ActionKey,
    /// Handle to the document the event occurred in.
    pub document: Document,
}

impl ActionContext {
    /// Returns a parameter value.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Step at which dispatch of an event finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The event target is not an element.
    NotAnElement,
    /// Neither the target nor its ancestors carry the action attribute.
    NoActionElement,
    /// The actionable element lies outside the configured root.
    OutsideRoot,
    /// The element does not declare this event type as a trigger.
    TriggerMismatch,
    /// The action attribute is not a valid `action:mode` value.
    InvalidSpec,
    /// No handler is registered for the key.
    UnknownAction,
    /// A synchronous handler ran and succeeded.
    Invoked,
    /// An asynchronous handler was started.
    Spawned,
    /// The handler failed or could not be started; the failure was logged.
    HandlerFailed,
}

impl DispatchOutcome {
    /// Returns `true` when a handler was called.
    #[must_use]
    pub const fn reached_handler(self) -> bool {
        matches!(self, Self::Invoked | Self::Spawned | Self::HandlerFailed)
    }
}

/// Routes events from delegated listeners to registered handlers.
#[derive(Debug)]
pub struct Dispatcher {
    document: Document,
    config: Rc<Config>,
    registry: Rc<RefCell<HandlerRegistry>>,
}

impl Dispatcher {
    /// Creates a dispatcher over shared configuration and registry.
    #[must_use]
    pub const fn new(
        document: Document,
        config: Rc<Config>,
        registry: Rc<RefCell<HandlerRegistry>>,
    ) -> Self {
        Self {
            document,
            config,
            registry,
        }
    }

    /// Builds a listener that forwards to this dispatcher while it is alive.
    #[must_use]
    pub fn listener(self: &Rc<Self>) -> Listener {
        let weak: Weak<Self> = Rc::downgrade(self);
        Rc::new(move |event: &Event| {
            if let Some(dispatcher) = weak.upgrade() {
                dispatcher.dispatch(event);
            }
        })
    }

    /// Dispatches a single event and reports where it stopped.
    pub fn dispatch(&self, event: &Event) -> DispatchOutcome {
        let outcome = self.route(event);
        trace!(
            target: DISPATCH_TARGET,
            event_type = event.event_type(),
            target_node = %event.target(),
            ?outcome,
            "event dispatched"
        );
        outcome
    }

    fn route(&self, event: &Event) -> DispatchOutcome {
        let origin = event.target();
        if !self.document.is_element(origin) {
            return DispatchOutcome::NotAnElement;
        }

        let config = &self.config;
        let Some(element) = self
            .document
            .closest_with_attribute(origin, config.action_attr())
        else {
            return DispatchOutcome::NoActionElement;
        };
        if !self.document.contains(config.root(), element) {
            return DispatchOutcome::OutsideRoot;
        }
        if !trigger::matches(&self.document, element, config, event.event_type()) {
            return DispatchOutcome::TriggerMismatch;
        }

        let Some(raw) = read_action(&self.document, element, config) else {
            return DispatchOutcome::NoActionElement;
        };
        let key = match parse_action_spec(&raw) {
            Ok(key) => key,
            Err(error) => {
                warn!(target: DISPATCH_TARGET, raw = %raw, %error, "ignoring malformed action");
                return DispatchOutcome::InvalidSpec;
            }
        };

        let handler = self.registry.borrow().resolve(&key).cloned();
        let Some(handler) = handler else {
            warn!(
                target: DISPATCH_TARGET,
                action = key.action(),
                mode = key.mode(),
                "unknown action"
            );
            return DispatchOutcome::UnknownAction;
        };

        let context = ActionContext {
            element,
            event: event.clone(),
            params: read_params(&self.document, element, config),
            root: config.root(),
            key: key.clone(),
            document: self.document.clone(),
        };
        self.invoke(&key, &handler, context)
    }

    fn invoke(&self, key: &ActionKey, handler: &Handler, context: ActionContext) -> DispatchOutcome {
        match handler {
            Handler::Sync(run) => {
                match panic::catch_unwind(AssertUnwindSafe(|| run(&context))) {
                    Ok(Ok(())) => DispatchOutcome::Invoked,
                    Ok(Err(failure)) => {
                        log_failure(key, &failure);
                        DispatchOutcome::HandlerFailed
                    }
                    Err(payload) => {
                        log_panic(key, payload.as_ref());
                        DispatchOutcome::HandlerFailed
                    }
                }
            }
            Handler::Async(start) => {
                let future = match panic::catch_unwind(AssertUnwindSafe(|| start(context))) {
                    Ok(future) => future,
                    Err(payload) => {
                        log_panic(key, payload.as_ref());
                        return DispatchOutcome::HandlerFailed;
                    }
                };
                self.spawn(key, future)
            }
        }
    }

    fn spawn(
        &self,
        key: &ActionKey,
        future: LocalBoxFuture<'static, HandlerResult>,
    ) -> DispatchOutcome {
        let task_key = key.clone();
        let task = async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(failure)) => log_failure(&task_key, &failure),
                Err(payload) => log_panic(&task_key, payload.as_ref()),
            }
        };
        match self.document.spawner().spawn_local(task) {
            Ok(()) => DispatchOutcome::Spawned,
            Err(spawn_error) => {
                error!(
                    target: DISPATCH_TARGET,
                    action = key.action(),
                    mode = key.mode(),
                    error = %spawn_error,
                    "failed to spawn asynchronous handler"
                );
                DispatchOutcome::HandlerFailed
            }
        }
    }
}

fn log_failure(key: &ActionKey, failure: &anyhow::Error) {
    let message = format!("{failure:#}");
    error!(
        target: DISPATCH_TARGET,
        action = key.action(),
        mode = key.mode(),
        error = %message,
        "handler failed"
    );
}

fn log_panic(key: &ActionKey, payload: &(dyn Any + Send)) {
    let message = payload
        .downcast_ref::<&str>()
        .map(|text| (*text).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("non-string panic payload"));
    error!(
        target: DISPATCH_TARGET,
        action = key.action(),
        mode = key.mode(),
        panic = %message,
        "handler panicked"
    );
}
