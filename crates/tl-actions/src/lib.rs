//! Declarative, attribute-driven event dispatch.
//!
//! `tl-actions` binds events occurring anywhere under a root container to
//! named handlers, using attributes on elements instead of per-element
//! listener wiring. Markup is the source of truth:
//!
//! ```html
//! <button data-tl-action="cart:add" data-tl-params-sku="A-1">Add</button>
//! <input data-tl-action="search:query" data-tl-trigger="input change">
//! ```
//!
//! # Architecture
//!
//! - [`attributes`] reads the action key, triggers and parameters.
//! - [`registry`] maps `(action, mode)` keys to [`Handler`]s.
//! - [`trigger`] decides whether an event type applies to an element.
//! - [`dispatch`] is the single capturing listener per trigger type.
//! - [`scanner`] discovers trigger types and attaches listeners.
//! - [`watcher`] re-scans subtrees inserted after initialisation.
//! - [`engine`] composes the above behind `register`/`define`, `init` and
//!   `destroy`.
//!
//! The host document is modelled by [`dom::Document`], an in-memory,
//! single-threaded tree with listeners, mutation observers and a local task
//! queue for asynchronous handlers.
//!
//! # Errors and logging
//!
//! Setup mistakes are returned as [`ActionError`]. Everything that goes
//! wrong while dispatching an event is logged through `tracing` and never
//! escapes: malformed `action:mode` values and unknown actions at `warn`,
//! failing or panicking handlers at `error`. Enable the `telemetry` feature
//! for a ready-made subscriber.

pub mod attributes;
pub mod config;
pub mod dispatch;
pub mod dom;
pub mod engine;
pub mod error;
pub mod registry;
pub mod scanner;
#[cfg(feature = "telemetry")]
pub mod telemetry;
pub mod trigger;
pub mod watcher;

#[cfg(test)]
mod tests;

pub use self::config::{Config, ConfigError, EngineOptions};
pub use self::dispatch::{ActionContext, DispatchOutcome};
pub use self::engine::ActionEngine;
pub use self::error::{ActionError, ActionSpecError};
pub use self::registry::{ActionKey, Handler, HandlerKind, HandlerRegistry, HandlerResult};
