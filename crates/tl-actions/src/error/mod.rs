//! Error types for registration, configuration and markup parsing.
//!
//! Only setup mistakes surface as [`ActionError`]. Problems found while
//! dispatching an event (malformed markup, unknown actions, failing handlers)
//! are logged and never returned to the code that triggered the event.

use thiserror::Error;

use crate::config::ConfigError;
use crate::dom::DomError;

/// Errors surfaced by the engine facade.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The handler can never be reached from markup.
    #[error("invalid handler for {action}:{mode}: {reason}")]
    InvalidHandler {
        /// Action half of the key.
        action: String,
        /// Mode half of the key.
        mode: String,
        /// Why the key was rejected.
        reason: &'static str,
    },

    /// Engine options could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A document operation failed.
    #[error(transparent)]
    Dom(#[from] DomError),
}

impl ActionError {
    /// Creates an invalid handler error.
    #[must_use]
    pub fn invalid_handler(
        action: impl Into<String>,
        mode: impl Into<String>,
        reason: &'static str,
    ) -> Self {
        Self::InvalidHandler {
            action: action.into(),
            mode: mode.into(),
            reason,
        }
    }
}

/// Reasons an `action:mode` attribute value is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionSpecError {
    /// The value has no colon.
    #[error("invalid action spec {raw:?}: expected \"action:mode\"")]
    MissingSeparator {
        /// Attribute value as written.
        raw: String,
    },

    /// Nothing but whitespace precedes the colon.
    #[error("invalid action spec {raw:?}: action is empty")]
    EmptyAction {
        /// Attribute value as written.
        raw: String,
    },

    /// Nothing but whitespace follows the colon.
    #[error("invalid action spec {raw:?}: mode is empty")]
    EmptyMode {
        /// Attribute value as written.
        raw: String,
    },
}

impl ActionSpecError {
    /// Returns the attribute value that failed to parse.
    #[must_use]
    pub fn raw(&self) -> &str {
        match self {
            Self::MissingSeparator { raw } | Self::EmptyAction { raw } | Self::EmptyMode { raw } => {
                raw
            }
        }
    }
}
