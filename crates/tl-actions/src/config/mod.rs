//! Engine configuration.
//!
//! [`EngineOptions`] collects the optional overrides a host supplies at
//! construction time, either programmatically or from JSON. Resolving the
//! options against a [`Document`] yields the immutable [`Config`] every
//! component reads by reference for the lifetime of the engine.

use serde::Deserialize;
use thiserror::Error;

use crate::dom::{Document, NodeId, NodeKind};

/// Attribute naming the `action:mode` pair of an actionable element.
pub const DEFAULT_ACTION_ATTR: &str = "data-tl-action";

/// Attribute listing the event types an element reacts to.
pub const DEFAULT_TRIGGER_ATTR: &str = "data-tl-trigger";

/// Prefix of the attributes that become invocation parameters.
pub const DEFAULT_PARAMS_ATTR: &str = "data-tl-params";

/// Separator between the parameter prefix and the parameter key.
pub const PARAMS_SEPARATOR: char = '-';

/// Errors raised while resolving engine options.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An attribute name option is empty or contains whitespace.
    #[error("invalid attribute name for {option}: {value:?}")]
    InvalidAttributeName {
        /// Option that carried the value.
        option: &'static str,
        /// Rejected value.
        value: String,
    },

    /// The configured root does not belong to the document.
    #[error("root {root} is not part of the document")]
    UnknownRoot {
        /// Rejected root.
        root: NodeId,
    },

    /// The configured root cannot contain elements.
    #[error("root {root} is a text node")]
    RootNotContainer {
        /// Rejected root.
        root: NodeId,
    },

    /// Options could not be parsed from JSON.
    #[error("failed to parse engine options: {message}")]
    Parse {
        /// Human-readable description of the parse failure.
        message: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    fn invalid_attribute(option: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidAttributeName {
            option,
            value: value.into(),
        }
    }
}

/// Optional overrides supplied when constructing an engine.
///
/// JSON keys use camel case:
///
/// ```json
/// {"actionAttr": "data-act", "triggerAttr": "data-on", "paramsAttr": "data-arg"}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EngineOptions {
    /// Container scoping delegation and scanning; defaults to the document
    /// node.
    #[serde(skip)]
    pub root: Option<NodeId>,
    /// Override for [`DEFAULT_ACTION_ATTR`].
    pub action_attr: Option<String>,
    /// Override for [`DEFAULT_TRIGGER_ATTR`].
    pub trigger_attr: Option<String>,
    /// Override for [`DEFAULT_PARAMS_ATTR`].
    pub params_attr: Option<String>,
}

impl EngineOptions {
    /// Creates options that keep every default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses options from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON or unknown keys.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|source| ConfigError::Parse {
            message: source.to_string(),
            source,
        })
    }

    /// Scopes the engine to the subtree rooted at `root`.
    #[must_use]
    pub const fn with_root(mut self, root: NodeId) -> Self {
        self.root = Some(root);
        self
    }

    /// Overrides the action attribute name.
    #[must_use]
    pub fn with_action_attr(mut self, name: impl Into<String>) -> Self {
        self.action_attr = Some(name.into());
        self
    }

    /// Overrides the trigger attribute name.
    #[must_use]
    pub fn with_trigger_attr(mut self, name: impl Into<String>) -> Self {
        self.trigger_attr = Some(name.into());
        self
    }

    /// Overrides the parameter attribute prefix.
    #[must_use]
    pub fn with_params_attr(mut self, name: impl Into<String>) -> Self {
        self.params_attr = Some(name.into());
        self
    }

    /// Applies defaults and validates the result against `document`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when an attribute name is unusable or the
    /// root cannot host actionable elements.
    pub fn resolve(self, document: &Document) -> Result<Config, ConfigError> {
        let root = self.root.unwrap_or_else(|| document.root());
        match document.kind(root) {
            None => return Err(ConfigError::UnknownRoot { root }),
            Some(NodeKind::Text) => return Err(ConfigError::RootNotContainer { root }),
            Some(NodeKind::Document | NodeKind::Element) => {}
        }

        Ok(Config {
            root,
            action_attr: attribute_name("actionAttr", self.action_attr, DEFAULT_ACTION_ATTR)?,
            trigger_attr: attribute_name("triggerAttr", self.trigger_attr, DEFAULT_TRIGGER_ATTR)?,
            params_attr: attribute_name("paramsAttr", self.params_attr, DEFAULT_PARAMS_ATTR)?,
        })
    }
}

fn attribute_name(
    option: &'static str,
    value: Option<String>,
    default: &str,
) -> Result<String, ConfigError> {
    let name = value.unwrap_or_else(|| default.to_owned());
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(ConfigError::invalid_attribute(option, name));
    }
    Ok(name)
}

/// Resolved, immutable engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    root: NodeId,
    action_attr: String,
    trigger_attr: String,
    params_attr: String,
}

impl Config {
    /// Container scoping delegation and scanning.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// Attribute naming the `action:mode` pair.
    #[must_use]
    pub fn action_attr(&self) -> &str {
        &self.action_attr
    }

    /// Attribute listing trigger event types.
    #[must_use]
    pub fn trigger_attr(&self) -> &str {
        &self.trigger_attr
    }

    /// Prefix of parameter attributes.
    #[must_use]
    pub fn params_attr(&self) -> &str {
        &self.params_attr
    }
}
