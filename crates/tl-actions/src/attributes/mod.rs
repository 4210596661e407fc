//! Reading the declarative markup contract from element attributes.
//!
//! Three attributes drive dispatch (names are configurable):
//!
//! - `data-tl-action="action:mode"` makes an element actionable;
//! - `data-tl-trigger="input change"` lists the event types it reacts to,
//!   defaulting to `click`;
//! - `data-tl-params-<key>="value"` contributes `params[key] = value`.
//!
//! Values are returned as raw strings. Nothing here coerces numbers or
//! booleans.

use std::collections::{BTreeSet, HashMap};

use crate::config::{Config, PARAMS_SEPARATOR};
use crate::dom::{Document, NodeId};
use crate::error::ActionSpecError;
use crate::registry::ActionKey;
use crate::trigger::DEFAULT_TRIGGER;

/// Returns the unparsed action attribute of an element.
#[must_use]
pub fn read_action(document: &Document, element: NodeId, config: &Config) -> Option<String> {
    document.attribute(element, config.action_attr())
}

/// Parses an `action:mode` value.
///
/// The value is split on the first colon and both halves are trimmed, so
/// `" cart : add:now "` names action `cart` and mode `add:now`.
///
/// # Errors
///
/// Returns an [`ActionSpecError`] when the colon is missing or either half
/// is empty after trimming.
pub fn parse_action_spec(raw: &str) -> Result<ActionKey, ActionSpecError> {
    let Some((head, tail)) = raw.split_once(':') else {
        return Err(ActionSpecError::MissingSeparator {
            raw: raw.to_owned(),
        });
    };
    let action = head.trim();
    let mode = tail.trim();
    if action.is_empty() {
        return Err(ActionSpecError::EmptyAction {
            raw: raw.to_owned(),
        });
    }
    if mode.is_empty() {
        return Err(ActionSpecError::EmptyMode {
            raw: raw.to_owned(),
        });
    }
    Ok(ActionKey::new(action, mode))
}

/// Splits a trigger attribute value into event types.
///
/// A missing value, or one holding only whitespace, yields the default
/// `{"click"}` set.
#[must_use]
pub fn parse_triggers(raw: Option<&str>) -> BTreeSet<String> {
    let triggers: BTreeSet<String> = raw
        .into_iter()
        .flat_map(str::split_whitespace)
        .map(str::to_owned)
        .collect();
    if triggers.is_empty() {
        BTreeSet::from([DEFAULT_TRIGGER.to_owned()])
    } else {
        triggers
    }
}

/// Returns the event types an element reacts to.
#[must_use]
pub fn read_triggers(document: &Document, element: NodeId, config: &Config) -> BTreeSet<String> {
    parse_triggers(document.attribute(element, config.trigger_attr()).as_deref())
}

/// Collects `<prefix>-<key>` attributes into a parameter map.
///
/// Later attributes deriving the same key replace earlier ones. An attribute
/// equal to the bare prefix, or with an empty key, is ignored.
#[must_use]
pub fn read_params(
    document: &Document,
    element: NodeId,
    config: &Config,
) -> HashMap<String, String> {
    document
        .attributes(element)
        .into_iter()
        .filter_map(|(name, value)| {
            let key = name
                .strip_prefix(config.params_attr())?
                .strip_prefix(PARAMS_SEPARATOR)?;
            (!key.is_empty()).then(|| (key.to_owned(), value))
        })
        .collect()
}
