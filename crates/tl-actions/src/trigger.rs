//! Matching observed event types against an element's declared triggers.
//!
//! Listener attachment is global per engine while matching is per element:
//! an element without a trigger attribute reacts to `click` only, even when
//! a sibling's custom trigger caused an `input` listener to be attached.

use crate::attributes::read_triggers;
use crate::config::Config;
use crate::dom::{Document, NodeId};

/// Event type an element reacts to when it declares no triggers.
pub const DEFAULT_TRIGGER: &str = "click";

/// Returns whether `event_type` is among the element's triggers.
#[must_use]
pub fn matches(document: &Document, element: NodeId, config: &Config, event_type: &str) -> bool {
    read_triggers(document, element, config).contains(event_type)
}
