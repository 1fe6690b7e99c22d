//! Domain event carried through the notification pipeline.
//!
//! Event names are dot-delimited: the first segment is the domain, the
//! remaining segments form the routing suffix (`model.account.created` has
//! domain `model` and suffix `account.created`).

use serde_json::{Map, Value};

/// Event payload: a JSON object with caller-defined keys.
pub type Payload = Map<String, Value>;

/// Payload key set by the metadata stage to the event name.
pub const NAME_KEY: &str = "name";

/// Separator between event name segments.
pub const SEGMENT_SEPARATOR: char = '.';

/// An `(event_name, payload)` pair threaded through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub payload: Payload,
}

impl Event {
    pub fn new(name: impl Into<String>, payload: Payload) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// First segment of the event name.
    pub fn domain(&self) -> &str {
        domain(&self.name)
    }

    /// Segments after the first, joined by `.`.
    pub fn routing_suffix(&self) -> &str {
        routing_suffix(&self.name)
    }
}

/// First segment of a dot-delimited event name.
///
/// A name without separators is its own domain.
pub fn domain(event_name: &str) -> &str {
    event_name
        .split_once(SEGMENT_SEPARATOR)
        .map(|(head, _)| head)
        .unwrap_or(event_name)
}

/// Everything after the first segment of an event name.
///
/// Empty for single-segment names. Trailing empty segments are dropped,
/// inner ones are kept: `a.b.` routes as `b`, `a..b` as `.b`.
pub fn routing_suffix(event_name: &str) -> &str {
    event_name
        .split_once(SEGMENT_SEPARATOR)
        .map(|(_, tail)| tail.trim_end_matches(SEGMENT_SEPARATOR))
        .unwrap_or("")
}
