//! Record lifecycle events.
//!
//! Builds `model.*` events for persisted records from their JSON form:
//!
//! - `model.deposit.created`
//! - `model.account.updated`
//! - `model.beneficiary.created.pending` (with a mapped suffix)
//!
//! Created events carry `{"record": ...}`; updated events additionally carry
//! `{"changes": ...}` with the previous values of every changed attribute.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::Result;
use crate::event::{Event, Payload};
use crate::notifier::Notifier;
use crate::pipeline::Outcome;

/// Domain segment of every record event.
pub const MODEL_DOMAIN: &str = "model";
/// Attributes backfilled into the previous record when it lacks them.
const TIMESTAMP_ATTRIBUTES: [&str; 2] = ["created_at", "updated_at"];
/// Source of backfilled timestamps.
const CREATED_AT: &str = "created_at";

/// Record lifecycle transitions that produce events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    Create,
    Update,
}

impl Lifecycle {
    pub fn verb(self) -> &'static str {
        match self {
            Lifecycle::Create => "created",
            Lifecycle::Update => "updated",
        }
    }
}

/// Event settings for one record type.
#[derive(Debug, Clone)]
pub struct RecordEvents {
    prefix: String,
    suffix: Vec<String>,
    valid_suffix_value: HashMap<String, String>,
    on: Vec<Lifecycle>,
}

impl RecordEvents {
    /// Events for records named `prefix`, on create and update.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: Vec::new(),
            valid_suffix_value: HashMap::new(),
            on: vec![Lifecycle::Create, Lifecycle::Update],
        }
    }

    /// Events named after a type path, e.g. `Admin::BeneficiaryAccount`
    /// becomes `admin_beneficiary_account`.
    pub fn for_type(type_name: &str) -> Self {
        Self::new(prefix_for_type(type_name))
    }

    /// Append a suffix computed from `attributes`.
    ///
    /// The attribute values are joined with `.` and looked up in `mapping`;
    /// records whose joined value has no mapping produce no event.
    pub fn with_suffix<A, M, K, V>(mut self, attributes: A, mapping: M) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        M: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.suffix = attributes.into_iter().map(Into::into).collect();
        self.valid_suffix_value = mapping
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Restrict the transitions that produce events.
    pub fn only_on(mut self, lifecycles: impl IntoIterator<Item = Lifecycle>) -> Self {
        self.on = lifecycles.into_iter().collect();
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn is_enabled(&self, lifecycle: Lifecycle) -> bool {
        self.on.contains(&lifecycle)
    }

    /// Full event name for `record`, or `None` when the suffix is unmapped.
    pub fn event_name(&self, lifecycle: Lifecycle, record: &Payload) -> Option<String> {
        let mut tokens = vec![
            MODEL_DOMAIN.to_string(),
            self.prefix.clone(),
            lifecycle.verb().to_string(),
        ];

        if !self.suffix.is_empty() {
            let key = self
                .suffix
                .iter()
                .map(|attribute| attribute_text(record.get(attribute)))
                .collect::<Vec<_>>()
                .join(".");
            let mapped = self.valid_suffix_value.get(&key).filter(|v| !v.is_empty())?;
            tokens.push(mapped.clone());
        }

        Some(tokens.join("."))
    }

    /// Event for a newly created record.
    pub fn created(&self, record: &Payload) -> Option<Event> {
        if !self.is_enabled(Lifecycle::Create) {
            return None;
        }
        let record = compact(record);
        let name = self.event_name(Lifecycle::Create, &record)?;

        let mut payload = Payload::new();
        payload.insert("record".to_string(), Value::Object(record));
        Some(Event::new(name, payload))
    }

    /// Event for an updated record, or `None` when nothing changed.
    ///
    /// `changes` holds the previous value of every attribute whose value
    /// differs in `after`.
    pub fn updated(&self, before: &Payload, after: &Payload) -> Option<Event> {
        if !self.is_enabled(Lifecycle::Update) {
            return None;
        }

        let after = compact(after);
        let mut before = compact(before);
        for attribute in TIMESTAMP_ATTRIBUTES {
            if !before.contains_key(attribute) {
                if let Some(created_at) = after.get(CREATED_AT) {
                    before.insert(attribute.to_string(), created_at.clone());
                }
            }
        }
        if before == after {
            return None;
        }

        let name = self.event_name(Lifecycle::Update, &after)?;
        let changes: Payload = before
            .into_iter()
            .filter(|(attribute, value)| after.get(attribute) != Some(value))
            .collect();

        let mut payload = Payload::new();
        payload.insert("record".to_string(), Value::Object(after));
        payload.insert("changes".to_string(), Value::Object(changes));
        Some(Event::new(name, payload))
    }

    /// Publish the created event for `record`, if any.
    pub async fn notify_created(
        &self,
        notifier: &Notifier,
        record: &Payload,
    ) -> Result<Option<Outcome>> {
        match self.created(record) {
            Some(event) => notifier.notify(event.name, event.payload).await.map(Some),
            None => Ok(None),
        }
    }

    /// Publish the updated event for a record, if any.
    pub async fn notify_updated(
        &self,
        notifier: &Notifier,
        before: &Payload,
        after: &Payload,
    ) -> Result<Option<Outcome>> {
        match self.updated(before, after) {
            Some(event) => notifier.notify(event.name, event.payload).await.map(Some),
            None => Ok(None),
        }
    }
}

/// Snake-cased type path with `::` and `/` flattened to `_`.
pub fn prefix_for_type(type_name: &str) -> String {
    let mut out = String::with_capacity(type_name.len() + 4);
    let chars: Vec<char> = type_name.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if c == ':' || c == '/' {
            if !out.ends_with('_') && !out.is_empty() {
                out.push('_');
            }
            continue;
        }
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn compact(record: &Payload) -> Payload {
    record
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn attribute_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
