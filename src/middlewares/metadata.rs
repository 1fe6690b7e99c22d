use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::event::{Event, NAME_KEY};
use crate::pipeline::{Flow, Middleware};

/// Sets `payload.name` to the event name. Always continues.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncludeEventMetadata;

#[async_trait]
impl Middleware for IncludeEventMetadata {
    fn name(&self) -> &str {
        "include_event_metadata"
    }

    async fn call(&self, mut event: Event) -> Result<Flow> {
        event
            .payload
            .insert(NAME_KEY.to_string(), Value::String(event.name.clone()));
        Ok(Flow::Continue(event))
    }
}
