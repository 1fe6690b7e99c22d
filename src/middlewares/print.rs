use std::io::Write;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::Result;
use crate::event::Event;
use crate::pipeline::{Flow, Middleware};

/// Prints each event to stdout. Always continues; write failures are logged
/// and ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrintToScreen;

impl PrintToScreen {
    /// Human-readable block describing `event`.
    pub fn render(event: &Event, at: DateTime<Utc>) -> String {
        let payload = serde_json::to_string(&event.payload)
            .unwrap_or_else(|e| format!("<unserializable payload: {}>", e));
        [
            String::new(),
            format!("Produced new event at {}: ", at.format("%Y-%m-%d %H:%M:%S %z")),
            format!("name    = {}", event.name),
            format!("payload = {}", payload),
            String::new(),
        ]
        .join("\n")
    }
}

#[async_trait]
impl Middleware for PrintToScreen {
    fn name(&self) -> &str {
        "print_to_screen"
    }

    async fn call(&self, event: Event) -> Result<Flow> {
        let block = Self::render(&event, Utc::now());
        if let Err(e) = writeln!(std::io::stdout().lock(), "{}", block) {
            warn!(error = %e, "Failed to print event");
        }
        info!(event = %event.name, "Produced new event");
        Ok(Flow::Continue(event))
    }
}
