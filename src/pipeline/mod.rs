//! Ordered middleware chain.
//!
//! Each stage receives the current [`Event`] and either hands a replacement
//! event to the next stage ([`Flow::Continue`]) or halts the chain with a
//! terminal value ([`Flow::Stop`]). Errors abort the chain and propagate
//! to the caller as-is.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{NotifyError, Result};
use crate::event::{Event, Payload};

/// Decision returned by a stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Pass this event to the next stage.
    Continue(Event),
    /// Stop processing and return this value to the caller.
    Stop(Value),
}

/// Result of running the whole chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Every stage continued; carries the final event.
    Completed(Event),
    /// A stage halted the chain with a terminal value.
    Stopped(Value),
}

impl Outcome {
    /// Final payload when the chain completed.
    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Outcome::Completed(event) => Some(&event.payload),
            Outcome::Stopped(_) => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }

    pub fn into_event(self) -> Option<Event> {
        match self {
            Outcome::Completed(event) => Some(event),
            Outcome::Stopped(_) => None,
        }
    }
}

/// A single processing stage.
///
/// Stages take the event by value; whatever they return in
/// [`Flow::Continue`] is a fresh handover owned by the next stage.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Stage name used in diagnostics.
    fn name(&self) -> &str;

    /// Process an event.
    async fn call(&self, event: Event) -> Result<Flow>;
}

/// Ordered list of stages.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage to the end of the chain.
    pub fn with(mut self, stage: impl Middleware + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Append an already shared stage.
    pub fn with_shared(mut self, stage: Arc<dyn Middleware>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn push(&mut self, stage: Arc<dyn Middleware>) {
        self.stages.push(stage);
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order, threading the event through.
    ///
    /// An empty pipeline returns the input unchanged.
    pub async fn execute(&self, event: Event) -> Result<Outcome> {
        let mut current = event;

        for stage in &self.stages {
            debug!(stage = stage.name(), event = %current.name, "Running stage");

            let flow = stage
                .call(current)
                .await
                .inspect_err(|e| warn!(stage = stage.name(), error = %e, "Stage failed"))?;

            match flow {
                Flow::Continue(next) => {
                    if next.name.is_empty() {
                        return Err(NotifyError::PipelineContract {
                            stage: stage.name().to_string(),
                            message: "continued with an empty event name".to_string(),
                        });
                    }
                    current = next;
                }
                Flow::Stop(value) => {
                    debug!(stage = stage.name(), "Stage stopped the pipeline");
                    return Ok(Outcome::Stopped(value));
                }
            }
        }

        Ok(Outcome::Completed(current))
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}
