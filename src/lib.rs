//! Event API - signed domain event publishing
//!
//! Services hand a named event and a JSON payload to a [`Notifier`]. The
//! event runs through an ordered stage pipeline that stamps metadata, wraps
//! the payload in a multi-signature JWS envelope, prints it and publishes it
//! to a RabbitMQ direct exchange named after the event domain.

pub mod broker;
pub mod config;
pub mod error;
pub mod event;
pub mod middlewares;
pub mod notifier;
pub mod pipeline;
pub mod record;
pub mod signing;
pub mod utils;

pub use config::NotifierConfig;
pub use error::{NotifyError, Result};
pub use event::{Event, Payload};
pub use notifier::Notifier;
pub use pipeline::{Flow, Middleware, Outcome, Pipeline};
pub use record::{Lifecycle, RecordEvents};
