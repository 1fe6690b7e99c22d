//! Message broker publishing.
//!
//! This module contains:
//! - `BrokerConnector` / `BrokerConnection` / `BrokerChannel` traits: the broker session seam
//! - `Exchange`: a declared direct exchange bound to a channel
//! - `BrokerPublisher`: lazily connects, caches exchanges and publishes events
//! - Naming helpers deriving exchange and routing key from an event name
//! - Implementations: AMQP (RabbitMQ), Mock

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::BrokerCredentials;
use crate::event;

// Implementation modules
#[cfg(feature = "amqp")]
pub mod amqp;
pub mod mock;
mod publisher;

// Re-exports
#[cfg(feature = "amqp")]
pub use amqp::AmqpConnector;
pub use mock::{MockBroker, PublishedMessage};
pub use publisher::BrokerPublisher;

// ============================================================================
// Traits
// ============================================================================

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;

/// Errors that can occur talking to the broker.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Channel failed: {0}")]
    Channel(String),

    #[error("Exchange declaration failed: {0}")]
    Declare(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Broker session already closed")]
    Closed,
}

/// Opens broker connections.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    /// Establish a connection with the given credentials.
    async fn connect(&self, credentials: &BrokerCredentials) -> Result<Arc<dyn BrokerConnection>>;
}

/// An open broker connection.
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    /// Open a channel on this connection.
    async fn open_channel(&self) -> Result<Arc<dyn BrokerChannel>>;

    /// Gracefully close the connection.
    async fn close(&self) -> Result<()>;
}

/// A channel on a broker connection.
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// Declare a direct exchange.
    async fn declare_direct_exchange(&self, name: &str) -> Result<()>;

    /// Publish a message body to an exchange.
    async fn publish(&self, exchange: &str, routing_key: &str, body: &[u8]) -> Result<()>;
}

/// A declared direct exchange.
///
/// Direct exchanges deliver to queues bound with exactly the message's
/// routing key.
#[derive(Clone)]
pub struct Exchange {
    name: String,
    channel: Arc<dyn BrokerChannel>,
}

impl Exchange {
    /// Declare `name` on `channel` and return a handle to it.
    pub async fn declare(channel: Arc<dyn BrokerChannel>, name: &str) -> Result<Self> {
        channel.declare_direct_exchange(name).await?;
        Ok(Self {
            name: name.to_string(),
            channel,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn publish(&self, body: &[u8], routing_key: &str) -> Result<()> {
        self.channel.publish(&self.name, routing_key, body).await
    }
}

impl std::fmt::Debug for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exchange").field("name", &self.name).finish()
    }
}

// ============================================================================
// Naming
// ============================================================================

/// Exchange for an event: `{application_name}.events.{domain}`.
///
/// e.g. `peatio.events.market`, `peatio.events.model`
pub fn exchange_name(application_name: &str, event_name: &str) -> String {
    format!("{}.events.{}", application_name, event::domain(event_name))
}

/// Routing key for an event: every segment after the domain.
///
/// e.g. `market.btcusd.order_created` routes as `btcusd.order_created`;
/// a single-segment name routes with the empty key.
pub fn routing_key(event_name: &str) -> &str {
    event::routing_suffix(event_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_name_uses_first_segment() {
        assert_eq!(
            exchange_name("event_api", "push_notify.withdraw.succeed"),
            "event_api.events.push_notify"
        );
        assert_eq!(
            exchange_name("svc", "model.account.created"),
            "svc.events.model"
        );
    }

    #[test]
    fn test_routing_key_is_remaining_segments() {
        assert_eq!(routing_key("push_notify.withdraw.succeed"), "withdraw.succeed");
        assert_eq!(routing_key("withdraw.succeed"), "succeed");
    }

    #[test]
    fn test_trailing_dots_do_not_reach_routing_key() {
        assert_eq!(routing_key("withdraw.succeed."), "succeed");
        assert_eq!(routing_key("withdraw.."), "");
        assert_eq!(exchange_name("svc", "withdraw.."), "svc.events.withdraw");
    }

    #[test]
    fn test_single_segment_event() {
        assert_eq!(exchange_name("svc", "heartbeat"), "svc.events.heartbeat");
        assert_eq!(routing_key("heartbeat"), "");
    }
}
