//! Event publisher owning one broker session.
//!
//! The connection, its channel and every declared exchange are created on
//! first use and reused afterwards. All access goes through one mutex, so
//! concurrent callers never race to connect or declare, and publishes on
//! the shared channel are serialized.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{
    exchange_name, routing_key, BrokerChannel, BrokerConnection, BrokerConnector, BrokerError,
    Exchange, Result,
};
use crate::config::BrokerCredentials;
use crate::event::Payload;

#[derive(Default)]
struct Session {
    connection: Option<Arc<dyn BrokerConnection>>,
    channel: Option<Arc<dyn BrokerChannel>>,
    exchanges: HashMap<String, Exchange>,
    closed: bool,
}

/// Publishes event payloads to `{app}.events.{domain}` direct exchanges.
///
/// Failed operations leave the cached session as it is; a broken channel
/// keeps failing until the process restarts.
pub struct BrokerPublisher {
    application_name: String,
    credentials: BrokerCredentials,
    connector: Arc<dyn BrokerConnector>,
    session: Mutex<Session>,
}

impl BrokerPublisher {
    pub fn new(
        application_name: impl Into<String>,
        credentials: BrokerCredentials,
        connector: Arc<dyn BrokerConnector>,
    ) -> Self {
        Self {
            application_name: application_name.into(),
            credentials,
            connector,
            session: Mutex::new(Session::default()),
        }
    }

    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    /// Exchange an event is published to.
    pub fn exchange_name(&self, event_name: &str) -> String {
        exchange_name(&self.application_name, event_name)
    }

    /// Open the connection and channel now instead of on first publish.
    pub async fn connect(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        self.channel(&mut session).await.map(|_| ())
    }

    pub async fn is_connected(&self) -> bool {
        let session = self.session.lock().await;
        session.connection.is_some() && !session.closed
    }

    /// Serialize `payload` as JSON and publish it for `event_name`.
    pub async fn publish(&self, event_name: &str, payload: &Payload) -> Result<()> {
        let body = serde_json::to_vec(payload)?;
        let exchange_name = self.exchange_name(event_name);
        let routing_key = routing_key(event_name);

        info!(
            routing_key = %routing_key,
            exchange = %exchange_name,
            "Publishing event"
        );

        let mut session = self.session.lock().await;
        let exchange = self.exchange(&mut session, &exchange_name).await?;
        exchange.publish(&body, routing_key).await?;

        debug!(exchange = %exchange_name, bytes = body.len(), "Published event");
        Ok(())
    }

    /// Close the connection. Only the first call does anything.
    pub async fn close(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.closed {
            return Ok(());
        }
        session.closed = true;
        session.exchanges.clear();
        session.channel = None;

        if let Some(connection) = session.connection.take() {
            connection.close().await?;
            info!(application = %self.application_name, "Broker connection closed");
        }
        Ok(())
    }

    async fn channel(&self, session: &mut Session) -> Result<Arc<dyn BrokerChannel>> {
        if session.closed {
            return Err(BrokerError::Closed);
        }
        if let Some(channel) = &session.channel {
            return Ok(channel.clone());
        }

        let connection = match &session.connection {
            Some(connection) => connection.clone(),
            None => {
                let connection = self.connector.connect(&self.credentials).await?;
                info!(
                    application = %self.application_name,
                    credentials = ?self.credentials,
                    "Connected to broker"
                );
                session.connection = Some(connection.clone());
                connection
            }
        };

        let channel = connection.open_channel().await?;
        session.channel = Some(channel.clone());
        Ok(channel)
    }

    async fn exchange(&self, session: &mut Session, name: &str) -> Result<Exchange> {
        if let Some(exchange) = session.exchanges.get(name) {
            return Ok(exchange.clone());
        }

        let channel = self.channel(session).await?;
        let exchange = Exchange::declare(channel, name).await?;
        debug!(exchange = %name, "Declared direct exchange");
        session.exchanges.insert(name.to_string(), exchange.clone());
        Ok(exchange)
    }
}

impl std::fmt::Debug for BrokerPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerPublisher")
            .field("application_name", &self.application_name)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}
