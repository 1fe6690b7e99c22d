//! AMQP (RabbitMQ) broker implementation.
//!
//! Events go to direct exchanges, one per event domain. Exchanges are
//! declared with default options (transient, not auto-deleted).

use std::sync::Arc;

use async_trait::async_trait;
use lapin::{
    options::{BasicPublishOptions, ExchangeDeclareOptions},
    types::FieldTable,
    uri::{AMQPAuthority, AMQPUri, AMQPUserInfo},
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
};
use tracing::{debug, info};

use super::{BrokerChannel, BrokerConnection, BrokerConnector, BrokerError, Result};
use crate::config::BrokerCredentials;

/// Content type of published event bodies.
const CONTENT_TYPE: &str = "application/json";
/// Reply code sent when closing the connection normally.
const CLOSE_REPLY_CODE: u16 = 200;

/// Opens AMQP connections with lapin.
#[derive(Debug, Clone, Default)]
pub struct AmqpConnector {
    /// Connection name reported to the broker.
    connection_name: Option<String>,
}

impl AmqpConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `name` as the client connection name.
    pub fn with_connection_name(mut self, name: impl Into<String>) -> Self {
        self.connection_name = Some(name.into());
        self
    }

    fn properties(&self) -> ConnectionProperties {
        let properties = ConnectionProperties::default();
        match &self.connection_name {
            Some(name) => properties.with_connection_name(name.as_str().into()),
            None => properties,
        }
    }
}

/// Build an AMQP URI from structured credentials on the default vhost.
pub fn amqp_uri(host: &str, port: u16, username: &str, password: &str) -> AMQPUri {
    AMQPUri {
        authority: AMQPAuthority {
            userinfo: AMQPUserInfo {
                username: username.to_string(),
                password: password.to_string(),
            },
            host: host.to_string(),
            port,
        },
        ..Default::default()
    }
}

#[async_trait]
impl BrokerConnector for AmqpConnector {
    async fn connect(&self, credentials: &BrokerCredentials) -> Result<Arc<dyn BrokerConnection>> {
        let connection = match credentials {
            BrokerCredentials::Url(url) => Connection::connect(url, self.properties()).await,
            BrokerCredentials::Params {
                host,
                port,
                username,
                password,
            } => {
                let uri = amqp_uri(host, *port, username, password);
                Connection::connect_uri(uri, self.properties()).await
            }
        }
        .map_err(|e| BrokerError::Connection(format!("Failed to connect: {}", e)))?;

        info!(credentials = ?credentials, "Connected to AMQP");

        Ok(Arc::new(AmqpConnection { connection }))
    }
}

struct AmqpConnection {
    connection: Connection,
}

#[async_trait]
impl BrokerConnection for AmqpConnection {
    async fn open_channel(&self) -> Result<Arc<dyn BrokerChannel>> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| BrokerError::Channel(format!("Failed to create channel: {}", e)))?;
        debug!(channel_id = channel.id(), "Opened AMQP channel");
        Ok(Arc::new(AmqpChannel { channel }))
    }

    async fn close(&self) -> Result<()> {
        self.connection
            .close(CLOSE_REPLY_CODE, "event publisher shutting down")
            .await
            .map_err(|e| BrokerError::Connection(format!("Failed to close connection: {}", e)))
    }
}

struct AmqpChannel {
    channel: Channel,
}

#[async_trait]
impl BrokerChannel for AmqpChannel {
    async fn declare_direct_exchange(&self, name: &str) -> Result<()> {
        self.channel
            .exchange_declare(
                name,
                ExchangeKind::Direct,
                ExchangeDeclareOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Declare(format!("Failed to declare exchange {}: {}", name, e)))
    }

    async fn publish(&self, exchange: &str, routing_key: &str, body: &[u8]) -> Result<()> {
        let properties = BasicProperties::default().with_content_type(CONTENT_TYPE.into());

        self.channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                body,
                properties,
            )
            .await
            .map_err(|e| BrokerError::Publish(format!("Failed to publish: {}", e)))?
            .await
            .map_err(|e| BrokerError::Publish(format!("Publish confirmation failed: {}", e)))?;

        Ok(())
    }
}
