//! Mock broker implementation for testing.
//!
//! Every connection and channel opened through a `MockBroker` records into
//! the same shared state, so tests can assert on connects, declarations,
//! publishes and closes.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{BrokerChannel, BrokerConnection, BrokerConnector, BrokerError, Result};
use crate::config::BrokerCredentials;

/// A message observed by the mock broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub body: Vec<u8>,
}

impl PublishedMessage {
    /// Body parsed as JSON.
    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
    }
}

#[derive(Default)]
struct MockState {
    connects: usize,
    channels_opened: usize,
    closes: usize,
    declared: Vec<String>,
    published: Vec<PublishedMessage>,
    credentials: Option<BrokerCredentials>,
    fail_on_connect: bool,
    fail_on_publish: bool,
}

/// Mock broker for testing.
#[derive(Clone, Default)]
pub struct MockBroker {
    state: Arc<RwLock<MockState>>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_connect(&self, fail: bool) {
        self.state.write().await.fail_on_connect = fail;
    }

    pub async fn set_fail_on_publish(&self, fail: bool) {
        self.state.write().await.fail_on_publish = fail;
    }

    pub async fn connect_count(&self) -> usize {
        self.state.read().await.connects
    }

    pub async fn channel_count(&self) -> usize {
        self.state.read().await.channels_opened
    }

    pub async fn close_count(&self) -> usize {
        self.state.read().await.closes
    }

    /// Exchange names in declaration order.
    pub async fn declared_exchanges(&self) -> Vec<String> {
        self.state.read().await.declared.clone()
    }

    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.state.read().await.published.clone()
    }

    pub async fn published_count(&self) -> usize {
        self.state.read().await.published.len()
    }

    /// Credentials passed to the most recent connect.
    pub async fn last_credentials(&self) -> Option<BrokerCredentials> {
        self.state.read().await.credentials.clone()
    }
}

#[async_trait]
impl BrokerConnector for MockBroker {
    async fn connect(&self, credentials: &BrokerCredentials) -> Result<Arc<dyn BrokerConnection>> {
        let mut state = self.state.write().await;
        if state.fail_on_connect {
            return Err(BrokerError::Connection(
                "Mock connection refused".to_string(),
            ));
        }
        state.connects += 1;
        state.credentials = Some(credentials.clone());
        Ok(Arc::new(MockConnection {
            state: self.state.clone(),
        }))
    }
}

struct MockConnection {
    state: Arc<RwLock<MockState>>,
}

#[async_trait]
impl BrokerConnection for MockConnection {
    async fn open_channel(&self) -> Result<Arc<dyn BrokerChannel>> {
        self.state.write().await.channels_opened += 1;
        Ok(Arc::new(MockChannel {
            state: self.state.clone(),
        }))
    }

    async fn close(&self) -> Result<()> {
        self.state.write().await.closes += 1;
        Ok(())
    }
}

struct MockChannel {
    state: Arc<RwLock<MockState>>,
}

#[async_trait]
impl BrokerChannel for MockChannel {
    async fn declare_direct_exchange(&self, name: &str) -> Result<()> {
        self.state.write().await.declared.push(name.to_string());
        Ok(())
    }

    async fn publish(&self, exchange: &str, routing_key: &str, body: &[u8]) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_publish {
            return Err(BrokerError::Publish("Mock publish failure".to_string()));
        }
        state.published.push(PublishedMessage {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            body: body.to_vec(),
        });
        Ok(())
    }
}
