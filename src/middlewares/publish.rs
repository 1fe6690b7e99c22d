use std::sync::Arc;

use async_trait::async_trait;

use crate::broker::BrokerPublisher;
use crate::error::Result;
use crate::event::Event;
use crate::pipeline::{Flow, Middleware};

/// Publishes the payload to the event's exchange and passes the event on
/// unchanged.
#[derive(Debug, Clone)]
pub struct PublishToBroker {
    publisher: Arc<BrokerPublisher>,
}

impl PublishToBroker {
    pub fn new(publisher: Arc<BrokerPublisher>) -> Self {
        Self { publisher }
    }

    pub fn publisher(&self) -> &Arc<BrokerPublisher> {
        &self.publisher
    }
}

#[async_trait]
impl Middleware for PublishToBroker {
    fn name(&self) -> &str {
        "publish_to_broker"
    }

    async fn call(&self, event: Event) -> Result<Flow> {
        self.publisher.publish(&event.name, &event.payload).await?;
        Ok(Flow::Continue(event))
    }
}
