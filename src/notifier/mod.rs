//! Public entry point for publishing domain events.
//!
//! A `Notifier` owns the stage pipeline and, when built from configuration,
//! the broker publisher whose session it opens on `start` and releases on
//! `shutdown`.

use std::future::Future;
use std::sync::Arc;

use tracing::{info, info_span, warn, Instrument};

use crate::broker::{BrokerConnector, BrokerPublisher};
use crate::config::NotifierConfig;
use crate::error::{NotifyError, Result};
use crate::event::{Event, Payload};
use crate::middlewares::{GenerateJwt, IncludeEventMetadata, PrintToScreen, PublishToBroker};
use crate::pipeline::{Outcome, Pipeline};
use crate::signing::{EnvelopeSigner, Keychain, SignerKey};

/// Runs events through the pipeline.
#[derive(Debug)]
pub struct Notifier {
    pipeline: Pipeline,
    publisher: Option<Arc<BrokerPublisher>>,
}

impl Notifier {
    /// Build the default pipeline publishing to RabbitMQ.
    ///
    /// Key material is decoded here; a bad key fails before any event is sent.
    #[cfg(feature = "amqp")]
    pub fn configure(config: NotifierConfig) -> Result<Self> {
        let connector = crate::broker::AmqpConnector::new()
            .with_connection_name(config.application_name.clone());
        Self::with_connector(config, Arc::new(connector))
    }

    /// Build the default pipeline on a custom broker connector.
    pub fn with_connector(
        config: NotifierConfig,
        connector: Arc<dyn BrokerConnector>,
    ) -> Result<Self> {
        config.validate()?;

        let application_name = config.application_name.as_str();
        let key = SignerKey::from_base64(
            application_name,
            &config.jwt.algorithm,
            &config.jwt.private_key,
        )?;
        let signer = EnvelopeSigner::new(
            application_name,
            Keychain::single(application_name, key),
        )?;
        let publisher = BrokerPublisher::new(
            application_name,
            config.broker.credentials(),
            connector,
        );

        Ok(Self::assemble(signer, publisher))
    }

    /// Build the default pipeline from prepared parts.
    ///
    /// Use this for keychains with more than one signer.
    pub fn assemble(signer: EnvelopeSigner, publisher: BrokerPublisher) -> Self {
        let publisher = Arc::new(publisher);
        Self {
            pipeline: Self::default_pipeline(signer, publisher.clone()),
            publisher: Some(publisher),
        }
    }

    /// Metadata → sign → print → publish.
    pub fn default_pipeline(signer: EnvelopeSigner, publisher: Arc<BrokerPublisher>) -> Pipeline {
        Pipeline::new()
            .with(IncludeEventMetadata)
            .with(GenerateJwt::new(signer))
            .with(PrintToScreen)
            .with(PublishToBroker::new(publisher))
    }

    /// Notifier over a caller-supplied pipeline with no broker session of
    /// its own.
    pub fn from_pipeline(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            publisher: None,
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn publisher(&self) -> Option<&Arc<BrokerPublisher>> {
        self.publisher.as_ref()
    }

    /// Open the broker session ahead of the first event.
    pub async fn start(&self) -> Result<()> {
        if let Some(publisher) = &self.publisher {
            publisher.connect().await?;
            info!(application = %publisher.application_name(), "Notifier started");
        }
        Ok(())
    }

    /// Run `event_name` and `payload` through every stage.
    ///
    /// Any stage error is returned as-is; the event should then be treated
    /// as not delivered.
    pub async fn notify(&self, event_name: impl Into<String>, payload: Payload) -> Result<Outcome> {
        let event_name = event_name.into();
        if event_name.is_empty() {
            return Err(NotifyError::InvalidEvent(
                "event name must not be empty".to_string(),
            ));
        }

        let span = info_span!("notify", event = %event_name);
        self.pipeline
            .execute(Event::new(event_name, payload))
            .instrument(span)
            .await
    }

    /// Release the broker session. Safe to call more than once.
    pub async fn shutdown(&self) -> Result<()> {
        if let Some(publisher) = &self.publisher {
            publisher.close().await?;
        }
        Ok(())
    }

    /// Start, run `body`, then shut down however `body` finished.
    ///
    /// `body` runs on its own task; if it panics the session is still
    /// closed and the panic is then resumed on the caller.
    pub async fn run<F, Fut, T>(self, body: F) -> Result<T>
    where
        F: FnOnce(Arc<Notifier>) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let notifier = Arc::new(self);

        if let Err(e) = notifier.start().await {
            if let Err(close_err) = notifier.shutdown().await {
                warn!(error = %close_err, "Failed to release broker session");
            }
            return Err(e);
        }

        let joined = tokio::spawn(body(notifier.clone())).await;
        let closed = notifier.shutdown().await;

        match joined {
            Ok(output) => closed.map(|_| output),
            Err(join_err) => {
                if let Err(close_err) = closed {
                    warn!(error = %close_err, "Failed to release broker session");
                }
                if join_err.is_panic() {
                    std::panic::resume_unwind(join_err.into_panic());
                }
                Err(NotifyError::Aborted(join_err.to_string()))
            }
        }
    }
}
