use async_trait::async_trait;

use crate::error::Result;
use crate::event::Event;
use crate::pipeline::{Flow, Middleware};
use crate::signing::EnvelopeSigner;

/// Replaces the payload with a signed envelope around it.
///
/// The event name is left untouched; downstream stages see only the
/// envelope object.
#[derive(Debug, Clone)]
pub struct GenerateJwt {
    signer: EnvelopeSigner,
}

impl GenerateJwt {
    pub fn new(signer: EnvelopeSigner) -> Self {
        Self { signer }
    }

    pub fn signer(&self) -> &EnvelopeSigner {
        &self.signer
    }
}

#[async_trait]
impl Middleware for GenerateJwt {
    fn name(&self) -> &str {
        "generate_jwt"
    }

    async fn call(&self, event: Event) -> Result<Flow> {
        let envelope = self.signer.sign(event.payload)?.into_payload()?;
        Ok(Flow::Continue(Event::new(event.name, envelope)))
    }
}
