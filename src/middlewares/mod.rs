//! Built-in pipeline stages.
//!
//! Default order: [`IncludeEventMetadata`] → [`GenerateJwt`] →
//! [`PrintToScreen`] → [`PublishToBroker`]. Signing must follow metadata
//! injection so the event name is covered by the signature, and precede
//! publishing so the broker only sees signed content.

mod jwt;
mod metadata;
mod print;
mod publish;

pub use jwt::GenerateJwt;
pub use metadata::IncludeEventMetadata;
pub use print::PrintToScreen;
pub use publish::PublishToBroker;
