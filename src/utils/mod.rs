//! Shared process helpers.

pub mod bootstrap;

pub use bootstrap::init_tracing;
