//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use jsonwebtoken::DecodingKey;
use serde_json::Value;

use event_api::broker::MockBroker;
use event_api::config::{JwtConfig, NotifierConfig};
use event_api::signing::{Claims, SignedEnvelope};
use event_api::{Notifier, Payload};

pub const RSA_PRIVATE: &str = include_str!("../fixtures/rsa_private.pem");
pub const RSA_PUBLIC: &str = include_str!("../fixtures/rsa_public.pem");
pub const EC_PRIVATE: &str = include_str!("../fixtures/ec_private.pem");
pub const EC_PUBLIC: &str = include_str!("../fixtures/ec_public.pem");

/// Application name used by every test notifier.
pub const APPLICATION: &str = "svc";

/// Configuration signing with the RSA fixture key.
pub fn test_config() -> NotifierConfig {
    event_api::utils::init_tracing();

    NotifierConfig {
        application_name: APPLICATION.to_string(),
        jwt: JwtConfig {
            algorithm: "RS256".to_string(),
            private_key: URL_SAFE.encode(RSA_PRIVATE),
        },
        ..Default::default()
    }
}

/// Default notifier publishing to `broker`.
pub fn mock_notifier(broker: &MockBroker) -> Notifier {
    Notifier::with_connector(test_config(), Arc::new(broker.clone()))
        .expect("Failed to build notifier")
}

pub fn payload(value: Value) -> Payload {
    value
        .as_object()
        .cloned()
        .expect("payload must be a JSON object")
}

/// Verify a published body against the RSA fixture key.
pub fn verify_body(body: Value) -> Claims {
    let envelope = SignedEnvelope::from_payload(payload(body)).expect("Malformed envelope");
    let key = DecodingKey::from_rsa_pem(RSA_PUBLIC.as_bytes()).expect("Bad public key");
    envelope
        .verify(APPLICATION, &key)
        .expect("Signature did not verify")
}
