//! Signed event envelopes.
//!
//! Claims are serialized once and signed by every configured signer. The
//! output is a JWS General JSON Serialization: one base64url payload plus a
//! `signatures` array whose entries carry the signer id as `kid`.
//!
//! ```json
//! {
//!   "payload": "<base64url(claims)>",
//!   "signatures": [
//!     {"protected": "<base64url({\"alg\":\"RS256\"})>",
//!      "header": {"kid": "event_api"},
//!      "signature": "<base64url>"}
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::str::FromStr;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, URL_SAFE_NO_PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use jsonwebtoken::{crypto, Algorithm, DecodingKey, EncodingKey};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ConfigError;
use crate::event::Payload;

/// Lifetime of a signed envelope in seconds.
pub const ENVELOPE_TTL_SECS: i64 = 60;

/// Key material decoder: URL-safe alphabet, padding optional.
const KEY_URL_SAFE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);
/// Fallback for keys encoded with the standard alphabet.
const KEY_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Errors raised while producing or checking an envelope.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("Failed to encode claims: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Signer '{signer}' failed: {source}")]
    Crypto {
        signer: String,
        #[source]
        source: jsonwebtoken::errors::Error,
    },

    #[error("Malformed envelope: {0}")]
    Malformed(String),

    #[error("No signature from signer '{0}'")]
    UnknownSigner(String),

    #[error("Signature from '{0}' does not verify")]
    InvalidSignature(String),
}

/// Standard claims wrapped around an event payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub event: Payload,
}

impl Claims {
    /// Build claims issued at `now` (Unix seconds) with a fresh `jti`.
    pub fn issue(issuer: &str, event: Payload, now: i64) -> Self {
        Self {
            iss: issuer.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + ENVELOPE_TTL_SECS,
            event,
        }
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.exp
    }
}

/// Per-signature header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureHeader {
    pub kid: String,
}

/// One signer's signature over the shared payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeSignature {
    pub protected: String,
    pub header: SignatureHeader,
    pub signature: String,
}

/// Multi-signature envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    pub payload: String,
    pub signatures: Vec<EnvelopeSignature>,
}

impl SignedEnvelope {
    /// Envelope as a JSON object, ready to continue down the pipeline.
    pub fn into_payload(self) -> Result<Payload, SigningError> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(SigningError::Malformed(format!(
                "envelope serialized to non-object: {}",
                other
            ))),
        }
    }

    /// Parse an envelope from a JSON object.
    pub fn from_payload(payload: Payload) -> Result<Self, SigningError> {
        Ok(serde_json::from_value(serde_json::Value::Object(payload))?)
    }

    /// Decode the claims without checking any signature.
    pub fn claims_unverified(&self) -> Result<Claims, SigningError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(&self.payload)
            .map_err(|e| SigningError::Malformed(format!("payload is not base64url: {}", e)))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Verify the signature made by `signer` and return the claims.
    pub fn verify(&self, signer: &str, key: &DecodingKey) -> Result<Claims, SigningError> {
        let entry = self
            .signatures
            .iter()
            .find(|s| s.header.kid == signer)
            .ok_or_else(|| SigningError::UnknownSigner(signer.to_string()))?;

        let protected = URL_SAFE_NO_PAD
            .decode(&entry.protected)
            .map_err(|e| SigningError::Malformed(format!("protected header: {}", e)))?;
        let header: ProtectedHeader = serde_json::from_slice(&protected)?;

        let message = format!("{}.{}", entry.protected, self.payload);
        let valid = crypto::verify(&entry.signature, message.as_bytes(), key, header.alg)
            .map_err(|source| SigningError::Crypto {
                signer: signer.to_string(),
                source,
            })?;
        if !valid {
            return Err(SigningError::InvalidSignature(signer.to_string()));
        }

        self.claims_unverified()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ProtectedHeader {
    alg: Algorithm,
}

/// A decoded private key and the algorithm it signs with.
#[derive(Clone)]
pub struct SignerKey {
    algorithm: Algorithm,
    key: EncodingKey,
}

impl SignerKey {
    /// Decode base64-wrapped PEM key material.
    ///
    /// For HMAC algorithms the decoded bytes are the shared secret.
    pub fn from_base64(signer: &str, algorithm: &str, encoded: &str) -> Result<Self, ConfigError> {
        let encoded = encoded.trim();
        let bytes = KEY_URL_SAFE
            .decode(encoded)
            .or_else(|_| KEY_STANDARD.decode(encoded))
            .map_err(|e| ConfigError::KeyEncoding {
                signer: signer.to_string(),
                message: e.to_string(),
            })?;
        Self::from_pem(signer, algorithm, &bytes)
    }

    /// Load a PEM private key for `algorithm`.
    pub fn from_pem(signer: &str, algorithm: &str, pem: &[u8]) -> Result<Self, ConfigError> {
        let algorithm = parse_algorithm(algorithm)?;
        let invalid = |e: jsonwebtoken::errors::Error| ConfigError::InvalidKey {
            signer: signer.to_string(),
            message: e.to_string(),
        };

        let key = match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => EncodingKey::from_secret(pem),
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => EncodingKey::from_rsa_pem(pem).map_err(invalid)?,
            Algorithm::ES256 | Algorithm::ES384 => EncodingKey::from_ec_pem(pem).map_err(invalid)?,
            Algorithm::EdDSA => EncodingKey::from_ed_pem(pem).map_err(invalid)?,
        };

        Ok(Self { algorithm, key })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

impl std::fmt::Debug for SignerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Parse an algorithm identifier such as `RS256`.
pub fn parse_algorithm(algorithm: &str) -> Result<Algorithm, ConfigError> {
    Algorithm::from_str(algorithm.trim())
        .map_err(|_| ConfigError::UnknownAlgorithm(algorithm.to_string()))
}

/// Signer id to key mapping. Signatures are emitted sorted by signer id.
#[derive(Debug, Clone, Default)]
pub struct Keychain {
    signers: BTreeMap<String, SignerKey>,
}

impl Keychain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keychain with a single signer.
    pub fn single(signer: impl Into<String>, key: SignerKey) -> Self {
        Self::new().with_signer(signer, key)
    }

    pub fn with_signer(mut self, signer: impl Into<String>, key: SignerKey) -> Self {
        self.signers.insert(signer.into(), key);
        self
    }

    pub fn len(&self) -> usize {
        self.signers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }

    pub fn signer_ids(&self) -> impl Iterator<Item = &str> {
        self.signers.keys().map(String::as_str)
    }
}

/// Wraps payloads in freshly issued, signed claims.
#[derive(Debug, Clone)]
pub struct EnvelopeSigner {
    issuer: String,
    keychain: Keychain,
}

impl EnvelopeSigner {
    /// Build a signer. An empty keychain is rejected here, not per call.
    pub fn new(issuer: impl Into<String>, keychain: Keychain) -> Result<Self, ConfigError> {
        if keychain.is_empty() {
            return Err(ConfigError::EmptyKeychain);
        }
        Ok(Self {
            issuer: issuer.into(),
            keychain,
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn keychain(&self) -> &Keychain {
        &self.keychain
    }

    /// Sign `event` with claims issued now.
    pub fn sign(&self, event: Payload) -> Result<SignedEnvelope, SigningError> {
        self.sign_at(event, chrono::Utc::now().timestamp())
    }

    /// Sign `event` with claims issued at `now` (Unix seconds).
    pub fn sign_at(&self, event: Payload, now: i64) -> Result<SignedEnvelope, SigningError> {
        let claims = Claims::issue(&self.issuer, event, now);
        self.sign_claims(&claims)
    }

    /// Sign prepared claims with every key in the keychain.
    pub fn sign_claims(&self, claims: &Claims) -> Result<SignedEnvelope, SigningError> {
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);

        let signatures = self
            .keychain
            .signers
            .iter()
            .map(|(signer, key)| -> Result<EnvelopeSignature, SigningError> {
                let header = ProtectedHeader { alg: key.algorithm };
                let protected = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
                let message = format!("{}.{}", protected, payload);
                let signature = crypto::sign(message.as_bytes(), &key.key, key.algorithm)
                    .map_err(|source| SigningError::Crypto {
                        signer: signer.clone(),
                        source,
                    })?;
                Ok(EnvelopeSignature {
                    protected,
                    header: SignatureHeader {
                        kid: signer.clone(),
                    },
                    signature,
                })
            })
            .collect::<Result<Vec<_>, SigningError>>()?;

        Ok(SignedEnvelope {
            payload,
            signatures,
        })
    }
}
