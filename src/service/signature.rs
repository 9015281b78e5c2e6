// service/signature.rs
//! Gateway webhook signature verification.
//!
//! The gateway signs a colon-joined list of selected payload fields followed by
//! the `x-gateway-timestamp` header value, using HMAC-SHA256 keyed with the
//! shared signing key, and sends the base64 digest in `x-gateway-signature`
//! (older integrations use `x-gateway-sig-value`).

use axum::http::HeaderMap;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::{config::Config, dtos::webhookdtos::GatewayEvent, service::error::ServiceError};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-gateway-signature";
pub const LEGACY_SIGNATURE_HEADER: &str = "x-gateway-sig-value";
pub const TIMESTAMP_HEADER: &str = "x-gateway-timestamp";

#[derive(Debug, Clone, Default)]
pub struct SignatureHeaders {
    pub signature: Option<String>,
    pub timestamp: Option<String>,
}

impl SignatureHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(|value| value.trim().to_string())
        };

        SignatureHeaders {
            signature: read(SIGNATURE_HEADER).or_else(|| read(LEGACY_SIGNATURE_HEADER)),
            timestamp: read(TIMESTAMP_HEADER),
        }
    }
}

pub struct SignatureVerifier {
    signing_key: String,
}

impl SignatureVerifier {
    pub fn new(signing_key: impl Into<String>) -> Self {
        SignatureVerifier {
            signing_key: signing_key.into(),
        }
    }

    /// Fails with `MissingSigningKey` when no key is configured.
    pub fn from_config(config: &Config) -> Result<Self, ServiceError> {
        config
            .gateway_signing_key
            .as_deref()
            .map(SignatureVerifier::new)
            .ok_or(ServiceError::MissingSigningKey)
    }

    pub fn canonical_string(event: &GatewayEvent, timestamp: &str) -> String {
        let fields = [
            Some(event.event_type.as_str()),
            event.request_id.as_deref(),
            event.merchant_user_id.as_deref(),
            event.merchant_wallet_id.as_deref(),
            event.transaction.id.as_deref(),
            event.transaction.kind.as_deref(),
            event.transaction.time.as_deref(),
            event.transaction.response_code.as_deref(),
        ];

        let mut canonical = fields
            .iter()
            .map(|field| field.unwrap_or(""))
            .collect::<Vec<_>>()
            .join(":");
        canonical.push(':');
        canonical.push_str(timestamp);
        canonical
    }

    /// Base64 HMAC-SHA256 of `message`.
    pub fn sign(&self, message: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.signing_key.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(message.as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }

    pub fn verify(&self, event: &GatewayEvent, headers: &SignatureHeaders) -> Result<(), ServiceError> {
        let received = headers
            .signature
            .as_deref()
            .ok_or(ServiceError::MissingSignature)?;
        let timestamp = headers
            .timestamp
            .as_deref()
            .ok_or(ServiceError::MissingTimestamp)?;

        let computed = self.sign(&Self::canonical_string(event, timestamp));

        if !constant_time_eq(computed.as_bytes(), received.as_bytes()) {
            tracing::warn!(
                "Gateway signature mismatch for event '{}' (request {:?}): computed={} received={}",
                event.event_type,
                event.request_id,
                computed,
                received
            );
            return Err(ServiceError::SignatureMismatch);
        }

        Ok(())
    }
}

/// Constant-time comparison. Different lengths (including an empty digest) never match.
pub fn constant_time_eq(expected: &[u8], received: &[u8]) -> bool {
    if received.is_empty() || expected.len() != received.len() {
        return false;
    }
    expected.ct_eq(received).into()
}
