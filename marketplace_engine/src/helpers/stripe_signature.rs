//! # Gateway webhook signatures
//!
//! Every webhook the payment gateway delivers carries a `Stripe-Signature` header of the form
//!
//! ```text
//!    t=1718000000,v1=5257a869e7ecebeda32affa62cdca3fa51cad7e77a0e56ff536d0ce8e108d8bd[,v1=...]
//! ```
//!
//! where `t` is the unix time at which the gateway signed the payload, and each `v1` entry is
//!
//! ```text
//!    hex(HMAC-SHA256(endpoint_secret, "{t}.{raw payload}"))
//! ```
//!
//! More than one `v1` entry is present while the endpoint secret is being rolled. The payload is authentic if any of
//! them matches. Other schemes (e.g. `v0`) are ignored.
//!
//! The timestamp guards against replays: a signature older (or newer) than the tolerance is rejected even if the
//! HMAC matches.
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use log::*;
use mkt_common::Secret;
use sha2::Sha256;
use thiserror::Error;

use crate::mkt_api::gateway_events::GatewayEvent;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("No signature header was provided")]
    MissingHeader,
    #[error("The signature header is malformed. {0}")]
    MalformedHeader(String),
    #[error("The signature timestamp is outside the tolerance window")]
    TimestampOutOfTolerance,
    #[error("No signature in the header matches the payload")]
    NoMatchingSignature,
    #[error("No webhook secret has been configured")]
    NoSecretConfigured,
    #[error("The payload is not a valid gateway event. {0}")]
    MalformedPayload(String),
}

/// The parsed contents of a `Stripe-Signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<Vec<u8>>,
}

impl FromStr for SignatureHeader {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut timestamp = None;
        let mut signatures = vec![];
        for part in s.split(',') {
            let (key, value) = part
                .trim()
                .split_once('=')
                .ok_or_else(|| SignatureError::MalformedHeader(format!("'{part}' is not a key=value pair")))?;
            match key {
                "t" => {
                    let t = value
                        .parse::<i64>()
                        .map_err(|e| SignatureError::MalformedHeader(format!("Invalid timestamp. {e}")))?;
                    timestamp = Some(t);
                },
                "v1" => match hex::decode(value) {
                    Ok(sig) => signatures.push(sig),
                    Err(e) => debug!("🔐️ Skipping v1 signature that is not valid hex. {e}"),
                },
                _ => trace!("🔐️ Ignoring signature scheme {key}"),
            }
        }
        let timestamp = timestamp.ok_or_else(|| SignatureError::MalformedHeader("No timestamp".into()))?;
        if signatures.is_empty() {
            return Err(SignatureError::MalformedHeader("No v1 signatures".into()));
        }
        Ok(Self { timestamp, signatures })
    }
}

fn keyed_mac(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::NoSecretConfigured)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Produces a complete signature header for `payload`, exactly as the gateway would.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, SignatureError> {
    let mac = keyed_mac(secret, timestamp, payload)?;
    let sig = hex::encode(mac.finalize().into_bytes());
    Ok(format!("t={timestamp},v1={sig}"))
}

/// Checks `header` against `payload` as of `now`.
pub fn verify_signature(
    secret: &str,
    header: Option<&str>,
    payload: &[u8],
    now: DateTime<Utc>,
    tolerance: Duration,
) -> Result<(), SignatureError> {
    if secret.is_empty() {
        error!("🔐️ A webhook arrived, but no webhook secret is configured. All webhooks will be rejected.");
        return Err(SignatureError::NoSecretConfigured);
    }
    let header = header.ok_or(SignatureError::MissingHeader)?.parse::<SignatureHeader>()?;
    // Timestamps far enough from now overflow the subtraction, and those are out of tolerance too
    let age = now.timestamp().checked_sub(header.timestamp).map(i64::unsigned_abs);
    let max_age = tolerance.num_seconds().unsigned_abs();
    if !matches!(age, Some(age) if age <= max_age) {
        return Err(SignatureError::TimestampOutOfTolerance);
    }
    let mac = keyed_mac(secret, header.timestamp, payload)?;
    // verify_slice compares in constant time
    let matched = header.signatures.iter().any(|sig| mac.clone().verify_slice(sig).is_ok());
    if matched {
        Ok(())
    } else {
        Err(SignatureError::NoMatchingSignature)
    }
}

/// Authenticates raw webhook deliveries and turns them into gateway events.
///
/// Implementations must not touch any state. A failure here means the delivery is rejected outright.
pub trait EventVerifier {
    fn verify_and_parse(&self, payload: &[u8], signature_header: Option<&str>) -> Result<GatewayEvent, SignatureError>;
}

#[derive(Debug, Clone)]
pub struct StripeEventVerifier {
    secret: Secret<String>,
    tolerance: Duration,
}

impl StripeEventVerifier {
    pub fn new(secret: Secret<String>) -> Self {
        Self { secret, tolerance: Duration::seconds(DEFAULT_SIGNATURE_TOLERANCE_SECS) }
    }

    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn verify_and_parse_at(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<GatewayEvent, SignatureError> {
        verify_signature(self.secret.reveal(), signature_header, payload, now, self.tolerance)?;
        trace!("🔐️ Webhook signature check ✅️");
        serde_json::from_slice::<GatewayEvent>(payload).map_err(|e| SignatureError::MalformedPayload(e.to_string()))
    }
}

impl EventVerifier for StripeEventVerifier {
    fn verify_and_parse(&self, payload: &[u8], signature_header: Option<&str>) -> Result<GatewayEvent, SignatureError> {
        self.verify_and_parse_at(payload, signature_header, Utc::now())
    }
}
