//! Signed webhook receiver
//!
//! LiveKit delivers room lifecycle events as JSON with an `Authorization`
//! header carrying a JWT signed by the API secret. The JWT's `sha256` claim
//! is the base64 digest of the raw body, binding the signature to the exact
//! payload. Verification fails closed: a request that does not check out is
//! rejected before any part of the body is interpreted.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer};
use sha2::{Digest, Sha256};

use super::token::{verify_jwt, TokenError};

/// Errors from webhook verification and parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookError {
    /// No `Authorization` header was supplied.
    MissingAuth,
    /// The auth token failed verification.
    InvalidToken(TokenError),
    /// The token was signed by a different API key than ours.
    UnknownApiKey(String),
    /// The body digest does not match the signed `sha256` claim.
    DigestMismatch,
    /// The body is not a well-formed event.
    InvalidPayload(String),
}

impl std::fmt::Display for WebhookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebhookError::MissingAuth => write!(f, "Missing Authorization header"),
            WebhookError::InvalidToken(e) => write!(f, "Webhook auth token rejected: {}", e),
            WebhookError::UnknownApiKey(key) => {
                write!(f, "Webhook signed by unknown API key: {}", key)
            }
            WebhookError::DigestMismatch => {
                write!(f, "Webhook body does not match signed digest")
            }
            WebhookError::InvalidPayload(e) => write!(f, "Invalid webhook payload: {}", e),
        }
    }
}

impl std::error::Error for WebhookError {}

/// Room lifecycle event kinds we know about.
///
/// The server adds kinds over time; anything unrecognized maps to `Unknown`
/// instead of failing deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventKind {
    RoomStarted,
    RoomFinished,
    ParticipantJoined,
    ParticipantLeft,
    TrackPublished,
    TrackUnpublished,
    EgressStarted,
    EgressEnded,
    #[serde(other)]
    Unknown,
}

/// Media kind of a published track.
///
/// The protobuf-JSON encoding uses enum names (`"AUDIO"`) but older payloads
/// carry the numeric tag (audio = 0, video = 1, data = 2); both forms are
/// accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackKind {
    Audio,
    Video,
    Data,
    #[default]
    Unknown,
}

impl<'de> Deserialize<'de> for TrackKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct KindVisitor;

        impl serde::de::Visitor<'_> for KindVisitor {
            type Value = TrackKind;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a track type name or numeric tag")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<TrackKind, E> {
                Ok(match v {
                    "AUDIO" | "audio" => TrackKind::Audio,
                    "VIDEO" | "video" => TrackKind::Video,
                    "DATA" | "data" => TrackKind::Data,
                    _ => TrackKind::Unknown,
                })
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<TrackKind, E> {
                Ok(match v {
                    0 => TrackKind::Audio,
                    1 => TrackKind::Video,
                    2 => TrackKind::Data,
                    _ => TrackKind::Unknown,
                })
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<TrackKind, E> {
                if v < 0 {
                    Ok(TrackKind::Unknown)
                } else {
                    self.visit_u64(v as u64)
                }
            }
        }

        deserializer.deserialize_any(KindVisitor)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RoomDetails {
    pub sid: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ParticipantDetails {
    pub sid: String,
    pub identity: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TrackDetails {
    pub sid: String,
    #[serde(rename = "type")]
    pub kind: TrackKind,
}

/// A verified room lifecycle event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: WebhookEventKind,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub room: Option<RoomDetails>,
    #[serde(default)]
    pub participant: Option<ParticipantDetails>,
    #[serde(default)]
    pub track: Option<TrackDetails>,
}

/// Verifies webhook deliveries against our API key/secret pair.
#[derive(Debug, Clone)]
pub struct WebhookReceiver {
    api_key: String,
    api_secret: String,
}

impl WebhookReceiver {
    pub fn new(api_key: &str, api_secret: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
        }
    }

    /// Verify authenticity of a delivery and parse the event.
    ///
    /// `auth_header` is the raw `Authorization` header value. Any failure
    /// rejects the whole request; no part of an unverified body is used.
    pub fn receive(&self, body: &[u8], auth_header: &str) -> Result<WebhookEvent, WebhookError> {
        if auth_header.is_empty() {
            return Err(WebhookError::MissingAuth);
        }

        let claims =
            verify_jwt(auth_header.trim(), &self.api_secret).map_err(WebhookError::InvalidToken)?;

        if claims.iss != self.api_key {
            return Err(WebhookError::UnknownApiKey(claims.iss));
        }

        let digest = STANDARD.encode(Sha256::digest(body));
        match claims.sha256 {
            Some(expected) if expected == digest => {}
            _ => return Err(WebhookError::DigestMismatch),
        }

        serde_json::from_slice(body).map_err(|e| WebhookError::InvalidPayload(e.to_string()))
    }
}
