//! LiveKit access tokens
//!
//! LiveKit credentials are HS256 JWTs signed with the API secret. The claims
//! carry the participant identity in `sub` and the permissions in a `video`
//! grant object. The same signing scheme authenticates webhook deliveries
//! (the `Authorization` header is a JWT whose `sha256` claim pins the body)
//! and our Twirp calls back to the server.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Default token lifetime in hours, matching the LiveKit SDKs.
const DEFAULT_TTL_HOURS: i64 = 6;

/// Errors from token construction and verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Signing key was rejected by the HMAC implementation.
    InvalidKey,
    /// Claims could not be serialized/deserialized.
    Claims(String),
    /// Token is not a three-segment JWT or segments are not valid base64url.
    Malformed,
    /// Signature does not match the secret.
    InvalidSignature,
    /// Token `exp` is in the past.
    Expired,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::InvalidKey => write!(f, "Invalid signing key"),
            TokenError::Claims(e) => write!(f, "Invalid token claims: {}", e),
            TokenError::Malformed => write!(f, "Malformed JWT"),
            TokenError::InvalidSignature => write!(f, "JWT signature mismatch"),
            TokenError::Expired => write!(f, "JWT is expired"),
        }
    }
}

impl std::error::Error for TokenError {}

/// Room permissions carried in the `video` claim.
///
/// Field names follow the LiveKit JSON convention (camelCase); absent
/// permissions are omitted from the payload entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoGrant {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_join: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_record: Option<bool>,
}

impl VideoGrant {
    /// Grant permission to join a specific room.
    pub fn room_join(room: &str) -> Self {
        Self {
            room: Some(room.to_string()),
            room_join: Some(true),
            ..Self::default()
        }
    }

    /// Grant permission to record rooms (used for egress API calls).
    pub fn room_record() -> Self {
        Self {
            room_record: Some(true),
            ..Self::default()
        }
    }
}

/// JWT claim set used by LiveKit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// API key that signed the token.
    pub iss: String,
    /// Participant identity; absent on server-to-server tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    pub nbf: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoGrant>,
    /// Base64 SHA-256 digest of a webhook body; only present on webhook
    /// auth tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// Builder for a signed join credential.
#[derive(Debug, Clone)]
pub struct AccessToken {
    api_key: String,
    api_secret: String,
    identity: Option<String>,
    ttl: Duration,
    grants: VideoGrant,
}

impl AccessToken {
    pub fn new(api_key: &str, api_secret: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            identity: None,
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
            grants: VideoGrant::default(),
        }
    }

    pub fn with_identity(mut self, identity: &str) -> Self {
        self.identity = Some(identity.to_string());
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_grants(mut self, grants: VideoGrant) -> Self {
        self.grants = grants;
        self
    }

    /// Sign the token. The credential is opaque to us once minted; its
    /// lifetime and semantics are the server's business.
    pub fn to_jwt(&self) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            iss: self.api_key.clone(),
            sub: self.identity.clone(),
            nbf: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            video: Some(self.grants.clone()),
            sha256: None,
        };
        encode_jwt(&claims, &self.api_secret)
    }
}

/// Encode and sign a claim set as an HS256 JWT.
pub fn encode_jwt(claims: &Claims, secret: &str) -> Result<String, TokenError> {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = serde_json::to_vec(claims).map_err(|e| TokenError::Claims(e.to_string()))?;
    let payload = URL_SAFE_NO_PAD.encode(payload);

    let signing_input = format!("{}.{}", header, payload);
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| TokenError::InvalidKey)?;
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", signing_input, signature))
}

/// Verify an HS256 JWT's signature and expiry and return its claims.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, TokenError> {
    let mut segments = token.split('.');
    let (header, payload, signature) =
        match (segments.next(), segments.next(), segments.next(), segments.next()) {
            (Some(h), Some(p), Some(s), None) => (h, p, s),
            _ => return Err(TokenError::Malformed),
        };

    let signature = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| TokenError::Malformed)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| TokenError::InvalidKey)?;
    mac.update(header.as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    // Constant-time comparison.
    mac.verify_slice(&signature)
        .map_err(|_| TokenError::InvalidSignature)?;

    let payload = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| TokenError::Malformed)?;
    let claims: Claims =
        serde_json::from_slice(&payload).map_err(|e| TokenError::Claims(e.to_string()))?;

    if claims.exp < Utc::now().timestamp() {
        return Err(TokenError::Expired);
    }

    Ok(claims)
}
