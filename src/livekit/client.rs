//! Twirp clients for the LiveKit server APIs
//!
//! The server exposes its admin surface as Twirp: JSON POSTs to
//! `/twirp/livekit.<Service>/<Method>` with a bearer token carrying the
//! relevant grant. We only need two calls — listing rooms and starting a
//! track egress — so this is a minimal client, not an SDK.

use std::sync::OnceLock;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::token::{AccessToken, TokenError, VideoGrant};

/// Lifetime of the short-lived tokens minted per API call.
const API_TOKEN_TTL_MINUTES: i64 = 10;

/// Global HTTP client for reuse across requests (avoids TLS handshake
/// overhead).
static HTTP_CLIENT: OnceLock<Client> = OnceLock::new();

fn get_http_client() -> &'static Client {
    HTTP_CLIENT.get_or_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client")
    })
}

/// Map a LiveKit host URL to its HTTP form for Twirp calls.
///
/// Clients are handed `ws://` URLs; the admin API lives on the same
/// host/port over HTTP.
pub fn http_url(host: &str) -> String {
    if let Some(rest) = host.strip_prefix("ws://") {
        format!("http://{}", rest)
    } else if let Some(rest) = host.strip_prefix("wss://") {
        format!("https://{}", rest)
    } else {
        host.trim_end_matches('/').to_string()
    }
}

/// Errors from LiveKit API calls.
#[derive(Debug)]
pub enum ClientError {
    /// Could not mint the request token.
    Token(TokenError),
    /// Network/transport failure.
    Network(String),
    /// The server answered with a non-success status.
    Api { status: u16, message: String },
    /// The response body could not be parsed.
    Parse(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Token(e) => write!(f, "Failed to mint API token: {}", e),
            ClientError::Network(e) => write!(f, "LiveKit request failed: {}", e),
            ClientError::Api { status, message } => {
                write!(f, "LiveKit API error ({}): {}", status, message)
            }
            ClientError::Parse(e) => write!(f, "Failed to parse LiveKit response: {}", e),
        }
    }
}

impl std::error::Error for ClientError {}

/// Shared Twirp plumbing for the service clients.
#[derive(Debug, Clone)]
struct TwirpClient {
    base_url: String,
    api_key: String,
    api_secret: String,
}

impl TwirpClient {
    fn new(host: &str, api_key: &str, api_secret: &str) -> Self {
        Self {
            base_url: http_url(host),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
        }
    }

    fn endpoint(&self, service: &str, method: &str) -> String {
        format!("{}/twirp/livekit.{}/{}", self.base_url, service, method)
    }

    async fn post(
        &self,
        service: &str,
        method: &str,
        body: serde_json::Value,
        grant: VideoGrant,
    ) -> Result<serde_json::Value, ClientError> {
        let token = AccessToken::new(&self.api_key, &self.api_secret)
            .with_ttl(ChronoDuration::minutes(API_TOKEN_TTL_MINUTES))
            .with_grants(grant)
            .to_jwt()
            .map_err(ClientError::Token)?;

        let response = get_http_client()
            .post(self.endpoint(service, method))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }
}

/// A room known to the server. Twirp responses use the protojson camelCase
/// field names.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Room {
    pub sid: String,
    pub name: String,
    pub num_participants: u32,
}

/// Room admin API. We only use it to list existing rooms; rooms themselves
/// are created implicitly when the first participant joins.
#[derive(Debug, Clone)]
pub struct RoomServiceClient {
    twirp: TwirpClient,
}

impl RoomServiceClient {
    pub fn new(host: &str, api_key: &str, api_secret: &str) -> Self {
        Self {
            twirp: TwirpClient::new(host, api_key, api_secret),
        }
    }

    pub async fn list_rooms(&self) -> Result<Vec<Room>, ClientError> {
        #[derive(Deserialize)]
        struct ListRoomsResponse {
            #[serde(default)]
            rooms: Vec<Room>,
        }

        let value = self
            .twirp
            .post("RoomService", "ListRooms", json!({}), VideoGrant::room_record())
            .await?;

        let response: ListRoomsResponse =
            serde_json::from_value(value).map_err(|e| ClientError::Parse(e.to_string()))?;
        Ok(response.rooms)
    }
}

/// Status of a started egress, parsed loosely: we only log it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EgressInfo {
    pub egress_id: String,
    pub room_name: String,
    pub status: Option<serde_json::Value>,
}

/// Egress admin API.
#[derive(Debug, Clone)]
pub struct EgressClient {
    twirp: TwirpClient,
}

impl EgressClient {
    pub fn new(host: &str, api_key: &str, api_secret: &str) -> Self {
        Self {
            twirp: TwirpClient::new(host, api_key, api_secret),
        }
    }

    /// Ask the server to export a single track to a WebSocket URL.
    ///
    /// Fire-and-forget from the caller's perspective: there is no retry and
    /// nobody tracks the egress afterwards beyond logging the response.
    pub async fn start_track_egress(
        &self,
        room_name: &str,
        websocket_url: &str,
        track_sid: &str,
    ) -> Result<EgressInfo, ClientError> {
        let body = json!({
            "roomName": room_name,
            "trackSid": track_sid,
            "websocketUrl": websocket_url,
        });

        let value = self
            .twirp
            .post("Egress", "StartTrackEgress", body, VideoGrant::room_record())
            .await?;

        serde_json::from_value(value).map_err(|e| ClientError::Parse(e.to_string()))
    }
}
