//! Credential and webhook relay
//!
//! The HTTP face of the backend: hands out room-join tokens to clients and
//! receives LiveKit's signed lifecycle webhooks. The only decision it makes
//! itself is the audio-only egress filter; everything else is delegated to
//! the server through the `livekit` module.
//!
//! ```text
//! client ──GET /get-token──▶ mint JWT ──▶ {token, user}
//! server ──POST /webhooks──▶ verify ──▶ track_published(audio)?
//!                                           └──▶ StartTrackEgress(capture server)
//! ```

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::config::RelayConfig;
use crate::livekit::{
    AccessToken, EgressClient, RoomServiceClient, TrackKind, VideoGrant, WebhookEvent,
    WebhookEventKind, WebhookReceiver,
};

/// Shared state behind the router.
pub struct RelayState {
    config: RelayConfig,
    rooms: RoomServiceClient,
    egress: EgressClient,
    webhooks: WebhookReceiver,
}

impl RelayState {
    pub fn new(config: RelayConfig) -> Self {
        let rooms = RoomServiceClient::new(&config.livekit_url, &config.api_key, &config.api_secret);
        let egress = EgressClient::new(&config.livekit_url, &config.api_key, &config.api_secret);
        let webhooks = WebhookReceiver::new(&config.api_key, &config.api_secret);
        Self {
            config,
            rooms,
            egress,
            webhooks,
        }
    }
}

/// Build the relay router. CORS is wide open: the token endpoint is called
/// straight from browser demo pages.
pub fn create_router(state: Arc<RelayState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/get-token", get(get_token))
        .route("/webhooks", post(receive_webhook))
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    token: String,
    user: String,
}

/// `GET /get-token?username=<identity>`
///
/// Mints a join credential for the configured room. The room does not need
/// to exist yet; it is created when the first participant joins. There is no
/// auth on this endpoint — demo-grade by design.
async fn get_token(
    State(state): State<Arc<RelayState>>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<TokenResponse>, (StatusCode, &'static str)> {
    let username = match query.username {
        Some(u) if !u.is_empty() => u,
        _ => return Err((StatusCode::BAD_REQUEST, "username is required")),
    };

    log::info!("Relay: issuing token for {:?}", username);

    let token = AccessToken::new(&state.config.api_key, &state.config.api_secret)
        .with_identity(&username)
        .with_grants(VideoGrant::room_join(&state.config.room_name))
        .to_jwt()
        .map_err(|e| {
            log::error!("Relay: failed to mint token: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to mint token")
        })?;

    // Log the rooms the server currently knows about, without holding up
    // the response.
    let rooms = state.rooms.clone();
    tokio::spawn(async move {
        match rooms.list_rooms().await {
            Ok(rooms) => log::info!("Relay: existing rooms: {:?}", rooms),
            Err(e) => log::warn!("Relay: could not list rooms: {}", e),
        }
    });

    Ok(Json(TokenResponse {
        token,
        user: username,
    }))
}

/// `POST /webhooks`
///
/// Body is the raw `application/webhook+json` payload; the `Authorization`
/// header carries the server's signature. A request that fails verification
/// is rejected outright and nothing in it is acted on.
async fn receive_webhook(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let event = match state.webhooks.receive(&body, auth) {
        Ok(event) => event,
        Err(e) => {
            log::warn!("Relay: rejected webhook: {}", e);
            return StatusCode::UNAUTHORIZED;
        }
    };

    handle_event(&state, &event);
    StatusCode::OK
}

/// React to a verified event. Egress is started fire-and-forget: the webhook
/// response never waits on it and a failure is only logged.
fn handle_event(state: &Arc<RelayState>, event: &WebhookEvent) {
    log::debug!("Relay: event {:?}", event.event);

    if event.event == WebhookEventKind::ParticipantJoined {
        if let Some(participant) = &event.participant {
            // The egress worker joins alongside the real participant, so
            // this fires for both.
            log::info!("Relay: participant joined: {}", participant.identity);
        }
    }

    if let Some(track_sid) = egress_track(event) {
        let egress = state.egress.clone();
        let room = state.config.room_name.clone();
        let target = state.config.websocket_server_url.clone();
        let track_sid = track_sid.to_string();

        tokio::spawn(async move {
            match egress.start_track_egress(&room, &target, &track_sid).await {
                Ok(info) => log::info!("Relay: egress started: {:?}", info),
                Err(e) => {
                    log::warn!("Relay: failed to start egress for {}: {}", track_sid, e)
                }
            }
        });
    }
}

/// The audio-only egress filter: returns the track to record, if any.
///
/// Only a `track_published` event for an audio track qualifies; video and
/// data tracks, and every other event kind, are ignored.
pub fn egress_track(event: &WebhookEvent) -> Option<&str> {
    if event.event != WebhookEventKind::TrackPublished {
        return None;
    }
    match &event.track {
        Some(track) if track.kind == TrackKind::Audio => Some(&track.sid),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::livekit::token::{encode_jwt, Claims};
    use axum::body::Body;
    use axum::http::Request;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use chrono::Utc;
    use http_body_util::BodyExt;
    use sha2::{Digest, Sha256};
    use tower::ServiceExt;

    fn test_router() -> Router {
        create_router(Arc::new(RelayState::new(RelayConfig::default())))
    }

    fn signed_auth(body: &[u8]) -> String {
        let now = Utc::now().timestamp();
        let claims = Claims {
            iss: "devkey".to_string(),
            sub: None,
            nbf: now,
            exp: now + 300,
            video: None,
            sha256: Some(STANDARD.encode(Sha256::digest(body))),
        };
        encode_jwt(&claims, "secret").unwrap()
    }

    fn track_published(kind: &str) -> String {
        format!(
            r#"{{"event":"track_published","room":{{"name":"my-room"}},"track":{{"sid":"TR_1","type":"{}"}}}}"#,
            kind
        )
    }

    #[tokio::test]
    async fn test_get_token_returns_credential() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/get-token?username=alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["user"], "alice");

        // The token must verify against our secret and carry the join grant.
        let claims =
            crate::livekit::token::verify_jwt(json["token"].as_str().unwrap(), "secret").unwrap();
        assert_eq!(claims.sub.as_deref(), Some("alice"));
        assert_eq!(claims.video.unwrap().room_join, Some(true));
    }

    #[tokio::test]
    async fn test_get_token_requires_username() {
        for uri in ["/get-token", "/get-token?username="] {
            let response = test_router()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "for {}", uri);
        }
    }

    #[tokio::test]
    async fn test_webhook_bad_signature_rejected() {
        let body = track_published("AUDIO");

        let response = test_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhooks")
                    .header("Authorization", "bogus.token.here")
                    .header("Content-Type", "application/webhook+json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_webhook_valid_event_accepted() {
        // The egress call itself is fire-and-forget (and fails against a dev
        // server that isn't running); the webhook must still be accepted.
        let body = track_published("AUDIO");
        let auth = signed_auth(body.as_bytes());

        let response = test_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhooks")
                    .header("Authorization", auth)
                    .header("Content-Type", "application/webhook+json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_egress_track_audio_only() {
        let audio: WebhookEvent = serde_json::from_str(&track_published("AUDIO")).unwrap();
        assert_eq!(egress_track(&audio), Some("TR_1"));

        let video: WebhookEvent = serde_json::from_str(&track_published("VIDEO")).unwrap();
        assert_eq!(egress_track(&video), None);
    }

    #[test]
    fn test_egress_track_ignores_other_events() {
        let joined: WebhookEvent = serde_json::from_str(
            r#"{"event":"participant_joined","participant":{"identity":"alice"}}"#,
        )
        .unwrap();
        assert_eq!(egress_track(&joined), None);

        // track_published with no track descriptor at all
        let bare: WebhookEvent =
            serde_json::from_str(r#"{"event":"track_published"}"#).unwrap();
        assert_eq!(egress_track(&bare), None);
    }
}
