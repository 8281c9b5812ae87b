//! LiveKit boundary
//!
//! Everything the backend needs from the LiveKit server, expressed through
//! its documented wire contracts rather than an SDK: HS256 access tokens,
//! signed webhook verification, and the two Twirp calls we make
//! (`ListRooms`, `StartTrackEgress`). Room and session management stay on
//! the server side; nothing in here holds state.

mod client;
pub mod token;
mod webhook;

pub use client::{http_url, ClientError, EgressClient, EgressInfo, Room, RoomServiceClient};
pub use token::{AccessToken, TokenError, VideoGrant};
pub use webhook::{
    ParticipantDetails, RoomDetails, TrackDetails, TrackKind, WebhookError, WebhookEvent,
    WebhookEventKind, WebhookReceiver,
};
