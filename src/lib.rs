//! roomtap — demo backend for recording audio from a LiveKit room
//!
//! Two independent services built from this library:
//!
//! - `relay` (HTTP, port 3001): mints room-join tokens and receives signed
//!   room webhooks, starting a track egress when audio is published.
//! - `capture` (WebSocket, port 8080): receives the exported raw PCM stream
//!   and writes it to disk as WAV snapshots plus a whole-session file.
//!
//! They do not talk to each other directly; the LiveKit egress connects the
//! two at runtime.

pub mod capture;
pub mod config;
pub mod livekit;
pub mod relay;
