//! Service configuration
//!
//! Everything is driven by environment variables with hardcoded local-dev
//! fallbacks, so `cargo run --bin relay` against a `livekit-server --dev`
//! instance works with no setup. A `.env` file is honored when present
//! (loaded by the binaries before config is read).

use std::path::PathBuf;
use std::time::Duration;

/// Read an environment variable, falling back when unset or empty.
fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => v,
        _ => default.to_string(),
    }
}

/// PCM format of the captured stream.
///
/// Fixed for the whole process; the egress is configured to produce exactly
/// this format, so nothing is negotiated per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 96_000,
            channels: 1,
            bits_per_sample: 16,
        }
    }
}

impl AudioFormat {
    pub fn bytes_per_sample(&self) -> u16 {
        self.bits_per_sample / 8
    }

    /// Bytes of audio per second of wall time.
    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.channels as u32 * self.bytes_per_sample() as u32
    }

    /// Bytes per sample frame across all channels.
    pub fn block_align(&self) -> u16 {
        self.channels * self.bytes_per_sample()
    }
}

/// Configuration for the token/webhook relay service.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// LiveKit server URL (`ws://` form, as handed to clients).
    pub livekit_url: String,
    /// API key/secret pair shared with the LiveKit server.
    pub api_key: String,
    pub api_secret: String,
    /// Capture server address as reachable *from the egress*, which may run
    /// in a container with a different view of the network.
    pub websocket_server_url: String,
    /// Room that issued tokens grant access to.
    pub room_name: String,
    /// Bind address for the HTTP API.
    pub listen_addr: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            livekit_url: "ws://localhost:7880".to_string(),
            api_key: "devkey".to_string(),
            api_secret: "secret".to_string(),
            websocket_server_url: "ws://192.168.65.2:8080".to_string(),
            room_name: "my-room".to_string(),
            listen_addr: "0.0.0.0:3001".to_string(),
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            livekit_url: env_or("LIVEKIT_URL", &defaults.livekit_url),
            api_key: env_or("LIVEKIT_API_KEY", &defaults.api_key),
            api_secret: env_or("LIVEKIT_API_SECRET", &defaults.api_secret),
            websocket_server_url: env_or(
                "WEBSOCKET_SERVER_URL",
                &defaults.websocket_server_url,
            ),
            room_name: env_or("ROOM_NAME", &defaults.room_name),
            listen_addr: env_or("RELAY_BIND", &defaults.listen_addr),
        }
    }
}

/// Configuration for the capture server.
///
/// One parameterized implementation covers both the fixed local setup and
/// environment-driven deployments.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Bind address for the WebSocket listener.
    pub listen_addr: String,
    /// How often the rolling buffer is flushed to a numbered snapshot file.
    pub flush_interval: Duration,
    /// Directory WAV files are written to.
    pub output_dir: PathBuf,
    pub format: AudioFormat,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            flush_interval: Duration::from_secs(3),
            output_dir: PathBuf::from("."),
            format: AudioFormat::default(),
        }
    }
}

impl CaptureConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let flush_interval = match env_or("FLUSH_INTERVAL_MS", "3000").parse::<u64>() {
            Ok(ms) if ms > 0 => Duration::from_millis(ms),
            _ => {
                log::warn!("Config: invalid FLUSH_INTERVAL_MS, using 3000");
                defaults.flush_interval
            }
        };

        Self {
            listen_addr: env_or("CAPTURE_BIND", &defaults.listen_addr),
            flush_interval,
            output_dir: PathBuf::from(env_or("OUTPUT_DIR", ".")),
            format: AudioFormat::default(),
        }
    }
}
