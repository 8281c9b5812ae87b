//! WebSocket listener for exported audio streams
//!
//! Accepts one persistent connection per egress session and drives its
//! capture lifecycle: `Open -> Receiving (loop) -> Closed`. Each connection
//! runs in its own task and owns its `CaptureSession`, so nothing is shared
//! across connections.
//!
//! Within a connection, the message stream and the flush ticker are both
//! polled from a single `select!` loop. That one task is the only writer the
//! buffers ever see, so an append can never interleave with the
//! concatenate-then-clear of a flush, and dropping out of the loop on close
//! also drops the ticker. No further flushes can fire once the close path
//! has started.

use std::net::SocketAddr;

use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use crate::config::CaptureConfig;

use super::session::CaptureSession;

/// Errors that can occur while starting the capture server.
#[derive(Debug)]
pub enum CaptureError {
    /// Failed to bind the listen socket.
    BindFailed(String),
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::BindFailed(e) => write!(f, "Failed to bind capture socket: {}", e),
        }
    }
}

impl std::error::Error for CaptureError {}

/// The capture server: a bound listener plus the capture configuration
/// handed to every connection.
pub struct CaptureServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: CaptureConfig,
}

impl CaptureServer {
    /// Bind the configured listen address. Port 0 is supported; the actual
    /// port is available from [`local_addr`](Self::local_addr).
    pub async fn bind(config: CaptureConfig) -> Result<Self, CaptureError> {
        let listener = TcpListener::bind(&config.listen_addr)
            .await
            .map_err(|e| CaptureError::BindFailed(format!("{}: {}", config.listen_addr, e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| CaptureError::BindFailed(e.to_string()))?;

        log::info!("Capture: listening on {}", local_addr);
        Ok(Self {
            listener,
            local_addr,
            config,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until the task is dropped. Accept failures are
    /// logged and do not stop the listener.
    pub async fn run(self) {
        let mut next_conn: u64 = 0;

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let conn = next_conn;
                    next_conn += 1;
                    log::info!("Capture: connection #{} from {}", conn, peer);

                    let config = self.config.clone();
                    tokio::spawn(async move {
                        handle_connection(stream, conn, config).await;
                    });
                }
                Err(e) => {
                    log::warn!("Capture: accept failed: {}", e);
                }
            }
        }
    }
}

/// Drive one egress connection from handshake to final write.
async fn handle_connection(stream: TcpStream, conn: u64, config: CaptureConfig) {
    let mut ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            log::warn!("Capture: connection #{} handshake failed: {}", conn, e);
            return;
        }
    };

    let mut session = CaptureSession::new(config.output_dir.clone(), config.format);

    // First flush happens one full interval after connect, not immediately.
    let mut ticker = tokio::time::interval_at(
        tokio::time::Instant::now() + config.flush_interval,
        config.flush_interval,
    );
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            msg = ws.next() => match msg {
                Some(Ok(Message::Binary(data))) => {
                    log::debug!("Capture: connection #{} received {} bytes", conn, data.len());
                    session.append(data);
                }
                Some(Ok(Message::Text(text))) => {
                    // The egress sends JSON mute/unmute events as text frames.
                    log::debug!("Capture: connection #{} text frame: {}", conn, text);
                }
                Some(Ok(Message::Close(_))) | None => break,
                // Ping/pong are answered by tungstenite itself.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    log::warn!("Capture: connection #{} error: {}", conn, e);
                    break;
                }
            },
            _ = ticker.tick() => {
                session.flush_rolling();
            }
        }
    }

    // The ticker is never polled again once the loop exits; only the final
    // write remains.
    session.finalize();
    log::info!("Capture: connection #{} closed", conn);
}
