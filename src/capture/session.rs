//! Per-connection capture state
//!
//! Each egress connection owns exactly one `CaptureSession`; it is created on
//! connect and dropped when the connection task exits, so no capture state
//! outlives or crosses connections. The session keeps two chunk lists: a
//! rolling window cleared on every flush, and a whole-session accumulator
//! cleared only at close. The accumulator is unbounded for the life of the
//! connection, which is a known growth risk for very long sessions.

use std::path::PathBuf;

use crate::config::AudioFormat;

use super::wav::write_wav;

/// Final whole-session capture file name.
const SESSION_FILE: &str = "sound.wav";

/// State for one inbound egress connection.
pub struct CaptureSession {
    /// Chunks since the last flush, in arrival order.
    rolling: Vec<Vec<u8>>,
    /// Every chunk since connect, in arrival order.
    whole: Vec<Vec<u8>>,
    /// Next rolling snapshot number; `sound_0.wav`, `sound_1.wav`, ...
    seq: u32,
    output_dir: PathBuf,
    format: AudioFormat,
}

impl CaptureSession {
    pub fn new(output_dir: PathBuf, format: AudioFormat) -> Self {
        Self {
            rolling: Vec::new(),
            whole: Vec::new(),
            seq: 0,
            output_dir,
            format,
        }
    }

    /// Append one received chunk to both buffers.
    ///
    /// The payload is opaque: it is never decoded or validated as audio.
    pub fn append(&mut self, chunk: Vec<u8>) {
        self.rolling.push(chunk.clone());
        self.whole.push(chunk);
    }

    /// Number of bytes waiting in the rolling buffer.
    pub fn pending_bytes(&self) -> usize {
        self.rolling.iter().map(|c| c.len()).sum()
    }

    /// Write the rolling buffer to the next numbered snapshot file and clear
    /// it. Returns the written path, or `None` when the buffer was empty and
    /// nothing was written.
    ///
    /// On a write failure the buffer is still cleared: that interval's audio
    /// is dropped with an error log rather than re-buffered.
    pub fn flush_rolling(&mut self) -> Option<PathBuf> {
        if self.rolling.is_empty() {
            return None;
        }

        let data: Vec<u8> = self.rolling.concat();
        self.rolling.clear();

        let path = self.output_dir.join(format!("sound_{}.wav", self.seq));
        self.seq += 1;

        match write_wav(&path, &data, &self.format) {
            Ok(()) => {
                log::info!(
                    "Capture: saved snippet {:?} ({} bytes of audio)",
                    path,
                    data.len()
                );
                Some(path)
            }
            Err(e) => {
                log::error!("Capture: failed to write {:?}: {}", path, e);
                None
            }
        }
    }

    /// Write the whole-session buffer (possibly empty) to the final file.
    /// Called once, when the connection closes.
    pub fn finalize(self) -> Option<PathBuf> {
        let data: Vec<u8> = self.whole.concat();
        let path = self.output_dir.join(SESSION_FILE);

        match write_wav(&path, &data, &self.format) {
            Ok(()) => {
                log::info!(
                    "Capture: saved session {:?} ({} bytes of audio)",
                    path,
                    data.len()
                );
                Some(path)
            }
            Err(e) => {
                log::error!("Capture: failed to write {:?}: {}", path, e);
                None
            }
        }
    }
}
