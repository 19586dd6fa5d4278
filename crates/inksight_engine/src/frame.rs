//! Line framing for streamed chat replies.
//!
//! The body is a sequence of newline-delimited lines. Only lines that start
//! with [`FRAME_PREFIX`] carry a frame; the rest of such a line is a JSON
//! object with a `type` discriminator.

use bytes::BytesMut;
use inksight_logging::{ink_debug, ink_warn};
use serde::Deserialize;
use serde_json::Value;

use crate::{ChatFrame, SourceImage};

pub const FRAME_PREFIX: &str = "data: ";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("malformed frame payload: {0}")]
    Malformed(String),
    #[error("unrecognized frame type {0:?}")]
    UnknownType(String),
}

#[derive(Deserialize)]
struct SourceImagesPayload {
    images: Vec<SourceImage>,
}

#[derive(Deserialize)]
struct ResponsePayload {
    content: String,
}

/// Parses one line of the body.
///
/// Returns `Ok(None)` for lines that are not frames (blank keep-alives,
/// comments, other event fields).
pub fn parse_frame_line(line: &str) -> Result<Option<ChatFrame>, FrameError> {
    let Some(payload) = line.strip_prefix(FRAME_PREFIX) else {
        return Ok(None);
    };

    let value: Value =
        serde_json::from_str(payload).map_err(|err| FrameError::Malformed(err.to_string()))?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| FrameError::Malformed("missing type".to_string()))?
        .to_string();

    match kind.as_str() {
        "source_images" => {
            let payload: SourceImagesPayload = serde_json::from_value(value)
                .map_err(|err| FrameError::Malformed(err.to_string()))?;
            Ok(Some(ChatFrame::SourceImages(payload.images)))
        }
        "response" => {
            let payload: ResponsePayload = serde_json::from_value(value)
                .map_err(|err| FrameError::Malformed(err.to_string()))?;
            Ok(Some(ChatFrame::Response(payload.content)))
        }
        _ => Err(FrameError::UnknownType(kind)),
    }
}

/// Longest line the decoder buffers before giving up on it.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Incremental decoder that survives frames split across chunk boundaries.
///
/// Lines longer than the configured limit are dropped as they stream in and
/// counted as skipped. The buffer never holds more than the limit.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    /// Prefix of `buf` already known to hold no newline.
    scanned: usize,
    max_line: usize,
    /// Inside an oversized line; drop bytes up to the next newline.
    discarding: bool,
    skipped: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_max_line(DEFAULT_MAX_LINE_BYTES)
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            scanned: 0,
            max_line,
            discarding: false,
            skipped: 0,
        }
    }

    /// Feeds a chunk and returns every frame completed by it, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<ChatFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(offset) = self.buf[self.scanned..]
            .iter()
            .position(|byte| *byte == b'\n')
        {
            let end = self.scanned + offset;
            let line = self.buf.split_to(end + 1);
            self.scanned = 0;
            if std::mem::take(&mut self.discarding) {
                continue;
            }
            if end > self.max_line {
                self.skip_oversized(end);
                continue;
            }
            if let Some(frame) = self.decode_line(&line[..end]) {
                frames.push(frame);
            }
        }

        if !self.discarding && self.buf.len() > self.max_line {
            self.skip_oversized(self.buf.len());
            self.discarding = true;
        }
        if self.discarding {
            self.buf.clear();
        }
        self.scanned = self.buf.len();
        frames
    }

    /// Decodes a trailing line left without a final newline.
    pub fn finish(&mut self) -> Vec<ChatFrame> {
        self.scanned = 0;
        if std::mem::take(&mut self.discarding) || self.buf.is_empty() {
            self.buf.clear();
            return Vec::new();
        }
        let line = self.buf.split();
        self.decode_line(&line).into_iter().collect()
    }

    /// Number of lines dropped as malformed, unrecognized or oversized so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn skip_oversized(&mut self, len: usize) {
        ink_warn!(
            "Skipping line over {} bytes (at least {} buffered)",
            self.max_line,
            len
        );
        self.skipped += 1;
    }

    fn decode_line(&mut self, raw: &[u8]) -> Option<ChatFrame> {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line,
            Err(err) => {
                ink_warn!("Skipping non UTF-8 line ({} bytes): {}", raw.len(), err);
                self.skipped += 1;
                return None;
            }
        };

        match parse_frame_line(line) {
            Ok(frame) => frame,
            Err(FrameError::UnknownType(kind)) => {
                ink_debug!("Skipping frame with unrecognized type {:?}", kind);
                self.skipped += 1;
                None
            }
            Err(err) => {
                ink_warn!("Skipping frame ({} bytes): {}", line.len(), err);
                self.skipped += 1;
                None
            }
        }
    }
}
