//! Frame decoder — splits the raw response body into `\n\n`-terminated frames.
//!
//! Chunk boundaries from the network carry no meaning: a frame is emitted only
//! once its terminator has been seen, and whatever follows the last terminator
//! is kept and prefixed onto the next chunk.

use bytes::{Buf, Bytes, BytesMut};

use crate::errors::FrameError;

pub const DEFAULT_MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

const TERMINATOR: &[u8] = b"\n\n";

#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    /// Offset up to which `buffer` is known to hold no terminator.
    scanned: usize,
    max_frame_bytes: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl FrameDecoder {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            scanned: 0,
            max_frame_bytes,
        }
    }

    /// Appends a chunk of transport bytes.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Pops the next complete frame (terminator stripped), if one is buffered.
    ///
    /// Fails once the unterminated tail grows past the configured limit.
    /// Frames already returned are unaffected and no partial frame is emitted.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, FrameError> {
        // Back up one byte so a terminator split across two pushes is found.
        let from = self.scanned.saturating_sub(TERMINATOR.len() - 1);
        match find(&self.buffer[from..], TERMINATOR) {
            Some(offset) => {
                let frame = self.buffer.split_to(from + offset).freeze();
                self.buffer.advance(TERMINATOR.len());
                self.scanned = 0;
                Ok(Some(frame))
            }
            None => {
                self.scanned = self.buffer.len();
                if self.buffer.len() > self.max_frame_bytes {
                    return Err(FrameError::Oversized {
                        limit: self.max_frame_bytes,
                    });
                }
                Ok(None)
            }
        }
    }

    /// Pushes `chunk` and drains every frame it completes.
    pub fn decode(&mut self, chunk: &[u8]) -> Result<Vec<Bytes>, FrameError> {
        self.push(chunk);
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Ends the stream, handing back any undelimited trailing bytes.
    /// They are not a frame; callers report and discard them.
    pub fn finish(&mut self) -> Option<Bytes> {
        self.scanned = 0;
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.buffer.split().freeze())
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
