//! Inter-node frame codec
//!
//! Each sample crosses the link as exactly three bytes: the two payload
//! bytes of a little-endian `i16` followed by a zero terminator. There is
//! no checksum and no escape mechanism, so a zero payload byte is only
//! recognized as data by its position.
//!
//! The decoder resynchronizes only when a zero byte arrives while a full
//! payload is buffered. Bytes arriving while it waits for that terminator
//! are dropped and reported as [`DecodeOutcome::Dropped`].

use crate::sample::RawSample;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI16, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Frame delimiter
pub const TERMINATOR: u8 = 0x00;

/// Payload bytes per sample
pub const PAYLOAD_LEN: usize = 2;

/// Total bytes per sample on the wire
pub const FRAME_LEN: usize = PAYLOAD_LEN + 1;

/// Encode one sample as payload plus terminator
pub fn encode_frame(value: RawSample) -> [u8; FRAME_LEN] {
    let [low, high] = value.to_le_bytes();
    [low, high, TERMINATOR]
}

/// Reinterpret two payload bytes as a sample
pub fn decode_payload(payload: [u8; PAYLOAD_LEN]) -> RawSample {
    RawSample::from_le_bytes(payload)
}

/// What the decoder did with one byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// Byte stored as payload, frame not complete yet
    Pending,
    /// Terminator seen after a full payload
    Frame(RawSample),
    /// Payload already full and byte was not a terminator
    Dropped,
}

/// Decoder counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderStats {
    /// Frames successfully decoded
    pub frames: u64,
    /// Bytes discarded while waiting for a terminator
    pub dropped_bytes: u64,
    /// Frames decoded right after one or more dropped bytes
    pub resyncs: u64,
}

/// Byte-at-a-time frame reassembly
#[derive(Debug, Clone, Default)]
pub struct FrameDecoder {
    payload: [u8; PAYLOAD_LEN],
    filled: usize,
    dropped_since_frame: u64,
    last_value: Option<RawSample>,
    stats: DecoderStats,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte from the link
    pub fn push(&mut self, byte: u8) -> DecodeOutcome {
        if byte == TERMINATOR && self.filled >= PAYLOAD_LEN {
            let value = decode_payload(self.payload);
            self.filled = 0;
            self.stats.frames += 1;
            if self.dropped_since_frame > 0 {
                self.stats.resyncs += 1;
                debug!(dropped = self.dropped_since_frame, value, "frame decoder resynchronized");
                self.dropped_since_frame = 0;
            }
            self.last_value = Some(value);
            DecodeOutcome::Frame(value)
        } else if self.filled < PAYLOAD_LEN {
            self.payload[self.filled] = byte;
            self.filled += 1;
            DecodeOutcome::Pending
        } else {
            self.stats.dropped_bytes += 1;
            self.dropped_since_frame += 1;
            DecodeOutcome::Dropped
        }
    }

    /// Feed a chunk of bytes, returning the last sample decoded in it
    pub fn feed(&mut self, bytes: &[u8]) -> Option<RawSample> {
        let mut latest = None;
        for &byte in bytes {
            if let DecodeOutcome::Frame(value) = self.push(byte) {
                latest = Some(value);
            }
        }
        latest
    }

    /// A full payload is buffered and only a terminator can complete it
    pub fn is_awaiting_terminator(&self) -> bool {
        self.filled >= PAYLOAD_LEN
    }

    /// Number of payload bytes currently buffered
    pub fn buffered(&self) -> usize {
        self.filled
    }

    /// Most recent decoded sample, if any
    pub fn last_value(&self) -> Option<RawSample> {
        self.last_value
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Drop any partial payload and clear counters
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Latest decoded sample shared between the link reader and the tick step
///
/// Writers and readers never block; a reader may see a value that is one
/// frame old but never a half-written one.
#[derive(Debug, Clone, Default)]
pub struct LatestSample {
    value: Arc<AtomicI16>,
}

impl LatestSample {
    pub fn new(initial: RawSample) -> Self {
        Self {
            value: Arc::new(AtomicI16::new(initial)),
        }
    }

    #[inline]
    pub fn store(&self, value: RawSample) {
        self.value.store(value, Ordering::Relaxed);
    }

    #[inline]
    pub fn load(&self) -> RawSample {
        self.value.load(Ordering::Relaxed)
    }
}
