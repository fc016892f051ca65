//! Recorded waveform files and looping playback
//!
//! A record is a flat sequence of fixed-width data points. Each data point
//! is six bytes: an ASCII integer right-aligned in the first five bytes
//! followed by a line terminator that is ignored when parsing.

use sa_core::{format_error, RawSample, SaError, SaResult, SampleSource};
use std::path::Path;
use tracing::{debug, info};

/// Bytes per data point, terminator included
pub const DATAPOINT_LEN: usize = 6;

/// Parse one data point the way C `atoi` would
///
/// Only the digit field is read; the terminator slot is ignored whatever
/// it holds. Leading whitespace is skipped, one optional sign is accepted,
/// and digits are read until the first non-digit. No digits gives 0.
/// Values outside the sample range saturate.
pub fn parse_datapoint(bytes: &[u8]) -> RawSample {
    let field = &bytes[..bytes.len().min(DATAPOINT_LEN - 1)];
    let mut rest = field
        .iter()
        .copied()
        .skip_while(|&b| matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c))
        .peekable();

    let negative = match rest.peek().copied() {
        Some(b'-') => {
            rest.next();
            true
        }
        Some(b'+') => {
            rest.next();
            false
        }
        _ => false,
    };

    let magnitude = rest
        .take_while(u8::is_ascii_digit)
        .fold(0i32, |acc, digit| acc.saturating_mul(10).saturating_add((digit - b'0') as i32));
    let value = if negative { -magnitude } else { magnitude };

    value.clamp(RawSample::MIN as i32, RawSample::MAX as i32) as RawSample
}

/// Split a record into data points; a trailing partial data point is ignored
pub fn parse_record(bytes: &[u8]) -> SaResult<Vec<RawSample>> {
    if bytes.len() < DATAPOINT_LEN {
        return Err(format_error!(
            "record of {} bytes holds no complete {}-byte data point",
            bytes.len(),
            DATAPOINT_LEN
        ));
    }

    let trailing = bytes.len() % DATAPOINT_LEN;
    if trailing != 0 {
        debug!(trailing, "ignoring partial data point at end of record");
    }

    Ok(bytes.chunks_exact(DATAPOINT_LEN).map(parse_datapoint).collect())
}

/// Render samples in the fixed-width record layout
pub fn format_record(samples: &[RawSample]) -> SaResult<Vec<u8>> {
    let mut out = Vec::with_capacity(samples.len() * DATAPOINT_LEN);
    for (index, &sample) in samples.iter().enumerate() {
        let text = format!("{:>5}\n", sample);
        if text.len() != DATAPOINT_LEN {
            return Err(format_error!(
                "sample {} at index {} does not fit a {}-byte data point",
                sample,
                index,
                DATAPOINT_LEN
            ));
        }
        out.extend_from_slice(text.as_bytes());
    }
    Ok(out)
}

/// Read and parse a record file
pub fn load_record(path: impl AsRef<Path>) -> SaResult<Vec<RawSample>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .map_err(|e| format_error!("cannot read record {}: {}", path.display(), e))?;
    let samples = parse_record(&bytes)?;
    info!(path = %path.display(), data_points = samples.len(), "record loaded");
    Ok(samples)
}

/// Endless playback of a window of a record
#[derive(Debug, Clone)]
pub struct RecordPlayer {
    name: String,
    samples: Vec<RawSample>,
    start: usize,
    end: usize,
    position: usize,
    loops: u64,
}

impl RecordPlayer {
    /// Play `samples[start..end]` on a loop
    ///
    /// `end == 0` or an `end` past the record means "to the end of the record".
    pub fn new(samples: Vec<RawSample>, start: usize, end: usize) -> SaResult<Self> {
        let available = samples.len();
        let range_error = |reason| SaError::PlaybackRange {
            start,
            end,
            available,
            reason,
        };

        if available == 0 {
            return Err(range_error("record holds no data points"));
        }
        if end != 0 && start > end {
            return Err(range_error("start is after end"));
        }
        if start >= available {
            return Err(range_error("start is past the end of the record"));
        }

        let stop = if end == 0 || end > available { available } else { end };
        if start == stop {
            return Err(range_error("playback window is empty"));
        }

        Ok(Self {
            name: "record".to_string(),
            samples,
            start,
            end: stop,
            position: start,
            loops: 0,
        })
    }

    /// Load a record file and play a window of it
    pub fn from_file(path: impl AsRef<Path>, start: usize, end: usize) -> SaResult<Self> {
        let path = path.as_ref();
        let mut player = Self::new(load_record(path)?, start, end)?;
        player.name = path.display().to_string();
        Ok(player)
    }

    /// Effective playback window
    pub fn window(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Completed passes over the window
    pub fn loops(&self) -> u64 {
        self.loops
    }
}

impl SampleSource for RecordPlayer {
    fn next_sample(&mut self) -> Option<RawSample> {
        let sample = self.samples[self.position];
        self.position += 1;
        if self.position >= self.end {
            self.position = self.start;
            self.loops += 1;
            debug!(loops = self.loops, "record playback wrapped");
        }
        Some(sample)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
