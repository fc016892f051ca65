//! Adaptive QRS peak detector
//!
//! A simplified Pan–Tompkins threshold detector running on the integrator
//! output. A running peak follows local maxima; once it crosses the
//! threshold the detector enters the inside-beat state. When the signal has
//! decayed below half of the running peak, the peak is latched and
//! classified as a signal or noise peak, and the threshold is recomputed
//! from the exponentially smoothed peak estimates:
//!
//! ```text
//! spki = peak/8 + 7*spki/8        (signal peak)
//! npki = peak/8 + 7*npki/8        (noise peak)
//! threshold = npki + (spki - npki)/4
//! ```
//!
//! Finalizing a peak does not leave the inside-beat state; the owner calls
//! [`PeakDetector::end_beat`] once the beat epoch has been consumed.

use sa_core::History;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Weight of a new peak in the smoothed estimates
pub const PEAK_SMOOTHING: f32 = 1.0 / 8.0;
/// Position of the threshold between noise and signal estimates
pub const THRESHOLD_FRACTION: f32 = 1.0 / 4.0;
/// Fraction of the running peak the signal must fall below to finalize
pub const PEAK_DECAY_FRACTION: f32 = 0.5;

/// Classification of a finalized peak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeakClass {
    Signal,
    Noise,
}

/// A peak latched when the signal decayed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinalizedPeak {
    pub value: f32,
    pub class: PeakClass,
    /// Threshold after the estimates were updated
    pub threshold: f32,
}

/// What happened during one detector update
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DetectorEvent {
    /// Running peak crossed the threshold while outside a beat
    pub onset: bool,
    /// Peak finalized this tick
    pub peak: Option<FinalizedPeak>,
}

/// Threshold state machine on the integrator output
#[derive(Debug, Clone)]
pub struct PeakDetector {
    /// Last three integrator values, newest first
    recent: History<3>,
    running_peak: f32,
    latched_peak: f32,
    signal_peak: f32,
    noise_peak: f32,
    threshold: f32,
    in_beat: bool,
    indicator: bool,
    threshold_resets: u64,
}

impl PeakDetector {
    /// Create a detector in the warm-up state (all estimates zero)
    pub fn new() -> Self {
        Self {
            recent: History::new(),
            running_peak: 0.0,
            latched_peak: 0.0,
            signal_peak: 0.0,
            noise_peak: 0.0,
            threshold: 0.0,
            in_beat: false,
            indicator: false,
            threshold_resets: 0,
        }
    }

    /// Process one integrator sample
    pub fn update(&mut self, integrated: f32) -> DetectorEvent {
        let mut event = DetectorEvent::default();

        self.recent.push(integrated);
        let newest = self.recent.newest();
        let two_ago = self.recent.oldest();

        if newest > two_ago && newest > self.running_peak {
            self.running_peak = newest;
        }

        if self.running_peak > self.threshold && !self.in_beat {
            self.in_beat = true;
            self.indicator = true;
            event.onset = true;
        }

        if newest <= two_ago && newest < PEAK_DECAY_FRACTION * self.running_peak {
            event.peak = Some(self.finalize_peak());
        }

        event
    }

    fn finalize_peak(&mut self) -> FinalizedPeak {
        self.latched_peak = self.running_peak;
        self.indicator = false;

        let class = if self.latched_peak > self.threshold {
            self.signal_peak =
                PEAK_SMOOTHING * self.latched_peak + (1.0 - PEAK_SMOOTHING) * self.signal_peak;
            PeakClass::Signal
        } else {
            self.noise_peak =
                PEAK_SMOOTHING * self.latched_peak + (1.0 - PEAK_SMOOTHING) * self.noise_peak;
            PeakClass::Noise
        };

        let threshold =
            self.noise_peak + THRESHOLD_FRACTION * (self.signal_peak - self.noise_peak);
        if threshold.is_finite() {
            self.threshold = threshold;
        } else {
            self.threshold_resets += 1;
            warn!(
                peak = self.latched_peak,
                spki = self.signal_peak,
                npki = self.noise_peak,
                "non-finite detection threshold, restarting warm-up"
            );
            self.signal_peak = 0.0;
            self.noise_peak = 0.0;
            self.threshold = 0.0;
        }

        self.running_peak = 0.0;

        FinalizedPeak {
            value: self.latched_peak,
            class,
            threshold: self.threshold,
        }
    }

    /// Leave the inside-beat state so the next threshold crossing is an onset
    pub fn end_beat(&mut self) {
        self.in_beat = false;
    }

    pub fn in_beat(&self) -> bool {
        self.in_beat
    }

    /// Raised at onset, lowered when a peak is finalized
    pub fn beat_indicator(&self) -> bool {
        self.indicator
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn running_peak(&self) -> f32 {
        self.running_peak
    }

    pub fn latched_peak(&self) -> f32 {
        self.latched_peak
    }

    /// Smoothed signal peak estimate (spki)
    pub fn signal_peak(&self) -> f32 {
        self.signal_peak
    }

    /// Smoothed noise peak estimate (npki)
    pub fn noise_peak(&self) -> f32 {
        self.noise_peak
    }

    /// How often a non-finite threshold forced a restart
    pub fn threshold_resets(&self) -> u64 {
        self.threshold_resets
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for PeakDetector {
    fn default() -> Self {
        Self::new()
    }
}
