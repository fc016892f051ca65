//! Group-delay compensated signal averager
//!
//! Raw samples around each detected beat are summed into a 200-sample
//! template. Detection happens `TOTAL_GROUP_DELAY` ticks after the QRS
//! complex passed through the raw signal, so a ring of the preceding raw
//! samples is injected into the tail of the template on the first in-beat
//! tick, and the following samples are written as they arrive.
//!
//! Template layout (index → raw sample relative to the onset tick `T`):
//!
//! ```text
//! 144 - k   →  raw[T + k]        k = 0..=144, written live
//! 145 + j   →  raw[T - 1 - j]    j = 0..55, injected from the ring
//! ```
//!
//! so index 199 holds the sample exactly `TOTAL_GROUP_DELAY` ticks before
//! the onset. The ring holds only samples older than the onset tick, so the
//! onset sample lands once, at 144. A ring that also held the current sample
//! would write it at both 144 and 145 and end the epoch one index early.
//! After `target` epochs the accumulated sum replaces the stable
//! template and accumulation starts again from zero.

use crate::filters::TOTAL_GROUP_DELAY;
use sa_core::History;
use serde::{Deserialize, Serialize};

/// Samples in one averaged beat template
pub const TEMPLATE_LEN: usize = 200;

/// Raw samples kept for retroactive alignment
pub const GROUP_DELAY_LEN: usize = TOTAL_GROUP_DELAY;

/// First template index written live on each epoch
pub const WRITE_START: usize = TEMPLATE_LEN - GROUP_DELAY_LEN - 1;

/// Epochs summed before a template is published
pub const DEFAULT_EPOCHS: usize = 32;

/// What happened during one averager tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AveragerOutput {
    /// Live averaged value, only produced on in-beat ticks
    pub live: Option<f32>,
    /// The current epoch finished this tick
    pub epoch_completed: bool,
    /// A new stable template was published this tick
    pub template_published: bool,
}

/// Beat-synchronous block averager
#[derive(Debug, Clone)]
pub struct SignalAverager {
    accumulating: [f32; TEMPLATE_LEN],
    stable: [f32; TEMPLATE_LEN],
    /// Raw samples preceding the current tick, offset 0 = previous tick
    delay: History<GROUP_DELAY_LEN>,
    write_index: usize,
    read_index: usize,
    epochs: usize,
    target_epochs: usize,
    templates_published: u64,
    live: f32,
}

impl SignalAverager {
    /// Create an averager publishing after `target_epochs` beats
    pub fn new(target_epochs: usize) -> Self {
        Self {
            accumulating: [0.0; TEMPLATE_LEN],
            stable: [0.0; TEMPLATE_LEN],
            delay: History::new(),
            write_index: WRITE_START,
            read_index: TEMPLATE_LEN - 1,
            epochs: 0,
            target_epochs: target_epochs.max(1),
            templates_published: 0,
            live: 0.0,
        }
    }

    /// Rewind the live read pointer at a beat onset
    pub fn begin_epoch(&mut self) {
        self.read_index = TEMPLATE_LEN - 1;
    }

    /// Consume one raw (normalized, uncentered) sample
    pub fn tick(&mut self, raw: f32, in_beat: bool) -> AveragerOutput {
        let mut output = AveragerOutput::default();

        if in_beat {
            // Until the first template exists the running sum is shown,
            // still divided by the final epoch count.
            let source = if self.templates_published > 0 {
                &self.stable
            } else {
                &self.accumulating
            };
            self.live = source[self.read_index] / self.target_epochs as f32;
            output.live = Some(self.live);

            if self.write_index == WRITE_START {
                for (offset, value) in self.delay.iter().enumerate() {
                    self.accumulating[WRITE_START + 1 + offset] += value;
                }
            }
            self.accumulating[self.write_index] += raw;

            self.read_index = if self.read_index == 0 {
                TEMPLATE_LEN - 1
            } else {
                self.read_index - 1
            };

            if self.write_index == 0 {
                self.write_index = WRITE_START;
                self.epochs += 1;
                output.epoch_completed = true;

                if self.epochs >= self.target_epochs {
                    self.stable = self.accumulating;
                    self.accumulating = [0.0; TEMPLATE_LEN];
                    self.epochs = 0;
                    self.templates_published += 1;
                    output.template_published = true;
                }
            } else {
                self.write_index -= 1;
            }
        }

        self.delay.push(raw);
        output
    }

    /// Averaged template (stable sum / target), once one has been published
    pub fn template(&self) -> Option<[f32; TEMPLATE_LEN]> {
        if self.templates_published == 0 {
            return None;
        }
        let scale = self.target_epochs as f32;
        Some(self.stable.map(|v| v / scale))
    }

    /// Averaged template ordered oldest sample first
    pub fn template_chronological(&self) -> Option<Vec<f32>> {
        self.template().map(|t| t.iter().rev().copied().collect())
    }

    /// Last live value, held between epochs
    pub fn live_value(&self) -> f32 {
        self.live
    }

    /// Raw sum of the last published epochs
    pub fn stable_sum(&self) -> &[f32; TEMPLATE_LEN] {
        &self.stable
    }

    /// Raw sum of the epochs accumulated so far
    pub fn accumulating_sum(&self) -> &[f32; TEMPLATE_LEN] {
        &self.accumulating
    }

    pub fn epochs_accumulated(&self) -> usize {
        self.epochs
    }

    pub fn target_epochs(&self) -> usize {
        self.target_epochs
    }

    pub fn templates_published(&self) -> u64 {
        self.templates_published
    }

    /// Template index the next in-beat sample is written to
    pub fn write_index(&self) -> usize {
        self.write_index
    }

    pub fn read_index(&self) -> usize {
        self.read_index
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.target_epochs);
    }
}

impl Default for SignalAverager {
    fn default() -> Self {
        Self::new(DEFAULT_EPOCHS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPOCH_TICKS: usize = WRITE_START + 1;

    /// Drive one synthetic beat: the pre-onset history, then the in-beat part
    fn drive_epoch(averager: &mut SignalAverager, waveform: &[f32]) -> Vec<AveragerOutput> {
        let (before, after) = waveform.split_at(GROUP_DELAY_LEN);
        for &v in before {
            averager.tick(v, false);
        }
        averager.begin_epoch();
        after.iter().map(|&v| averager.tick(v, true)).collect()
    }

    fn beat_waveform() -> Vec<f32> {
        (0..TEMPLATE_LEN)
            .map(|n| 0.5 + 0.3 * (-((n as f32 - 60.0) / 6.0).powi(2)).exp())
            .collect()
    }

    #[test]
    fn test_constants() {
        assert_eq!(GROUP_DELAY_LEN, 55);
        assert_eq!(WRITE_START, 144);
        assert_eq!(EPOCH_TICKS, 145);
    }

    #[test]
    fn test_epoch_lasts_until_index_zero() {
        let mut averager = SignalAverager::new(4);
        averager.begin_epoch();
        for tick in 0..EPOCH_TICKS {
            let output = averager.tick(0.1, true);
            assert!(output.live.is_some());
            assert_eq!(output.epoch_completed, tick == EPOCH_TICKS - 1);
        }
        assert_eq!(averager.epochs_accumulated(), 1);
        assert_eq!(averager.write_index(), WRITE_START);
    }

    #[test]
    fn test_outside_beat_only_feeds_delay_line() {
        let mut averager = SignalAverager::default();
        for _ in 0..500 {
            let output = averager.tick(0.7, false);
            assert_eq!(output, AveragerOutput::default());
        }
        assert!(averager.accumulating_sum().iter().all(|&v| v == 0.0));
        assert!(averager.template().is_none());
    }

    #[test]
    fn test_identical_epochs_average_to_waveform() {
        let mut averager = SignalAverager::new(DEFAULT_EPOCHS);
        let waveform = beat_waveform();

        let mut publications = 0;
        for epoch in 0..DEFAULT_EPOCHS {
            let outputs = drive_epoch(&mut averager, &waveform);
            let published = outputs.iter().filter(|o| o.template_published).count();
            publications += published;
            if epoch + 1 < DEFAULT_EPOCHS {
                assert_eq!(published, 0);
                assert!(averager.template().is_none());
            }
        }
        assert_eq!(publications, 1);

        let chronological = averager.template_chronological().unwrap();
        assert_eq!(chronological.len(), TEMPLATE_LEN);
        for (n, (&avg, &expected)) in chronological.iter().zip(&waveform).enumerate() {
            assert!((avg - expected).abs() < 1e-4, "index {}: {} != {}", n, avg, expected);
        }
        assert!(averager.accumulating_sum().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_stable_updates_once_per_target_epochs() {
        let target = 4;
        let mut averager = SignalAverager::new(target);
        let mut published_at = Vec::new();

        for epoch in 0..(target * 3 + 2) {
            let waveform: Vec<f32> = vec![epoch as f32; TEMPLATE_LEN];
            let outputs = drive_epoch(&mut averager, &waveform);
            if outputs.iter().any(|o| o.template_published) {
                published_at.push(epoch);
            }
        }

        assert_eq!(published_at, vec![3, 7, 11]);
        assert_eq!(averager.templates_published(), 3);
        // Mean of epochs 8..=11
        let template = averager.template().unwrap();
        assert!((template[100] - 9.5).abs() < 1e-5);
    }

    #[test]
    fn test_group_delay_alignment() {
        let mut averager = SignalAverager::new(1);
        let ramp = |t: usize| t as f32 * 0.001;

        let onset = 300;
        for t in 0..onset {
            averager.tick(ramp(t), false);
        }
        averager.begin_epoch();
        for k in 0..EPOCH_TICKS {
            averager.tick(ramp(onset + k), true);
        }

        let template = averager.template().unwrap();
        for k in 0..EPOCH_TICKS {
            assert_eq!(template[WRITE_START - k], ramp(onset + k));
        }
        for j in 0..GROUP_DELAY_LEN {
            assert_eq!(template[WRITE_START + 1 + j], ramp(onset - 1 - j));
        }
        assert_eq!(template[TEMPLATE_LEN - 1], ramp(onset - TOTAL_GROUP_DELAY));
    }

    #[test]
    fn test_live_output_warm_up_then_stable() {
        let target = 2;
        let mut averager = SignalAverager::new(target);
        let waveform = vec![1.0; TEMPLATE_LEN];

        // First epoch reads the still-empty running sum
        let first = drive_epoch(&mut averager, &waveform);
        assert_eq!(first[0].live, Some(0.0));

        // Second epoch sees one epoch of sum divided by the final count
        let second = drive_epoch(&mut averager, &waveform);
        assert_eq!(second[0].live, Some(0.5));
        assert!(second.last().unwrap().template_published);

        // Afterwards the stable average is shown
        let third = drive_epoch(&mut averager, &waveform);
        assert!(third.iter().all(|o| o.live == Some(1.0)));
        assert_eq!(averager.live_value(), 1.0);
    }

    #[test]
    fn test_read_pointer_runs_with_write_pointer() {
        let mut averager = SignalAverager::new(1);
        averager.begin_epoch();
        assert_eq!(averager.read_index(), TEMPLATE_LEN - 1);
        for _ in 0..10 {
            averager.tick(0.0, true);
        }
        assert_eq!(averager.read_index(), TEMPLATE_LEN - 11);
        assert_eq!(averager.write_index(), WRITE_START - 10);

        averager.reset();
        assert_eq!(averager.read_index(), TEMPLATE_LEN - 1);
        assert_eq!(averager.target_epochs(), 1);
    }
}
