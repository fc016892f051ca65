//! The fixed-rate receiver step
//!
//! [`Pipeline`] owns every piece of receiver state and runs the whole
//! sequence once per tick:
//!
//! 1. normalize the raw sample and center it around zero
//! 2. run the filter cascade on the centered value
//! 3. update the peak detector with the integrator output
//! 4. feed the averager with the uncentered value, rewinding it on onsets
//! 5. end the beat once the averager has consumed the epoch

use crate::averager::{SignalAverager, TEMPLATE_LEN};
use crate::cascade::{CascadeOutput, FilterCascade};
use crate::config::ProcessingConfig;
use crate::detector::{FinalizedPeak, PeakClass, PeakDetector};
use crate::processor::{TickStats, TickTimer};
use crate::sink::OutputSink;
use sa_core::{center, normalize, RawSample, SaResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Discrete events raised during one tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickEvents {
    /// A new beat was detected
    pub onset: bool,
    /// A peak was finalized and classified
    pub peak: Option<FinalizedPeak>,
    /// The averager finished a beat epoch
    pub epoch_completed: bool,
    /// A new averaged template replaced the previous one
    pub template_published: bool,
}

/// Everything observable after one tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickOutput {
    pub tick: u64,
    /// Normalized sample in [0, 1)
    pub raw: f32,
    pub lowpass: f32,
    pub highpass: f32,
    pub derivative: f32,
    /// Squared derivative, display scaled
    pub squared: f32,
    pub integrated: f32,
    pub threshold: f32,
    pub beat_indicator: bool,
    pub in_beat: bool,
    /// Live averaged value, held between epochs
    pub averaged: f32,
    pub events: TickEvents,
}

/// Counters accumulated since the last reset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub ticks: u64,
    pub beats: u64,
    pub signal_peaks: u64,
    pub noise_peaks: u64,
    pub epochs_completed: u64,
    pub templates_published: u64,
    pub threshold_resets: u64,
    pub threshold: f32,
    pub timing: TickStats,
}

/// Receiver processing context
pub struct Pipeline {
    config: ProcessingConfig,
    period: Duration,
    cascade: FilterCascade,
    detector: PeakDetector,
    averager: SignalAverager,
    tick: u64,
    summary: PipelineSummary,
}

impl Pipeline {
    /// Create a pipeline in its power-on state
    pub fn new(config: ProcessingConfig) -> SaResult<Self> {
        config.validate()?;

        info!(
            name = %config.name,
            tick_rate_hz = config.tick_rate_hz,
            epochs = config.epochs_per_template,
            "creating pipeline"
        );

        Ok(Self {
            period: config.tick_period(),
            cascade: FilterCascade::new(config.square_display_gain),
            detector: PeakDetector::new(),
            averager: SignalAverager::new(config.epochs_per_template),
            tick: 0,
            summary: PipelineSummary::default(),
            config,
        })
    }

    /// Run the whole receiver sequence for one sample
    pub fn tick(&mut self, raw: RawSample) -> TickOutput {
        let timer = TickTimer::start();

        let normalized = normalize(raw, self.config.adc_full_scale);
        let stages: CascadeOutput = self.cascade.process(center(normalized));

        let detection = self.detector.update(stages.integrated);
        if detection.onset {
            self.averager.begin_epoch();
            self.summary.beats += 1;
            debug!(tick = self.tick, threshold = self.detector.threshold(), "beat onset");
        }
        if let Some(peak) = detection.peak {
            match peak.class {
                PeakClass::Signal => self.summary.signal_peaks += 1,
                PeakClass::Noise => self.summary.noise_peaks += 1,
            }
        }

        let averaged = self.averager.tick(normalized, self.detector.in_beat());
        if averaged.epoch_completed {
            self.detector.end_beat();
            self.summary.epochs_completed += 1;
        }
        if averaged.template_published {
            self.summary.templates_published += 1;
            debug!(
                tick = self.tick,
                templates = self.summary.templates_published,
                "averaged template published"
            );
        }

        let output = TickOutput {
            tick: self.tick,
            raw: normalized,
            lowpass: stages.lowpass,
            highpass: stages.highpass,
            derivative: stages.derivative,
            squared: stages.squared_display,
            integrated: stages.integrated,
            threshold: self.detector.threshold(),
            beat_indicator: self.detector.beat_indicator(),
            in_beat: self.detector.in_beat(),
            averaged: self.averager.live_value(),
            events: TickEvents {
                onset: detection.onset,
                peak: detection.peak,
                epoch_completed: averaged.epoch_completed,
                template_published: averaged.template_published,
            },
        };

        self.tick += 1;
        self.summary.ticks = self.tick;

        let elapsed = timer.finish();
        if self.summary.timing.record(elapsed, self.period) && self.config.warn_on_overrun {
            warn!(
                tick = output.tick,
                step_us = elapsed.as_micros() as u64,
                period_us = self.period.as_micros() as u64,
                overruns = self.summary.timing.overruns,
                "tick step overran the tick period"
            );
        }

        output
    }

    /// Tick and hand the output to a sink
    pub fn run<S: OutputSink + ?Sized>(&mut self, raw: RawSample, sink: &mut S) -> SaResult<TickOutput> {
        let output = self.tick(raw);
        sink.write(&output)?;
        Ok(output)
    }

    /// Tick once per sample of a block
    pub fn process_block(&mut self, samples: &[RawSample]) -> Vec<TickOutput> {
        samples.iter().map(|&raw| self.tick(raw)).collect()
    }

    /// Restore the power-on state, keeping the configuration
    pub fn reset(&mut self) {
        self.cascade.reset();
        self.detector.reset();
        self.averager.reset();
        self.tick = 0;
        self.summary = PipelineSummary::default();
        info!(name = %self.config.name, "pipeline reset");
    }

    pub fn summary(&self) -> PipelineSummary {
        PipelineSummary {
            threshold_resets: self.detector.threshold_resets(),
            threshold: self.detector.threshold(),
            ..self.summary.clone()
        }
    }

    /// Latest averaged template, once published
    pub fn template(&self) -> Option<[f32; TEMPLATE_LEN]> {
        self.averager.template()
    }

    pub fn ticks(&self) -> u64 {
        self.tick
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    pub fn cascade(&self) -> &FilterCascade {
        &self.cascade
    }

    pub fn detector(&self) -> &PeakDetector {
        &self.detector
    }

    pub fn averager(&self) -> &SignalAverager {
        &self.averager
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::averager::WRITE_START;
    use crate::sink::RecordingSink;

    const MIDSCALE: RawSample = 1024;

    fn pipeline() -> Pipeline {
        Pipeline::new(ProcessingConfig::reference()).unwrap()
    }

    /// Flat baseline with a narrow spike every `period` ticks
    fn spike_train(ticks: usize, period: usize) -> Vec<RawSample> {
        (0..ticks)
            .map(|n| match n % period {
                100 => 1800,
                101 => 1400,
                _ => MIDSCALE,
            })
            .collect()
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = ProcessingConfig::reference();
        config.epochs_per_template = 0;
        assert!(Pipeline::new(config).is_err());
    }

    #[test]
    fn test_midscale_input_is_quiet() {
        let mut pipeline = pipeline();
        let outputs = pipeline.process_block(&vec![MIDSCALE; 2000]);

        assert!(outputs.iter().all(|o| !o.events.onset));
        assert!(outputs.iter().all(|o| o.integrated == 0.0));
        assert_eq!(outputs[0].raw, 0.5);
        assert_eq!(pipeline.summary().beats, 0);
        assert_eq!(pipeline.ticks(), 2000);
    }

    #[test]
    fn test_spikes_are_detected_once_each() {
        let mut pipeline = pipeline();
        let outputs = pipeline.process_block(&spike_train(200 * 8 + 100, 200));

        let onsets: Vec<u64> = outputs
            .iter()
            .filter(|o| o.events.onset)
            .map(|o| o.tick)
            .collect();
        assert_eq!(onsets.len(), 8);
        // The crossing point moves a little while the threshold adapts
        for pair in onsets.windows(2) {
            assert!((185..=215).contains(&(pair[1] - pair[0])), "{:?}", onsets);
        }

        let summary = pipeline.summary();
        assert_eq!(summary.beats, 8);
        assert!(summary.signal_peaks >= 8);
        // Each beat epoch lasts until the averager has written the whole window
        assert_eq!(summary.epochs_completed, 8);
    }

    #[test]
    fn test_in_beat_lasts_one_epoch() {
        let mut pipeline = pipeline();
        let outputs = pipeline.process_block(&spike_train(400, 200));

        let onset = outputs.iter().position(|o| o.events.onset).unwrap();
        let completed = outputs.iter().position(|o| o.events.epoch_completed).unwrap();
        assert_eq!(completed - onset, WRITE_START);
        assert!(outputs[onset..completed].iter().all(|o| o.in_beat));
        assert!(!outputs[completed].in_beat);
    }

    #[test]
    fn test_template_published_after_configured_epochs() {
        let mut config = ProcessingConfig::reference();
        config.epochs_per_template = 4;
        let mut pipeline = Pipeline::new(config).unwrap();

        let mut sink = RecordingSink::new();
        for raw in spike_train(200 * 6, 200) {
            pipeline.run(raw, &mut sink).unwrap();
        }

        let published: Vec<&TickOutput> = sink
            .outputs()
            .iter()
            .filter(|o| o.events.template_published)
            .collect();
        assert_eq!(published.len(), 1);

        let template = pipeline.template().unwrap();
        // Baseline portions average back to mid-scale
        assert!((template[0] - 0.5).abs() < 1e-6);
        let peak = template.iter().cloned().fold(f32::MIN, f32::max);
        assert!(peak > 0.55);

        // Both spike samples fall inside every epoch window
        let area: f32 = template.iter().map(|v| v - 0.5).sum();
        let expected = (1800.0 + 1400.0) / 2048.0 - 1.0;
        assert!((area - expected).abs() < 1e-3, "area {}", area);
    }

    #[test]
    fn test_reset_restores_power_on_state() {
        let mut pipeline = pipeline();
        let first = pipeline.process_block(&spike_train(600, 200));
        pipeline.reset();
        assert_eq!(pipeline.ticks(), 0);
        assert_eq!(pipeline.summary().beats, 0);

        let second = pipeline.process_block(&spike_train(600, 200));
        assert_eq!(first, second);
    }
}
