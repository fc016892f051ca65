//! Synthetic ECG source with a PQRST beat shape

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use sa_core::{config_error, RawSample, SaResult, SampleSource, ADC_MAX};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// One Gaussian component of the beat, timed relative to the R peak
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wave {
    /// Offset from the R peak in seconds
    pub offset_s: f32,
    /// Standard deviation in seconds
    pub width_s: f32,
    /// Peak amplitude relative to the R wave
    pub amplitude: f32,
}

impl Wave {
    const fn new(offset_s: f32, width_s: f32, amplitude: f32) -> Self {
        Self {
            offset_s,
            width_s,
            amplitude,
        }
    }

    #[inline]
    fn at(&self, t_from_r: f32) -> f32 {
        let z = (t_from_r - self.offset_s) / self.width_s;
        self.amplitude * (-0.5 * z * z).exp()
    }
}

/// Lead-II like P, Q, R, S and T waves
pub const PQRST: [Wave; 5] = [
    Wave::new(-0.20, 0.025, 0.15),
    Wave::new(-0.03, 0.010, -0.12),
    Wave::new(0.0, 0.010, 1.0),
    Wave::new(0.03, 0.010, -0.25),
    Wave::new(0.30, 0.050, 0.30),
];

/// Noise configuration, all amplitudes in ADC counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseConfig {
    /// Gaussian noise standard deviation (0.0 = no noise)
    pub gaussian_std: f32,
    /// Baseline wander amplitude
    pub baseline_wander: f32,
    /// Baseline wander frequency in Hz
    pub wander_frequency: f32,
}

impl NoiseConfig {
    pub fn none() -> Self {
        Self {
            gaussian_std: 0.0,
            baseline_wander: 0.0,
            wander_frequency: 0.0,
        }
    }
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            gaussian_std: 4.0,
            baseline_wander: 20.0,
            wander_frequency: 0.25,
        }
    }
}

/// Configuration for ECG simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcgConfig {
    /// Sampling rate in Hz
    pub sampling_rate: f32,
    /// Heart rate in beats per minute
    pub heart_rate_bpm: f32,
    /// Isoelectric line in ADC counts
    pub baseline: f32,
    /// R wave height above the baseline in ADC counts
    pub r_amplitude: f32,
    pub noise: NoiseConfig,
    /// Stop after this many seconds; `None` runs forever
    pub duration_s: Option<f32>,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

impl Default for EcgConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 360.0,
            heart_rate_bpm: 72.0,
            baseline: 1024.0,
            r_amplitude: 600.0,
            noise: NoiseConfig::default(),
            duration_s: None,
            seed: Some(42),
        }
    }
}

impl EcgConfig {
    pub fn validate(&self) -> SaResult<()> {
        if !(self.sampling_rate.is_finite() && self.sampling_rate > 0.0) {
            return Err(config_error!("Sampling rate must be positive, got {}", self.sampling_rate));
        }
        if !(self.heart_rate_bpm > 0.0 && self.heart_rate_bpm <= 300.0) {
            return Err(config_error!(
                "Heart rate must be within (0, 300] bpm, got {}",
                self.heart_rate_bpm
            ));
        }
        if !(self.noise.gaussian_std >= 0.0) {
            return Err(config_error!("Noise deviation must not be negative"));
        }
        Ok(())
    }

    /// Seconds between R peaks
    pub fn rr_interval(&self) -> f32 {
        60.0 / self.heart_rate_bpm
    }
}

/// ECG signal simulator producing 11-bit ADC counts
pub struct EcgSimulator {
    config: EcgConfig,
    rng: StdRng,
    normal_dist: Normal<f32>,
    index: u64,
    limit: Option<u64>,
}

impl EcgSimulator {
    /// Create new ECG simulator with configuration
    pub fn new(config: EcgConfig) -> SaResult<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let normal_dist = Normal::new(0.0, config.noise.gaussian_std)
            .map_err(|e| config_error!("Failed to create normal distribution: {}", e))?;
        let limit = config
            .duration_s
            .map(|d| (d.max(0.0) * config.sampling_rate).round() as u64);

        Ok(Self {
            config,
            rng,
            normal_dist,
            index: 0,
            limit,
        })
    }

    /// Noise-free waveform value in ADC counts at time `t`
    pub fn clean_value(&self, t: f32) -> f32 {
        let rr = self.config.rr_interval();
        // R peaks sit at (k + 0.5) * rr; neighbours cover the P and T tails
        let beat = (t / rr - 0.5).round();
        let mut shape = 0.0;
        for k in [beat - 1.0, beat, beat + 1.0] {
            let r_time = (k + 0.5) * rr;
            shape += PQRST.iter().map(|w| w.at(t - r_time)).sum::<f32>();
        }
        self.config.baseline + self.config.r_amplitude * shape
    }

    /// Times of the R peaks within `[0, seconds)`
    pub fn r_peak_times(&self, seconds: f32) -> Vec<f32> {
        let rr = self.config.rr_interval();
        (0..)
            .map(|k| (k as f32 + 0.5) * rr)
            .take_while(|&t| t < seconds)
            .collect()
    }

    fn sample_at(&mut self, index: u64) -> RawSample {
        let t = index as f32 / self.config.sampling_rate;
        let noise = &self.config.noise;
        let mut value = self.clean_value(t);
        value += noise.baseline_wander * (2.0 * PI * noise.wander_frequency * t).sin();
        if noise.gaussian_std > 0.0 {
            value += self.normal_dist.sample(&mut self.rng);
        }
        value.round().clamp(0.0, ADC_MAX as f32) as RawSample
    }

    /// Generate the next `seconds` of signal
    pub fn generate(&mut self, seconds: f32) -> Vec<RawSample> {
        let count = (seconds * self.config.sampling_rate).round() as usize;
        (0..count).map_while(|_| self.next_sample()).collect()
    }

    /// Samples produced so far
    pub fn samples_generated(&self) -> u64 {
        self.index
    }

    /// Restart the waveform at time zero
    pub fn reset_time(&mut self) {
        self.index = 0;
    }

    pub fn config(&self) -> &EcgConfig {
        &self.config
    }
}

impl SampleSource for EcgSimulator {
    fn next_sample(&mut self) -> Option<RawSample> {
        if self.limit.is_some_and(|limit| self.index >= limit) {
            return None;
        }
        let sample = self.sample_at(self.index);
        self.index += 1;
        Some(sample)
    }

    fn name(&self) -> &str {
        "synthetic-ecg"
    }
}
