//! Core sample processor trait and tick timing

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Core trait for every per-sample stage of the filter cascade
pub trait SampleProcessor: Send {
    /// Process one sample and return the stage output
    fn process_sample(&mut self, input: f32) -> f32;

    /// Get processor name/identifier
    fn name(&self) -> &str;

    /// Reset processor internal state to power-on values
    fn reset(&mut self);

    /// Delay the stage introduces, in ticks
    fn group_delay(&self) -> usize {
        0
    }

    /// Which cascade stage this processor implements
    fn stage(&self) -> Stage;

    /// Run a block of samples through the stage
    fn process_block(&mut self, input: &[f32]) -> Vec<f32> {
        input.iter().map(|&x| self.process_sample(x)).collect()
    }

    /// Response to a unit impulse followed by zeros, starting from reset state
    fn impulse_response(&mut self, len: usize) -> Vec<f32> {
        self.reset();
        (0..len)
            .map(|n| self.process_sample(if n == 0 { 1.0 } else { 0.0 }))
            .collect()
    }
}

/// Stages of the QRS filter cascade, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Recursive low-pass
    Lowpass,
    /// All-pass minus moving-average high-pass
    Highpass,
    /// Five-point derivative
    Derivative,
    /// Point-wise square
    Squarer,
    /// Moving-window integrator
    Integrator,
}

impl Stage {
    pub fn description(&self) -> &'static str {
        match self {
            Stage::Lowpass => "low-pass filter",
            Stage::Highpass => "high-pass filter",
            Stage::Derivative => "derivative",
            Stage::Squarer => "squarer",
            Stage::Integrator => "moving-window integrator",
        }
    }
}

/// Execution time statistics for the fixed-rate tick step
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TickStats {
    /// Ticks measured
    pub ticks: u64,
    /// Ticks whose step took longer than the tick period
    pub overruns: u64,
    /// Longest step observed in microseconds
    pub max_step_us: u64,
    /// Sum of all step times in microseconds
    pub total_step_us: u64,
}

impl TickStats {
    /// Record one step; returns true when it overran the tick period
    pub fn record(&mut self, elapsed: Duration, period: Duration) -> bool {
        let step_us = elapsed.as_micros() as u64;
        self.ticks += 1;
        self.total_step_us += step_us;
        self.max_step_us = self.max_step_us.max(step_us);

        let overrun = elapsed > period;
        if overrun {
            self.overruns += 1;
        }
        overrun
    }

    pub fn average_step_us(&self) -> u64 {
        if self.ticks == 0 {
            0
        } else {
            self.total_step_us / self.ticks
        }
    }
}

/// Helper for timing one tick step
pub struct TickTimer {
    start_time: Instant,
}

impl TickTimer {
    pub fn start() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    /// Finish timing and return the elapsed step time
    pub fn finish(self) -> Duration {
        self.start_time.elapsed()
    }
}
