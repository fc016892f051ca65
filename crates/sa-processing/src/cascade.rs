//! The QRS filter cascade: LPF → HPF → derivative → squarer → integrator

use crate::filters::{Derivative, Highpass, Integrator, Lowpass, Squarer, SQUARE_DISPLAY_GAIN};
use crate::processor::{SampleProcessor, Stage};
use serde::{Deserialize, Serialize};

/// Every stage value produced by one cascade step
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CascadeOutput {
    pub lowpass: f32,
    pub highpass: f32,
    pub derivative: f32,
    /// Squared derivative as fed to the integrator
    pub squared: f32,
    /// Squared derivative scaled for display
    pub squared_display: f32,
    /// Moving-window integrator output, the detector input
    pub integrated: f32,
}

/// Chained filter stages with their own histories
#[derive(Debug, Clone)]
pub struct FilterCascade {
    lowpass: Lowpass,
    highpass: Highpass,
    derivative: Derivative,
    squarer: Squarer,
    integrator: Integrator,
    display_gain: f32,
}

impl FilterCascade {
    pub fn new(display_gain: f32) -> Self {
        Self {
            lowpass: Lowpass::lowpass(),
            highpass: Highpass::highpass(),
            derivative: Derivative::derivative(),
            squarer: Squarer::new(),
            integrator: Integrator::new(),
            display_gain,
        }
    }

    /// Run one centered sample through every stage
    #[inline]
    pub fn process(&mut self, centered: f32) -> CascadeOutput {
        let lowpass = self.lowpass.process_sample(centered);
        let highpass = self.highpass.process_sample(lowpass);
        let derivative = self.derivative.process_sample(highpass);
        let squared = self.squarer.process_sample(derivative);
        let integrated = self.integrator.process_sample(squared);

        CascadeOutput {
            lowpass,
            highpass,
            derivative,
            squared,
            squared_display: squared * self.display_gain,
            integrated,
        }
    }

    pub fn reset(&mut self) {
        for stage in self.stages_mut() {
            stage.reset();
        }
    }

    /// Stages in execution order
    pub fn stages(&self) -> [&dyn SampleProcessor; 5] {
        [
            &self.lowpass,
            &self.highpass,
            &self.derivative,
            &self.squarer,
            &self.integrator,
        ]
    }

    fn stages_mut(&mut self) -> [&mut dyn SampleProcessor; 5] {
        [
            &mut self.lowpass,
            &mut self.highpass,
            &mut self.derivative,
            &mut self.squarer,
            &mut self.integrator,
        ]
    }

    /// Sum of the stage group delays
    pub fn group_delay(&self) -> usize {
        self.stages().iter().map(|s| s.group_delay()).sum()
    }

    /// Group delay of each stage
    pub fn stage_delays(&self) -> [(Stage, usize); 5] {
        self.stages().map(|s| (s.stage(), s.group_delay()))
    }

    pub fn lowpass(&self) -> &Lowpass {
        &self.lowpass
    }

    pub fn highpass(&self) -> &Highpass {
        &self.highpass
    }

    pub fn derivative(&self) -> &Derivative {
        &self.derivative
    }

    pub fn integrator(&self) -> &Integrator {
        &self.integrator
    }
}

impl Default for FilterCascade {
    fn default() -> Self {
        Self::new(SQUARE_DISPLAY_GAIN)
    }
}
