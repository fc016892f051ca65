//! Fixed-coefficient digital filters of the QRS cascade
//!
//! Every recursive or FIR stage is a direct-form rational transfer function
//!
//! ```text
//! y[n] = gain * Σ_i a[i] * x[n-i]  -  Σ_{i>=1} b[i] * y[n-i]
//! ```
//!
//! evaluated once per tick over `History` buffers of the last `NA` inputs
//! and `NB` outputs. Coefficients are constants of the design; nothing here
//! computes filter coefficients.

use crate::processor::{SampleProcessor, Stage};
use sa_core::History;

/// Group delay of the low-pass stage, in ticks
pub const LOWPASS_GROUP_DELAY: usize = 5;
/// Group delay of the high-pass stage, in ticks
pub const HIGHPASS_GROUP_DELAY: usize = 16;
/// Group delay of the derivative stage, in ticks
pub const DERIVATIVE_GROUP_DELAY: usize = 2;
/// Group delay assigned to the moving-window integrator, in ticks
pub const INTEGRATOR_GROUP_DELAY: usize = 32;

/// Total latency between a raw sample and its effect on the integrator output
pub const TOTAL_GROUP_DELAY: usize = LOWPASS_GROUP_DELAY
    + HIGHPASS_GROUP_DELAY
    + DERIVATIVE_GROUP_DELAY
    + INTEGRATOR_GROUP_DELAY;

/// Moving-window integrator length
pub const INTEGRATOR_WINDOW: usize = 32;

/// Scale applied to the squared derivative on its display channel only
pub const SQUARE_DISPLAY_GAIN: f32 = 5.0;

/// Transfer function coefficients
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients<const NA: usize, const NB: usize> {
    /// Feed-forward weights, `a[0]` applies to the newest input
    pub numerator: [f32; NA],
    /// Feedback weights, `b[0]` is implicitly 1 and never read
    pub denominator: [f32; NB],
    /// Scalar applied to the feed-forward sum
    pub gain: f32,
}

/// `(1 - z^-6)^2 / (1 - z^-1)^2` with the input scaled by 1/20
pub const LOWPASS: Coefficients<13, 3> = Coefficients {
    numerator: [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, -2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0],
    denominator: [1.0, -2.0, 1.0],
    gain: 1.0 / 20.0,
};

/// All-pass delayed by 16 minus a 32-point moving average
pub const HIGHPASS: Coefficients<33, 2> = Coefficients {
    numerator: {
        let mut a = [0.0; 33];
        a[0] = -1.0 / 32.0;
        a[16] = 1.0;
        a[17] = -1.0;
        a[32] = 1.0 / 32.0;
        a
    },
    denominator: [1.0, -1.0],
    gain: 1.0 / 1.2,
};

/// Five-point derivative, no feedback
pub const DERIVATIVE: Coefficients<5, 1> = Coefficients {
    numerator: [2.0, 1.0, 0.0, -1.0, -2.0],
    denominator: [1.0],
    gain: 1.0 / 4.0,
};

/// Direct-form filter over fixed-size input and output histories
#[derive(Debug, Clone)]
pub struct DirectFormFilter<const NA: usize, const NB: usize> {
    name: &'static str,
    stage: Stage,
    coeffs: Coefficients<NA, NB>,
    inputs: History<NA>,
    outputs: History<NB>,
    group_delay: usize,
}

pub type Lowpass = DirectFormFilter<13, 3>;
pub type Highpass = DirectFormFilter<33, 2>;
pub type Derivative = DirectFormFilter<5, 1>;

impl<const NA: usize, const NB: usize> DirectFormFilter<NA, NB> {
    /// Create a filter with zeroed histories
    pub fn new(
        name: &'static str,
        stage: Stage,
        coeffs: Coefficients<NA, NB>,
        group_delay: usize,
    ) -> Self {
        Self {
            name,
            stage,
            coeffs,
            inputs: History::new(),
            outputs: History::new(),
            group_delay,
        }
    }

    pub fn coefficients(&self) -> &Coefficients<NA, NB> {
        &self.coeffs
    }

    /// Last `NA` inputs, newest first
    pub fn inputs(&self) -> &History<NA> {
        &self.inputs
    }

    /// Last `NB` outputs, newest first
    pub fn outputs(&self) -> &History<NB> {
        &self.outputs
    }

    /// Most recent output
    pub fn output(&self) -> f32 {
        self.outputs.newest()
    }
}

impl Lowpass {
    pub fn lowpass() -> Self {
        Self::new("lowpass", Stage::Lowpass, LOWPASS, LOWPASS_GROUP_DELAY)
    }
}

impl Highpass {
    pub fn highpass() -> Self {
        Self::new("highpass", Stage::Highpass, HIGHPASS, HIGHPASS_GROUP_DELAY)
    }
}

impl Derivative {
    pub fn derivative() -> Self {
        Self::new("derivative", Stage::Derivative, DERIVATIVE, DERIVATIVE_GROUP_DELAY)
    }
}

impl<const NA: usize, const NB: usize> SampleProcessor for DirectFormFilter<NA, NB> {
    #[inline]
    fn process_sample(&mut self, input: f32) -> f32 {
        self.inputs.push(input);
        let feedforward = self.coeffs.gain * self.inputs.dot(&self.coeffs.numerator);

        // Before the push, output offset i-1 is y[n-i].
        let mut feedback = 0.0;
        for (i, b) in self.coeffs.denominator.iter().enumerate().skip(1) {
            feedback += b * self.outputs.get(i - 1).unwrap_or(0.0);
        }

        let output = feedforward - feedback;
        self.outputs.push(output);
        output
    }

    fn name(&self) -> &str {
        self.name
    }

    fn reset(&mut self) {
        self.inputs.reset();
        self.outputs.reset();
    }

    fn group_delay(&self) -> usize {
        self.group_delay
    }

    fn stage(&self) -> Stage {
        self.stage
    }
}

/// Point-wise square of the derivative
#[derive(Debug, Clone, Copy, Default)]
pub struct Squarer {
    last: f32,
}

impl Squarer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(&self) -> f32 {
        self.last
    }
}

impl SampleProcessor for Squarer {
    #[inline]
    fn process_sample(&mut self, input: f32) -> f32 {
        self.last = input * input;
        self.last
    }

    fn name(&self) -> &str {
        "squarer"
    }

    fn reset(&mut self) {
        self.last = 0.0;
    }

    fn stage(&self) -> Stage {
        Stage::Squarer
    }
}

/// Boxcar moving average over the last `N` squared samples
#[derive(Debug, Clone)]
pub struct MovingWindowIntegrator<const N: usize> {
    window: History<N>,
    output: f32,
}

pub type Integrator = MovingWindowIntegrator<INTEGRATOR_WINDOW>;

impl<const N: usize> MovingWindowIntegrator<N> {
    pub fn new() -> Self {
        Self {
            window: History::new(),
            output: 0.0,
        }
    }

    pub fn window(&self) -> &History<N> {
        &self.window
    }

    pub fn output(&self) -> f32 {
        self.output
    }
}

impl<const N: usize> Default for MovingWindowIntegrator<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SampleProcessor for MovingWindowIntegrator<N> {
    #[inline]
    fn process_sample(&mut self, input: f32) -> f32 {
        self.window.push(input);
        // Summed fresh every tick so rounding error never accumulates
        self.output = self.window.sum() / N as f32;
        self.output
    }

    fn name(&self) -> &str {
        "integrator"
    }

    fn reset(&mut self) {
        self.window.reset();
        self.output = 0.0;
    }

    fn group_delay(&self) -> usize {
        INTEGRATOR_GROUP_DELAY
    }

    fn stage(&self) -> Stage {
        Stage::Integrator
    }
}
