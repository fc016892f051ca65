//! Raw ADC samples and their normalized form
//!
//! Samples travel between the nodes as signed 16-bit integers carrying an
//! 11-bit ADC reading. The receiver divides by the ADC full scale to get a
//! value in [0, 1) and subtracts the baseline before filtering.

/// Transport representation of one sample
pub type RawSample = i16;

/// Full scale of the 11-bit acquisition ADC
pub const ADC_FULL_SCALE: f32 = 2048.0;

/// Largest reading the acquisition ADC can produce
pub const ADC_MAX: RawSample = 2047;

/// Mid-scale offset removed before the filter cascade
pub const BASELINE: f32 = 0.5;

/// Scale a raw reading into [0, 1) for the given full scale.
#[inline]
pub fn normalize(raw: RawSample, full_scale: f32) -> f32 {
    raw as f32 / full_scale
}

/// Remove the mid-scale baseline from a normalized sample.
#[inline]
pub fn center(normalized: f32) -> f32 {
    normalized - BASELINE
}

/// Convert a normalized value back to ADC counts, clamped to the ADC range.
pub fn quantize(normalized: f32, full_scale: f32) -> RawSample {
    let max = (full_scale - 1.0).min(RawSample::MAX as f32);
    let counts = (normalized * full_scale).round();
    if counts.is_nan() {
        return 0;
    }
    counts.clamp(0.0, max) as RawSample
}
