//! Configuration for the receiver pipeline and the byte link

use crate::sink::OutputChannel;
use sa_core::{config_error, SaError, SaResult, FRAME_LEN};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bits on the wire per byte (start + 8 data + stop)
pub const BITS_PER_BYTE: u32 = 10;

/// Receiver pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Configuration name/profile
    pub name: String,
    /// Fixed processing tick rate (Hz)
    pub tick_rate_hz: f32,
    /// Divisor turning raw ADC counts into [0, 1)
    pub adc_full_scale: f32,
    /// Beat epochs summed per published template
    pub epochs_per_template: usize,
    /// Scale of the squared derivative display channel
    pub square_display_gain: f32,
    /// Channels written to output sinks
    pub output_channels: Vec<OutputChannel>,
    /// Log a warning when a tick step exceeds the tick period
    pub warn_on_overrun: bool,
}

impl ProcessingConfig {
    /// The 200 Hz receiver of the reference hardware
    pub fn reference() -> Self {
        Self {
            name: "reference".to_string(),
            tick_rate_hz: 200.0,
            adc_full_scale: sa_core::ADC_FULL_SCALE,
            epochs_per_template: crate::averager::DEFAULT_EPOCHS,
            square_display_gain: crate::filters::SQUARE_DISPLAY_GAIN,
            output_channels: OutputChannel::default_set().to_vec(),
            warn_on_overrun: true,
        }
    }

    /// Same receiver with every intermediate channel routed to the sinks
    pub fn diagnostic() -> Self {
        Self {
            name: "diagnostic".to_string(),
            output_channels: OutputChannel::ALL.to_vec(),
            ..Self::reference()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> SaResult<()> {
        if !(self.tick_rate_hz.is_finite() && self.tick_rate_hz > 0.0) {
            return Err(config_error!("Tick rate must be positive, got {}", self.tick_rate_hz));
        }
        if self.tick_period().is_zero() {
            return Err(config_error!(
                "Tick rate {} Hz is too high for a nanosecond period",
                self.tick_rate_hz
            ));
        }

        if !(self.adc_full_scale.is_finite() && self.adc_full_scale > 0.0) {
            return Err(config_error!(
                "ADC full scale must be positive, got {}",
                self.adc_full_scale
            ));
        }

        if self.epochs_per_template == 0 {
            return Err(config_error!("Epochs per template must be greater than 0"));
        }

        if !self.square_display_gain.is_finite() {
            return Err(config_error!("Square display gain must be finite"));
        }

        if self.output_channels.is_empty() {
            return Err(config_error!("At least one output channel is required"));
        }

        Ok(())
    }

    /// Tick period derived from the tick rate
    pub fn tick_period(&self) -> Duration {
        period_of(self.tick_rate_hz as f64)
    }

    /// Export configuration to JSON
    pub fn to_json(&self) -> SaResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| SaError::SerializationError {
            reason: format!("Failed to serialize configuration: {}", e),
        })
    }

    /// Import configuration from JSON
    pub fn from_json(json: &str) -> SaResult<Self> {
        serde_json::from_str(json).map_err(|e| SaError::SerializationError {
            reason: format!("Failed to deserialize configuration: {}", e),
        })
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self::reference()
    }
}

/// Sender side of the point-to-point byte link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Frames sent per second
    pub sender_rate_hz: f32,
    /// Serial line rate (bits per second)
    pub baud_rate: u32,
}

impl LinkConfig {
    /// 360 Hz sender of the reference hardware
    pub fn reference() -> Self {
        Self {
            sender_rate_hz: 360.0,
            baud_rate: 115_200,
        }
    }

    /// Sender paced at the receiver tick rate
    pub fn matched(processing: &ProcessingConfig) -> Self {
        Self {
            sender_rate_hz: processing.tick_rate_hz,
            ..Self::reference()
        }
    }

    pub fn validate(&self) -> SaResult<()> {
        if !(self.sender_rate_hz.is_finite() && self.sender_rate_hz > 0.0) {
            return Err(config_error!(
                "Sender rate must be positive, got {}",
                self.sender_rate_hz
            ));
        }
        if self.frame_period().is_zero() {
            return Err(config_error!(
                "Sender rate {} Hz is too high for a nanosecond period",
                self.sender_rate_hz
            ));
        }

        if self.baud_rate == 0 {
            return Err(config_error!("Baud rate must be greater than 0"));
        }

        let needed = self.sender_rate_hz as f64 * FRAME_LEN as f64;
        if needed > self.bytes_per_second() {
            return Err(config_error!(
                "Sender rate {} Hz needs {} bytes/s but {} baud carries only {}",
                self.sender_rate_hz,
                needed,
                self.baud_rate,
                self.bytes_per_second()
            ));
        }

        Ok(())
    }

    /// Bytes the line can carry per second
    pub fn bytes_per_second(&self) -> f64 {
        self.baud_rate as f64 / BITS_PER_BYTE as f64
    }

    /// Time on the wire for a single byte
    pub fn byte_time(&self) -> Duration {
        period_of(self.bytes_per_second())
    }

    /// Interval between frame starts
    pub fn frame_period(&self) -> Duration {
        period_of(self.sender_rate_hz as f64)
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::reference()
    }
}

/// Period of a rate in Hz, rounded to whole nanoseconds
pub fn period_of(rate_hz: f64) -> Duration {
    Duration::from_nanos((1e9 / rate_hz).round() as u64)
}
