//! Error handling for the signal-averaging link
//!
//! A single error type shared by every library crate in the workspace.
//! The per-tick DSP path never fails; errors come from configuration,
//! record parsing, playback ranges and the byte link.

use core::fmt;

/// Result type alias for signal-averaging operations
pub type SaResult<T> = Result<T, SaError>;

/// Error type for all signal-averaging operations
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SaError {
    /// Invalid processing, link or node configuration
    InvalidConfig {
        /// Description of the configuration error
        reason: String,
    },

    /// Recorded waveform could not be parsed
    RecordFormat {
        /// Description of the format issue
        reason: String,
    },

    /// Requested playback window does not fit the record
    PlaybackRange {
        /// First data point requested
        start: usize,
        /// Last data point requested (0 means end of record)
        end: usize,
        /// Number of data points in the record
        available: usize,
        /// Which constraint was violated
        reason: &'static str,
    },

    /// The byte link between sender and receiver went away
    LinkClosed {
        /// Underlying I/O or channel error
        reason: String,
    },

    /// Output sink failed to write a row
    OutputError {
        /// Underlying write error
        reason: String,
    },

    /// Serialization/deserialization error
    SerializationError {
        /// Serialization error description
        reason: String,
    },
}

impl fmt::Display for SaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaError::InvalidConfig { reason } => {
                write!(f, "Invalid configuration: {}", reason)
            }
            SaError::RecordFormat { reason } => {
                write!(f, "Record format error: {}", reason)
            }
            SaError::PlaybackRange { start, end, available, reason } => {
                write!(f, "Invalid playback range [{}, {}) for record of {} data points: {}",
                       start, end, available, reason)
            }
            SaError::LinkClosed { reason } => {
                write!(f, "Link closed: {}", reason)
            }
            SaError::OutputError { reason } => {
                write!(f, "Output error: {}", reason)
            }
            SaError::SerializationError { reason } => {
                write!(f, "Serialization error: {}", reason)
            }
        }
    }
}

impl std::error::Error for SaError {}

impl From<std::io::Error> for SaError {
    fn from(error: std::io::Error) -> Self {
        SaError::LinkClosed {
            reason: error.to_string(),
        }
    }
}

/// Convenience macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)+) => {
        $crate::error::SaError::InvalidConfig {
            reason: format!($($arg)+),
        }
    };
}

/// Convenience macro for creating record format errors
#[macro_export]
macro_rules! format_error {
    ($($arg:tt)+) => {
        $crate::error::SaError::RecordFormat {
            reason: format!($($arg)+),
        }
    };
}
