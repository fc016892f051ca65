//! SA-Simulation: Sample sources for the sender node
//!
//! Synthetic ECG generation, recorded waveform playback and the real-time
//! byte sender that paces either of them onto the link.

pub mod ecg_simulator;
pub mod record;
pub mod sender;

pub use ecg_simulator::*;
pub use record::*;
pub use sender::*;
