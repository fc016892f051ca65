//! SA-Processing: The receiver side of the signal-averaging link
//!
//! Fixed-rate QRS filter cascade, adaptive peak detection and
//! group-delay compensated beat averaging, plus the sinks and schedulers
//! that drive and observe the per-tick step.

pub mod processor;
pub mod filters;
pub mod cascade;
pub mod detector;
pub mod averager;
pub mod pipeline;
pub mod sink;
pub mod config;
pub mod scheduler;

pub use pipeline::*;
pub use processor::{SampleProcessor, Stage, TickStats, TickTimer};
pub use filters::{
    Coefficients, DirectFormFilter, Lowpass, Highpass, Derivative, Squarer,
    MovingWindowIntegrator, Integrator, TOTAL_GROUP_DELAY,
};
pub use cascade::{CascadeOutput, FilterCascade};
pub use detector::{DetectorEvent, FinalizedPeak, PeakClass, PeakDetector};
pub use averager::{AveragerOutput, SignalAverager, TEMPLATE_LEN};
pub use sink::{CsvSink, OutputChannel, OutputSink, RecordingSink, TracingSink};
pub use config::{LinkConfig, ProcessingConfig};
pub use scheduler::{LinkFault, LinkScheduler, ScheduleReport};
