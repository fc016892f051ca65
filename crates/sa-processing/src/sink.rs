//! Per-tick output channels and the sinks that consume them

use crate::pipeline::TickOutput;
use sa_core::{SaError, SaResult};
use serde::{Deserialize, Serialize};
use std::io::Write;
use tracing::{debug, trace};

/// Observation channels produced on every tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputChannel {
    /// Normalized input sample (analog output A3 on the reference board)
    Raw,
    Lowpass,
    Highpass,
    Derivative,
    /// Squared derivative with display gain applied
    Squared,
    /// Moving-window integrator (A5)
    Integrated,
    Threshold,
    /// Live signal-averaged value (A4)
    Averaged,
    /// Beat indicator as 0.0 / 1.0 (the LED)
    BeatIndicator,
}

impl OutputChannel {
    pub const ALL: [OutputChannel; 9] = [
        OutputChannel::Raw,
        OutputChannel::Lowpass,
        OutputChannel::Highpass,
        OutputChannel::Derivative,
        OutputChannel::Squared,
        OutputChannel::Integrated,
        OutputChannel::Threshold,
        OutputChannel::Averaged,
        OutputChannel::BeatIndicator,
    ];

    /// The three analog outputs of the reference receiver
    pub fn default_set() -> [OutputChannel; 3] {
        [OutputChannel::Raw, OutputChannel::Integrated, OutputChannel::Averaged]
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutputChannel::Raw => "raw",
            OutputChannel::Lowpass => "lowpass",
            OutputChannel::Highpass => "highpass",
            OutputChannel::Derivative => "derivative",
            OutputChannel::Squared => "squared",
            OutputChannel::Integrated => "integrated",
            OutputChannel::Threshold => "threshold",
            OutputChannel::Averaged => "averaged",
            OutputChannel::BeatIndicator => "beat",
        }
    }

    /// Value of this channel in a tick output
    pub fn value(&self, output: &TickOutput) -> f32 {
        match self {
            OutputChannel::Raw => output.raw,
            OutputChannel::Lowpass => output.lowpass,
            OutputChannel::Highpass => output.highpass,
            OutputChannel::Derivative => output.derivative,
            OutputChannel::Squared => output.squared,
            OutputChannel::Integrated => output.integrated,
            OutputChannel::Threshold => output.threshold,
            OutputChannel::Averaged => output.averaged,
            OutputChannel::BeatIndicator => {
                if output.beat_indicator {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Consumer of per-tick pipeline outputs
pub trait OutputSink: Send {
    fn write(&mut self, output: &TickOutput) -> SaResult<()>;

    /// Flush buffered rows, if any
    fn flush(&mut self) -> SaResult<()> {
        Ok(())
    }
}

impl<S: OutputSink + ?Sized> OutputSink for Box<S> {
    fn write(&mut self, output: &TickOutput) -> SaResult<()> {
        (**self).write(output)
    }

    fn flush(&mut self) -> SaResult<()> {
        (**self).flush()
    }
}

/// Fan out to several sinks in order
impl OutputSink for Vec<Box<dyn OutputSink>> {
    fn write(&mut self, output: &TickOutput) -> SaResult<()> {
        for sink in self.iter_mut() {
            sink.write(output)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> SaResult<()> {
        for sink in self.iter_mut() {
            sink.flush()?;
        }
        Ok(())
    }
}

/// Keeps every tick output in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    outputs: Vec<TickOutput>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(ticks: usize) -> Self {
        Self {
            outputs: Vec::with_capacity(ticks),
        }
    }

    pub fn outputs(&self) -> &[TickOutput] {
        &self.outputs
    }

    /// One channel over all recorded ticks
    pub fn channel(&self, channel: OutputChannel) -> Vec<f32> {
        self.outputs.iter().map(|o| channel.value(o)).collect()
    }

    /// Ticks at which a beat onset was reported
    pub fn onset_ticks(&self) -> Vec<u64> {
        self.outputs
            .iter()
            .filter(|o| o.events.onset)
            .map(|o| o.tick)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn clear(&mut self) {
        self.outputs.clear();
    }

    pub fn into_outputs(self) -> Vec<TickOutput> {
        self.outputs
    }
}

impl OutputSink for RecordingSink {
    fn write(&mut self, output: &TickOutput) -> SaResult<()> {
        self.outputs.push(*output);
        Ok(())
    }
}

/// Emits tick outputs as tracing events
#[derive(Debug, Clone)]
pub struct TracingSink {
    channels: Vec<OutputChannel>,
}

impl TracingSink {
    pub fn new(channels: &[OutputChannel]) -> Self {
        Self {
            channels: channels.to_vec(),
        }
    }
}

impl OutputSink for TracingSink {
    fn write(&mut self, output: &TickOutput) -> SaResult<()> {
        if tracing::enabled!(tracing::Level::TRACE) {
            let values: Vec<(&str, f32)> = self
                .channels
                .iter()
                .map(|c| (c.name(), c.value(output)))
                .collect();
            trace!(tick = output.tick, ?values, "tick");
        }

        let events = &output.events;
        if events.onset {
            debug!(tick = output.tick, threshold = output.threshold, "beat onset");
        }
        if let Some(peak) = events.peak {
            debug!(tick = output.tick, value = peak.value, class = ?peak.class, "peak finalized");
        }
        if events.template_published {
            debug!(tick = output.tick, "template published");
        }
        Ok(())
    }
}

/// Writes selected channels as CSV rows
pub struct CsvSink<W: Write> {
    writer: W,
    channels: Vec<OutputChannel>,
    header_written: bool,
    rows: u64,
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W, channels: &[OutputChannel]) -> Self {
        Self {
            writer,
            channels: channels.to_vec(),
            header_written: false,
            rows: 0,
        }
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_header(&mut self) -> SaResult<()> {
        let mut header = String::from("tick");
        for channel in &self.channels {
            header.push(',');
            header.push_str(channel.name());
        }
        writeln!(self.writer, "{}", header).map_err(output_error)?;
        self.header_written = true;
        Ok(())
    }
}

fn output_error(error: std::io::Error) -> SaError {
    SaError::OutputError {
        reason: error.to_string(),
    }
}

impl<W: Write + Send> OutputSink for CsvSink<W> {
    fn write(&mut self, output: &TickOutput) -> SaResult<()> {
        if !self.header_written {
            self.write_header()?;
        }

        write!(self.writer, "{}", output.tick).map_err(output_error)?;
        for channel in &self.channels {
            write!(self.writer, ",{}", channel.value(output)).map_err(output_error)?;
        }
        writeln!(self.writer).map_err(output_error)?;
        self.rows += 1;
        Ok(())
    }

    fn flush(&mut self) -> SaResult<()> {
        self.writer.flush().map_err(output_error)
    }
}
