//! Deterministic simulated-time driver for the sender → link → receiver chain
//!
//! The scheduler keeps a logical clock in nanoseconds. Frames leave the
//! sender at the link's frame rate, each byte arriving one byte time after
//! the previous one. Receiver ticks run at the pipeline tick rate and read
//! whatever sample the decoder published last. Bytes due at or before a
//! tick are delivered before that tick runs.

use crate::config::{LinkConfig, ProcessingConfig};
use crate::pipeline::Pipeline;
use crate::sink::OutputSink;
use sa_core::{encode_frame, DecoderStats, FrameDecoder, LatestSample, RawSample, SaResult, SampleSource};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info};

/// Fault injected on the simulated link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinkFault {
    #[default]
    None,
    /// Lose every n-th byte sent
    DropEvery(u64),
    /// Lose every byte sent in the window `[from, from + count)` (byte indices)
    DropRange { from: u64, count: u64 },
}

impl LinkFault {
    fn drops(&self, byte_index: u64) -> bool {
        match *self {
            LinkFault::None => false,
            LinkFault::DropEvery(n) => n > 0 && (byte_index + 1) % n == 0,
            LinkFault::DropRange { from, count } => byte_index >= from && byte_index - from < count,
        }
    }
}

/// Outcome of a scheduler run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleReport {
    pub ticks: u64,
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub bytes_lost: u64,
    pub decoder: DecoderStats,
    /// Simulated time covered by the run
    pub simulated: Duration,
    pub source_exhausted: bool,
}

/// Cooperative sender/receiver scheduler on a logical clock
pub struct LinkScheduler<S: SampleSource> {
    source: S,
    pipeline: Pipeline,
    decoder: FrameDecoder,
    latest: LatestSample,
    fault: LinkFault,
    frame_period_ns: u64,
    byte_time_ns: u64,
    tick_period_ns: u64,
    next_frame_ns: u64,
    next_tick_ns: u64,
    /// Bytes on the wire with their arrival time
    in_flight: VecDeque<(u64, u8)>,
    report: ScheduleReport,
}

impl<S: SampleSource> LinkScheduler<S> {
    pub fn new(source: S, processing: ProcessingConfig, link: LinkConfig) -> SaResult<Self> {
        link.validate()?;
        let pipeline = Pipeline::new(processing)?;

        info!(
            source = source.name(),
            sender_rate_hz = link.sender_rate_hz,
            tick_rate_hz = pipeline.config().tick_rate_hz,
            "simulated link ready"
        );

        Ok(Self {
            source,
            frame_period_ns: link.frame_period().as_nanos() as u64,
            byte_time_ns: link.byte_time().as_nanos() as u64,
            tick_period_ns: pipeline.config().tick_period().as_nanos() as u64,
            pipeline,
            decoder: FrameDecoder::new(),
            latest: LatestSample::new(0),
            fault: LinkFault::None,
            next_frame_ns: 0,
            next_tick_ns: 0,
            in_flight: VecDeque::with_capacity(16),
            report: ScheduleReport::default(),
        })
    }

    pub fn with_fault(mut self, fault: LinkFault) -> Self {
        self.fault = fault;
        self
    }

    /// Run `ticks` receiver ticks, writing every output to `sink`
    pub fn run_for_ticks<O: OutputSink + ?Sized>(
        &mut self,
        ticks: u64,
        sink: &mut O,
    ) -> SaResult<ScheduleReport> {
        for _ in 0..ticks {
            let now = self.next_tick_ns;
            self.send_until(now);
            self.deliver_until(now);

            self.pipeline.run(self.latest.load(), sink)?;

            self.report.ticks += 1;
            self.next_tick_ns += self.tick_period_ns;
        }

        sink.flush()?;
        self.report.decoder = self.decoder.stats();
        self.report.simulated = Duration::from_nanos(self.next_tick_ns);
        debug!(
            ticks = self.report.ticks,
            frames = self.report.frames_sent,
            dropped = self.report.decoder.dropped_bytes,
            "scheduler run finished"
        );
        Ok(self.report.clone())
    }

    /// Run for a span of simulated time
    pub fn run_for<O: OutputSink + ?Sized>(
        &mut self,
        span: Duration,
        sink: &mut O,
    ) -> SaResult<ScheduleReport> {
        let ticks = span.as_nanos() as u64 / self.tick_period_ns.max(1);
        self.run_for_ticks(ticks, sink)
    }

    fn send_until(&mut self, now: u64) {
        while !self.report.source_exhausted && self.next_frame_ns <= now {
            match self.source.next_sample() {
                Some(sample) => self.send_frame(sample),
                None => {
                    self.report.source_exhausted = true;
                    info!(source = self.source.name(), "sample source exhausted");
                }
            }
            self.next_frame_ns += self.frame_period_ns;
        }
    }

    fn send_frame(&mut self, sample: RawSample) {
        let start = self.next_frame_ns;
        for (i, byte) in encode_frame(sample).into_iter().enumerate() {
            let index = self.report.bytes_sent;
            self.report.bytes_sent += 1;
            if self.fault.drops(index) {
                self.report.bytes_lost += 1;
                continue;
            }
            let arrival = start + (i as u64 + 1) * self.byte_time_ns;
            self.in_flight.push_back((arrival, byte));
        }
        self.report.frames_sent += 1;
    }

    fn deliver_until(&mut self, now: u64) {
        while let Some(&(arrival, byte)) = self.in_flight.front() {
            if arrival > now {
                break;
            }
            self.in_flight.pop_front();
            if let Some(value) = self.decoder.feed(&[byte]) {
                self.latest.store(value);
            }
        }
    }

    /// Logical time of the next receiver tick
    pub fn now(&self) -> Duration {
        Duration::from_nanos(self.next_tick_ns)
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn decoder(&self) -> &FrameDecoder {
        &self.decoder
    }

    pub fn latest(&self) -> &LatestSample {
        &self.latest
    }

    pub fn report(&self) -> &ScheduleReport {
        &self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{OutputChannel, RecordingSink};
    use sa_core::{normalize, IterSource, ADC_FULL_SCALE};

    fn ramp_source(len: usize) -> IterSource<std::vec::IntoIter<RawSample>> {
        let samples: Vec<RawSample> = (0..len).map(|n| (n % 2048) as RawSample).collect();
        IterSource::new("ramp", samples.into_iter())
    }

    fn matched_scheduler(len: usize) -> LinkScheduler<IterSource<std::vec::IntoIter<RawSample>>> {
        let processing = ProcessingConfig::reference();
        let link = LinkConfig::matched(&processing);
        LinkScheduler::new(ramp_source(len), processing, link).unwrap()
    }

    #[test]
    fn test_matched_rates_deliver_every_sample() {
        let mut scheduler = matched_scheduler(1000);
        let mut sink = RecordingSink::new();
        let report = scheduler.run_for_ticks(500, &mut sink).unwrap();

        assert_eq!(report.ticks, 500);
        assert_eq!(report.bytes_lost, 0);
        assert_eq!(report.decoder.dropped_bytes, 0);
        assert_eq!(report.simulated, Duration::from_millis(2500));

        // A frame sent at a tick arrives a few byte times later, so each
        // tick sees the sample of the previous period
        let raw = sink.channel(OutputChannel::Raw);
        assert_eq!(raw[0], 0.0);
        for (tick, &value) in raw.iter().enumerate().skip(1) {
            assert_eq!(value, normalize((tick - 1) as RawSample, ADC_FULL_SCALE));
        }
    }

    #[test]
    fn test_reference_rates_subsample_the_sender() {
        let processing = ProcessingConfig::reference();
        let link = LinkConfig::reference();
        let mut scheduler = LinkScheduler::new(ramp_source(2000), processing, link).unwrap();
        let mut sink = RecordingSink::new();
        let report = scheduler.run_for(Duration::from_secs(1), &mut sink).unwrap();

        assert_eq!(report.ticks, 200);
        // Frames started before the last tick at 995 ms
        assert_eq!(report.frames_sent, 359);

        // Values seen by the receiver only move forward, skipping samples
        let raw = sink.channel(OutputChannel::Raw);
        for pair in raw.windows(2).skip(1) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[test]
    fn test_exhausted_source_holds_last_sample() {
        let mut scheduler = matched_scheduler(10);
        let mut sink = RecordingSink::new();
        let report = scheduler.run_for_ticks(50, &mut sink).unwrap();

        assert!(report.source_exhausted);
        assert_eq!(report.frames_sent, 10);
        assert_eq!(scheduler.latest().load(), 9);
        let raw = sink.channel(OutputChannel::Raw);
        assert!(raw[20..].iter().all(|&v| v == normalize(9, ADC_FULL_SCALE)));
    }

    #[test]
    fn test_lost_byte_misaligns_until_zero_low_byte() {
        // Byte 31 is the high byte of sample 10
        let mut scheduler =
            matched_scheduler(400).with_fault(LinkFault::DropRange { from: 31, count: 1 });
        let mut sink = RecordingSink::new();
        let report = scheduler.run_for_ticks(400, &mut sink).unwrap();

        assert_eq!(report.bytes_lost, 1);

        // Terminators are taken as low bytes: sample 12 reads as 0x0C00
        let raw = sink.channel(OutputChannel::Raw);
        assert_eq!(raw[13], normalize(0x0C00, ADC_FULL_SCALE));

        // Sample 256 carries a zero low byte, which realigns the stream
        assert_eq!(report.decoder.dropped_bytes, 2);
        assert_eq!(report.decoder.resyncs, 2);
        assert_eq!(raw[300], normalize(299, ADC_FULL_SCALE));
        assert_eq!(scheduler.latest().load(), 398);
    }

    #[test]
    fn test_fault_patterns() {
        assert!(!LinkFault::None.drops(0));
        assert!(LinkFault::DropEvery(3).drops(2));
        assert!(!LinkFault::DropEvery(3).drops(3));
        assert!(!LinkFault::DropEvery(0).drops(5));
        assert!(LinkFault::DropRange { from: 4, count: 2 }.drops(5));
        assert!(!LinkFault::DropRange { from: 4, count: 2 }.drops(6));
    }
}
