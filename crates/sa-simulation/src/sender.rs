//! Real-time sender node: one framed sample per sender tick

use sa_core::{config_error, encode_frame, SaError, SaResult, SampleSource, FRAME_LEN};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Commands for controlling the sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderCommand {
    Start,
    Pause,
    Resume,
    /// End the task and report statistics
    Stop,
}

/// Why the sender task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    Stopped,
    SourceExhausted,
    ControlClosed,
}

/// Sender statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderStats {
    pub frames_sent: u64,
    pub bytes_written: u64,
    /// Ticks skipped while paused
    pub paused_ticks: u64,
    /// Wall-clock time the task ran
    pub elapsed: Duration,
    pub stop_reason: Option<StopReason>,
}

impl SenderStats {
    fn new() -> Self {
        Self {
            frames_sent: 0,
            bytes_written: 0,
            paused_ticks: 0,
            elapsed: Duration::ZERO,
            stop_reason: None,
        }
    }
}

/// Paces a sample source onto a byte link
pub struct ByteSender<S, W> {
    source: S,
    writer: W,
    period: Duration,
    control_receiver: mpsc::Receiver<SenderCommand>,
}

impl<S, W> ByteSender<S, W>
where
    S: SampleSource,
    W: AsyncWrite + Unpin + Send,
{
    /// Create a paused sender and the handle that controls it
    pub fn new(source: S, writer: W, rate_hz: f32) -> SaResult<(Self, mpsc::Sender<SenderCommand>)> {
        if !(rate_hz.is_finite() && rate_hz > 0.0) {
            return Err(config_error!("Sender rate must be positive, got {}", rate_hz));
        }
        let period = Duration::from_nanos((1e9 / rate_hz as f64).round() as u64);
        if period.is_zero() {
            return Err(config_error!(
                "Sender rate {} Hz is too high for a nanosecond period",
                rate_hz
            ));
        }
        let (control_sender, control_receiver) = mpsc::channel(32);

        Ok((
            Self {
                source,
                writer,
                period,
                control_receiver,
            },
            control_sender,
        ))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run until stopped, the source runs dry or the link closes
    pub async fn run(self) -> SaResult<SenderStats> {
        let ByteSender {
            mut source,
            mut writer,
            period,
            mut control_receiver,
        } = self;

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
        let mut running = false;
        let mut stats = SenderStats::new();
        let started = Instant::now();

        info!(source = source.name(), period_us = period.as_micros() as u64, "sender ready");

        let reason = loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !running {
                        stats.paused_ticks += 1;
                        continue;
                    }
                    let Some(sample) = source.next_sample() else {
                        info!(source = source.name(), frames = stats.frames_sent, "source exhausted");
                        break StopReason::SourceExhausted;
                    };
                    let frame = encode_frame(sample);
                    if let Err(e) = writer.write_all(&frame).await {
                        warn!(error = %e, frames = stats.frames_sent, "link write failed");
                        return Err(SaError::from(e));
                    }
                    stats.frames_sent += 1;
                    stats.bytes_written += FRAME_LEN as u64;
                }

                command = control_receiver.recv() => {
                    match command {
                        Some(SenderCommand::Start) | Some(SenderCommand::Resume) => {
                            debug!(?command, "sender running");
                            running = true;
                        }
                        Some(SenderCommand::Pause) => {
                            debug!("sender paused");
                            running = false;
                        }
                        Some(SenderCommand::Stop) => break StopReason::Stopped,
                        None => break StopReason::ControlClosed,
                    }
                }
            }
        };

        writer.flush().await?;
        writer.shutdown().await?;

        stats.elapsed = started.elapsed();
        stats.stop_reason = Some(reason);
        info!(
            frames = stats.frames_sent,
            bytes = stats.bytes_written,
            reason = ?reason,
            "sender finished"
        );
        Ok(stats)
    }
}

/// Spawn a running sender task
pub fn start_sender<S, W>(
    source: S,
    writer: W,
    rate_hz: f32,
) -> SaResult<(JoinHandle<SaResult<SenderStats>>, mpsc::Sender<SenderCommand>)>
where
    S: SampleSource + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (sender, control) = ByteSender::new(source, writer, rate_hz)?;
    control
        .try_send(SenderCommand::Start)
        .map_err(|e| SaError::LinkClosed {
            reason: format!("cannot start sender: {}", e),
        })?;
    Ok((tokio::spawn(sender.run()), control))
}
