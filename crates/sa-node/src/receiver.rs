//! Real-time receiver node
//!
//! A reader task drains the byte link into the frame decoder and publishes
//! every decoded sample to a [`LatestSample`] cell. The tick loop samples
//! that cell once per tick period and runs the pipeline step.

use sa_core::{DecoderStats, FrameDecoder, LatestSample, SaResult};
use sa_processing::{OutputSink, Pipeline, PipelineSummary};
use std::future::Future;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

const READ_CHUNK: usize = 64;

/// Spawn the link reader; it ends when the writer side closes
pub fn spawn_reader<R>(reader: R, latest: LatestSample) -> JoinHandle<SaResult<DecoderStats>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = reader;
        let mut decoder = FrameDecoder::new();
        let mut buffer = [0u8; READ_CHUNK];

        loop {
            let n = reader.read(&mut buffer).await?;
            if n == 0 {
                break;
            }

            let dropped_before = decoder.stats().dropped_bytes;
            if let Some(value) = decoder.feed(&buffer[..n]) {
                latest.store(value);
            }
            let dropped = decoder.stats().dropped_bytes - dropped_before;
            if dropped > 0 {
                warn!(dropped, "link bytes discarded while out of frame");
            }
        }

        let stats = decoder.stats();
        info!(
            frames = stats.frames,
            dropped = stats.dropped_bytes,
            resyncs = stats.resyncs,
            "link reader finished"
        );
        Ok(stats)
    })
}

/// Run the tick loop until `limit` ticks have run or `shutdown` resolves
pub async fn run_receiver<O, F>(
    pipeline: &mut Pipeline,
    latest: &LatestSample,
    sink: &mut O,
    limit: Option<u64>,
    shutdown: F,
) -> SaResult<PipelineSummary>
where
    O: OutputSink + ?Sized,
    F: Future<Output = ()>,
{
    let mut ticker = interval(pipeline.config().tick_period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    info!(
        tick_rate_hz = pipeline.config().tick_rate_hz,
        limit = ?limit,
        "receiver running"
    );

    let mut ticks = 0u64;
    while limit.map_or(true, |limit| ticks < limit) {
        tokio::select! {
            _ = ticker.tick() => {
                let output = pipeline.run(latest.load(), sink)?;
                if output.events.template_published {
                    debug!(tick = output.tick, "template refreshed");
                }
                ticks += 1;
            }
            _ = &mut shutdown => {
                info!(ticks, "receiver shutdown requested");
                break;
            }
        }
    }

    sink.flush()?;
    let summary = pipeline.summary();
    info!(
        ticks = summary.ticks,
        beats = summary.beats,
        templates = summary.templates_published,
        "receiver stopped"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_core::{encode_frame, normalize, IterSource, ADC_FULL_SCALE};
    use sa_processing::{OutputChannel, ProcessingConfig, RecordingSink};
    use sa_simulation::{start_sender, SenderCommand};
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_reader_publishes_latest_frame() {
        let (mut writer, link) = tokio::io::duplex(64);
        let latest = LatestSample::new(0);
        let reader = spawn_reader(link, latest.clone());

        for value in [100, 200, 300] {
            writer.write_all(&encode_frame(value)).await.unwrap();
        }
        drop(writer);

        let stats = reader.await.unwrap().unwrap();
        assert_eq!(stats.frames, 3);
        assert_eq!(stats.dropped_bytes, 0);
        assert_eq!(latest.load(), 300);
    }

    #[tokio::test]
    async fn test_receiver_stops_at_tick_limit() {
        let mut pipeline = Pipeline::new(ProcessingConfig::reference()).unwrap();
        let latest = LatestSample::new(1024);
        let mut sink = RecordingSink::new();

        let summary = run_receiver(&mut pipeline, &latest, &mut sink, Some(20), std::future::pending())
            .await
            .unwrap();

        assert_eq!(summary.ticks, 20);
        assert_eq!(sink.len(), 20);
        assert!(sink.channel(OutputChannel::Raw).iter().all(|&v| v == 0.5));
    }

    #[tokio::test]
    async fn test_receiver_stops_on_shutdown() {
        let mut pipeline = Pipeline::new(ProcessingConfig::reference()).unwrap();
        let latest = LatestSample::new(0);
        let mut sink = RecordingSink::new();

        let shutdown = tokio::time::sleep(std::time::Duration::from_millis(30));
        let summary = run_receiver(&mut pipeline, &latest, &mut sink, None, shutdown)
            .await
            .unwrap();

        assert!(summary.ticks > 0);
        assert_eq!(summary.ticks, sink.len() as u64);
    }

    #[tokio::test]
    async fn test_sender_to_receiver_over_duplex() {
        let (link_writer, link_reader) = tokio::io::duplex(256);
        let latest = LatestSample::new(0);
        let reader = spawn_reader(link_reader, latest.clone());
        let source = IterSource::new("flat", std::iter::repeat(1536));
        let (sender, control) = start_sender(source, link_writer, 200.0).unwrap();

        let mut pipeline = Pipeline::new(ProcessingConfig::reference()).unwrap();
        let mut sink = RecordingSink::new();
        run_receiver(&mut pipeline, &latest, &mut sink, Some(40), std::future::pending())
            .await
            .unwrap();

        control.send(SenderCommand::Stop).await.unwrap();
        let sent = sender.await.unwrap().unwrap();
        let received = reader.await.unwrap().unwrap();

        assert_eq!(received.frames, sent.frames_sent);
        let raw = sink.channel(OutputChannel::Raw);
        assert_eq!(raw.last().copied(), Some(normalize(1536, ADC_FULL_SCALE)));
    }
}
