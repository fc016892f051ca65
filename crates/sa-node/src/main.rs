//! SA-Node: sender → link → receiver in one process
//!
//! In real-time mode the sender task and the receiver tick loop share a
//! tokio runtime and talk over an in-memory duplex link. Simulated mode
//! runs the same chain on a logical clock and finishes as fast as it can.

mod cli;
mod config;
mod receiver;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use config::NodeConfig;
use sa_core::LatestSample;
use sa_processing::{CsvSink, LinkScheduler, OutputSink, Pipeline, TracingSink};
use sa_simulation::{start_sender, SenderCommand};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Bytes buffered by the in-memory link
const LINK_BUFFER: usize = 1024;

/// Run length in simulated mode when none is configured
const DEFAULT_SIMULATED_SECONDS: f32 = 60.0;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = cli.node_config()?;
    debug!(config = %config.to_json()?, "node configuration");

    let mut sinks = build_sinks(&config, cli.csv.as_deref())?;

    if config.simulated {
        run_simulated(&config, &mut sinks)
    } else {
        run_realtime(&config, &mut sinks).await
    }
}

fn build_sinks(config: &NodeConfig, csv: Option<&Path>) -> Result<Vec<Box<dyn OutputSink>>> {
    let channels = &config.processing.output_channels;
    let mut sinks: Vec<Box<dyn OutputSink>> = vec![Box::new(TracingSink::new(channels))];

    if let Some(path) = csv {
        let file = File::create(path)
            .with_context(|| format!("Failed to create CSV output {}", path.display()))?;
        sinks.push(Box::new(CsvSink::new(BufWriter::new(file), channels)));
        info!(path = %path.display(), "writing CSV output");
    }
    Ok(sinks)
}

fn run_simulated(config: &NodeConfig, sinks: &mut Vec<Box<dyn OutputSink>>) -> Result<()> {
    let source = config.source.open(config.link.sender_rate_hz)?;
    let mut scheduler =
        LinkScheduler::new(source, config.processing.clone(), config.link.clone())
            .context("Failed to set up simulated link")?;

    let seconds = config.seconds.unwrap_or(DEFAULT_SIMULATED_SECONDS);
    let report = scheduler
        .run_for(Duration::from_secs_f32(seconds), sinks)
        .context("Simulated run failed")?;

    print_report(&RunReport {
        summary: scheduler.pipeline().summary(),
        frames_sent: report.frames_sent,
        decoder: report.decoder,
        source_exhausted: report.source_exhausted,
    })
}

async fn run_realtime(config: &NodeConfig, sinks: &mut Vec<Box<dyn OutputSink>>) -> Result<()> {
    let source = config.source.open(config.link.sender_rate_hz)?;
    let (link_writer, link_reader) = tokio::io::duplex(LINK_BUFFER);

    let latest = LatestSample::new(0);
    let reader = receiver::spawn_reader(link_reader, latest.clone());
    let (sender, control) = start_sender(source, link_writer, config.link.sender_rate_hz)
        .context("Failed to start sender")?;

    let mut pipeline =
        Pipeline::new(config.processing.clone()).context("Failed to set up pipeline")?;
    let summary = receiver::run_receiver(
        &mut pipeline,
        &latest,
        sinks,
        config.tick_limit(),
        shutdown_signal(),
    )
    .await
    .context("Receiver failed")?;

    if control.send(SenderCommand::Stop).await.is_err() {
        debug!("sender already finished");
    }
    let sent = sender.await.context("Sender task panicked")??;
    let decoder = reader.await.context("Link reader panicked")??;

    print_report(&RunReport {
        summary,
        frames_sent: sent.frames_sent,
        decoder,
        source_exhausted: sent.stop_reason == Some(sa_simulation::StopReason::SourceExhausted),
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

#[derive(Debug, Serialize)]
struct RunReport {
    summary: sa_processing::PipelineSummary,
    frames_sent: u64,
    decoder: sa_core::DecoderStats,
    source_exhausted: bool,
}

fn print_report(report: &RunReport) -> Result<()> {
    info!(
        beats = report.summary.beats,
        templates = report.summary.templates_published,
        frames = report.frames_sent,
        dropped_bytes = report.decoder.dropped_bytes,
        "run finished"
    );
    let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
    println!("{}", json);
    Ok(())
}
