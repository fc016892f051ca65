//! Command line arguments

use crate::config::{NodeConfig, SourceConfig};
use anyhow::Result;
use clap::Parser;
use sa_processing::{LinkConfig, ProcessingConfig};
use std::path::PathBuf;

/// Stream an ECG over a framed byte link and average its beats
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// JSON node configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Play a fixed-width record file instead of the synthetic ECG
    #[arg(short, long)]
    pub record: Option<PathBuf>,

    /// First data point of the record window
    #[arg(long)]
    pub start: Option<usize>,

    /// Data point after the record window (0 = end of record)
    #[arg(long)]
    pub end: Option<usize>,

    /// Heart rate of the synthetic ECG in beats per minute
    #[arg(long, conflicts_with = "record")]
    pub heart_rate: Option<f32>,

    /// Stop after this many seconds
    #[arg(short, long)]
    pub seconds: Option<f32>,

    /// Run on a simulated clock as fast as possible
    #[arg(long)]
    pub simulated: bool,

    /// Pace the sender at the receiver tick rate
    #[arg(long)]
    pub matched: bool,

    /// Write every output channel instead of the default set
    #[arg(long)]
    pub all_channels: bool,

    /// Write the output channels to a CSV file
    #[arg(long)]
    pub csv: Option<PathBuf>,
}

impl Cli {
    /// Configuration file (or defaults) with the command line applied on top
    pub fn node_config(&self) -> Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::load(path)?,
            None => NodeConfig::default(),
        };

        if let Some(path) = &self.record {
            config.source = SourceConfig::Record {
                path: path.clone(),
                start: self.start.unwrap_or(0),
                end: self.end.unwrap_or(0),
            };
        } else if let SourceConfig::Record { start, end, .. } = &mut config.source {
            if let Some(first) = self.start {
                *start = first;
            }
            if let Some(last) = self.end {
                *end = last;
            }
        }

        if let Some(rate) = self.heart_rate {
            match &mut config.source {
                SourceConfig::Synthetic { heart_rate_bpm, .. } => *heart_rate_bpm = rate,
                SourceConfig::Record { .. } => config.source = SourceConfig::synthetic(rate),
            }
        }

        if self.all_channels {
            config.processing.output_channels = ProcessingConfig::diagnostic().output_channels;
        }
        if self.matched {
            config.link = LinkConfig::matched(&config.processing);
        }
        if self.seconds.is_some() {
            config.seconds = self.seconds;
        }
        config.simulated |= self.simulated;

        config.validate()?;
        Ok(config)
    }
}
