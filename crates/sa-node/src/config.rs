//! Node configuration: pipeline, link, sample source and run length

use anyhow::{Context, Result};
use sa_core::SampleSource;
use sa_processing::{LinkConfig, ProcessingConfig};
use sa_simulation::{EcgConfig, EcgSimulator, NoiseConfig, RecordPlayer};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Where the sender node takes its samples from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Synthetic PQRST waveform
    Synthetic {
        heart_rate_bpm: f32,
        noise: NoiseConfig,
        seed: Option<u64>,
    },
    /// Fixed-width record file played on a loop
    Record {
        path: PathBuf,
        start: usize,
        /// 0 plays to the end of the record
        end: usize,
    },
}

impl SourceConfig {
    pub fn synthetic(heart_rate_bpm: f32) -> Self {
        SourceConfig::Synthetic {
            heart_rate_bpm,
            noise: NoiseConfig::default(),
            seed: Some(42),
        }
    }

    /// Build the source, paced at `sampling_rate` frames per second
    pub fn open(&self, sampling_rate: f32) -> Result<Box<dyn SampleSource>> {
        match self {
            SourceConfig::Synthetic {
                heart_rate_bpm,
                noise,
                seed,
            } => {
                let simulator = EcgSimulator::new(EcgConfig {
                    sampling_rate,
                    heart_rate_bpm: *heart_rate_bpm,
                    noise: noise.clone(),
                    seed: *seed,
                    ..EcgConfig::default()
                })
                .context("Failed to create ECG simulator")?;
                Ok(Box::new(simulator))
            }
            SourceConfig::Record { path, start, end } => {
                let player = RecordPlayer::from_file(path, *start, *end)
                    .with_context(|| format!("Failed to open record {}", path.display()))?;
                let (first, last) = player.window();
                info!(path = %path.display(), first, last, "playing record window");
                Ok(Box::new(player))
            }
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::synthetic(72.0)
    }
}

/// Everything one run of the node needs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub processing: ProcessingConfig,
    pub link: LinkConfig,
    pub source: SourceConfig,
    /// Stop after this many seconds; `None` runs until interrupted
    pub seconds: Option<f32>,
    /// Drive the link on a logical clock instead of wall-clock time
    pub simulated: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            processing: ProcessingConfig::reference(),
            link: LinkConfig::reference(),
            source: SourceConfig::default(),
            seconds: None,
            simulated: false,
        }
    }
}

impl NodeConfig {
    /// Read a JSON configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: NodeConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.processing.validate().context("Invalid processing config")?;
        self.link.validate().context("Invalid link config")?;
        if let Some(seconds) = self.seconds {
            anyhow::ensure!(
                seconds.is_finite() && seconds > 0.0,
                "Run length must be positive, got {} s",
                seconds
            );
        }
        Ok(())
    }

    /// Receiver ticks covered by the run length
    pub fn tick_limit(&self) -> Option<u64> {
        self.seconds
            .map(|seconds| (seconds * self.processing.tick_rate_hz).round() as u64)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize node config")
    }
}
