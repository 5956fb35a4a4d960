use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::audio::{AnalyserConfig, FrequencyConfig};
use crate::error::{PlayerError, Result};

/// Everything the player and the frame loop need, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Rate the analysis graph runs at; decoded tracks are resampled to it.
    pub sample_rate: u32,
    pub frame_rate: f32,
    pub volume: f32,
    pub looping: bool,
    pub output_device: Option<String>,
    pub analyser: AnalyserConfig,
    pub frequency: FrequencyConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            frame_rate: 60.0,
            volume: 1.0,
            looping: false,
            output_device: None,
            analyser: AnalyserConfig::default(),
            frequency: FrequencyConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| PlayerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig = serde_json::from_str(&text)?;
        config.validate()?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text).map_err(|source| PlayerError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(PlayerError::Config("sample_rate must be positive".into()));
        }
        if self.frame_rate.is_nan() || self.frame_rate <= 0.0 {
            return Err(PlayerError::Config(format!(
                "frame_rate must be positive, got {}",
                self.frame_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(PlayerError::Config(format!(
                "volume must be within [0, 1], got {}",
                self.volume
            )));
        }
        self.analyser.validate().map_err(PlayerError::Config)
    }

    /// Frames of audio that elapse during one rendered frame.
    pub fn frames_per_tick(&self) -> usize {
        (self.sample_rate as f32 / self.frame_rate).round().max(1.0) as usize
    }
}
