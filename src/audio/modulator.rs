use serde::{Deserialize, Serialize};

use super::sampler::FrequencySample;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandRange {
    pub min: f32,
    pub max: f32,
}

/// Which array length the mid band's mean is divided by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MidDivisor {
    /// Divide by the treble array's length, as the player always has.
    #[default]
    TrebleLength,
    /// Divide by the mid array's own length.
    MidLength,
}

/// Output ranges for each band plus the shared amplitude multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrequencyConfig {
    pub bass: BandRange,
    pub mid: BandRange,
    pub treble: BandRange,
    pub amplitude: f32,
    pub mid_divisor: MidDivisor,
}

impl Default for FrequencyConfig {
    fn default() -> Self {
        Self {
            bass: BandRange { min: 0.0, max: 8.0 },
            mid: BandRange { min: 0.0, max: 4.0 },
            treble: BandRange { min: 0.0, max: 2.0 },
            amplitude: 7.0,
            mid_divisor: MidDivisor::TrebleLength,
        }
    }
}

/// Per-frame band energies handed to the visual layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModulationTriple {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
}

const BASS_CURVE: f32 = 0.8;

/// Position of `value` inside `[min, max]`. A zero-width range yields 0.
pub fn fractionate(value: f32, min: f32, max: f32) -> f32 {
    let width = max - min;
    if width == 0.0 {
        return 0.0;
    }
    (value - min) / width
}

/// Linear remap of `value` from `[in_min, in_max]` onto `[out_min, out_max]`.
pub fn modulate(value: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    out_min + fractionate(value, in_min, in_max) * (out_max - out_min)
}

fn max_byte(data: &[u8]) -> f32 {
    data.iter().copied().max().unwrap_or(0) as f32
}

fn mean_byte(data: &[u8]) -> f32 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().map(|&b| b as u64).sum::<u64>() as f32 / data.len() as f32
}

fn per_length(value: f32, len: usize) -> f32 {
    if len == 0 {
        0.0
    } else {
        value / len as f32
    }
}

/// Turns three magnitude spectra into three drive scalars. Holds no state between calls.
#[derive(Debug, Clone, Default)]
pub struct BandReducer {
    config: FrequencyConfig,
}

impl BandReducer {
    pub fn new(config: FrequencyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FrequencyConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: FrequencyConfig) {
        self.config = config;
    }

    pub fn reduce(&self, sample: &FrequencySample) -> ModulationTriple {
        let config = &self.config;

        let bass = per_length(max_byte(&sample.bass), sample.bass.len());
        let mid_len = match config.mid_divisor {
            MidDivisor::TrebleLength => sample.treble.len(),
            MidDivisor::MidLength => sample.mid.len(),
        };
        let mid = per_length(mean_byte(&sample.mid), mid_len);
        let treble = per_length(mean_byte(&sample.treble), sample.treble.len());

        let bass = modulate(bass.powf(BASS_CURVE), 0.0, 1.0, config.bass.min, config.bass.max);
        let mid = modulate(mid, 0.0, 1.0, config.mid.min, config.mid.max);
        let treble = modulate(treble, 0.0, 1.0, config.treble.min, config.treble.max);

        ModulationTriple {
            bass: bass * config.amplitude,
            mid: mid * config.amplitude,
            treble: treble * config.amplitude,
        }
    }
}
