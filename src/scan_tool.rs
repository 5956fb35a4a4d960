use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use bandviz::audio::{Band, MidDivisor, OfflineOutput};
use bandviz::{AppConfig, FrequencyConfig, ModulationTriple, Player};

#[derive(Parser)]
#[command(name = "band-scan")]
#[command(about = "Plays a file through the band analysis graph offline and reports the band energies")]
struct Args {
    /// Audio file to scan (WAV, MP3, FLAC, OGG, M4A)
    input: PathBuf,

    /// Output JSON file path
    #[arg(long, short, default_value = "band_scan.json")]
    output: PathBuf,

    /// JSON configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Frames per second the energies are sampled at
    #[arg(long)]
    fps: Option<f32>,

    /// Include every frame's energies in the report
    #[arg(long)]
    frame_by_frame: bool,

    /// Divide the mid band by its own bin count rather than the treble's
    #[arg(long)]
    corrected_mid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BandStats {
    min: f32,
    max: f32,
    mean: f32,
    std_dev: f32,
    samples: usize,
}

impl BandStats {
    fn from_values(values: &[f32]) -> Self {
        if values.is_empty() {
            return Self { min: 0.0, max: 0.0, mean: 0.0, std_dev: 0.0, samples: 0 };
        }
        let n = values.len() as f32;
        let min = values.iter().copied().fold(f32::INFINITY, f32::min);
        let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mean = values.iter().sum::<f32>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
        Self {
            min,
            max,
            mean,
            std_dev: variance.sqrt(),
            samples: values.len(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FrameRecord {
    timestamp: f32,
    bass: f32,
    mid: f32,
    treble: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ScanReport {
    file: String,
    track_name: String,
    duration_seconds: f32,
    sample_rate: u32,
    frame_rate: f32,
    total_frames: usize,
    frequency_config: FrequencyConfig,
    bands: BTreeMap<String, BandStats>,
    frames: Option<Vec<FrameRecord>>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::load(path).with_context(|| format!("loading {:?}", path))?,
        None => AppConfig::default(),
    };
    if let Some(fps) = args.fps {
        config.frame_rate = fps;
    }
    if args.corrected_mid {
        config.frequency.mid_divisor = MidDivisor::MidLength;
    }
    config.looping = false;
    config.validate()?;

    info!("Band scan of {:?}", args.input);
    info!("Sample rate: {}Hz, frame rate: {:.1}fps", config.sample_rate, config.frame_rate);

    let mut player = Player::new(OfflineOutput::new(), &config)?;
    player
        .load_path(&args.input)
        .with_context(|| format!("loading {:?}", args.input))?;

    let frames_per_tick = config.frames_per_tick();
    let mut history: Vec<ModulationTriple> = Vec::new();
    let mut records = Vec::new();

    loop {
        let pulled = player.output_mut().pull(frames_per_tick);
        player.update()?;
        if pulled == 0 {
            break;
        }
        let triple = player.modulation();
        if args.frame_by_frame {
            records.push(FrameRecord {
                timestamp: player.position().as_secs_f32(),
                bass: triple.bass,
                mid: triple.mid,
                treble: triple.treble,
            });
        }
        history.push(triple);

        if history.len() % 600 == 0 {
            info!("Scanned {:.1}s", player.position().as_secs_f32());
        }
    }

    let mut bands = BTreeMap::new();
    for band in Band::ALL {
        let values: Vec<f32> = history
            .iter()
            .map(|t| match band {
                Band::Bass => t.bass,
                Band::Mid => t.mid,
                Band::Treble => t.treble,
            })
            .collect();
        let stats = BandStats::from_values(&values);
        info!(
            "{:>6}: min {:.3}, max {:.3}, mean {:.3}, std dev {:.3}",
            band.label(),
            stats.min,
            stats.max,
            stats.mean,
            stats.std_dev
        );
        bands.insert(band.label().to_string(), stats);
    }

    let report = ScanReport {
        file: args.input.display().to_string(),
        track_name: player.current_track().map(|t| t.name.clone()).unwrap_or_default(),
        duration_seconds: player.position().as_secs_f32(),
        sample_rate: config.sample_rate,
        frame_rate: config.frame_rate,
        total_frames: history.len(),
        frequency_config: player.frequency_config().clone(),
        bands,
        frames: args.frame_by_frame.then_some(records),
    };

    let writer = BufWriter::new(File::create(&args.output).with_context(|| format!("creating {:?}", args.output))?);
    serde_json::to_writer_pretty(writer, &report)?;
    info!("Report written to {:?} ({} frames)", args.output, report.total_frames);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_of_constant_series() {
        let stats = BandStats::from_values(&[2.0, 2.0, 2.0]);
        assert_eq!(stats, BandStats { min: 2.0, max: 2.0, mean: 2.0, std_dev: 0.0, samples: 3 });
    }

    #[test]
    fn stats_of_empty_series_are_zero() {
        assert_eq!(BandStats::from_values(&[]).samples, 0);
    }

    #[test]
    fn stats_spread() {
        let stats = BandStats::from_values(&[0.0, 4.0]);
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 4.0);
        assert_eq!(stats.mean, 2.0);
        assert_eq!(stats.std_dev, 2.0);
    }
}
