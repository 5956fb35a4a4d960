use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use bandviz::audio::{Band, MidDivisor, ModulationTriple, RodioOutput};
use bandviz::format::{format_time, shortener};
use bandviz::{AppConfig, FrequencyConfig, Library, Player, PlayerEvent, Track};

#[derive(Parser)]
#[command(name = "bandviz")]
#[command(about = "Music player with a live bass/mid/treble energy meter")]
struct Args {
    /// Audio files or directories to play, in order
    inputs: Vec<PathBuf>,

    /// JSON configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Playback volume (0.0 - 1.0)
    #[arg(long)]
    volume: Option<f32>,

    /// Repeat the current track instead of advancing
    #[arg(long = "loop")]
    looping: bool,

    /// Meter refresh rate in frames per second
    #[arg(long)]
    fps: Option<f32>,

    /// Output device name (see --list-devices)
    #[arg(long)]
    device: Option<String>,

    /// Print available output devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Divide the mid band by its own bin count rather than the treble's
    #[arg(long)]
    corrected_mid: bool,

    /// Do not draw the meter
    #[arg(long, short)]
    quiet: bool,

    /// Write the effective configuration as JSON and exit
    #[arg(long)]
    dump_config: Option<PathBuf>,
}

fn build_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path).with_context(|| format!("loading {:?}", path))?,
        None => AppConfig::default(),
    };
    if let Some(volume) = args.volume {
        config.volume = volume;
    }
    if let Some(fps) = args.fps {
        config.frame_rate = fps;
    }
    if args.device.is_some() {
        config.output_device = args.device.clone();
    }
    if args.looping {
        config.looping = true;
    }
    if args.corrected_mid {
        config.frequency.mid_divisor = MidDivisor::MidLength;
    }
    config.validate()?;
    Ok(config)
}

fn build_library(inputs: &[PathBuf]) -> Result<Library> {
    let mut library = Library::default();
    for input in inputs {
        if input.is_dir() {
            for track in Library::scan_dir(input)?.tracks() {
                library.push(track.clone());
            }
        } else {
            let track = Track::from_path(input).unwrap_or_else(|e| {
                warn!("Reading tags from {:?} failed: {}", input, e);
                Track::new(input)
            });
            library.push(track);
        }
    }
    Ok(library)
}

fn meter(value: f32, full_scale: f32, width: usize) -> String {
    let fraction = if full_scale > 0.0 { (value / full_scale).clamp(0.0, 1.0) } else { 0.0 };
    let filled = (fraction * width as f32).round() as usize;
    format!("{}{}", "#".repeat(filled), " ".repeat(width - filled))
}

fn draw_meter(player: &Player<RodioOutput>, triple: &ModulationTriple, config: &FrequencyConfig) -> Result<()> {
    let name = player.current_track().map(|t| t.name.as_str());
    let position = format_time(player.position().as_secs_f64());
    let duration = player
        .duration()
        .map(|d| format_time(d.as_secs_f64()))
        .unwrap_or_else(|| "--:--".to_string());

    let mut line = format!("\r{:<13} {} / {} ", shortener(name, 10), position, duration);
    for band in Band::ALL {
        let (value, range) = match band {
            Band::Bass => (triple.bass, config.bass),
            Band::Mid => (triple.mid, config.mid),
            Band::Treble => (triple.treble, config.treble),
        };
        let full_scale = range.max * config.amplitude;
        line.push_str(&format!(" {} [{}] {:5.2}", band.label(), meter(value, full_scale, 12), value));
    }

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(line.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

/// Loads the next playable track after the current one. False when none is left.
fn advance(player: &mut Player<RodioOutput>, library: &Library) -> bool {
    let mut current = player.current_track().map(|t| t.id.clone()).unwrap_or_default();
    while let Some(next) = library.next_after(&current) {
        match player.load(next.clone()) {
            Ok(()) => return true,
            Err(e) => {
                warn!("Skipping {:?}: {}", next.audio, e);
                current = next.id.clone();
            }
        }
    }
    false
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.list_devices {
        for name in RodioOutput::device_names() {
            println!("{}", name);
        }
        return Ok(());
    }

    let config = build_config(&args)?;
    if let Some(path) = &args.dump_config {
        config.save(path)?;
        info!("Configuration written to {:?}", path);
        return Ok(());
    }

    let library = build_library(&args.inputs)?;
    let Some(first) = library.first().cloned() else {
        bail!("nothing to play: pass audio files or directories");
    };
    info!("Starting bandviz with {} tracks", library.len());

    let mut player = Player::open(&config).context("opening audio output")?;
    let events = player.events().channel();
    player.load(first)?;

    let frame = Duration::from_secs_f32(1.0 / config.frame_rate);
    'frames: loop {
        let tick = Instant::now();
        player.update()?;

        for event in events.try_iter() {
            match event {
                PlayerEvent::TrackChanged(track) => {
                    info!("Track: {} by {}", track.name, track.author.as_deref().unwrap_or("unknown"));
                }
                PlayerEvent::Ended => {
                    if !advance(&mut player, &library) {
                        info!("Playlist finished");
                        break 'frames;
                    }
                }
                _ => {}
            }
        }

        let triple = player.modulation();
        if !args.quiet {
            draw_meter(&player, &triple, player.frequency_config())?;
        }

        std::thread::sleep(frame.saturating_sub(tick.elapsed()));
    }

    if !args.quiet {
        println!();
    }
    Ok(())
}
