//! Music player with a three-band audio analysis core.
//!
//! One decoded source is played and, in parallel, fanned out through a bass
//! low-pass, a mid band-pass and a treble high-pass filter, each feeding its own
//! FFT analyser. Once per rendered frame the analysers are sampled and reduced
//! into three energies that drive visuals.

pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod format;
pub mod library;
pub mod visual;

pub use audio::{AudioGraph, BandReducer, FrequencyConfig, FrequencySample, ModulationTriple, Player};
pub use config::AppConfig;
pub use error::{PlayerError, Result};
pub use events::{EventBus, PlayerEvent};
pub use library::{Library, Track};
