pub mod analyser;
pub mod filter;
pub mod graph;
pub mod modulator;
pub mod playback;
pub mod sampler;

pub use analyser::{Analyser, AnalyserConfig};
pub use filter::{BiquadFilter, FilterKind, FilterSpec};
pub use graph::{AudioGraph, BandAnalysers, TappedSource, RENDER_QUANTUM};
pub use modulator::{BandRange, BandReducer, FrequencyConfig, MidDivisor, ModulationTriple};
pub use playback::{OfflineOutput, OutputDevice, Player, RodioOutput};
pub use sampler::FrequencySample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    Bass,
    Mid,
    Treble,
}

impl Band {
    pub const ALL: [Band; 3] = [Band::Bass, Band::Mid, Band::Treble];

    pub fn label(&self) -> &'static str {
        match self {
            Band::Bass => "bass",
            Band::Mid => "mid",
            Band::Treble => "treble",
        }
    }
}
