use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info};
use rodio::Source;

use super::analyser::{Analyser, AnalyserConfig};
use super::filter::{BiquadFilter, FilterSpec};
use super::Band;
use crate::error::{PlayerError, Result};

/// Frames mixed down before they are pushed through the filter bank in one go.
pub const RENDER_QUANTUM: usize = 128;

/// Read handles for the three band analysers.
#[derive(Debug, Clone)]
pub struct BandAnalysers {
    pub bass: Arc<Analyser>,
    pub mid: Arc<Analyser>,
    pub treble: Arc<Analyser>,
}

impl BandAnalysers {
    pub fn get(&self, band: Band) -> &Arc<Analyser> {
        match band {
            Band::Bass => &self.bass,
            Band::Mid => &self.mid,
            Band::Treble => &self.treble,
        }
    }
}

struct BandChannel {
    filter: BiquadFilter,
    analyser: Arc<Analyser>,
    scratch: Vec<f32>,
}

/// One filter per band, each feeding its own analyser. Every filter sees the
/// unfiltered input; bands are never derived from each other.
pub struct FilterBank {
    channels: [BandChannel; 3],
    /// Bumped on every tap. Only the source holding the current value feeds the bank.
    generation: u64,
}

impl FilterBank {
    fn new(sample_rate: u32, analysers: &BandAnalysers) -> Self {
        let channel = |band: Band| BandChannel {
            filter: BiquadFilter::new(FilterSpec::for_band(band), sample_rate as f32),
            analyser: Arc::clone(analysers.get(band)),
            scratch: Vec::with_capacity(RENDER_QUANTUM),
        };
        Self {
            channels: [channel(Band::Bass), channel(Band::Mid), channel(Band::Treble)],
            generation: 0,
        }
    }

    /// Clears filter history. The analysers keep their smoothing state.
    fn reset(&mut self) {
        for channel in self.channels.iter_mut() {
            channel.filter.reset();
        }
    }

    pub fn process(&mut self, mono: &[f32]) {
        for channel in self.channels.iter_mut() {
            channel.filter.process_block(mono, &mut channel.scratch);
            channel.analyser.push_samples(&channel.scratch);
        }
    }

    pub fn specs(&self) -> [FilterSpec; 3] {
        [
            *self.channels[0].filter.spec(),
            *self.channels[1].filter.spec(),
            *self.channels[2].filter.spec(),
        ]
    }
}

/// The fixed source → filters → analysers fan-out.
///
/// Built once per audio session. New tracks are attached with [`AudioGraph::tap`],
/// which reuses the same filters and analysers.
pub struct AudioGraph {
    sample_rate: u32,
    bank: Arc<Mutex<FilterBank>>,
    analysers: BandAnalysers,
}

impl AudioGraph {
    pub fn new(sample_rate: u32, config: &AnalyserConfig) -> Result<Self> {
        if sample_rate == 0 {
            return Err(PlayerError::Config("sample rate must be positive".into()));
        }
        config.validate().map_err(PlayerError::Config)?;

        let analysers = BandAnalysers {
            bass: Arc::new(Analyser::new(config.clone())),
            mid: Arc::new(Analyser::new(config.clone())),
            treble: Arc::new(Analyser::new(config.clone())),
        };
        let bank = FilterBank::new(sample_rate, &analysers);

        info!(
            "Audio graph ready: {}Hz, fft size {}, filters {:?}",
            sample_rate,
            config.fft_size,
            bank.specs()
        );

        Ok(Self {
            sample_rate,
            bank: Arc::new(Mutex::new(bank)),
            analysers,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn analysers(&self) -> &BandAnalysers {
        &self.analysers
    }

    pub fn filter_specs(&self) -> [FilterSpec; 3] {
        lock_bank(&self.bank).specs()
    }

    /// Pushes mono samples straight into the filter bank.
    pub fn process(&self, mono: &[f32]) {
        lock_bank(&self.bank).process(mono);
    }

    /// Wraps `source` so that everything it yields is also analysed.
    ///
    /// The filters start from rest, and any previously tapped source stops
    /// feeding the bank even if the output has not dropped it yet.
    pub fn tap<S>(&self, source: S) -> TappedSource<S>
    where
        S: Source<Item = f32>,
    {
        let generation = {
            let mut bank = lock_bank(&self.bank);
            bank.reset();
            bank.generation += 1;
            bank.generation
        };
        debug!(
            "Tapping source {}: {} channels at {}Hz",
            generation,
            source.channels(),
            source.sample_rate()
        );
        TappedSource {
            generation,
            channels: source.channels().max(1),
            inner: source,
            bank: Arc::clone(&self.bank),
            frame_sum: 0.0,
            frame_fill: 0,
            pending: Vec::with_capacity(RENDER_QUANTUM),
            frames: Arc::new(AtomicU64::new(0)),
        }
    }
}

fn lock_bank(bank: &Mutex<FilterBank>) -> std::sync::MutexGuard<'_, FilterBank> {
    bank.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Pass-through source that mirrors its samples into the filter bank.
pub struct TappedSource<S> {
    inner: S,
    generation: u64,
    bank: Arc<Mutex<FilterBank>>,
    channels: u16,
    frame_sum: f32,
    frame_fill: u16,
    pending: Vec<f32>,
    frames: Arc<AtomicU64>,
}

impl<S> TappedSource<S> {
    /// Counter of frames handed to the output so far.
    pub fn frame_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.frames)
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let mut bank = lock_bank(&self.bank);
        if bank.generation == self.generation {
            bank.process(&self.pending);
        }
        drop(bank);
        self.pending.clear();
    }
}

impl<S> Iterator for TappedSource<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.frame_fill == 0 {
            self.channels = self.inner.channels().max(1);
        }
        let Some(sample) = self.inner.next() else {
            self.flush();
            return None;
        };

        self.frame_sum += sample;
        self.frame_fill += 1;
        if self.frame_fill == self.channels {
            self.pending.push(self.frame_sum / self.channels as f32);
            self.frame_sum = 0.0;
            self.frame_fill = 0;
            self.frames.fetch_add(1, Ordering::Relaxed);
            if self.pending.len() >= RENDER_QUANTUM {
                self.flush();
            }
        }
        Some(sample)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<S> Source for TappedSource<S>
where
    S: Source<Item = f32>,
{
    fn current_frame_len(&self) -> Option<usize> {
        self.inner.current_frame_len()
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::filter::{FilterKind, BASS_FILTER, MID_FILTER, TREBLE_FILTER};
    use rodio::buffer::SamplesBuffer;

    fn tone(freq: f32, frames: usize, channels: u16) -> Vec<f32> {
        (0..frames)
            .flat_map(|i| {
                let s = 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / 44100.0).sin();
                std::iter::repeat(s).take(channels as usize)
            })
            .collect()
    }

    fn peak(analyser: &Analyser) -> u8 {
        let mut bytes = vec![0u8; analyser.frequency_bin_count()];
        analyser.get_byte_frequency_data(&mut bytes);
        bytes.into_iter().max().unwrap_or(0)
    }

    #[test]
    fn graph_has_fixed_filter_table() {
        let graph = AudioGraph::new(44100, &AnalyserConfig::default()).unwrap();
        let specs = graph.filter_specs();
        assert_eq!(specs, [BASS_FILTER, MID_FILTER, TREBLE_FILTER]);
        assert_eq!(specs[0].kind, FilterKind::LowPass);
        assert_eq!(specs[1].kind, FilterKind::BandPass);
        assert_eq!(specs[2].kind, FilterKind::HighPass);
    }

    #[test]
    fn invalid_analyser_config_fails_construction() {
        let config = AnalyserConfig { fft_size: 100, ..Default::default() };
        assert!(matches!(AudioGraph::new(44100, &config), Err(PlayerError::Config(_))));
        assert!(AudioGraph::new(0, &AnalyserConfig::default()).is_err());
    }

    #[test]
    fn low_tone_drives_bass_not_treble() {
        let graph = AudioGraph::new(44100, &AnalyserConfig::default()).unwrap();
        graph.process(&tone(100.0, 8192, 1));
        let analysers = graph.analysers();
        assert!(peak(&analysers.bass) > 200);
        assert_eq!(peak(&analysers.treble), 0);
    }

    #[test]
    fn high_tone_drives_treble_not_bass() {
        let graph = AudioGraph::new(44100, &AnalyserConfig::default()).unwrap();
        graph.process(&tone(17000.0, 8192, 1));
        let analysers = graph.analysers();
        assert!(peak(&analysers.treble) > 200);
        assert!(peak(&analysers.bass) < 100);
    }

    #[test]
    fn tapped_source_passes_samples_through_and_feeds_analysers() {
        let graph = AudioGraph::new(44100, &AnalyserConfig::default()).unwrap();
        let samples = tone(100.0, 4096, 2);
        let tapped = graph.tap(SamplesBuffer::new(2, 44100, samples.clone()));
        let counter = tapped.frame_counter();

        let played: Vec<f32> = tapped.collect();
        assert_eq!(played, samples);
        assert_eq!(counter.load(Ordering::Relaxed), 4096);
        assert!(peak(&graph.analysers().bass) > 200);
    }

    #[test]
    fn tapping_resets_filter_history() {
        let graph = AudioGraph::new(44100, &AnalyserConfig::default()).unwrap();
        graph.process(&tone(100.0, 1024, 1));

        let _tapped = graph.tap(SamplesBuffer::new(1, 44100, vec![0.0f32; 16]));
        let mut fresh = BiquadFilter::new(BASS_FILTER, 44100.0);
        let mut bank = lock_bank(&graph.bank);
        assert_eq!(bank.channels[0].filter.process(0.3), fresh.process(0.3));
    }

    #[test]
    fn replaced_source_stops_feeding_analysers() {
        let graph = AudioGraph::new(44100, &AnalyserConfig::default()).unwrap();
        let mut stale = graph.tap(SamplesBuffer::new(1, 44100, tone(100.0, 4096, 1)));
        // Less than one quantum, so nothing has been flushed yet.
        for _ in 0..10 {
            stale.next();
        }

        let _current = graph.tap(SamplesBuffer::new(1, 44100, vec![0.0f32; 16]));
        let remaining: Vec<f32> = stale.collect();
        assert_eq!(remaining.len(), 4086);
        assert_eq!(peak(&graph.analysers().bass), 0);
    }

    #[test]
    fn new_source_reuses_analysers() {
        let graph = AudioGraph::new(44100, &AnalyserConfig::default()).unwrap();
        let before = graph.analysers().clone();

        let first: Vec<f32> = graph.tap(SamplesBuffer::new(1, 44100, tone(100.0, 1024, 1))).collect();
        let second: Vec<f32> = graph.tap(SamplesBuffer::new(1, 44100, tone(9000.0, 1024, 1))).collect();
        assert_eq!(first.len(), 1024);
        assert_eq!(second.len(), 1024);

        let after = graph.analysers();
        assert!(Arc::ptr_eq(&before.bass, &after.bass));
        assert!(Arc::ptr_eq(&before.mid, &after.mid));
        assert!(Arc::ptr_eq(&before.treble, &after.treble));
    }
}
