use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait};
use log::{info, warn};
use rodio::source::UniformSourceIterator;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

use super::{AudioGraph, BandAnalysers, BandReducer, FrequencyConfig, FrequencySample, ModulationTriple};
use crate::config::AppConfig;
use crate::error::{PlayerError, Result};
use crate::events::{EventBus, PlayerEvent};
use crate::library::Track;

pub type BoxedSource = Box<dyn Source<Item = f32> + Send>;

/// Where tapped audio ends up.
pub trait OutputDevice {
    /// Replaces whatever is currently queued with `source`.
    fn start(&mut self, source: BoxedSource, volume: f32, paused: bool) -> Result<()>;

    fn play(&mut self);

    fn pause(&mut self);

    fn set_volume(&mut self, volume: f32);

    /// True once the current source is used up, or when nothing was started.
    fn is_drained(&self) -> bool;
}

/// Speaker output through rodio, one sink per loaded source.
pub struct RodioOutput {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sink: Option<Sink>,
}

impl RodioOutput {
    pub fn open_default() -> Result<Self> {
        let (stream, handle) = OutputStream::try_default()?;
        info!("Opened default audio output");
        Ok(Self {
            _stream: stream,
            handle,
            sink: None,
        })
    }

    /// Opens the named output device, or the default one when `name` is `None`.
    pub fn open(name: Option<&str>) -> Result<Self> {
        let Some(name) = name else {
            return Self::open_default();
        };

        let host = cpal::default_host();
        let device = host
            .output_devices()
            .map_err(|e| PlayerError::DeviceNotFound(format!("{}: {}", name, e)))?
            .find(|device| device.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| PlayerError::DeviceNotFound(name.to_string()))?;

        let (stream, handle) = OutputStream::try_from_device(&device)?;
        info!("Opened audio output: {}", name);
        Ok(Self {
            _stream: stream,
            handle,
            sink: None,
        })
    }

    pub fn device_names() -> Vec<String> {
        let host = cpal::default_host();
        match host.output_devices() {
            Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
            Err(e) => {
                warn!("Failed to enumerate output devices: {}", e);
                Vec::new()
            }
        }
    }
}

impl OutputDevice for RodioOutput {
    fn start(&mut self, source: BoxedSource, volume: f32, paused: bool) -> Result<()> {
        if let Some(old) = self.sink.take() {
            old.stop();
        }
        let sink = Sink::try_new(&self.handle)?;
        sink.set_volume(volume);
        if paused {
            sink.pause();
        }
        sink.append(source);
        self.sink = Some(sink);
        Ok(())
    }

    fn play(&mut self) {
        if let Some(sink) = &self.sink {
            sink.play();
        }
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
    }

    fn set_volume(&mut self, volume: f32) {
        if let Some(sink) = &self.sink {
            sink.set_volume(volume);
        }
    }

    fn is_drained(&self) -> bool {
        self.sink.as_ref().map_or(true, |sink| sink.empty())
    }
}

/// Output without a device: the host pulls audio explicitly, frame by frame.
#[derive(Default)]
pub struct OfflineOutput {
    source: Option<BoxedSource>,
    paused: bool,
    volume: f32,
}

impl OfflineOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes up to `frames` frames and returns how many were available.
    pub fn pull(&mut self, frames: usize) -> usize {
        if self.paused {
            return 0;
        }
        let Some(source) = self.source.as_mut() else {
            return 0;
        };

        let channels = source.channels().max(1) as usize;
        let mut samples = 0;
        let mut exhausted = false;
        while samples < frames * channels {
            if source.next().is_none() {
                exhausted = true;
                break;
            }
            samples += 1;
        }
        if exhausted {
            self.source = None;
        }
        samples / channels
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }
}

impl OutputDevice for OfflineOutput {
    fn start(&mut self, source: BoxedSource, volume: f32, paused: bool) -> Result<()> {
        self.source = Some(source);
        self.volume = volume;
        self.paused = paused;
        Ok(())
    }

    fn play(&mut self) {
        self.paused = false;
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    fn is_drained(&self) -> bool {
        self.source.is_none()
    }
}

/// The player service: one analysis graph for the whole session, one track at a time.
///
/// Owned by the composition root and passed to whatever needs playback control or
/// band energies.
pub struct Player<O: OutputDevice> {
    output: O,
    graph: AudioGraph,
    reducer: BandReducer,
    sample: FrequencySample,
    events: EventBus,
    track: Option<Track>,
    playing: bool,
    volume: f32,
    looping: bool,
    duration: Option<Duration>,
    frames: Arc<AtomicU64>,
    offset: Duration,
    /// One frame of zeros, fed to the graph whenever no audio is flowing.
    silence: Vec<f32>,
}

impl Player<RodioOutput> {
    /// Fails when no output engine is available.
    pub fn open(config: &AppConfig) -> Result<Self> {
        let output = RodioOutput::open(config.output_device.as_deref())?;
        Self::new(output, config)
    }
}

impl<O: OutputDevice> Player<O> {
    pub fn new(output: O, config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let graph = AudioGraph::new(config.sample_rate, &config.analyser)?;

        Ok(Self {
            output,
            graph,
            reducer: BandReducer::new(config.frequency.clone()),
            sample: FrequencySample::default(),
            events: EventBus::new(),
            track: None,
            playing: false,
            volume: config.volume,
            looping: config.looping,
            duration: None,
            frames: Arc::new(AtomicU64::new(0)),
            offset: Duration::ZERO,
            silence: vec![0.0; config.frames_per_tick()],
        })
    }

    fn open_source(&self, path: &Path, start: Duration) -> Result<(BoxedSource, Arc<AtomicU64>, Option<Duration>)> {
        let file = File::open(path).map_err(|source| PlayerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let decoder = Decoder::new(BufReader::new(file)).map_err(|source| PlayerError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        let duration = decoder.total_duration();

        let uniform: UniformSourceIterator<_, f32> =
            UniformSourceIterator::new(decoder, 2, self.graph.sample_rate());
        let tapped = self.graph.tap(uniform.skip_duration(start));
        let counter = tapped.frame_counter();
        Ok((Box::new(tapped), counter, duration))
    }

    fn restart_at(&mut self, position: Duration, paused: bool) -> Result<()> {
        let path = self.track.as_ref().ok_or(PlayerError::NoTrack)?.audio.clone();
        let (source, frames, _) = self.open_source(&path, position)?;
        self.output.start(source, self.volume, paused)?;
        self.frames = frames;
        self.offset = position;
        Ok(())
    }

    fn set_playing(&mut self, playing: bool) {
        if self.playing != playing {
            self.playing = playing;
            self.events.emit(&PlayerEvent::PlayStateChanged(playing));
        }
    }

    /// Swaps in `track` and starts playing it. The analysis graph is kept.
    pub fn load(&mut self, track: Track) -> Result<()> {
        let (source, frames, duration) = self.open_source(&track.audio, Duration::ZERO)?;
        self.output.start(source, self.volume, false)?;
        self.frames = frames;
        self.offset = Duration::ZERO;
        self.duration = duration.or(track.duration);

        info!("Now playing: {} ({:?})", track.name, track.audio);
        self.track = Some(track.clone());
        self.events.emit(&PlayerEvent::TrackChanged(track));
        self.set_playing(true);
        Ok(())
    }

    /// Loads an arbitrary file, reading its tags when possible.
    pub fn load_path<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let track = Track::from_path(path).unwrap_or_else(|e| {
            warn!("Playing {:?} without tags: {}", path, e);
            Track::new(path)
        });
        self.load(track)
    }

    pub fn play(&mut self) -> Result<()> {
        if self.track.is_none() {
            return Err(PlayerError::NoTrack);
        }
        if self.output.is_drained() {
            self.restart_at(Duration::ZERO, false)?;
        }
        self.output.play();
        self.set_playing(true);
        Ok(())
    }

    pub fn pause(&mut self) {
        self.output.pause();
        self.set_playing(false);
    }

    /// Returns the new playing state.
    pub fn toggle(&mut self) -> Result<bool> {
        if self.playing {
            self.pause();
        } else {
            self.play()?;
        }
        Ok(self.playing)
    }

    pub fn set_volume(&mut self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        self.volume = volume;
        self.output.set_volume(volume);
        self.events.emit(&PlayerEvent::VolumeChanged(volume));
    }

    pub fn mute(&mut self) {
        self.set_volume(0.0);
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Jumps to `position`, keeping the current play state.
    pub fn seek(&mut self, position: Duration) -> Result<()> {
        let position = match self.duration {
            Some(duration) => position.min(duration),
            None => position,
        };
        let paused = !self.playing;
        self.restart_at(position, paused)
    }

    /// Per-frame housekeeping: handles the end of the current track.
    pub fn update(&mut self) -> Result<()> {
        if !self.playing || self.track.is_none() || !self.output.is_drained() {
            return Ok(());
        }
        if self.looping {
            info!("Looping track");
            self.restart_at(Duration::ZERO, false)?;
        } else {
            self.events.emit(&PlayerEvent::Ended);
            self.set_playing(false);
        }
        Ok(())
    }

    /// Samples the three analysers and reduces them into band energies.
    ///
    /// While paused or after the track ran out the graph is fed silence, so the
    /// energies decay to zero instead of holding their last value.
    pub fn modulation(&mut self) -> ModulationTriple {
        if !self.playing || self.output.is_drained() {
            self.graph.process(&self.silence);
        }
        self.sample.refresh(self.graph.analysers());
        self.reducer.reduce(&self.sample)
    }

    /// The spectra captured by the last [`Player::modulation`] call.
    pub fn last_sample(&self) -> &FrequencySample {
        &self.sample
    }

    pub fn position(&self) -> Duration {
        let frames = self.frames.load(Ordering::Relaxed);
        self.offset + Duration::from_secs_f64(frames as f64 / self.graph.sample_rate() as f64)
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.track.as_ref()
    }

    pub fn analysers(&self) -> &BandAnalysers {
        self.graph.analysers()
    }

    pub fn graph(&self) -> &AudioGraph {
        &self.graph
    }

    pub fn frequency_config(&self) -> &FrequencyConfig {
        self.reducer.config()
    }

    pub fn set_frequency_config(&mut self, config: FrequencyConfig) {
        self.reducer.set_config(config);
    }

    pub fn events(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::tests::write_tone_wav;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn fixture(dir: &TempDir, name: &str, freq: f32, seconds: f32) -> PathBuf {
        let path = dir.path().join(name);
        write_tone_wav(&path, freq, seconds, 44100);
        path
    }

    fn offline_player() -> Player<OfflineOutput> {
        Player::new(OfflineOutput::new(), &AppConfig::default()).unwrap()
    }

    #[test]
    fn load_starts_playback_and_announces_track() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(&dir, "low.wav", 100.0, 0.5);
        let mut player = offline_player();
        let events = player.events().channel();

        player.load_path(&path).unwrap();

        assert!(player.is_playing());
        assert_eq!(player.current_track().unwrap().name, "low");
        let received: Vec<_> = events.try_iter().collect();
        assert!(matches!(received[0], PlayerEvent::TrackChanged(ref t) if t.name == "low"));
        assert_eq!(received[1], PlayerEvent::PlayStateChanged(true));
    }

    #[test]
    fn pulled_audio_drives_band_energies() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(&dir, "low.wav", 100.0, 1.0);
        let mut player = offline_player();
        player.load_path(&path).unwrap();

        for _ in 0..10 {
            player.output_mut().pull(735);
        }
        let triple = player.modulation();
        assert!(triple.bass > triple.treble);
        assert!(triple.bass > 0.0);
        assert!((player.position().as_secs_f32() - 7350.0 / 44100.0).abs() < 1e-3);
    }

    #[test]
    fn swapping_tracks_keeps_the_analysers() {
        let dir = tempfile::tempdir().unwrap();
        let first = fixture(&dir, "first.wav", 100.0, 0.2);
        let second = fixture(&dir, "second.wav", 8000.0, 0.2);
        let mut player = offline_player();

        player.load_path(&first).unwrap();
        let before = player.analysers().clone();
        player.output_mut().pull(2048);
        player.load_path(&second).unwrap();
        player.output_mut().pull(2048);

        let after = player.analysers();
        assert!(Arc::ptr_eq(&before.bass, &after.bass));
        assert!(Arc::ptr_eq(&before.mid, &after.mid));
        assert!(Arc::ptr_eq(&before.treble, &after.treble));
        assert_eq!(player.current_track().unwrap().name, "second");
    }

    #[test]
    fn end_of_track_emits_ended_without_loop() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(&dir, "short.wav", 440.0, 0.05);
        let mut player = offline_player();
        player.load_path(&path).unwrap();
        let events = player.events().channel();

        while player.output_mut().pull(735) > 0 {}
        player.output_mut().pull(735);
        player.update().unwrap();

        assert!(!player.is_playing());
        let received: Vec<_> = events.try_iter().collect();
        assert_eq!(received, vec![PlayerEvent::Ended, PlayerEvent::PlayStateChanged(false)]);
    }

    #[test]
    fn end_of_track_restarts_when_looping() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(&dir, "short.wav", 440.0, 0.05);
        let mut player = offline_player();
        player.set_looping(true);
        player.load_path(&path).unwrap();

        while player.output_mut().pull(735) > 0 {}
        player.output_mut().pull(735);
        player.update().unwrap();

        assert!(player.is_playing());
        assert_eq!(player.position(), Duration::ZERO);
        assert!(player.output_mut().pull(100) > 0);
    }

    #[test]
    fn paused_player_does_not_advance() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(&dir, "tone.wav", 440.0, 0.5);
        let mut player = offline_player();
        player.load_path(&path).unwrap();

        assert!(!player.toggle().unwrap());
        assert_eq!(player.output_mut().pull(735), 0);
        assert_eq!(player.position(), Duration::ZERO);
        assert!(player.toggle().unwrap());
        assert_eq!(player.output_mut().pull(735), 735);
    }

    #[test]
    fn seek_moves_position_and_keeps_pause() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(&dir, "tone.wav", 440.0, 1.0);
        let mut player = offline_player();
        player.load_path(&path).unwrap();
        player.pause();

        player.seek(Duration::from_millis(500)).unwrap();
        assert!(!player.is_playing());
        assert_eq!(player.position(), Duration::from_millis(500));

        player.play().unwrap();
        player.output_mut().pull(4410);
        assert!((player.position().as_secs_f32() - 0.6).abs() < 1e-3);
    }

    #[test]
    fn energies_settle_to_zero_after_pause() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(&dir, "low.wav", 100.0, 1.0);
        let mut player = offline_player();
        player.load_path(&path).unwrap();

        for _ in 0..10 {
            player.output_mut().pull(735);
            player.modulation();
        }
        assert!(player.modulation().bass > 0.0);

        player.pause();
        let mut triple = player.modulation();
        for _ in 0..300 {
            triple = player.modulation();
        }
        assert_eq!(triple, ModulationTriple::default());
    }

    #[test]
    fn energies_settle_to_zero_after_track_ends() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(&dir, "short.wav", 100.0, 0.2);
        let mut player = offline_player();
        player.load_path(&path).unwrap();

        player.output_mut().pull(4096);
        assert!(player.modulation().bass > 0.0);
        while player.output_mut().pull(735) > 0 {}
        player.update().unwrap();

        let mut triple = player.modulation();
        for _ in 0..300 {
            triple = player.modulation();
        }
        assert_eq!(triple, ModulationTriple::default());
    }

    #[test]
    fn volume_is_clamped_and_announced() {
        let mut player = offline_player();
        let events = player.events().channel();
        player.set_volume(3.0);
        assert_eq!(player.volume(), 1.0);
        player.mute();
        assert_eq!(player.output().volume(), 0.0);
        let received: Vec<_> = events.try_iter().collect();
        assert_eq!(received, vec![PlayerEvent::VolumeChanged(1.0), PlayerEvent::VolumeChanged(0.0)]);
    }

    #[test]
    fn play_without_track_is_an_error() {
        let mut player = offline_player();
        assert!(matches!(player.play(), Err(PlayerError::NoTrack)));
        assert!(matches!(player.seek(Duration::ZERO), Err(PlayerError::NoTrack)));
    }

    #[test]
    fn undecodable_file_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.mp3");
        std::fs::write(&path, b"this is not audio").unwrap();
        let mut player = offline_player();

        assert!(matches!(player.load_path(&path), Err(PlayerError::Decode { .. })));
        assert!(matches!(
            player.load(Track::new(dir.path().join("missing.wav"))),
            Err(PlayerError::Io { .. })
        ));
        assert!(!player.is_playing());
    }

    #[test]
    fn silence_before_any_track_reduces_to_zero() {
        let mut player = offline_player();
        assert_eq!(player.modulation(), ModulationTriple::default());
        assert_eq!(player.last_sample().bass.len(), 1024);
    }
}
