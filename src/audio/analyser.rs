use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyserConfig {
    pub fft_size: usize,
    pub smoothing_time_constant: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

impl AnalyserConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.fft_size.is_power_of_two() || !(32..=32768).contains(&self.fft_size) {
            return Err(format!(
                "fft_size must be a power of two between 32 and 32768, got {}",
                self.fft_size
            ));
        }
        if !(0.0..=1.0).contains(&self.smoothing_time_constant) {
            return Err(format!(
                "smoothing_time_constant must be within [0, 1], got {}",
                self.smoothing_time_constant
            ));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(format!(
                "min_decibels ({}) must be below max_decibels ({})",
                self.min_decibels, self.max_decibels
            ));
        }
        Ok(())
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }
}

struct AnalyserState {
    time_domain: VecDeque<f32>,
    window: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    decibels: Vec<f32>,
    bytes: Vec<u8>,
    /// Set when samples arrived after the last spectrum was computed.
    dirty: bool,
}

/// Frequency-domain tap fed by one band filter.
///
/// Writers push filtered samples from the audio thread; readers take snapshots of
/// the magnitude spectrum. The spectrum is recomputed only when new audio arrived
/// since the previous read, so repeated reads within one frame agree.
pub struct Analyser {
    config: AnalyserConfig,
    fft: Arc<dyn Fft<f32>>,
    state: Mutex<AnalyserState>,
}

impl Analyser {
    pub fn new(config: AnalyserConfig) -> Self {
        let fft_size = config.fft_size;
        let bins = config.frequency_bin_count();
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        let state = AnalyserState {
            time_domain: std::iter::repeat(0.0).take(fft_size).collect(),
            window: Self::blackman_window(fft_size),
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
            smoothed: vec![0.0; bins],
            decibels: vec![f32::NEG_INFINITY; bins],
            bytes: vec![0; bins],
            dirty: false,
        };

        Self {
            config,
            fft,
            state: Mutex::new(state),
        }
    }

    fn blackman_window(size: usize) -> Vec<f32> {
        let (a0, a1, a2) = (0.42, 0.5, 0.08);
        (0..size)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
                a0 - a1 * phase.cos() + a2 * (2.0 * phase).cos()
            })
            .collect()
    }

    pub fn fft_size(&self) -> usize {
        self.config.fft_size
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.config.frequency_bin_count()
    }

    pub fn config(&self) -> &AnalyserConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, AnalyserState> {
        // A panicking writer leaves plain sample data behind, which is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push_samples(&self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }
        let fft_size = self.config.fft_size;
        let mut state = self.lock();
        let incoming = if samples.len() > fft_size {
            &samples[samples.len() - fft_size..]
        } else {
            samples
        };
        state.time_domain.drain(..incoming.len());
        state.time_domain.extend(incoming.iter().copied());
        state.dirty = true;
    }

    /// Recomputes the spectrum if new audio arrived and returns the locked state.
    ///
    /// The FFT itself runs without the lock held so writers on the audio thread
    /// only ever wait for a copy.
    fn refresh(&self) -> MutexGuard<'_, AnalyserState> {
        let n = self.config.fft_size;
        let mut scratch = {
            let mut state = self.lock();
            if !state.dirty {
                return state;
            }
            state.dirty = false;
            let mut scratch = std::mem::take(&mut state.scratch);
            scratch.resize(n, Complex::new(0.0, 0.0));
            for ((slot, &sample), &w) in scratch.iter_mut().zip(state.time_domain.iter()).zip(state.window.iter()) {
                *slot = Complex::new(sample * w, 0.0);
            }
            scratch
        };

        self.fft.process(&mut scratch);

        let tau = self.config.smoothing_time_constant;
        let min_db = self.config.min_decibels;
        let range_scale = 255.0 / (self.config.max_decibels - min_db);

        let mut state = self.lock();
        let AnalyserState {
            smoothed,
            decibels,
            bytes,
            ..
        } = &mut *state;
        for k in 0..smoothed.len() {
            let magnitude = scratch[k].norm() / n as f32;
            let mut value = tau * smoothed[k] + (1.0 - tau) * magnitude;
            if !value.is_finite() {
                value = 0.0;
            }
            smoothed[k] = value;
            decibels[k] = 20.0 * value.log10();
            bytes[k] = (range_scale * (decibels[k] - min_db)).floor().clamp(0.0, 255.0) as u8;
        }
        state.scratch = scratch;
        state
    }

    /// Copies the current byte magnitude spectrum into `out`, one value per bin.
    pub fn get_byte_frequency_data(&self, out: &mut [u8]) {
        let state = self.refresh();
        let len = out.len().min(state.bytes.len());
        out[..len].copy_from_slice(&state.bytes[..len]);
    }

    pub fn get_float_frequency_data(&self, out: &mut [f32]) {
        let state = self.refresh();
        let len = out.len().min(state.decibels.len());
        out[..len].copy_from_slice(&state.decibels[..len]);
    }

    /// Current waveform mapped to bytes, 128 being silence.
    pub fn get_byte_time_domain_data(&self, out: &mut [u8]) {
        let state = self.lock();
        for (slot, &sample) in out.iter_mut().zip(state.time_domain.iter()) {
            *slot = (128.0 * (1.0 + sample)).floor().clamp(0.0, 255.0) as u8;
        }
    }
}

impl std::fmt::Debug for Analyser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyser").field("config", &self.config).finish()
    }
}
