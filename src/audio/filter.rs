use std::f32::consts::PI;

use super::Band;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    LowPass,
    BandPass,
    HighPass,
}

/// Type and operating point of one band filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSpec {
    pub kind: FilterKind,
    pub frequency: f32,
    pub q: f32,
}

pub const BASS_FILTER: FilterSpec = FilterSpec {
    kind: FilterKind::LowPass,
    frequency: 250.0,
    q: 0.5,
};

pub const MID_FILTER: FilterSpec = FilterSpec {
    kind: FilterKind::BandPass,
    frequency: 4000.0,
    q: 1.0,
};

pub const TREBLE_FILTER: FilterSpec = FilterSpec {
    kind: FilterKind::HighPass,
    frequency: 14000.0,
    q: 0.5,
};

impl FilterSpec {
    pub fn for_band(band: Band) -> Self {
        match band {
            Band::Bass => BASS_FILTER,
            Band::Mid => MID_FILTER,
            Band::Treble => TREBLE_FILTER,
        }
    }
}

/// Normalized biquad coefficients (a0 folded in).
#[derive(Debug, Clone, Copy, PartialEq)]
struct Coefficients {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Coefficients {
    const PASS: Self = Self { b0: 1.0, b1: 0.0, b2: 0.0, a1: 0.0, a2: 0.0 };
    const SILENCE: Self = Self { b0: 0.0, b1: 0.0, b2: 0.0, a1: 0.0, a2: 0.0 };

    fn normalized(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Web Audio biquad formulas. Low/high-pass read Q in dB, band-pass reads it linearly.
    fn compute(spec: &FilterSpec, sample_rate: f32) -> Self {
        let nyquist = sample_rate / 2.0;
        let f = spec.frequency.clamp(0.0, nyquist) / nyquist;

        match spec.kind {
            FilterKind::LowPass => {
                if f >= 1.0 {
                    return Self::PASS;
                }
                if f <= 0.0 {
                    return Self::SILENCE;
                }
                let w0 = PI * f;
                let alpha = w0.sin() / (2.0 * 10f32.powf(spec.q / 20.0));
                let cos_w0 = w0.cos();
                Self::normalized(
                    (1.0 - cos_w0) / 2.0,
                    1.0 - cos_w0,
                    (1.0 - cos_w0) / 2.0,
                    1.0 + alpha,
                    -2.0 * cos_w0,
                    1.0 - alpha,
                )
            }
            FilterKind::HighPass => {
                if f >= 1.0 {
                    return Self::SILENCE;
                }
                if f <= 0.0 {
                    return Self::PASS;
                }
                let w0 = PI * f;
                let alpha = w0.sin() / (2.0 * 10f32.powf(spec.q / 20.0));
                let cos_w0 = w0.cos();
                Self::normalized(
                    (1.0 + cos_w0) / 2.0,
                    -(1.0 + cos_w0),
                    (1.0 + cos_w0) / 2.0,
                    1.0 + alpha,
                    -2.0 * cos_w0,
                    1.0 - alpha,
                )
            }
            FilterKind::BandPass => {
                if f <= 0.0 || f >= 1.0 {
                    return Self::SILENCE;
                }
                if spec.q <= 0.0 {
                    return Self::PASS;
                }
                let w0 = PI * f;
                let alpha = w0.sin() / (2.0 * spec.q);
                let cos_w0 = w0.cos();
                Self::normalized(alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
        }
    }
}

/// Direct form I biquad.
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    spec: FilterSpec,
    coeffs: Coefficients,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl BiquadFilter {
    pub fn new(spec: FilterSpec, sample_rate: f32) -> Self {
        Self {
            spec,
            coeffs: Coefficients::compute(&spec, sample_rate),
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let c = &self.coeffs;
        let y = c.b0 * x + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        // Flush denormals so a silent tail does not stall the audio thread.
        self.y1 = if y.abs() < 1e-30 { 0.0 } else { y };
        y
    }

    pub fn process_block(&mut self, input: &[f32], output: &mut Vec<f32>) {
        output.clear();
        output.extend(input.iter().map(|&x| self.process(x)));
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}
