//! Biquad coefficient synthesis and the stateful biquad stage.
//!
//! Coefficient sets are immutable once they have been designed. Stages and the frequency response
//! evaluator share them through an [`Arc`], and a stage is retargeted by swapping in a different
//! `Arc` rather than by changing the coefficients in place.

use std::f64::consts;
use std::sync::Arc;

use crate::eq_params::{
    MAX_FREQUENCY_HZ, MAX_GAIN_DB, MAX_Q, MIN_FREQUENCY_HZ, MIN_GAIN_DB, MIN_Q, PASS_FILTER_Q,
};

/// Cutoff and center frequencies are kept below this fraction of the sample rate. At low sample
/// rates the upper end of the frequency range would otherwise land on or above the Nyquist
/// frequency.
const NYQUIST_FRACTION: f64 = 0.49;

/// The coefficients `[b0, b1, b2, a1, a2]` for a [`Biquad`]. These coefficients are all
/// prenormalized, i.e. they have been divided by `a0`. First order filters leave `b2` and `a2` at
/// zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoefficientSet {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

/// The filter kinds the equalizer can design, along with their design parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterKind {
    /// A peaking (bell) filter boosting or cutting `gain_db` around `frequency`.
    Peaking { frequency: f32, q: f32, gain_db: f32 },
    /// A Butterworth high-pass. `first_order` selects a 6 dB/octave filter instead of a 12
    /// dB/octave one.
    HighPass { frequency: f32, first_order: bool },
    /// A Butterworth low-pass. See [`FilterKind::HighPass`].
    LowPass { frequency: f32, first_order: bool },
}

impl FilterKind {
    /// Design a new coefficient set for this filter at `sample_rate`.
    pub fn design(self, sample_rate: f32) -> Arc<CoefficientSet> {
        Arc::new(CoefficientSet::design(sample_rate, self))
    }
}

/// Design a peaking filter. See [`CoefficientSet::design()`] for how out of range values are
/// handled.
pub fn make_peaking(sample_rate: f32, frequency: f32, q: f32, gain_db: f32) -> Arc<CoefficientSet> {
    FilterKind::Peaking {
        frequency,
        q,
        gain_db,
    }
    .design(sample_rate)
}

/// Design a high-pass filter. See [`CoefficientSet::design()`] for how out of range values are
/// handled.
pub fn make_high_pass(sample_rate: f32, frequency: f32, first_order: bool) -> Arc<CoefficientSet> {
    FilterKind::HighPass {
        frequency,
        first_order,
    }
    .design(sample_rate)
}

/// Design a low-pass filter. See [`CoefficientSet::design()`] for how out of range values are
/// handled.
pub fn make_low_pass(sample_rate: f32, frequency: f32, first_order: bool) -> Arc<CoefficientSet> {
    FilterKind::LowPass {
        frequency,
        first_order,
    }
    .design(sample_rate)
}

impl Default for CoefficientSet {
    fn default() -> Self {
        Self::identity()
    }
}

impl CoefficientSet {
    /// Filter coefficients that would cause the sound to be passed through as is.
    pub const fn identity() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    /// Design the coefficients for `kind`. The inputs are never rejected. NaN inputs fall back to
    /// the lowest frequency, the lowest Q and 0 dB of gain, after which everything is clamped to
    /// the parameter bounds and the frequency is kept below Nyquist. An invalid sample rate results
    /// in an identity filter.
    ///
    /// Based on <http://shepazu.github.io/Audio-EQ-Cookbook/audio-eq-cookbook.html>.
    pub fn design(sample_rate: f32, kind: FilterKind) -> Self {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            peq_debug_assert_failure!("Invalid sample rate {}", sample_rate);
            return Self::identity();
        }

        let sample_rate = sample_rate as f64;
        match kind {
            FilterKind::Peaking {
                frequency,
                q,
                gain_db,
            } => Self::peaking(
                sample_rate,
                sanitize_frequency(sample_rate, frequency),
                sanitize(q, MIN_Q, MIN_Q, MAX_Q),
                sanitize(gain_db, 0.0, MIN_GAIN_DB, MAX_GAIN_DB),
            ),
            FilterKind::HighPass {
                frequency,
                first_order: true,
            } => Self::first_order_highpass(sample_rate, sanitize_frequency(sample_rate, frequency)),
            FilterKind::HighPass {
                frequency,
                first_order: false,
            } => Self::highpass(sample_rate, sanitize_frequency(sample_rate, frequency)),
            FilterKind::LowPass {
                frequency,
                first_order: true,
            } => Self::first_order_lowpass(sample_rate, sanitize_frequency(sample_rate, frequency)),
            FilterKind::LowPass {
                frequency,
                first_order: false,
            } => Self::lowpass(sample_rate, sanitize_frequency(sample_rate, frequency)),
        }
    }

    fn peaking(sample_rate: f64, frequency: f64, q: f64, gain_db: f64) -> Self {
        let a = 10.0f64.powf(gain_db / 40.0);
        let omega0 = consts::TAU * (frequency / sample_rate);
        let cos_omega0 = omega0.cos();
        let alpha = omega0.sin() / (2.0 * q);

        // We'll prenormalize everything with a0
        let a0 = 1.0 + alpha / a;
        let b0 = (1.0 + alpha * a) / a0;
        let b1 = (-2.0 * cos_omega0) / a0;
        let b2 = (1.0 - alpha * a) / a0;
        let a1 = (-2.0 * cos_omega0) / a0;
        let a2 = (1.0 - alpha / a) / a0;

        Self { b0, b1, b2, a1, a2 }
    }

    fn lowpass(sample_rate: f64, frequency: f64) -> Self {
        let omega0 = consts::TAU * (frequency / sample_rate);
        let cos_omega0 = omega0.cos();
        let alpha = omega0.sin() / (2.0 * PASS_FILTER_Q as f64);

        let a0 = 1.0 + alpha;
        let b0 = ((1.0 - cos_omega0) / 2.0) / a0;
        let b1 = (1.0 - cos_omega0) / a0;
        let b2 = ((1.0 - cos_omega0) / 2.0) / a0;
        let a1 = (-2.0 * cos_omega0) / a0;
        let a2 = (1.0 - alpha) / a0;

        Self { b0, b1, b2, a1, a2 }
    }

    fn highpass(sample_rate: f64, frequency: f64) -> Self {
        let omega0 = consts::TAU * (frequency / sample_rate);
        let cos_omega0 = omega0.cos();
        let alpha = omega0.sin() / (2.0 * PASS_FILTER_Q as f64);

        let a0 = 1.0 + alpha;
        let b0 = ((1.0 + cos_omega0) / 2.0) / a0;
        let b1 = -(1.0 + cos_omega0) / a0;
        let b2 = ((1.0 + cos_omega0) / 2.0) / a0;
        let a1 = (-2.0 * cos_omega0) / a0;
        let a2 = (1.0 - alpha) / a0;

        Self { b0, b1, b2, a1, a2 }
    }

    /// A bilinear transform of the analog one pole low-pass, prewarped at the cutoff.
    fn first_order_lowpass(sample_rate: f64, frequency: f64) -> Self {
        let n = (consts::PI * frequency / sample_rate).tan();
        let b0 = n / (n + 1.0);

        Self {
            b0,
            b1: b0,
            b2: 0.0,
            a1: (n - 1.0) / (n + 1.0),
            a2: 0.0,
        }
    }

    /// The high-pass counterpart to [`first_order_lowpass()`][Self::first_order_lowpass()].
    fn first_order_highpass(sample_rate: f64, frequency: f64) -> Self {
        let n = (consts::PI * frequency / sample_rate).tan();
        let b0 = 1.0 / (n + 1.0);

        Self {
            b0,
            b1: -b0,
            b2: 0.0,
            a1: (n - 1.0) / (n + 1.0),
            a2: 0.0,
        }
    }

    /// The linear magnitude response `|H(e^jw)|` of these coefficients at `frequency` for a filter
    /// running at `sample_rate`.
    pub fn magnitude_at(&self, frequency: f64, sample_rate: f64) -> f64 {
        let omega = consts::TAU * (frequency / sample_rate);
        let (sin_1, cos_1) = omega.sin_cos();
        let (sin_2, cos_2) = (2.0 * omega).sin_cos();

        // H(z) = (b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2) with z^-k = cos(kw) - j sin(kw)
        let num_re = self.b0 + self.b1 * cos_1 + self.b2 * cos_2;
        let num_im = -(self.b1 * sin_1 + self.b2 * sin_2);
        let den_re = 1.0 + self.a1 * cos_1 + self.a2 * cos_2;
        let den_im = -(self.a1 * sin_1 + self.a2 * sin_2);

        let num = num_re * num_re + num_im * num_im;
        let den = den_re * den_re + den_im * den_im;

        (num / den.max(f64::MIN_POSITIVE)).sqrt()
    }

    /// Whether both poles lie strictly inside the unit circle.
    pub fn is_stable(&self) -> bool {
        self.a2.abs() < 1.0 && self.a1.abs() < 1.0 + self.a2
    }

    /// The raw `[b0, b1, b2, a1, a2]` coefficients.
    pub fn as_array(&self) -> [f64; 5] {
        [self.b0, self.b1, self.b2, self.a1, self.a2]
    }
}

/// Replace NaN with `fallback` and clamp the result to `[min, max]`.
fn sanitize(value: f32, fallback: f32, min: f32, max: f32) -> f64 {
    let value = if value.is_nan() { fallback } else { value };
    value.clamp(min, max) as f64
}

fn sanitize_frequency(sample_rate: f64, frequency: f32) -> f64 {
    sanitize(frequency, MIN_FREQUENCY_HZ, MIN_FREQUENCY_HZ, MAX_FREQUENCY_HZ)
        .min(sample_rate * NYQUIST_FRACTION)
}

/// A single biquad stage with its own delay state. Transposed direct form II.
///
/// Based on <https://en.wikipedia.org/wiki/Digital_biquad_filter#Transposed_direct_forms>.
///
/// A stage without coefficients passes audio through untouched. Changing the coefficients does not
/// reset the delay state, so a retargeted filter picks up where it left off.
#[derive(Debug, Clone, Default)]
pub struct Biquad {
    coefficients: Option<Arc<CoefficientSet>>,
    s1: f64,
    s2: f64,
}

impl Biquad {
    /// The coefficients this stage currently uses, if any.
    pub fn coefficients(&self) -> Option<&Arc<CoefficientSet>> {
        self.coefficients.as_ref()
    }

    /// Point this stage at a different coefficient set, or at `None` to bypass it. Returns the
    /// previous coefficients so the caller decides where they get dropped.
    pub fn set_coefficients(
        &mut self,
        coefficients: Option<Arc<CoefficientSet>>,
    ) -> Option<Arc<CoefficientSet>> {
        std::mem::replace(&mut self.coefficients, coefficients)
    }

    /// Process a single sample.
    #[cfg(test)]
    fn process(&mut self, sample: f32) -> f32 {
        match &self.coefficients {
            Some(coefficients) => {
                let sample = sample as f64;
                let result = coefficients.b0 * sample + self.s1;

                self.s1 = coefficients.b1 * sample - coefficients.a1 * result + self.s2;
                self.s2 = coefficients.b2 * sample - coefficients.a2 * result;

                result as f32
            }
            None => sample,
        }
    }

    /// Process a block of samples in place.
    pub fn process_block(&mut self, samples: &mut [f32]) {
        let coefficients = match &self.coefficients {
            Some(coefficients) => coefficients,
            None => return,
        };

        let CoefficientSet { b0, b1, b2, a1, a2 } = **coefficients;
        let (mut s1, mut s2) = (self.s1, self.s2);
        for sample in samples.iter_mut() {
            let input = *sample as f64;
            let result = b0 * input + s1;

            s1 = b1 * input - a1 * result + s2;
            s2 = b2 * input - a2 * result;

            *sample = result as f32;
        }

        self.s1 = s1;
        self.s2 = s2;
    }

    /// Reset the state to zero.
    pub fn reset(&mut self) {
        self.s1 = 0.0;
        self.s2 = 0.0;
    }
}
