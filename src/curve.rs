//! The adaptive response curve sampler used for drawing the equalizer's frequency response.
//!
//! A uniformly sampled curve either needs a huge number of points or it flattens narrow high-Q
//! peaks and notches that fall between two grid points. Instead, the sampler evaluates a coarse
//! log-spaced grid first, looks for local extrema in the decibel domain, adds extra points around
//! those extrema, and then evaluates the final set of frequencies once more.

use crate::response::FrequencyResponse;
use crate::util;

pub use crate::config::CurveConfig;

/// A sampled response curve. The frequencies are strictly ascending, and the magnitudes are linear
/// amplitude ratios.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Curve {
    frequencies: Vec<f64>,
    magnitudes: Vec<f64>,
}

impl Curve {
    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn magnitudes(&self) -> &[f64] {
        &self.magnitudes
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Iterate over the `(frequency, linear_magnitude)` pairs in ascending frequency order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.frequencies
            .iter()
            .copied()
            .zip(self.magnitudes.iter().copied())
    }

    /// Iterate over the `(frequency, magnitude_db)` pairs in ascending frequency order. Silence is
    /// floored at [`util::MAGNITUDE_FLOOR`].
    pub fn iter_db(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.iter()
            .map(|(frequency, magnitude)| (frequency, util::magnitude_to_db(magnitude)))
    }
}

/// Builds [`Curve`]s from anything implementing [`FrequencyResponse`]. The sampler keeps its
/// buffers around between refreshes, so after the first few refreshes it no longer allocates.
#[derive(Debug, Clone)]
pub struct CurveSampler {
    config: CurveConfig,

    /// The log-spaced baseline grid. This never changes.
    baseline: Vec<f64>,
    /// Scratch space for the baseline magnitudes in decibels.
    baseline_db: Vec<f64>,

    /// The committed curve.
    curve: Curve,
    /// The curve that's being built. Swapped with `curve` once it's complete.
    pending: Curve,
}

/// Fill `frequencies` with `count` logarithmically spaced frequencies from `min` to `max`,
/// inclusive.
pub fn log_spaced(min: f64, max: f64, count: usize, frequencies: &mut Vec<f64>) {
    let (log_min, log_max) = (min.ln(), max.ln());
    match count {
        0 => (),
        1 => frequencies.push(min),
        _ => frequencies.extend((0..count).map(|idx| {
            // Pin the endpoints so rounding can't move them outside of the range
            match idx {
                0 => min,
                idx if idx == count - 1 => max,
                idx => (log_min + (log_max - log_min) * idx as f64 / (count - 1) as f64).exp(),
            }
        })),
    }
}

/// The indices in `magnitudes_db` where the slope changes sign and where the slopes on both sides
/// are steeper than `threshold_db`.
fn find_extrema(magnitudes_db: &[f64], threshold_db: f64) -> impl Iterator<Item = usize> + '_ {
    magnitudes_db
        .windows(3)
        .enumerate()
        .filter_map(move |(idx, window)| {
            let left_slope = window[1] - window[0];
            let right_slope = window[2] - window[1];
            let is_extremum = left_slope * right_slope < 0.0
                && left_slope.abs() > threshold_db
                && right_slope.abs() > threshold_db;

            is_extremum.then_some(idx + 1)
        })
}

/// Drop every frequency that lies within a relative `epsilon` of the last frequency that was kept.
/// `frequencies` must be sorted.
fn dedup_sorted(frequencies: &mut Vec<f64>, epsilon: f64) {
    frequencies.dedup_by(|later, kept| (*later - *kept).abs() <= epsilon * kept.abs().max(1.0));
}

/// Thin out `frequencies` to at most `max_points` entries by picking evenly spaced indices. The
/// first and the last frequency are always kept.
fn decimate(frequencies: &mut Vec<f64>, max_points: usize) {
    let len = frequencies.len();
    if len <= max_points {
        return;
    }

    let stride = (len - 1) as f64 / (max_points - 1) as f64;
    for idx in 0..max_points {
        let source_idx = ((idx as f64 * stride).round() as usize).min(len - 1);
        frequencies[idx] = frequencies[source_idx];
    }
    frequencies.truncate(max_points);
}

impl CurveSampler {
    /// Create a sampler for `config`. Nonsensical configurations are repaired: an invalid
    /// frequency range falls back to the default range, and the baseline and the output both get
    /// at least two points.
    pub fn new(config: CurveConfig) -> Self {
        let mut config = config;
        let defaults = CurveConfig::default();
        let valid_range = config.min_frequency_hz.is_finite()
            && config.max_frequency_hz.is_finite()
            && config.min_frequency_hz > 0.0
            && config.min_frequency_hz < config.max_frequency_hz;
        if !valid_range {
            peq_warn!(
                "Invalid curve frequency range {}..{}, using the default range",
                config.min_frequency_hz,
                config.max_frequency_hz
            );
            config.min_frequency_hz = defaults.min_frequency_hz;
            config.max_frequency_hz = defaults.max_frequency_hz;
        }
        config.base_points = config.base_points.max(2);
        config.max_points = config.max_points.max(2);
        if !(config.merge_epsilon.is_finite() && config.merge_epsilon >= 0.0) {
            config.merge_epsilon = defaults.merge_epsilon;
        }

        let mut baseline = Vec::with_capacity(config.base_points);
        log_spaced(
            config.min_frequency_hz,
            config.max_frequency_hz,
            config.base_points,
            &mut baseline,
        );

        Self {
            config,

            baseline_db: vec![0.0; baseline.len()],
            baseline,

            curve: Curve::default(),
            pending: Curve::default(),
        }
    }

    /// The configuration after it has been repaired.
    pub fn config(&self) -> &CurveConfig {
        &self.config
    }

    /// The most recently committed curve. Empty until the first
    /// [`refresh()`][Self::refresh()].
    pub fn curve(&self) -> &Curve {
        &self.curve
    }

    /// Resample the curve from `response`. This queries `response` exactly twice: once for the
    /// baseline grid, and once for the refined frequencies. The new curve replaces the old one
    /// only after both queries have finished.
    pub fn refresh<R: FrequencyResponse + ?Sized>(&mut self, response: &mut R) -> &Curve {
        // The baseline magnitudes are written to the pending curve's buffer first to avoid an
        // extra allocation
        let baseline_magnitudes = &mut self.pending.magnitudes;
        baseline_magnitudes.clear();
        baseline_magnitudes.resize(self.baseline.len(), 0.0);
        response.frequency_response(&self.baseline, baseline_magnitudes);
        for (db, magnitude) in self.baseline_db.iter_mut().zip(baseline_magnitudes.iter()) {
            *db = util::magnitude_to_db(*magnitude);
        }

        let frequencies = &mut self.pending.frequencies;
        frequencies.clear();
        frequencies.extend_from_slice(&self.baseline);
        for extremum_idx in find_extrema(&self.baseline_db, self.config.noise_threshold_db) {
            log_spaced(
                self.baseline[extremum_idx - 1],
                self.baseline[extremum_idx + 1],
                self.config.extremum_points,
                frequencies,
            );
        }

        frequencies.sort_by(f64::total_cmp);
        dedup_sorted(frequencies, self.config.merge_epsilon);
        decimate(frequencies, self.config.max_points);

        let magnitudes = &mut self.pending.magnitudes;
        magnitudes.clear();
        magnitudes.resize(frequencies.len(), 0.0);
        response.frequency_response(frequencies, magnitudes);

        std::mem::swap(&mut self.curve, &mut self.pending);
        &self.curve
    }
}

impl<'a> IntoIterator for &'a Curve {
    type Item = (f64, f64);
    type IntoIter = std::iter::Zip<
        std::iter::Copied<std::slice::Iter<'a, f64>>,
        std::iter::Copied<std::slice::Iter<'a, f64>>,
    >;

    fn into_iter(self) -> Self::IntoIter {
        self.frequencies
            .iter()
            .copied()
            .zip(self.magnitudes.iter().copied())
    }
}
