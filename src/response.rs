//! Frequency response evaluation that can run on any thread while the audio thread keeps
//! processing.
//!
//! After rebuilding filters, the processor publishes a [`ChainResponse`] through a triple buffer.
//! That is a complete, immutable description of every active stage at one point in time. The
//! [`ResponseEvaluator`] on the other end reads the most recently published one without ever
//! waiting for the audio thread, and since the coefficient sets themselves never change it can
//! never see half of an update.

use std::sync::Arc;

use crate::eq_params::{MAX_BANDS, MAX_FREQUENCY_HZ, MIN_FREQUENCY_HZ};
use crate::filter::CoefficientSet;

/// Anything that can report the linear magnitude response at a set of frequencies.
pub trait FrequencyResponse {
    /// Write `|H(f)|` for every frequency in `frequencies` to the same index in `magnitudes`.
    /// Frequencies are clamped to the supported range first.
    ///
    /// # Panics
    ///
    /// Panics if the two slices have different lengths.
    fn frequency_response(&mut self, frequencies: &[f64], magnitudes: &mut [f64]);

    /// Allocating version of [`frequency_response()`][Self::frequency_response()].
    fn frequency_response_vec(&mut self, frequencies: &[f64]) -> Vec<f64> {
        let mut magnitudes = vec![0.0; frequencies.len()];
        self.frequency_response(frequencies, &mut magnitudes);

        magnitudes
    }
}

/// The active stages of a filter chain at the time it was captured. Cloning this only clones the
/// coefficient references.
#[derive(Debug, Clone, Default)]
pub struct ChainResponse {
    /// Zero until the processor has been prepared. The response is flat in that case.
    sample_rate: f64,
    /// The high-pass coefficients and stage count, if the high-pass filter is enabled.
    hpf: Option<(Arc<CoefficientSet>, usize)>,
    bands: [Option<Arc<CoefficientSet>>; MAX_BANDS],
    lpf: Option<(Arc<CoefficientSet>, usize)>,
}

impl ChainResponse {
    pub fn new(
        sample_rate: f32,
        hpf: Option<(Arc<CoefficientSet>, usize)>,
        bands: [Option<Arc<CoefficientSet>>; MAX_BANDS],
        lpf: Option<(Arc<CoefficientSet>, usize)>,
    ) -> Self {
        Self {
            sample_rate: sample_rate as f64,
            hpf,
            bands,
            lpf,
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// The high-pass coefficients and stage count, or `None` if the filter is disabled.
    pub fn hpf(&self) -> Option<&(Arc<CoefficientSet>, usize)> {
        self.hpf.as_ref()
    }

    /// The low-pass coefficients and stage count, or `None` if the filter is disabled.
    pub fn lpf(&self) -> Option<&(Arc<CoefficientSet>, usize)> {
        self.lpf.as_ref()
    }

    /// Band `band_idx`'s coefficients, or `None` if the band is disabled.
    pub fn band(&self, band_idx: usize) -> Option<&Arc<CoefficientSet>> {
        self.bands[band_idx].as_ref()
    }

    /// The product of every active stage's magnitude at `frequency`. A cascade of `n` stages
    /// contributes its stage's magnitude to the `n`th power.
    pub fn magnitude_at(&self, frequency: f64) -> f64 {
        if self.sample_rate <= 0.0 {
            return 1.0;
        }

        let frequency = if frequency.is_nan() {
            MIN_FREQUENCY_HZ as f64
        } else {
            frequency.clamp(MIN_FREQUENCY_HZ as f64, MAX_FREQUENCY_HZ as f64)
        };

        let mut magnitude = 1.0;
        if let Some((coefficients, stages)) = &self.hpf {
            magnitude *= coefficients
                .magnitude_at(frequency, self.sample_rate)
                .powi(*stages as i32);
        }
        for coefficients in self.bands.iter().flatten() {
            magnitude *= coefficients.magnitude_at(frequency, self.sample_rate);
        }
        if let Some((coefficients, stages)) = &self.lpf {
            magnitude *= coefficients
                .magnitude_at(frequency, self.sample_rate)
                .powi(*stages as i32);
        }

        magnitude
    }
}

impl FrequencyResponse for ChainResponse {
    fn frequency_response(&mut self, frequencies: &[f64], magnitudes: &mut [f64]) {
        assert_eq!(frequencies.len(), magnitudes.len());

        for (frequency, magnitude) in frequencies.iter().zip(magnitudes.iter_mut()) {
            *magnitude = self.magnitude_at(*frequency);
        }
    }
}

/// The reading end of the processor's response handoff. Create one through
/// [`EqProcessor::new()`][crate::processor::EqProcessor::new()] and move it to the thread that
/// draws the response curve.
pub struct ResponseEvaluator {
    output: triple_buffer::Output<ChainResponse>,
}

impl ResponseEvaluator {
    pub(crate) fn new(output: triple_buffer::Output<ChainResponse>) -> Self {
        Self { output }
    }

    /// Whether the processor has published a new response since the last read.
    pub fn has_update(&self) -> bool {
        self.output.updated()
    }

    /// The most recently published response.
    pub fn latest(&mut self) -> &ChainResponse {
        self.output.read()
    }

    /// A local copy of the most recently published response. This only copies reference counts,
    /// and the copy stays valid no matter what the processor does afterwards.
    pub fn snapshot(&mut self) -> ChainResponse {
        self.output.read().clone()
    }
}

impl std::fmt::Debug for ResponseEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseEvaluator").finish_non_exhaustive()
    }
}

impl FrequencyResponse for ResponseEvaluator {
    fn frequency_response(&mut self, frequencies: &[f64], magnitudes: &mut [f64]) {
        // One read per query, so every frequency sees the same stages
        self.output
            .read()
            .clone()
            .frequency_response(frequencies, magnitudes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{make_high_pass, make_peaking};
    use approx::assert_relative_eq;
    use triple_buffer::TripleBuffer;

    const SAMPLE_RATE: f32 = 44_100.0;

    #[test]
    fn unprepared_response_is_flat() {
        let mut response = ChainResponse::default();
        let magnitudes = response.frequency_response_vec(&[10.0, 1000.0, 20_000.0]);
        assert_eq!(magnitudes, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn cascades_raise_to_the_stage_count() {
        let hpf = make_high_pass(SAMPLE_RATE, 200.0, false);
        let single = ChainResponse::new(SAMPLE_RATE, Some((hpf.clone(), 1)), Default::default(), None);
        let quad = ChainResponse::new(SAMPLE_RATE, Some((hpf, 4)), Default::default(), None);

        assert_relative_eq!(
            quad.magnitude_at(100.0),
            single.magnitude_at(100.0).powi(4),
            epsilon = 1e-12
        );
    }

    #[test]
    fn queries_are_clamped() {
        let mut bands: [Option<Arc<CoefficientSet>>; MAX_BANDS] = Default::default();
        bands[0] = Some(make_peaking(SAMPLE_RATE, 15.0, 1.0, 12.0));
        let response = ChainResponse::new(SAMPLE_RATE, None, bands, None);

        assert_eq!(response.magnitude_at(1.0), response.magnitude_at(10.0));
        assert_eq!(response.magnitude_at(f64::NAN), response.magnitude_at(10.0));
        assert_eq!(response.magnitude_at(40_000.0), response.magnitude_at(20_000.0));
    }

    #[test]
    fn band_order_does_not_matter() {
        let a = make_peaking(SAMPLE_RATE, 300.0, 2.0, 9.0);
        let b = make_peaking(SAMPLE_RATE, 2000.0, 0.7, -4.0);

        let mut forward: [Option<Arc<CoefficientSet>>; MAX_BANDS] = Default::default();
        forward[0] = Some(a.clone());
        forward[1] = Some(b.clone());
        let mut backward: [Option<Arc<CoefficientSet>>; MAX_BANDS] = Default::default();
        backward[0] = Some(b);
        backward[1] = Some(a);

        let forward = ChainResponse::new(SAMPLE_RATE, None, forward, None);
        let backward = ChainResponse::new(SAMPLE_RATE, None, backward, None);
        for frequency in [20.0, 300.0, 1000.0, 2000.0, 15_000.0] {
            assert_relative_eq!(
                forward.magnitude_at(frequency),
                backward.magnitude_at(frequency),
                max_relative = 1e-12
            );
        }
    }

    #[test]
    fn evaluator_sees_published_responses() {
        let (mut input, output) = TripleBuffer::new(&ChainResponse::default()).split();
        let mut evaluator = ResponseEvaluator::new(output);
        assert_eq!(evaluator.frequency_response_vec(&[1000.0]), [1.0]);

        let mut bands: [Option<Arc<CoefficientSet>>; MAX_BANDS] = Default::default();
        bands[0] = Some(make_peaking(SAMPLE_RATE, 1000.0, 2.0, 6.0));
        input.write(ChainResponse::new(SAMPLE_RATE, None, bands, None));

        assert!(evaluator.has_update());
        let magnitude = evaluator.frequency_response_vec(&[1000.0])[0];
        assert_relative_eq!(magnitude, 10.0f64.powf(6.0 / 20.0), epsilon = 1e-9);
        assert!(!evaluator.has_update());
    }
}
