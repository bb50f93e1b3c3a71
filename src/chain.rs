//! The filter chain: a high-pass cascade, the peaking bands and a low-pass cascade, with separate
//! delay state for every channel.

use std::sync::Arc;

use crate::eq_params::MAX_BANDS;
use crate::filter::{Biquad, CoefficientSet};
use crate::response::ChainResponse;
use crate::snapshot::MAX_STAGES;

/// Mono and stereo are the only supported layouts.
pub const MAX_CHANNELS: usize = 2;

/// The coefficients and topology shared by every stage of a high-pass or low-pass cascade.
#[derive(Debug, Clone, Default)]
pub struct PassFilterGroup {
    enabled: bool,
    stages: usize,
    coefficients: Option<Arc<CoefficientSet>>,
}

/// The stages for a single channel. Every channel runs the same coefficients through its own
/// delay lines.
#[derive(Debug, Clone, Default)]
struct ChannelFilters {
    hpf: [Biquad; MAX_STAGES],
    bands: [Biquad; MAX_BANDS],
    lpf: [Biquad; MAX_STAGES],
}

/// All filters for up to [`MAX_CHANNELS`] channels. The groups hold the authoritative coefficient
/// references, and the per-channel stages hold clones of those same `Arc`s.
#[derive(Debug, Default)]
pub struct FilterChain {
    hpf: PassFilterGroup,
    lpf: PassFilterGroup,
    /// `None` means the band is disabled.
    bands: [Option<Arc<CoefficientSet>>; MAX_BANDS],

    /// Allocated in [`allocate()`][Self::allocate()], one entry per channel.
    channels: Vec<ChannelFilters>,
}

impl PassFilterGroup {
    /// Whether the cascade is applied at all.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// The number of active stages in the cascade. All of them share the same coefficients.
    pub fn stages(&self) -> usize {
        self.stages
    }

    /// The coefficients for every stage in the cascade. `None` until the group is first assigned.
    pub fn coefficients(&self) -> Option<&Arc<CoefficientSet>> {
        self.coefficients.as_ref()
    }

    /// The group's coefficients and stage count if the cascade is currently applied.
    pub fn active(&self) -> Option<(Arc<CoefficientSet>, usize)> {
        match (&self.coefficients, self.enabled) {
            (Some(coefficients), true) => Some((coefficients.clone(), self.stages)),
            _ => None,
        }
    }
}

impl FilterChain {
    /// Allocate fresh filter state for `num_channels` channels. Any existing delay state is
    /// discarded, while the coefficient assignments are copied to the new stages.
    pub fn allocate(&mut self, num_channels: usize) {
        peq_debug_assert!(num_channels <= MAX_CHANNELS);

        self.channels = vec![ChannelFilters::default(); num_channels];
        for channel in &mut self.channels {
            for stage in &mut channel.hpf {
                stage.set_coefficients(self.hpf.coefficients.clone());
            }
            for stage in &mut channel.lpf {
                stage.set_coefficients(self.lpf.coefficients.clone());
            }
            for (stage, coefficients) in channel.bands.iter_mut().zip(&self.bands) {
                stage.set_coefficients(coefficients.clone());
            }
        }
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn hpf(&self) -> &PassFilterGroup {
        &self.hpf
    }

    pub fn lpf(&self) -> &PassFilterGroup {
        &self.lpf
    }

    /// The coefficients for band `band_idx`, or `None` if the band is disabled.
    ///
    /// # Panics
    ///
    /// Panics if `band_idx >= MAX_BANDS`.
    pub fn band(&self, band_idx: usize) -> Option<&Arc<CoefficientSet>> {
        self.bands[band_idx].as_ref()
    }

    /// Point every high-pass stage on every channel at `coefficients`.
    pub fn assign_hpf(&mut self, coefficients: Arc<CoefficientSet>, stages: usize, enabled: bool) {
        Self::assign_pass_filter(
            &mut self.hpf,
            self.channels.iter_mut().map(|channel| &mut channel.hpf),
            coefficients,
            stages,
            enabled,
        );
    }

    /// Point every low-pass stage on every channel at `coefficients`.
    pub fn assign_lpf(&mut self, coefficients: Arc<CoefficientSet>, stages: usize, enabled: bool) {
        Self::assign_pass_filter(
            &mut self.lpf,
            self.channels.iter_mut().map(|channel| &mut channel.lpf),
            coefficients,
            stages,
            enabled,
        );
    }

    /// Point band `band_idx` on every channel at `coefficients`. `None` disables the band.
    pub fn assign_band(&mut self, band_idx: usize, coefficients: Option<Arc<CoefficientSet>>) {
        for channel in &mut self.channels {
            channel.bands[band_idx].set_coefficients(coefficients.clone());
        }
        self.bands[band_idx] = coefficients;
    }

    fn assign_pass_filter<'a>(
        group: &mut PassFilterGroup,
        channels: impl Iterator<Item = &'a mut [Biquad; MAX_STAGES]>,
        coefficients: Arc<CoefficientSet>,
        stages: usize,
        enabled: bool,
    ) {
        let stages = stages.clamp(1, MAX_STAGES);

        // Only the coefficients change. Idle stages keep their delay state until the next reset.
        for cascade in channels {
            for stage in cascade.iter_mut() {
                stage.set_coefficients(Some(coefficients.clone()));
            }
        }

        group.enabled = enabled;
        group.stages = stages;
        group.coefficients = Some(coefficients);
    }

    /// Run a channel's samples through the high-pass cascade, every enabled band in ascending
    /// order, and then the low-pass cascade.
    ///
    /// # Panics
    ///
    /// Panics if `channel_idx >= self.num_channels()`.
    pub fn process(&mut self, channel_idx: usize, samples: &mut [f32]) {
        let channel = &mut self.channels[channel_idx];

        if self.hpf.enabled {
            for stage in &mut channel.hpf[..self.hpf.stages] {
                stage.process_block(samples);
            }
        }

        // Disabled bands don't have any coefficients and will leave the samples alone
        for band in &mut channel.bands {
            band.process_block(samples);
        }

        if self.lpf.enabled {
            for stage in &mut channel.lpf[..self.lpf.stages] {
                stage.process_block(samples);
            }
        }
    }

    /// Clear every stage's delay state without touching the coefficients.
    pub fn reset(&mut self) {
        for channel in &mut self.channels {
            channel
                .hpf
                .iter_mut()
                .chain(channel.bands.iter_mut())
                .chain(channel.lpf.iter_mut())
                .for_each(Biquad::reset);
        }
    }

    /// An immutable view of the coefficients that are currently active, for evaluating the
    /// frequency response on another thread.
    pub fn response(&self, sample_rate: f32) -> ChainResponse {
        ChainResponse::new(
            sample_rate,
            self.hpf.active(),
            self.bands.clone(),
            self.lpf.active(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{make_high_pass, make_low_pass, make_peaking};

    const SAMPLE_RATE: f32 = 48_000.0;

    fn sine(frequency: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|idx| (std::f32::consts::TAU * frequency * idx as f32 / SAMPLE_RATE).sin())
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn empty_chain_passes_through() {
        let mut chain = FilterChain::default();
        chain.allocate(1);

        let input = sine(440.0, 512);
        let mut output = input.clone();
        chain.process(0, &mut output);
        assert_eq!(input, output);
    }

    #[test]
    fn disabled_pass_filter_is_skipped() {
        let mut chain = FilterChain::default();
        chain.allocate(1);
        chain.assign_hpf(make_high_pass(SAMPLE_RATE, 10_000.0, false), 4, false);

        let input = sine(100.0, 512);
        let mut output = input.clone();
        chain.process(0, &mut output);
        assert_eq!(input, output);
        assert!(chain.hpf().active().is_none());
    }

    #[test]
    fn cascades_attenuate_more() {
        let mut shallow = FilterChain::default();
        shallow.allocate(1);
        shallow.assign_lpf(make_low_pass(SAMPLE_RATE, 1000.0, false), 1, true);

        let mut steep = FilterChain::default();
        steep.allocate(1);
        steep.assign_lpf(make_low_pass(SAMPLE_RATE, 1000.0, false), 4, true);

        let mut shallow_output = sine(4000.0, 4096);
        let mut steep_output = shallow_output.clone();
        shallow.process(0, &mut shallow_output);
        steep.process(0, &mut steep_output);

        // Skip the transient at the start
        assert!(rms(&steep_output[2048..]) < rms(&shallow_output[2048..]) * 0.1);
    }

    #[test]
    fn channels_keep_separate_state() {
        let mut chain = FilterChain::default();
        chain.allocate(2);
        chain.assign_band(0, Some(make_peaking(SAMPLE_RATE, 1000.0, 4.0, 12.0)));

        let mut left = sine(1000.0, 256);
        let mut right = vec![0.0; 256];
        chain.process(0, &mut left);
        chain.process(1, &mut right);
        assert!(right.iter().all(|sample| *sample == 0.0));
    }

    #[test]
    fn stages_share_one_coefficient_set() {
        let mut chain = FilterChain::default();
        chain.allocate(2);
        let coefficients = make_high_pass(SAMPLE_RATE, 80.0, false);
        chain.assign_hpf(coefficients.clone(), 2, true);

        // One reference for the test, one for the group and four stages on two channels
        assert_eq!(Arc::strong_count(&coefficients), 2 + MAX_STAGES * 2);
        assert!(Arc::ptr_eq(
            chain.hpf().coefficients().expect("assigned"),
            &coefficients
        ));
    }

    #[test]
    fn disabling_a_band_leaves_the_others_alone() {
        let mut chain = FilterChain::default();
        chain.allocate(1);
        for band_idx in 0..3 {
            chain.assign_band(
                band_idx,
                Some(make_peaking(SAMPLE_RATE, 500.0 * (band_idx + 1) as f32, 1.0, 3.0)),
            );
        }
        let before: Vec<_> = (0..3).map(|idx| chain.band(idx).cloned()).collect();

        chain.assign_band(1, None);
        assert!(chain.band(1).is_none());
        for band_idx in [0, 2] {
            assert!(Arc::ptr_eq(
                chain.band(band_idx).expect("enabled"),
                before[band_idx].as_ref().expect("enabled")
            ));
        }
    }

    #[test]
    fn slope_changes_keep_stage_state() {
        let mut chain = FilterChain::default();
        chain.allocate(1);
        let coefficients = make_low_pass(SAMPLE_RATE, 500.0, false);

        let mut reference: [Biquad; MAX_STAGES] = Default::default();
        for stage in &mut reference {
            stage.set_coefficients(Some(coefficients.clone()));
        }

        // 48 dB, then 12 dB for a single block, then 48 dB again. The stages that sat out the
        // middle block resume from where they stopped.
        let input = sine(100.0, 256);
        for stages in [4, 1, 4] {
            chain.assign_lpf(coefficients.clone(), stages, true);

            let mut output = input.clone();
            chain.process(0, &mut output);

            let mut expected = input.clone();
            for stage in &mut reference[..stages] {
                stage.process_block(&mut expected);
            }
            assert_eq!(output, expected, "{stages} stages");
        }
    }

    #[test]
    fn reenabling_a_cascade_keeps_stage_state() {
        let mut chain = FilterChain::default();
        chain.allocate(1);
        let coefficients = make_high_pass(SAMPLE_RATE, 300.0, false);
        chain.assign_hpf(coefficients.clone(), 2, true);
        let mut samples = sine(150.0, 128);
        chain.process(0, &mut samples);

        let mut reference: [Biquad; 2] = Default::default();
        for stage in &mut reference {
            stage.set_coefficients(Some(coefficients.clone()));
        }
        let mut expected = sine(150.0, 128);
        for stage in &mut reference {
            stage.process_block(&mut expected);
        }

        chain.assign_hpf(coefficients.clone(), 2, false);
        let mut bypassed = sine(150.0, 128);
        chain.process(0, &mut bypassed);
        assert_eq!(bypassed, sine(150.0, 128));

        chain.assign_hpf(coefficients, 2, true);
        let mut output = sine(150.0, 128);
        chain.process(0, &mut output);
        let mut expected = sine(150.0, 128);
        for stage in &mut reference {
            stage.process_block(&mut expected);
        }
        assert_eq!(output, expected);
    }

    #[test]
    fn allocation_keeps_assignments() {
        let mut chain = FilterChain::default();
        chain.assign_band(3, Some(make_peaking(SAMPLE_RATE, 200.0, 1.0, -6.0)));
        chain.allocate(1);

        let mut samples = sine(200.0, 2048);
        let input_rms = rms(&samples[1024..]);
        chain.process(0, &mut samples);
        assert!(rms(&samples[1024..]) < input_rms * 0.6);
    }
}
