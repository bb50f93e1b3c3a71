//! Peak meters for the signal going into and coming out of the filters.

use atomic_float::AtomicF32;
use std::sync::atomic::Ordering;

use crate::chain::MAX_CHANNELS;

/// The weight applied to the previous meter value for every sample, for a meter that falls by 12
/// dB over `decay_ms` milliseconds.
pub fn decay_weight(sample_rate: f32, decay_ms: f64) -> f32 {
    let decay_samples = sample_rate as f64 * decay_ms / 1000.0;
    if decay_samples > 0.0 {
        0.25f64.powf(decay_samples.recip()) as f32
    } else {
        0.0
    }
}

/// Per-channel input and output peak levels, stored as voltage gain. The processor writes these
/// once per block, and any other thread can read them at any time.
#[derive(Debug)]
pub struct PeakMeters {
    input: [AtomicF32; MAX_CHANNELS],
    output: [AtomicF32; MAX_CHANNELS],
}

impl Default for PeakMeters {
    fn default() -> Self {
        Self {
            input: std::array::from_fn(|_| AtomicF32::new(0.0)),
            output: std::array::from_fn(|_| AtomicF32::new(0.0)),
        }
    }
}

impl PeakMeters {
    /// The input peak for a channel, after the input gain has been applied. Out of range channel
    /// indices read the last channel.
    pub fn input_peak(&self, channel_idx: usize) -> f32 {
        self.input[channel_idx.min(MAX_CHANNELS - 1)].load(Ordering::Relaxed)
    }

    /// The output peak for a channel. Out of range channel indices read the last channel.
    pub fn output_peak(&self, channel_idx: usize) -> f32 {
        self.output[channel_idx.min(MAX_CHANNELS - 1)].load(Ordering::Relaxed)
    }

    /// Drop all meters back to silence.
    pub fn reset(&self) {
        for meter in self.input.iter().chain(&self.output) {
            meter.store(0.0, Ordering::Relaxed);
        }
    }

    pub(crate) fn update_input(&self, channel_idx: usize, samples: &[f32], decay_weight: f32) {
        Self::update(&self.input[channel_idx], samples, decay_weight);
    }

    pub(crate) fn update_output(&self, channel_idx: usize, samples: &[f32], decay_weight: f32) {
        Self::update(&self.output[channel_idx], samples, decay_weight);
    }

    fn update(meter: &AtomicF32, samples: &[f32], decay_weight: f32) {
        let mut peak = meter.load(Ordering::Relaxed);
        for sample in samples {
            let amplitude = sample.abs();
            peak = if amplitude > peak {
                amplitude
            } else {
                peak * decay_weight + amplitude * (1.0 - decay_weight)
            };
        }

        meter.store(peak, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn decays_by_twelve_db() {
        let weight = decay_weight(1000.0, 150.0);
        assert_relative_eq!(weight.powi(150), 0.25, epsilon = 1e-4);
        assert_eq!(decay_weight(1000.0, 0.0), 0.0);
    }

    #[test]
    fn peaks_rise_instantly_and_fall_slowly() {
        let meters = PeakMeters::default();
        let weight = decay_weight(1000.0, 150.0);

        meters.update_input(0, &[0.1, -0.8, 0.2], weight);
        let peak = meters.input_peak(0);
        assert!(peak > 0.75 && peak <= 0.8, "{peak}");

        meters.update_input(0, &[0.0; 150], weight);
        assert!(meters.input_peak(0) < peak * 0.26);
        assert_eq!(meters.input_peak(1), 0.0);
    }

    #[test]
    fn channel_index_is_clamped() {
        let meters = PeakMeters::default();
        meters.update_output(1, &[0.5], 0.9);
        assert_eq!(meters.output_peak(7), 0.5);
        meters.reset();
        assert_eq!(meters.output_peak(1), 0.0);
    }
}
