//! Ramps for gain changes so an abrupt parameter jump doesn't produce an audible step.

/// Controls how a value gets smoothed. A zero length ramp jumps straight to the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SmoothingStyle {
    /// Smooth changes so the current value approaches the target value at a constant rate. The
    /// target value will be reached in exactly this many milliseconds.
    Linear(f32),
}

/// A smoother, providing a smoothed value for each sample. This is owned by the audio thread, so
/// unlike the parameters themselves it doesn't need any interior mutability.
#[derive(Debug, Clone)]
pub struct Smoother {
    /// The kind of smoothing that needs to be applied, if any.
    pub style: SmoothingStyle,
    /// The number of steps of smoothing left to take.
    steps_left: u32,
    /// The amount we should adjust the current value each sample to be able to reach the target in
    /// the specified time frame.
    step_size: f32,
    /// The value for the current sample.
    current: f32,
    /// The value we're smoothing towards.
    target: f32,
}

impl SmoothingStyle {
    /// Compute the number of steps to reach the target value based on the sample rate and this
    /// smoothing style's duration.
    #[inline]
    pub fn num_steps(&self, sample_rate: f32) -> u32 {
        peq_debug_assert!(sample_rate > 0.0);

        match self {
            Self::Linear(time) => {
                peq_debug_assert!(*time >= 0.0);
                (sample_rate * time / 1000.0).round() as u32
            }
        }
    }

    /// Compute the per-step increment for this smoother.
    #[inline]
    pub fn step_size(&self, start: f32, target: f32, num_steps: u32) -> f32 {
        peq_debug_assert!(num_steps >= 1);

        match self {
            Self::Linear(_) => (target - start) / (num_steps as f32),
        }
    }
}

impl Smoother {
    /// Use the specified style for the smoothing.
    pub fn new(style: SmoothingStyle) -> Self {
        Self {
            style,
            steps_left: 0,
            step_size: 0.0,
            current: 0.0,
            target: 0.0,
        }
    }

    /// The value we're currently smoothing towards.
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Reset the smoother to the specified value, skipping any remaining smoothing.
    pub fn reset(&mut self, value: f32) {
        self.target = value;
        self.current = value;
        self.steps_left = 0;
    }

    /// Start smoothing from the current value towards `target`.
    pub fn set_target(&mut self, sample_rate: f32, target: f32) {
        self.target = target;
        self.steps_left = self.style.num_steps(sample_rate);
        self.step_size = if self.steps_left > 0 {
            self.style
                .step_size(self.current, target, self.steps_left)
        } else {
            self.current = target;
            0.0
        };
    }

    /// Get the next value from this smoother. The value will be equal to the target once the
    /// smoothing period is over. This should be called exactly once per sample.
    #[allow(clippy::should_implement_trait)]
    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.steps_left > 0 {
            // The last step snaps to the target so rounding errors don't accumulate into an
            // overshoot
            self.steps_left -= 1;
            self.current = if self.steps_left == 0 {
                self.target
            } else {
                self.current + self.step_size
            };
        }

        self.current
    }

    /// Produce smoothed values for an entire block of audio. `block_values[..block_len]` will be
    /// filled with the smoothed values.
    ///
    /// # Panics
    ///
    /// Panics if `block_len > block_values.len()`.
    pub fn next_block(&mut self, block_values: &mut [f32], block_len: usize) {
        let block_values = &mut block_values[..block_len];

        let num_smoothed_values = block_values.len().min(self.steps_left as usize);
        for value in &mut block_values[..num_smoothed_values] {
            *value = self.next();
        }

        block_values[num_smoothed_values..].fill(self.target);
        if num_smoothed_values < block_len {
            self.current = self.target;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_f32_smoothing() {
        let mut smoother = Smoother::new(SmoothingStyle::Linear(100.0));
        smoother.reset(10.0);
        assert_eq!(smoother.next(), 10.0);

        // Instead of testing the actual values, we'll make sure that we reach the target values at
        // the expected time.
        smoother.set_target(100.0, 20.0);
        for _ in 0..(10 - 2) {
            smoother.next();
        }
        assert_ne!(smoother.next(), 20.0);
        assert_eq!(smoother.next(), 20.0);
    }

    #[test]
    fn zero_length_ramp_snaps_to_target() {
        let mut smoother = Smoother::new(SmoothingStyle::Linear(0.0));
        smoother.reset(1.0);
        smoother.set_target(44_100.0, 0.25);
        assert_eq!(smoother.next(), 0.25);
        assert_eq!(smoother.next(), 0.25);
    }

    #[test]
    fn block_smoothing_matches_per_sample() {
        let mut per_sample = Smoother::new(SmoothingStyle::Linear(1.0));
        let mut per_block = per_sample.clone();
        per_sample.reset(0.0);
        per_block.reset(0.0);
        per_sample.set_target(10_000.0, 1.0);
        per_block.set_target(10_000.0, 1.0);

        let mut block = [0.0; 16];
        per_block.next_block(&mut block, 16);
        for (idx, value) in block.iter().enumerate() {
            approx::assert_relative_eq!(*value, per_sample.next(), epsilon = 1e-6);
            if idx >= 9 {
                assert_eq!(*value, 1.0);
            }
        }
        assert_eq!(per_block.next(), 1.0);
    }

    #[test]
    fn partial_block_keeps_smoothing() {
        let mut smoother = Smoother::new(SmoothingStyle::Linear(1.0));
        smoother.reset(0.0);
        smoother.set_target(10_000.0, 1.0);

        let mut block = [0.0; 8];
        smoother.next_block(&mut block, 4);
        approx::assert_relative_eq!(block[3], 0.4, epsilon = 1e-6);
        assert_eq!(block[4], 0.0);
        approx::assert_relative_eq!(smoother.next(), 0.5, epsilon = 1e-6);
    }
}
