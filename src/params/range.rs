//! How a float parameter's plain values map onto the normalized `[0, 1]` range.

/// The mapping between a float parameter's plain values and its normalized values. Both bounds are
/// inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FloatRange {
    /// Plain values are spread evenly over the normalized range. Used for the gain parameters.
    Linear { min: f32, max: f32 },
    /// Normalized values are raised to the power of `factor`. Factors below 1.0 give more of the
    /// normalized range to the low end, which suits frequency and Q. See
    /// [`FloatRange::skew_factor()`].
    Skewed { min: f32, max: f32, factor: f32 },
}

impl FloatRange {
    /// Turn a signed amount of skew into a [`FloatRange::Skewed`] factor. Negative amounts widen
    /// the start of the range, positive amounts widen the end, and zero is linear.
    pub fn skew_factor(amount: f32) -> f32 {
        2.0f32.powf(amount)
    }

    pub fn min(&self) -> f32 {
        match *self {
            FloatRange::Linear { min, .. } | FloatRange::Skewed { min, .. } => min,
        }
    }

    pub fn max(&self) -> f32 {
        match *self {
            FloatRange::Linear { max, .. } | FloatRange::Skewed { max, .. } => max,
        }
    }

    pub fn clamp(&self, plain: f32) -> f32 {
        plain.clamp(self.min(), self.max())
    }

    /// Map a plain value to `[0, 1]`. Values outside of the range are clamped first.
    pub fn normalize(&self, plain: f32) -> f32 {
        let position = (self.clamp(plain) - self.min()) / (self.max() - self.min());
        match *self {
            FloatRange::Linear { .. } => position,
            FloatRange::Skewed { factor, .. } => position.powf(factor),
        }
    }

    /// The inverse of [`normalize()`][Self::normalize()]. `normalized` is clamped to `[0, 1]`.
    pub fn unnormalize(&self, normalized: f32) -> f32 {
        let normalized = normalized.clamp(0.0, 1.0);
        let position = match *self {
            FloatRange::Linear { .. } => normalized,
            FloatRange::Skewed { factor, .. } => normalized.powf(factor.recip()),
        };

        self.min() + position * (self.max() - self.min())
    }

    /// Round `value` to the nearest multiple of `step_size`, staying within the range.
    pub fn snap_to_step(&self, value: f32, step_size: f32) -> f32 {
        self.clamp((value / step_size).round() * step_size)
    }

    pub(super) fn assert_validity(&self) {
        peq_debug_assert!(
            self.min() < self.max(),
            "Empty parameter range: {} to {}",
            self.min(),
            self.max()
        );
    }
}
