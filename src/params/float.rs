//! Continuous (or discrete, with a step size) parameters.

use atomic_float::AtomicF32;
use std::fmt::{Debug, Display};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::range::FloatRange;
use super::{Param, ParamPtr};

/// A floating point parameter that's stored unnormalized. The range is used for the normalization
/// process and for clamping.
pub struct FloatParam {
    /// The field's current plain value.
    value: AtomicF32,
    /// The field's default value.
    default: f32,

    /// The distribution of the parameter's values.
    range: FloatRange,
    /// The distance between steps. Mostly useful for quantizing GUI input. If this is set and a
    /// [`value_to_string`][Self::with_value_to_string()] function is not set, then this is also
    /// used when formatting the parameter.
    step_size: Option<f32>,
    /// The parameter's human readable display name.
    name: String,
    /// The parameter value's unit, added after `value_to_string` if that is set. No space is added
    /// automatically.
    unit: &'static str,
    /// Optional custom conversion function from a plain **unnormalized** value to a string.
    value_to_string: Option<Arc<dyn Fn(f32) -> String + Send + Sync>>,
    /// Optional custom conversion function from a string to a plain **unnormalized** value.
    string_to_value: Option<Arc<dyn Fn(&str) -> Option<f32> + Send + Sync>>,
}

impl Display for FloatParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            self.normalized_value_to_string(self.normalized_value(), true)
        )
    }
}

impl Debug for FloatParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FloatParam")
            .field("name", &self.name)
            .field("value", &self.value())
            .field("range", &self.range)
            .finish()
    }
}

impl Param for FloatParam {
    type Plain = f32;

    fn name(&self) -> &str {
        &self.name
    }

    fn unit(&self) -> &'static str {
        self.unit
    }

    #[inline]
    fn plain_value(&self) -> Self::Plain {
        self.value.load(Ordering::Relaxed)
    }

    #[inline]
    fn default_plain_value(&self) -> Self::Plain {
        self.default
    }

    fn set_plain_value(&self, plain: Self::Plain) -> bool {
        // A UI may hand us garbage, the store should never hold a non-finite value
        if !plain.is_finite() {
            return false;
        }

        let value = self.range.clamp(plain);
        let old_value = self.value.swap(value, Ordering::Relaxed);

        value != old_value
    }

    fn normalized_value_to_string(&self, normalized: f32, include_unit: bool) -> String {
        let value = self.preview_plain(normalized);
        match (&self.value_to_string, &self.step_size, include_unit) {
            (Some(f), _, true) => format!("{}{}", f(value), self.unit),
            (Some(f), _, false) => f(value),
            (None, Some(step_size), true) => {
                let num_digits = decimals_from_step_size(*step_size);
                format!("{:.num_digits$}{}", value, self.unit)
            }
            (None, Some(step_size), false) => {
                let num_digits = decimals_from_step_size(*step_size);
                format!("{value:.num_digits$}")
            }
            (None, None, true) => format!("{}{}", value, self.unit),
            (None, None, false) => format!("{value}"),
        }
    }

    fn string_to_normalized_value(&self, string: &str) -> Option<f32> {
        let value = match &self.string_to_value {
            Some(f) => f(string.trim()),
            // The unit may or may not be included
            None => string.trim().trim_end_matches(self.unit).trim().parse().ok(),
        }?;

        if value.is_finite() {
            Some(self.preview_normalized(value))
        } else {
            None
        }
    }

    #[inline]
    fn preview_normalized(&self, plain: Self::Plain) -> f32 {
        self.range.normalize(plain)
    }

    #[inline]
    fn preview_plain(&self, normalized: f32) -> Self::Plain {
        let value = self.range.unnormalize(normalized);
        match &self.step_size {
            Some(step_size) => self.range.snap_to_step(value, *step_size),
            None => value,
        }
    }

    fn as_ptr(&self) -> ParamPtr<'_> {
        ParamPtr::FloatParam(self)
    }
}

impl FloatParam {
    /// Build a new [`FloatParam`]. Use the other associated functions to modify the behavior of the
    /// parameter.
    pub fn new(name: impl Into<String>, default: f32, range: FloatRange) -> Self {
        range.assert_validity();

        Self {
            value: AtomicF32::new(range.clamp(default)),
            default: range.clamp(default),

            range,
            step_size: None,
            name: name.into(),
            unit: "",
            value_to_string: None,
            string_to_value: None,
        }
    }

    /// The field's current plain value. Equivalent to calling `param.plain_value()`.
    #[inline]
    pub fn value(&self) -> f32 {
        self.plain_value()
    }

    /// The range of valid plain values for this parameter.
    #[inline]
    pub fn range(&self) -> FloatRange {
        self.range
    }

    /// Display a unit when rendering this parameter to a string. Appended after the
    /// [`value_to_string`][Self::with_value_to_string()] function if that is also set.
    pub fn with_unit(mut self, unit: &'static str) -> Self {
        self.unit = unit;
        self
    }

    /// Set the distance between steps. This must be a positive, nonzero number.
    pub fn with_step_size(mut self, step_size: f32) -> Self {
        peq_debug_assert!(step_size > 0.0);
        self.step_size = Some(step_size);
        self
    }

    /// Use a custom conversion function to convert the plain, unnormalized value to a string.
    pub fn with_value_to_string(
        mut self,
        callback: Arc<dyn Fn(f32) -> String + Send + Sync>,
    ) -> Self {
        self.value_to_string = Some(callback);
        self
    }

    /// Use a custom conversion function to convert from a string to a plain, unnormalized value.
    /// If the string cannot be parsed, then this should return a `None`.
    pub fn with_string_to_value(
        mut self,
        callback: Arc<dyn Fn(&str) -> Option<f32> + Send + Sync>,
    ) -> Self {
        self.string_to_value = Some(callback);
        self
    }
}

/// Calculate how many decimals to round to when displaying a floating point value with a specific
/// step size. We'll perform some rounding to ignore spurious extra precision caused by the floating
/// point quantization.
fn decimals_from_step_size(step_size: f32) -> usize {
    const SCALE: f32 = 1_000_000.0; // 10.0f32.powi(f32::DIGITS as i32)
    let step_size = (step_size * SCALE).round() / SCALE;

    let mut num_digits = 0;
    for decimals in 0..f32::DIGITS as i32 {
        if step_size * 10.0f32.powi(decimals) >= 1.0 {
            num_digits = decimals;
            break;
        }
    }

    num_digits as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_gain_param() -> FloatParam {
        FloatParam::new(
            "Gain",
            0.0,
            FloatRange::Linear {
                min: -30.0,
                max: 30.0,
            },
        )
        .with_unit(" dB")
        .with_step_size(0.01)
    }

    #[test]
    fn writes_are_clamped() {
        let param = make_gain_param();
        assert!(param.set_plain_value(100.0));
        assert_eq!(param.value(), 30.0);
        assert!(param.set_plain_value(-100.0));
        assert_eq!(param.value(), -30.0);
    }

    #[test]
    fn non_finite_writes_are_ignored() {
        let param = make_gain_param();
        param.set_plain_value(6.0);
        assert!(!param.set_plain_value(f32::NAN));
        assert!(!param.set_plain_value(f32::INFINITY));
        assert_eq!(param.value(), 6.0);
    }

    #[test]
    fn unchanged_write_reports_no_change() {
        let param = make_gain_param();
        assert!(!param.set_plain_value(0.0));
    }

    #[test]
    fn formatting_uses_step_size_decimals() {
        let param = make_gain_param();
        param.set_plain_value(1.5);
        assert_eq!(param.to_string(), "1.50 dB");
    }

    #[test]
    fn parse_with_and_without_unit() {
        let param = make_gain_param();
        assert!(param.set_from_string("-6 dB"));
        approx::assert_relative_eq!(param.value(), -6.0, epsilon = 1e-4);
        assert!(param.set_from_string("3.25"));
        approx::assert_relative_eq!(param.value(), 3.25, epsilon = 1e-4);
        assert!(!param.set_from_string("loud"));
        assert!(!param.set_from_string("NaN"));
    }

    #[test]
    fn decimals_for_step_sizes() {
        assert_eq!(decimals_from_step_size(1.0), 0);
        assert_eq!(decimals_from_step_size(0.1), 1);
        assert_eq!(decimals_from_step_size(0.01), 2);
    }
}
