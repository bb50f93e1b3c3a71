//! Value to string and string to value conversions for the equalizer's parameters.

use std::sync::Arc;

/// Round a frequency to `digits` decimals below 1 kHz, and switch to kilohertz above that.
pub fn v2s_f32_hz_then_khz(digits: usize) -> Arc<dyn Fn(f32) -> String + Send + Sync> {
    Arc::new(move |value| {
        if value < 1000.0 {
            format!("{value:.digits$} Hz")
        } else {
            format!("{:.digits$} kHz", value / 1000.0, digits = digits.max(1))
        }
    })
}

/// Convert an input in the same format as that of [`v2s_f32_hz_then_khz()`] to a Hertz value.
/// Input without a unit is assumed to be in Hertz.
pub fn s2v_f32_hz_then_khz() -> Arc<dyn Fn(&str) -> Option<f32> + Send + Sync> {
    Arc::new(move |string| {
        let string = string.trim();
        let value: f32 = string
            .trim_end_matches(&[' ', 'k', 'K', 'h', 'H', 'z', 'Z'])
            .parse()
            .ok()?;

        let is_khz = string
            .get(string.len().saturating_sub(3)..)
            .map_or(false, |unit| unit.eq_ignore_ascii_case("khz"));
        Some(if is_khz { value * 1000.0 } else { value })
    })
}

/// Format a gain in decibels with a sign, so boosts and cuts are easy to tell apart.
pub fn v2s_f32_signed_db(digits: usize) -> Arc<dyn Fn(f32) -> String + Send + Sync> {
    Arc::new(move |value| format!("{value:+.digits$}"))
}
