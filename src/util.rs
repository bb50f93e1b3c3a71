//! General conversion functions and utilities.

mod ftz;
mod logger;

pub use ftz::process_wrapper;
pub use logger::setup_logger;

pub const MINUS_INFINITY_DB: f32 = -100.0;
pub const MINUS_INFINITY_GAIN: f32 = 1e-5; // 10f32.powf(MINUS_INFINITY_DB / 20)

/// Linear magnitudes are floored to this value before being converted to decibels in
/// [`magnitude_to_db()`]. That corresponds to -240 dB.
pub const MAGNITUDE_FLOOR: f64 = 1e-12;

#[cfg(all(debug_assertions, feature = "assert_process_allocs"))]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

/// Temporarily allow allocations within `func` if this crate was configured with the
/// `assert_process_allocs` feature.
#[cfg(all(debug_assertions, feature = "assert_process_allocs"))]
pub fn permit_alloc<T, F: FnOnce() -> T>(func: F) -> T {
    assert_no_alloc::permit_alloc(func)
}

/// Temporarily allow allocations within `func` if this crate was configured with the
/// `assert_process_allocs` feature.
#[cfg(not(all(debug_assertions, feature = "assert_process_allocs")))]
pub fn permit_alloc<T, F: FnOnce() -> T>(func: F) -> T {
    func()
}

/// Convert decibels to a voltage gain ratio, treating anything below -100 dB as minus infinity.
#[inline]
pub fn db_to_gain(dbs: f32) -> f32 {
    if dbs > MINUS_INFINITY_DB {
        10.0f32.powf(dbs * 0.05)
    } else {
        0.0
    }
}

/// Convert a voltage gain ratio to decibels. Gain ratios that aren't positive will be treated as
/// [`MINUS_INFINITY_DB`].
#[inline]
pub fn gain_to_db(gain: f32) -> f32 {
    f32::max(gain, MINUS_INFINITY_GAIN).log10() * 20.0
}

/// Convert a linear magnitude from a frequency response query to decibels. Magnitudes are clamped
/// to [`MAGNITUDE_FLOOR`] first so an exact zero (or a NaN) never reaches the logarithm.
#[inline]
pub fn magnitude_to_db(magnitude: f64) -> f64 {
    // `f64::max()` returns the other argument when one of them is NaN
    20.0 * magnitude.max(MAGNITUDE_FLOOR).log10()
}

#[cfg(test)]
mod tests {
    mod db_gain_conversion {
        use super::super::*;

        #[test]
        fn test_db_to_gain_positive() {
            assert_eq!(db_to_gain(3.0), 1.4125376);
        }

        #[test]
        fn test_db_to_gain_negative() {
            assert_eq!(db_to_gain(-3.0), 1.4125376f32.recip());
        }

        #[test]
        fn test_db_to_gain_minus_infinity() {
            assert_eq!(db_to_gain(-100.0), 0.0);
        }

        #[test]
        fn test_gain_to_db_positive() {
            assert_eq!(gain_to_db(4.0), 12.041201);
        }

        #[test]
        fn test_gain_to_db_minus_infinity_zero() {
            assert_eq!(gain_to_db(0.0), MINUS_INFINITY_DB);
        }
    }

    mod magnitude_conversion {
        use super::super::*;

        #[test]
        fn test_unity() {
            assert_eq!(magnitude_to_db(1.0), 0.0);
        }

        #[test]
        fn test_doubling() {
            approx::assert_relative_eq!(magnitude_to_db(2.0), 6.0206, epsilon = 1e-4);
        }

        #[test]
        fn test_zero_is_floored() {
            approx::assert_relative_eq!(magnitude_to_db(0.0), -240.0, epsilon = 1e-9);
        }

        #[test]
        fn test_nan_is_floored() {
            approx::assert_relative_eq!(magnitude_to_db(f64::NAN), -240.0, epsilon = 1e-9);
        }
    }
}
