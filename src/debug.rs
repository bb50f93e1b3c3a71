//! Macros for logging and debug assertions. [`peq_dbg!()`], [`peq_trace!()`], and the
//! `peq_debug_assert_*!()` macros are compiled out during release builds, so they can be used for
//! asserting additional invariants in debug builds. None of the logging functions are realtime-safe,
//! and they should not be used from [`EqProcessor::process()`][crate::processor::EqProcessor::process()]
//! outside of debug assertions.

// NOTE: `#[macro_export]` exports these macros from the crate root. They're also re-exported from
//       this module so `use peq::debug::*;` pulls in just the macros.

/// Write something to the logger. Where the output ends up is controlled by the `PEQ_LOG`
/// environment variable, see [`setup_logger()`][crate::util::setup_logger()].
#[macro_export]
macro_rules! peq_log {
    ($($args:tt)*) => (
        $crate::log::info!($($args)*)
    );
}
#[doc(inline)]
pub use peq_log;

/// Similar to `peq_log!()`, but less subtle. Used for printing warnings.
#[macro_export]
macro_rules! peq_warn {
    ($($args:tt)*) => (
        $crate::log::warn!($($args)*)
    );
}
#[doc(inline)]
pub use peq_warn;

/// Similar to `peq_log!()`, but more scream-y. Used for printing fatal errors.
#[macro_export]
macro_rules! peq_error {
    ($($args:tt)*) => (
        $crate::log::error!($($args)*)
    );
}
#[doc(inline)]
pub use peq_error;

/// The same as `peq_log!()`, but only shown when compiling in debug mode.
#[macro_export]
macro_rules! peq_trace {
    ($($args:tt)*) => (
        $crate::util::permit_alloc(|| $crate::log::trace!($($args)*))
    );
}
#[doc(inline)]
pub use peq_trace;

/// Analogue to the `dbg!()` macro that writes to the logger instead of STDERR. The value is still
/// returned in release builds.
#[macro_export]
macro_rules! peq_dbg {
    () => {
        $crate::util::permit_alloc(|| $crate::log::debug!(""));
    };
    ($val:expr $(,)?) => {
        // Match here acts as a let-binding: https://stackoverflow.com/questions/48732263/why-is-rusts-assert-eq-implemented-using-a-match/48732525#48732525
        match $val {
            tmp => {
                $crate::util::permit_alloc(|| $crate::log::debug!("{} = {:#?}", stringify!($val), &tmp));
                tmp
            }
        }
    };
    ($($val:expr),+ $(,)?) => { ($($crate::peq_dbg!($val)),+,) };
}
#[doc(inline)]
pub use peq_dbg;

/// Logs a failed debug assertion. Used by the `peq_debug_assert*!()` macros, which have already
/// checked that we're in a debug build.
#[doc(hidden)]
#[macro_export]
macro_rules! __peq_assertion_failed {
    ($($args:tt)*) => (
        $crate::util::permit_alloc(|| $crate::log::warn!($($args)*))
    );
}

/// A `debug_assert!()` analogue that logs the failed assertion instead of panicking. During tests
/// this is upgraded to a regular panicking `debug_assert!()`.
#[macro_export]
macro_rules! peq_debug_assert {
    ($cond:expr $(,)?) => (
        #[allow(clippy::neg_cmp_op_on_partial_ord)]
        if cfg!(test) {
            debug_assert!($cond);
        } else if cfg!(debug_assertions) && !$cond {
            $crate::__peq_assertion_failed!(concat!("Debug assertion failed: ", stringify!($cond)));
        }
    );
    ($cond:expr, $format:expr $(, $($args:tt)*)?) => (
        #[allow(clippy::neg_cmp_op_on_partial_ord)]
        if cfg!(test) {
            debug_assert!($cond, $format, $($($args)*)?);
        } else if cfg!(debug_assertions) && !$cond {
            $crate::__peq_assertion_failed!(
                concat!("Debug assertion failed: ", stringify!($cond), ", ", $format),
                $($($args)*)?
            );
        }
    );
}
#[doc(inline)]
pub use peq_debug_assert;

/// An unconditional debug assertion failure, for when the condition has already been checked
/// elsewhere.
#[macro_export]
macro_rules! peq_debug_assert_failure {
    () => (
        if cfg!(test) {
            debug_assert!(false, "Debug assertion failed");
        } else if cfg!(debug_assertions) {
            $crate::__peq_assertion_failed!("Debug assertion failed");
        }
    );
    ($format:expr $(, $($args:tt)*)?) => (
        if cfg!(test) {
            debug_assert!(false, concat!("Debug assertion failed: ", $format), $($($args)*)?);
        } else if cfg!(debug_assertions) {
            $crate::__peq_assertion_failed!(concat!("Debug assertion failed: ", $format), $($($args)*)?);
        }
    );
}
#[doc(inline)]
pub use peq_debug_assert_failure;

/// A `debug_assert_eq!()` analogue. See [`peq_debug_assert!()`].
#[macro_export]
macro_rules! peq_debug_assert_eq {
    ($left:expr, $right:expr $(,)?) => (
        $crate::peq_debug_assert!($left == $right)
    );
    ($left:expr, $right:expr, $format:expr $(, $($args:tt)*)?) => (
        $crate::peq_debug_assert!($left == $right, $format $(, $($args)*)?)
    );
}
#[doc(inline)]
pub use peq_debug_assert_eq;

/// A `debug_assert_ne!()` analogue. See [`peq_debug_assert!()`].
#[macro_export]
macro_rules! peq_debug_assert_ne {
    ($left:expr, $right:expr $(,)?) => (
        $crate::peq_debug_assert!($left != $right)
    );
    ($left:expr, $right:expr, $format:expr $(, $($args:tt)*)?) => (
        $crate::peq_debug_assert!($left != $right, $format $(, $($args)*)?)
    );
}
#[doc(inline)]
pub use peq_debug_assert_ne;
