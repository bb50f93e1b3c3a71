//! A multi-band parametric equalizer: a switchable high-pass and low-pass filter with selectable
//! slopes, eight peaking bands, and input and output gain.
//!
//! The [`EqParams`][eq_params::EqParams] can be changed from any thread at any time. The
//! [`EqProcessor`][processor::EqProcessor] reads them once per block on the audio thread and only
//! redesigns the filters whose parameters actually changed. A
//! [`ResponseEvaluator`][response::ResponseEvaluator] lets a display thread query the frequency
//! response without ever blocking the audio thread, and the [`curve`] and [`refresh`] modules turn
//! that into a curve that can be drawn.

#[macro_use]
pub mod debug;

/// Everything you'd need to use the equalizer. Import this with `use peq::prelude::*;`.
pub mod prelude;

// These modules have also been re-exported in the prelude.
pub mod formatters;
pub mod util;

pub mod buffer;
pub mod chain;
pub mod config;
pub mod curve;
pub mod eq_params;
pub mod error;
pub mod filter;
pub mod meters;
pub mod params;
pub mod processor;
pub mod refresh;
pub mod response;
pub mod snapshot;
pub mod state;

// The debug macros need to be able to reach the `log` crate from other crates
#[doc(hidden)]
pub use log;
