//! The equalizer's parameter layout: input and output gain, a switchable high-pass and low-pass
//! filter, and [`MAX_BANDS`] peaking bands.

use crate::formatters;
use crate::params::{BoolParam, Enum, EnumParam, FloatParam, FloatRange, ParamPtr, Params};

/// The number of peaking bands.
pub const MAX_BANDS: usize = 8;

pub const MIN_FREQUENCY_HZ: f32 = 10.0;
pub const MAX_FREQUENCY_HZ: f32 = 20_000.0;
pub const MIN_GAIN_DB: f32 = -30.0;
pub const MAX_GAIN_DB: f32 = 30.0;
pub const MIN_Q: f32 = 0.1;
pub const MAX_Q: f32 = 40.0;
pub const MIN_IO_GAIN_DB: f32 = -60.0;
pub const MAX_IO_GAIN_DB: f32 = 10.0;

/// The Q used for the second order high-pass and low-pass stages.
pub const PASS_FILTER_Q: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// The frequency range shared by the pass filters and the peaking bands. The skew gives the lower
/// octaves more room.
pub fn frequency_range() -> FloatRange {
    FloatRange::Skewed {
        min: MIN_FREQUENCY_HZ,
        max: MAX_FREQUENCY_HZ,
        factor: FloatRange::skew_factor(-1.0),
    }
}

pub fn q_range() -> FloatRange {
    FloatRange::Skewed {
        min: MIN_Q,
        max: MAX_Q,
        factor: FloatRange::skew_factor(-1.0),
    }
}

pub fn band_gain_range() -> FloatRange {
    FloatRange::Linear {
        min: MIN_GAIN_DB,
        max: MAX_GAIN_DB,
    }
}

pub fn io_gain_range() -> FloatRange {
    FloatRange::Linear {
        min: MIN_IO_GAIN_DB,
        max: MAX_IO_GAIN_DB,
    }
}

/// The roll-off of the high-pass and low-pass filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slope {
    Db6,
    Db12,
    Db24,
    Db48,
}

impl Enum for Slope {
    fn variants() -> &'static [&'static str] {
        &["6 dB", "12 dB", "24 dB", "48 dB"]
    }

    fn ids() -> &'static [&'static str] {
        &["6db", "12db", "24db", "48db"]
    }

    fn to_index(self) -> usize {
        match self {
            Slope::Db6 => 0,
            Slope::Db12 => 1,
            Slope::Db24 => 2,
            Slope::Db48 => 3,
        }
    }

    fn from_index(index: usize) -> Self {
        match index {
            1 => Slope::Db12,
            2 => Slope::Db24,
            3 => Slope::Db48,
            _ => Slope::Db6,
        }
    }
}

/// An enabled flag, a cutoff and a slope. Used for both the high-pass and the low-pass filter.
#[derive(Debug)]
pub struct PassFilterParams {
    pub enabled: BoolParam,
    pub frequency: FloatParam,
    pub slope: EnumParam<Slope>,
}

/// The parameters for a single peaking band.
#[derive(Debug)]
pub struct BandParams {
    pub enabled: BoolParam,
    pub frequency: FloatParam,
    /// The boost or cut at the center frequency, in decibels.
    pub gain: FloatParam,
    pub q: FloatParam,
}

/// Every parameter the equalizer reads. Share this between threads through an `Arc`. The UI may
/// write to it at any time, the processor reads it once per block.
#[derive(Debug)]
pub struct EqParams {
    /// Applied before the filters, in decibels.
    pub input_gain: FloatParam,
    /// Applied after the filters, in decibels.
    pub output_gain: FloatParam,

    pub hpf: PassFilterParams,
    pub lpf: PassFilterParams,

    /// The peaking bands, applied in this order.
    pub bands: [BandParams; MAX_BANDS],
}

impl Default for EqParams {
    fn default() -> Self {
        Self {
            input_gain: io_gain_param("Input"),
            output_gain: io_gain_param("Output"),

            hpf: PassFilterParams::new("HPF", 20.0),
            lpf: PassFilterParams::new("LPF", MAX_FREQUENCY_HZ),

            bands: std::array::from_fn(|idx| BandParams::new(idx + 1)),
        }
    }
}

fn io_gain_param(name: &str) -> FloatParam {
    FloatParam::new(name, 0.0, io_gain_range())
        .with_unit(" dB")
        .with_step_size(0.01)
}

fn frequency_param(name: String, default: f32) -> FloatParam {
    FloatParam::new(name, default, frequency_range())
        .with_step_size(0.01)
        .with_value_to_string(formatters::v2s_f32_hz_then_khz(0))
        .with_string_to_value(formatters::s2v_f32_hz_then_khz())
}

impl PassFilterParams {
    fn new(prefix: &str, default_frequency: f32) -> Self {
        Self {
            enabled: BoolParam::new(format!("{prefix} Enabled"), true),
            frequency: frequency_param(format!("{prefix} Freq"), default_frequency),
            slope: EnumParam::new(format!("{prefix} Slope"), Slope::Db6),
        }
    }
}

impl BandParams {
    /// Create the parameters for band `number`, counting from one. The first three bands are
    /// enabled by default, and the default frequencies are spread linearly from 100 Hz for the
    /// first band up to 5 kHz for the last band.
    fn new(number: usize) -> Self {
        let position = (number - 1) as f32 / (MAX_BANDS - 1) as f32;
        let default_frequency = 100.0 + position * (5000.0 - 100.0);

        Self {
            enabled: BoolParam::new(format!("B{number} Enabled"), number <= 3),
            frequency: frequency_param(format!("B{number} Freq"), default_frequency),
            gain: FloatParam::new(format!("B{number} Gain"), 0.0, band_gain_range())
                .with_unit(" dB")
                .with_step_size(0.01)
                .with_value_to_string(formatters::v2s_f32_signed_db(2)),
            q: FloatParam::new(format!("B{number} Q"), 2.0, q_range()).with_step_size(0.01),
        }
    }
}

impl Params for EqParams {
    fn param_map(&self) -> Vec<(String, ParamPtr<'_>, String)> {
        use crate::params::Param;

        let mut map = vec![
            (
                String::from("in_gain"),
                self.input_gain.as_ptr(),
                String::from("Input/Output"),
            ),
            (
                String::from("out_gain"),
                self.output_gain.as_ptr(),
                String::from("Input/Output"),
            ),
        ];

        for (prefix, group, filter) in [("hpf", "High-pass", &self.hpf), ("lpf", "Low-pass", &self.lpf)]
        {
            map.push((
                format!("{prefix}_enabled"),
                filter.enabled.as_ptr(),
                String::from(group),
            ));
            map.push((
                format!("{prefix}_freq"),
                filter.frequency.as_ptr(),
                String::from(group),
            ));
            map.push((
                format!("{prefix}_slope"),
                filter.slope.as_ptr(),
                String::from(group),
            ));
        }

        for (idx, band) in self.bands.iter().enumerate() {
            let number = idx + 1;
            let group = format!("Band {number}");
            map.push((format!("b{number}_enabled"), band.enabled.as_ptr(), group.clone()));
            map.push((format!("b{number}_freq"), band.frequency.as_ptr(), group.clone()));
            map.push((format!("b{number}_gain"), band.gain.as_ptr(), group.clone()));
            map.push((format!("b{number}_q"), band.q.as_ptr(), group));
        }

        map
    }
}
