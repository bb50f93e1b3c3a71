//! Configuration for the processor and the response curve. Everything here can be loaded from
//! JSON, and fields that are missing from the JSON keep their defaults.

use serde::{Deserialize, Serialize};

use crate::eq_params::{MAX_FREQUENCY_HZ, MIN_FREQUENCY_HZ};

/// The stream configuration passed to
/// [`EqProcessor::prepare()`][crate::processor::EqProcessor::prepare()].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// The current sample rate in Hz.
    pub sample_rate: f32,
    /// The largest number of samples a single `process()` call will receive. Larger buffers are
    /// still processed, in chunks of this size.
    pub max_buffer_size: u32,
    /// Either one or two.
    pub num_channels: u32,
}

/// Settings for the processor that don't depend on the stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqConfig {
    /// How long it takes for a change in the input or output gain to be fully applied.
    pub gain_ramp_ms: f32,
    /// The time it takes for the peak meters to fall by 12 dB.
    pub peak_meter_decay_ms: f64,
}

impl Default for EqConfig {
    fn default() -> Self {
        Self {
            gain_ramp_ms: 20.0,
            peak_meter_decay_ms: 150.0,
        }
    }
}

/// Settings for the adaptive response curve sampler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveConfig {
    /// The number of log-spaced frequencies in the baseline grid.
    pub base_points: usize,
    /// The number of extra frequencies added around every detected peak or notch.
    pub extremum_points: usize,
    /// Both slopes around a peak or notch need to be steeper than this for it to be refined.
    pub noise_threshold_db: f64,
    /// Frequencies closer together than this, relative to their magnitude, are merged.
    pub merge_epsilon: f64,
    /// The curve never contains more points than this.
    pub max_points: usize,
    pub min_frequency_hz: f64,
    pub max_frequency_hz: f64,
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            base_points: 256,
            extremum_points: 32,
            noise_threshold_db: 0.05,
            merge_epsilon: 1e-6,
            max_points: 4096,
            min_frequency_hz: MIN_FREQUENCY_HZ as f64,
            max_frequency_hz: MAX_FREQUENCY_HZ as f64,
        }
    }
}

/// The [`EqConfig`] and [`CurveConfig`] together, as stored in a configuration file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub eq: EqConfig,
    pub curve: CurveConfig,
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_keep_defaults() {
        let config = Config::from_json(r#"{ "eq": { "gain_ramp_ms": 5.0 } }"#).unwrap();
        assert_eq!(config.eq.gain_ramp_ms, 5.0);
        assert_eq!(config.eq.peak_meter_decay_ms, 150.0);
        assert_eq!(config.curve, CurveConfig::default());
    }

    #[test]
    fn empty_object_is_the_default() {
        assert_eq!(Config::from_json("{}").unwrap(), Config::default());
    }

    #[test]
    fn process_config_requires_every_field() {
        assert!(serde_json::from_str::<ProcessConfig>(r#"{ "sample_rate": 48000.0 }"#).is_err());

        let config: ProcessConfig = serde_json::from_str(
            r#"{ "sample_rate": 48000.0, "max_buffer_size": 512, "num_channels": 2 }"#,
        )
        .unwrap();
        assert_eq!(config.num_channels, 2);
    }
}
