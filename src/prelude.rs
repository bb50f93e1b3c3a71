// Re-export the macros
pub use crate::debug::*;

pub use crate::formatters;
pub use crate::util;

pub use crate::buffer::Buffer;
pub use crate::config::{Config, CurveConfig, EqConfig, ProcessConfig};
pub use crate::curve::{Curve, CurveSampler};
pub use crate::eq_params::{BandParams, EqParams, PassFilterParams, Slope, MAX_BANDS};
pub use crate::error::{PrepareError, StateError};
pub use crate::filter::{CoefficientSet, FilterKind};
pub use crate::meters::PeakMeters;
pub use crate::params::{
    BoolParam, Enum, EnumParam, FloatParam, FloatRange, Param, ParamPtr, Params, Smoother,
    SmoothingStyle,
};
pub use crate::processor::{EqProcessor, ProcessStatus};
pub use crate::refresh::{CurveOutput, CurveRefresher, DEFAULT_REFRESH_INTERVAL};
pub use crate::response::{ChainResponse, FrequencyResponse, ResponseEvaluator};
pub use crate::state::{deserialize_json, serialize_json, EqState};
