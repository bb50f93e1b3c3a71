//! The parameter store primitives. Every parameter stores its value in an atomic, so the UI thread
//! can write while the audio thread reads without any locking. Reads and writes happen by value.

use std::fmt::{Debug, Display};

pub mod boolean;
pub mod enums;
pub mod float;
pub mod range;
pub mod smoothing;

pub use boolean::BoolParam;
pub use enums::{Enum, EnumParam, EnumParamInner};
pub use float::FloatParam;
pub use range::FloatRange;
pub use smoothing::{Smoother, SmoothingStyle};

/// Describes a single parameter of any type. All setters take `&self`, since parameters are shared
/// between threads through an `Arc`.
pub trait Param: Display + Debug + Send + Sync {
    /// The plain parameter type.
    type Plain: PartialEq + Copy;

    /// The human readable display name.
    fn name(&self) -> &str;

    /// The unit label appended to the formatted value. This can be an empty string.
    fn unit(&self) -> &'static str;

    /// The current plain, unnormalized value.
    fn plain_value(&self) -> Self::Plain;

    /// The current value normalized to `[0, 1]`.
    fn normalized_value(&self) -> f32 {
        self.preview_normalized(self.plain_value())
    }

    /// The plain value the parameter was created with.
    fn default_plain_value(&self) -> Self::Plain;

    /// Set this parameter based on a plain, unnormalized value. Out of range values are clamped.
    /// Returns whether the stored value changed.
    fn set_plain_value(&self, plain: Self::Plain) -> bool;

    /// Set this parameter based on a normalized value. This **does** snap to step sizes for
    /// continuous parameters. Returns whether the stored value changed.
    fn set_normalized_value(&self, normalized: f32) -> bool {
        self.set_plain_value(self.preview_plain(normalized))
    }

    /// Parse `string` using [`string_to_normalized_value()`][Self::string_to_normalized_value()]
    /// and store the result. Returns `false` if the string could not be parsed.
    fn set_from_string(&self, string: &str) -> bool {
        match self.string_to_normalized_value(string) {
            Some(normalized) => {
                self.set_normalized_value(normalized);
                true
            }
            None => false,
        }
    }

    /// Restore the parameter's default value.
    fn reset_to_default(&self) {
        self.set_plain_value(self.default_plain_value());
    }

    /// Get the string representation for a normalized value, optionally including the unit.
    fn normalized_value_to_string(&self, normalized: f32, include_unit: bool) -> String;

    /// Parse a string back to a normalized value. Returns `None` if the string cannot be parsed.
    fn string_to_normalized_value(&self, string: &str) -> Option<f32>;

    /// Get the normalized value for a plain, unnormalized value.
    fn preview_normalized(&self, plain: Self::Plain) -> f32;

    /// Get the plain, unnormalized value for a normalized value.
    fn preview_plain(&self, normalized: f32) -> Self::Plain;

    /// A type erased reference to this parameter, used by [`Params::param_map()`].
    fn as_ptr(&self) -> ParamPtr<'_>;
}

/// A type erased reference to one of the parameter types. This lets UI and state code walk over a
/// [`Params`] object without knowing its concrete layout.
#[derive(Debug, Clone, Copy)]
pub enum ParamPtr<'a> {
    FloatParam(&'a FloatParam),
    BoolParam(&'a BoolParam),
    /// The enum's variant type is erased, this only knows about indices, names and ids.
    EnumParam(&'a EnumParamInner),
}

/// Dispatch a [`Param`] method to the parameter behind a [`ParamPtr`].
macro_rules! param_ptr_forward {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            ParamPtr::FloatParam(p) => p.$method($($arg),*),
            ParamPtr::BoolParam(p) => p.$method($($arg),*),
            ParamPtr::EnumParam(p) => p.$method($($arg),*),
        }
    };
}

impl<'a> ParamPtr<'a> {
    pub fn name(&self) -> &'a str {
        match *self {
            ParamPtr::FloatParam(p) => p.name(),
            ParamPtr::BoolParam(p) => p.name(),
            ParamPtr::EnumParam(p) => p.name(),
        }
    }

    pub fn unit(&self) -> &'static str {
        param_ptr_forward!(self, unit)
    }

    pub fn normalized_value(&self) -> f32 {
        param_ptr_forward!(self, normalized_value)
    }

    pub fn set_normalized_value(&self, normalized: f32) -> bool {
        param_ptr_forward!(self, set_normalized_value, normalized)
    }

    pub fn set_from_string(&self, string: &str) -> bool {
        param_ptr_forward!(self, set_from_string, string)
    }

    pub fn reset_to_default(&self) {
        param_ptr_forward!(self, reset_to_default)
    }

    pub fn normalized_value_to_string(&self, normalized: f32, include_unit: bool) -> String {
        param_ptr_forward!(self, normalized_value_to_string, normalized, include_unit)
    }
}

impl Display for ParamPtr<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamPtr::FloatParam(p) => Display::fmt(p, f),
            ParamPtr::BoolParam(p) => Display::fmt(p, f),
            ParamPtr::EnumParam(p) => Display::fmt(p, f),
        }
    }
}

/// A collection of parameters, addressable by a stable string id.
pub trait Params: Send + Sync {
    /// Every parameter as an `(id, param_ptr, group)` triple, in a stable order. The ids must be
    /// unique and should never change since they're used for saving and restoring state.
    fn param_map(&self) -> Vec<(String, ParamPtr<'_>, String)>;

    /// Look up a single parameter by its id.
    fn param(&self, id: &str) -> Option<ParamPtr<'_>> {
        self.param_map()
            .into_iter()
            .find(|(param_id, _, _)| param_id == id)
            .map(|(_, ptr, _)| ptr)
    }
}
