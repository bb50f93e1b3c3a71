//! Simple boolean parameters.

use std::fmt::{Debug, Display};
use std::sync::atomic::{AtomicBool, Ordering};

use super::{Param, ParamPtr};

/// An on/off switch, used for the filters' enabled flags. Displayed as `On` or `Off`.
pub struct BoolParam {
    value: AtomicBool,
    default: bool,
    name: String,
}

fn on_off(value: bool) -> &'static str {
    if value {
        "On"
    } else {
        "Off"
    }
}

impl Display for BoolParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(on_off(self.value()))
    }
}

impl Debug for BoolParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoolParam")
            .field("name", &self.name)
            .field("value", &self.value())
            .finish()
    }
}

impl Param for BoolParam {
    type Plain = bool;

    fn name(&self) -> &str {
        &self.name
    }

    fn unit(&self) -> &'static str {
        ""
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
        self.value.swap(plain, Ordering::Relaxed) != plain
    }

    fn normalized_value_to_string(&self, normalized: f32, _include_unit: bool) -> String {
        String::from(on_off(self.preview_plain(normalized)))
    }

    fn string_to_normalized_value(&self, string: &str) -> Option<f32> {
        let string = string.trim();
        let value = if string.eq_ignore_ascii_case("on")
            || string.eq_ignore_ascii_case("true")
            || string == "1"
        {
            true
        } else if string.eq_ignore_ascii_case("off")
            || string.eq_ignore_ascii_case("false")
            || string == "0"
        {
            false
        } else {
            return None;
        };

        Some(self.preview_normalized(value))
    }

    #[inline]
    fn preview_normalized(&self, plain: Self::Plain) -> f32 {
        if plain {
            1.0
        } else {
            0.0
        }
    }

    #[inline]
    fn preview_plain(&self, normalized: f32) -> Self::Plain {
        normalized > 0.5
    }

    fn as_ptr(&self) -> ParamPtr<'_> {
        ParamPtr::BoolParam(self)
    }
}

impl BoolParam {
    pub fn new(name: impl Into<String>, default: bool) -> Self {
        Self {
            value: AtomicBool::new(default),
            default,
            name: name.into(),
        }
    }

    /// The field's current value. Equivalent to calling `param.plain_value()`.
    #[inline]
    pub fn value(&self) -> bool {
        self.plain_value()
    }
}
