//! Enum parameters. `enum` is a keyword, so `enums` it is.

use std::fmt::{Debug, Display};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicI32, Ordering};

use super::{Param, ParamPtr};

/// An enum usable with [`EnumParam`]. Variants are identified by a stable _id_, which is what gets
/// stored when saving the parameter state. That makes it possible to reorder or rename variants
/// without breaking existing state files.
pub trait Enum {
    /// The human readable names for the variants. These are displayed to the user, and also used
    /// for parsing text back to a parameter value. The length of this slice determines how many
    /// variants there are.
    fn variants() -> &'static [&'static str];

    /// Stable identifiers for each variant. The length of this slice needs to be equal to
    /// [`variants()`][Self::variants()].
    fn ids() -> &'static [&'static str];

    /// Get the variant index corresponding to the active variant. The index needs to correspond to
    /// the name in [`variants()`][Self::variants()].
    fn to_index(self) -> usize;

    /// Get the variant corresponding to the variant with the same index in
    /// [`variants()`][Self::variants()]. This must always return a value. If the index is out of
    /// range, return the first variant.
    fn from_index(index: usize) -> Self;
}

/// A categorical parameter that allows convenient conversion to and from a simple enum.
pub struct EnumParam<T: Enum> {
    /// A type-erased version of this parameter so state and UI code can do its thing without
    /// needing to know about `T`.
    inner: EnumParamInner,

    /// `T` is only used to convert back to an enum variant. Internally everything works through
    /// the variant indices on [`EnumParamInner`].
    _marker: PhantomData<fn() -> T>,
}

/// The type-erased internals for [`EnumParam`]. Stores the active variant's index.
pub struct EnumParamInner {
    /// The active variant's index.
    value: AtomicI32,
    /// The default variant's index.
    default: i32,

    /// The parameter's human readable display name.
    name: String,
    /// The human readable variant names, obtained from [`Enum::variants()`].
    variants: &'static [&'static str],
    /// Stable identifiers for the enum variants, obtained from [`Enum::ids()`].
    ids: &'static [&'static str],
}

impl<T: Enum> Display for EnumParam<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.inner, f)
    }
}

impl Display for EnumParamInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.variants[self.index()])
    }
}

impl<T: Enum> Debug for EnumParam<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.inner, f)
    }
}

impl Debug for EnumParamInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnumParam")
            .field("name", &self.name)
            .field("value", &self.ids[self.index()])
            .finish()
    }
}

impl<T: Enum + PartialEq + Copy> Param for EnumParam<T> {
    type Plain = T;

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn unit(&self) -> &'static str {
        ""
    }

    #[inline]
    fn plain_value(&self) -> Self::Plain {
        T::from_index(self.inner.index())
    }

    fn default_plain_value(&self) -> Self::Plain {
        T::from_index(self.inner.default as usize)
    }

    fn set_plain_value(&self, plain: Self::Plain) -> bool {
        self.inner.set_plain_value(T::to_index(plain) as i32)
    }

    fn normalized_value_to_string(&self, normalized: f32, include_unit: bool) -> String {
        self.inner
            .normalized_value_to_string(normalized, include_unit)
    }

    fn string_to_normalized_value(&self, string: &str) -> Option<f32> {
        self.inner.string_to_normalized_value(string)
    }

    fn preview_normalized(&self, plain: Self::Plain) -> f32 {
        self.inner.preview_normalized(T::to_index(plain) as i32)
    }

    fn preview_plain(&self, normalized: f32) -> Self::Plain {
        T::from_index(self.inner.preview_plain(normalized) as usize)
    }

    fn as_ptr(&self) -> ParamPtr<'_> {
        self.inner.as_ptr()
    }
}

impl Param for EnumParamInner {
    type Plain = i32;

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

    fn default_plain_value(&self) -> Self::Plain {
        self.default
    }

    fn set_plain_value(&self, plain: Self::Plain) -> bool {
        let plain = plain.clamp(0, self.max_index());
        self.value.swap(plain, Ordering::Relaxed) != plain
    }

    fn normalized_value_to_string(&self, normalized: f32, _include_unit: bool) -> String {
        self.variants[self.preview_plain(normalized) as usize].to_string()
    }

    fn string_to_normalized_value(&self, string: &str) -> Option<f32> {
        let string = string.trim();
        self.variants
            .iter()
            .position(|variant| variant.eq_ignore_ascii_case(string))
            .or_else(|| self.ids.iter().position(|id| *id == string))
            .map(|idx| self.preview_normalized(idx as i32))
    }

    fn preview_normalized(&self, plain: Self::Plain) -> f32 {
        let max_index = self.max_index();
        if max_index == 0 {
            0.0
        } else {
            plain.clamp(0, max_index) as f32 / max_index as f32
        }
    }

    fn preview_plain(&self, normalized: f32) -> Self::Plain {
        (normalized.clamp(0.0, 1.0) * self.max_index() as f32).round() as i32
    }

    fn as_ptr(&self) -> ParamPtr<'_> {
        ParamPtr::EnumParam(self)
    }
}

impl<T: Enum + PartialEq + Copy> EnumParam<T> {
    /// Build a new [`EnumParam`].
    pub fn new(name: impl Into<String>, default: T) -> Self {
        let variants = T::variants();
        let ids = T::ids();
        peq_debug_assert_eq!(variants.len(), ids.len());
        peq_debug_assert!(!variants.is_empty());

        Self {
            inner: EnumParamInner {
                value: AtomicI32::new(T::to_index(default) as i32),
                default: T::to_index(default) as i32,

                name: name.into(),
                variants,
                ids,
            },
            _marker: PhantomData,
        }
    }

    /// The field's current value. Equivalent to calling `param.plain_value()`.
    #[inline]
    pub fn value(&self) -> T {
        self.plain_value()
    }

    /// The type-erased parameter.
    pub fn inner(&self) -> &EnumParamInner {
        &self.inner
    }
}

impl EnumParamInner {
    /// The active variant's index.
    #[inline]
    pub fn index(&self) -> usize {
        self.plain_value() as usize
    }

    /// The stable id of the active variant.
    pub fn id(&self) -> &'static str {
        self.ids[self.index()]
    }

    /// Select a variant by its stable id. Returns `false` if no variant has that id.
    pub fn set_from_id(&self, id: &str) -> bool {
        match self.ids.iter().position(|candidate| *candidate == id) {
            Some(idx) => {
                self.set_plain_value(idx as i32);
                true
            }
            None => false,
        }
    }

    /// The number of variants.
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// Whether there are no variants. Never true for a parameter created through
    /// [`EnumParam::new()`].
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    fn max_index(&self) -> i32 {
        self.variants.len().saturating_sub(1) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Shape {
        Flat,
        Steep,
        Steeper,
    }

    impl Enum for Shape {
        fn variants() -> &'static [&'static str] {
            &["Flat", "Steep", "Steeper"]
        }

        fn ids() -> &'static [&'static str] {
            &["flat", "steep", "steeper"]
        }

        fn to_index(self) -> usize {
            self as usize
        }

        fn from_index(index: usize) -> Self {
            match index {
                1 => Shape::Steep,
                2 => Shape::Steeper,
                _ => Shape::Flat,
            }
        }
    }

    #[test]
    fn normalized_round_trip_hits_variants() {
        let param = EnumParam::new("Shape", Shape::Flat);
        param.set_normalized_value(0.5);
        assert_eq!(param.value(), Shape::Steep);
        param.set_normalized_value(1.0);
        assert_eq!(param.value(), Shape::Steeper);
    }

    #[test]
    fn parse_by_name_or_id() {
        let param = EnumParam::new("Shape", Shape::Flat);
        assert!(param.set_from_string("steeper"));
        assert_eq!(param.value(), Shape::Steeper);
        assert!(param.inner().set_from_id("steep"));
        assert_eq!(param.value(), Shape::Steep);
        assert_eq!(param.inner().id(), "steep");
        assert!(!param.inner().set_from_id("vertical"));
        assert_eq!(param.to_string(), "Steep");
    }

    #[test]
    fn out_of_range_index_is_clamped() {
        let param = EnumParam::new("Shape", Shape::Flat);
        param.inner().set_plain_value(17);
        assert_eq!(param.value(), Shape::Steeper);
    }
}
