//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

use crate::constants::PERCENT_SCALE;

/// Convert a count to f64 while allowing precision loss in a single location.
#[must_use]
pub fn count_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(0.0)
}

/// Narrow a `usize` to `u32`, saturating at `u32::MAX`.
#[must_use]
pub fn usize_to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Percentage of `part` over `whole`, returning 0.0 when `whole` is zero or
/// the quotient is not finite.
#[must_use]
pub fn percentage(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 || !whole.is_finite() {
        return 0.0;
    }
    let value = part / whole * PERCENT_SCALE;
    if value.is_finite() { value } else { 0.0 }
}

/// Percentage of two counts (see [`percentage`]).
#[must_use]
pub fn count_percentage(part: usize, whole: usize) -> f64 {
    percentage(count_to_f64(part), count_to_f64(whole))
}

/// Round to one decimal place, returning 0.0 for non-finite values.
#[must_use]
pub fn round_to_tenth(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value * 10.0).round() / 10.0
}
