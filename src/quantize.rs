//! Conversions between slider positions and stepped parameter values.
//!
//! Every function here is pure. Sliders always report a fraction in `[0, 1]`;
//! the physical value lives in `[min, max]` and is snapped to multiples of the
//! parameter step. A step of `0` means the parameter is continuous.

/// Upper bound for the decimal precision carried alongside a step.
pub const MAX_PRECISION: u32 = 9;

/// Slack used when comparing snapped values against the upper bound.
const EPSILON: f64 = 1e-9;

/// Direction of a stepper button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Down,
    Up,
}

impl Direction {
    /// Signed step for this direction.
    pub fn delta(self, step: f64) -> f64 {
        match self {
            Direction::Down => -step,
            Direction::Up => step,
        }
    }
}

/// Round `value` to `precision` decimal places.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let scale = 10f64.powi(precision.min(MAX_PRECISION) as i32);
    (value * scale).round() / scale
}

/// Number of meaningful fractional digits in a number as it was written.
///
/// `"2.5"` has one, `"0.25"` two, while `"1"` and `"1.0"` have none.
/// Exponent notation is normalised through the shortest float representation.
pub fn decimals_of(text: &str) -> u32 {
    let text = text.trim();
    if text.contains(['e', 'E']) {
        return match text.parse::<f64>() {
            Ok(v) if v.is_finite() && !format!("{v}").contains(['e', 'E']) => {
                decimals_of(&format!("{v}"))
            }
            _ => 0,
        };
    }
    match text.split_once('.') {
        Some((_, frac)) => (frac.trim_end_matches('0').len() as u32).min(MAX_PRECISION),
        None => 0,
    }
}

/// Convert a slider fraction into a parameter value.
///
/// The fraction is interpolated linearly into `[min, max]` and snapped to the
/// nearest multiple of `step` that does not exceed `max`, then rounded to
/// `precision` decimals so values like `0.1 * 3` print cleanly. With a zero
/// step nothing is snapped, but the value is still rounded to `precision`.
pub fn to_value(fraction: f64, min: f64, max: f64, step: f64, precision: u32) -> f64 {
    let fraction = if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    };
    let raw = min + fraction * (max - min);
    if step <= 0.0 {
        return round_to(raw, precision);
    }
    let mut steps = ((raw - min) / step).round();
    if min + steps * step > max + EPSILON {
        steps = ((max - min) / step + EPSILON).floor();
    }
    round_to(min + steps * step, precision)
}

/// Inverse of [`to_value`]: the slider fraction that represents `value`.
///
/// Callers must guarantee `max > min`.
pub fn to_fraction(value: f64, min: f64, max: f64) -> f64 {
    (value - min) / (max - min)
}

/// Apply a stepper delta and clamp the result to `[min, max]`.
pub fn step_value(current: f64, delta: f64, min: f64, max: f64) -> f64 {
    let next = current + delta;
    if next.is_nan() {
        return min;
    }
    next.clamp(min, max)
}
