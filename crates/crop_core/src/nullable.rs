//! Null-propagating arithmetic over `Option<f64>`.
//!
//! Layer reads and table lookups can miss, so most quantities in the model are
//! `Option<f64>`. A missing operand makes the result missing. NaN and infinity
//! are ordinary values here and flow through unchanged.

/// Combine two nullable values with `op`, yielding `None` when either is missing.
pub fn lift2<F>(a: Option<f64>, b: Option<f64>, op: F) -> Option<f64>
where
    F: FnOnce(f64, f64) -> f64,
{
    match (a, b) {
        (Some(a), Some(b)) => Some(op(a, b)),
        _ => None,
    }
}

/// Nullable sum.
pub fn add(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    lift2(a, b, |a, b| a + b)
}

/// Nullable difference.
pub fn sub(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    lift2(a, b, |a, b| a - b)
}

/// Nullable product.
pub fn mul(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    lift2(a, b, |a, b| a * b)
}

/// Nullable quotient. Division by zero yields infinity or NaN, not `None`.
pub fn div(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    lift2(a, b, |a, b| a / b)
}

/// Minimum that returns NaN when either operand is NaN.
///
/// `f64::min` silently drops NaN, which would hide corrupt inputs behind a
/// plausible-looking number.
pub fn min_nan(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.min(b)
    }
}

/// Maximum that returns NaN when either operand is NaN.
pub fn max_nan(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.max(b)
    }
}

/// True for a present value that is neither zero nor NaN.
pub fn truthy(value: Option<f64>) -> bool {
    matches!(value, Some(v) if v != 0.0 && !v.is_nan())
}

/// The value itself when it is [`truthy`].
pub fn nonzero(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0 && !v.is_nan())
}

/// `preferred` when it is [`truthy`], `fallback` otherwise.
pub fn or_truthy(preferred: Option<f64>, fallback: Option<f64>) -> Option<f64> {
    if truthy(preferred) {
        preferred
    } else {
        fallback
    }
}
