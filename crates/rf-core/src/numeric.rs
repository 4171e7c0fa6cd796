use crate::CoreError;

/// Floating point type used throughout the controller
pub type Real = f64;

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Check that `v` lies in `[lo, hi]` and is finite.
pub fn ensure_in_range(v: Real, lo: Real, hi: Real, what: &'static str) -> Result<Real, CoreError> {
    let v = ensure_finite(v, what)?;
    if v < lo || v > hi {
        return Err(CoreError::InvalidArg { what });
    }
    Ok(v)
}

/// Round a percentage to an integer duty in `0..=100`.
///
/// NaN maps to `None` so callers must pick an explicit fallback.
pub fn duty_from_percent(v: Real) -> Option<u8> {
    if v.is_nan() {
        return None;
    }
    Some(v.clamp(0.0, 100.0).round() as u8)
}

/// Mean of the finite values yielded by `values`, NaN when there are none.
pub fn finite_mean<I: IntoIterator<Item = Real>>(values: I) -> Real {
    let (sum, n) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0u32), |(s, n), v| (s + v, n + 1));
    if n == 0 { Real::NAN } else { sum / n as Real }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(Real::NAN, "test").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("Non-finite"));
    }

    #[test]
    fn range_check() {
        assert_eq!(ensure_in_range(5.0, 0.0, 10.0, "x"), Ok(5.0));
        assert!(ensure_in_range(11.0, 0.0, 10.0, "x").is_err());
        assert!(ensure_in_range(Real::INFINITY, 0.0, 10.0, "x").is_err());
    }

    #[test]
    fn duty_rounds_after_clamp() {
        assert_eq!(duty_from_percent(49.6), Some(50));
        assert_eq!(duty_from_percent(-3.0), Some(0));
        assert_eq!(duty_from_percent(250.0), Some(100));
        assert_eq!(duty_from_percent(Real::NAN), None);
    }

    #[test]
    fn mean_without_values_is_nan() {
        assert!(finite_mean(std::iter::empty()).is_nan());
        assert!(finite_mean([Real::NAN, Real::NAN]).is_nan());
        assert_eq!(finite_mean([100.0, Real::NAN, 200.0]), 150.0);
    }

    proptest::proptest! {
        #[test]
        fn duty_always_in_range(v in proptest::num::f64::ANY) {
            if let Some(d) = duty_from_percent(v) {
                proptest::prop_assert!(d <= 100);
            } else {
                proptest::prop_assert!(v.is_nan());
            }
        }
    }
}
