//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Limit a value to the range `[min, max]`.
pub fn clamp<T>(value: &T, min: &T, max: &T) -> T 
where
    T: Float
{
    let mut ret = *value;

    if ret > *max {
        ret = *max
    }
    if ret < *min {
        ret = *min
    }

    ret
}

/// Limit a value to the symmetric range `[-limit, limit]`.
///
/// The sign of `limit` is ignored.
pub fn clamp_sym<T>(value: &T, limit: &T) -> T
where
    T: Float
{
    let abs_limit = limit.abs();
    clamp(value, &(-abs_limit), &abs_limit)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(&0.5f64, &0.0, &1.0), 0.5);
        assert_eq!(clamp(&1.5f64, &0.0, &1.0), 1.0);
        assert_eq!(clamp(&-1.5f64, &0.0, &1.0), 0.0);
    }

    #[test]
    fn test_clamp_sym() {
        assert_eq!(clamp_sym(&9.0f64, &8.2), 8.2);
        assert_eq!(clamp_sym(&-9.0f64, &8.2), -8.2);
        assert_eq!(clamp_sym(&-9.0f64, &-8.2), -8.2);
        assert_eq!(clamp_sym(&1.0f64, &8.2), 1.0);
    }
}
