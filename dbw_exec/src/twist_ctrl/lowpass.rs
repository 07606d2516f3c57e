//! # Low pass filter
//!
//! First order exponential smoothing. The blend factor is derived from the
//! filter time constant `tau` and the nominal sample period `ts` as
//! `a = ts / (tau + ts)`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Time constants of a low pass filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LowPassParams {
    /// Filter time constant
    ///
    /// Units: seconds
    pub tau_s: f64,

    /// Nominal sample period
    ///
    /// Units: seconds
    pub ts_s: f64
}

/// A first order low pass filter.
#[derive(Debug, Clone, Serialize)]
pub struct LowPassFilter {
    /// Blend factor applied to new samples
    a: f64,

    /// Most recent filter output, `None` until the first sample
    last_value: Option<f64>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum LowPassError {
    #[error("Filter time constant must be positive, found {0}")]
    InvalidTau(f64),

    #[error("Filter sample period must be positive, found {0}")]
    InvalidTs(f64)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LowPassFilter {
    /// Create a new filter from its time constant and sample period.
    pub fn new(tau: f64, ts: f64) -> Result<Self, LowPassError> {
        // Written so that NaN is also rejected
        if !(tau > 0f64 && tau.is_finite()) {
            return Err(LowPassError::InvalidTau(tau))
        }
        if !(ts > 0f64 && ts.is_finite()) {
            return Err(LowPassError::InvalidTs(ts))
        }

        Ok(Self {
            a: ts / (tau + ts),
            last_value: None
        })
    }

    /// Create a new filter from a parameter block.
    pub fn from_params(params: &LowPassParams) -> Result<Self, LowPassError> {
        Self::new(params.tau_s, params.ts_s)
    }

    /// Filter a new sample, returning the filtered value.
    ///
    /// The first sample passes through unchanged and seeds the filter.
    pub fn filt(&mut self, value: f64) -> f64 {
        let filtered = match self.last_value {
            Some(last) => self.a * value + (1f64 - self.a) * last,
            None => value
        };

        self.last_value = Some(filtered);

        filtered
    }

    /// Get the last filtered value, or `None` if no samples have been seen.
    pub fn get(&self) -> Option<f64> {
        self.last_value
    }

    /// Returns true once the filter has been seeded with a sample.
    pub fn ready(&self) -> bool {
        self.last_value.is_some()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_first_sample_passes_through() {
        let mut filt = LowPassFilter::new(1.5, 1.0).unwrap();
        assert!(!filt.ready());
        assert_eq!(filt.get(), None);

        assert_eq!(filt.filt(0.1234), 0.1234);
        assert!(filt.ready());
        assert_eq!(filt.get(), Some(0.1234));
    }

    #[test]
    fn test_blend() {
        let mut filt = LowPassFilter::new(1.5, 1.0).unwrap();
        filt.filt(0.0);

        // a = 1.0 / 2.5 = 0.4
        assert_relative_eq!(filt.filt(1.0), 0.4, epsilon = 1e-12);
        assert_relative_eq!(filt.filt(1.0), 0.64, epsilon = 1e-12);
        assert_relative_eq!(filt.get().unwrap(), 0.64, epsilon = 1e-12);
    }

    #[test]
    fn test_monotonic_convergence() {
        let cases: [(f64, f64); 3] = [(0.0, 1.0), (5.0, -2.0), (-0.3, -0.31)];

        for &(start, target) in cases.iter() {
            let mut filt = LowPassFilter::new(1.5, 1.0).unwrap();
            filt.filt(start);

            let mut prev_err = (start - target).abs();
            let mut num_steps = 0;
            while prev_err > 1e-12 {
                let out = filt.filt(target);
                let err = (out - target).abs();

                assert!(err < prev_err, "Error grew from {} to {}", prev_err, err);

                // Approaches from the starting side, never overshooting
                assert_eq!((out - target).signum(), (start - target).signum());

                prev_err = err;
                num_steps += 1;
                assert!(num_steps < 200, "Filter failed to converge");
            }
        }
    }

    #[test]
    fn test_invalid_params() {
        assert_eq!(LowPassFilter::new(0.0, 1.0).unwrap_err(), LowPassError::InvalidTau(0.0));
        assert_eq!(LowPassFilter::new(1.5, -1.0).unwrap_err(), LowPassError::InvalidTs(-1.0));
        assert!(LowPassFilter::new(std::f64::NAN, 1.0).is_err());
        assert!(LowPassFilter::from_params(&LowPassParams { tau_s: 1.5, ts_s: 1.0 }).is_ok());
    }
}
