//! # PID controller
//!
//! A discrete PID controller with a saturated output. While the output is
//! saturated the error of that step is not accumulated into the integral,
//! which stops the integral term winding up against the limit.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use util::maths::clamp;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Gains and output limits of a single PID channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    pub k_i: f64,

    /// Derivative gain
    pub k_d: f64,

    /// Lowest value the controller may output
    pub min_output: f64,

    /// Highest value the controller may output
    pub max_output: f64
}

/// A PID controller
#[derive(Debug, Serialize, Clone)]
pub struct PidController {
    gains: PidGains,

    /// The integral accumulation (error x time)
    integral: f64,

    /// Error passed into the previous step, used for the derivative
    last_error: f64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Configuration errors for a PID controller.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum PidError {
    #[error("Minimum output ({min}) is greater than the maximum output ({max})")]
    InvalidBounds {
        min: f64,
        max: f64
    },

    #[error("PID parameter {0} is not a finite number")]
    NonFiniteParam(&'static str)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidGains {
    /// Create a new set of gains with the given output limits.
    pub const fn new(k_p: f64, k_i: f64, k_d: f64, min_output: f64, max_output: f64) -> Self {
        Self { k_p, k_i, k_d, min_output, max_output }
    }

    /// Check that the gains describe a usable controller.
    pub fn validate(&self) -> Result<(), PidError> {
        let fields = [
            ("k_p", self.k_p),
            ("k_i", self.k_i),
            ("k_d", self.k_d),
            ("min_output", self.min_output),
            ("max_output", self.max_output)
        ];

        for (name, val) in fields.iter() {
            if !val.is_finite() {
                return Err(PidError::NonFiniteParam(*name))
            }
        }

        if self.min_output > self.max_output {
            return Err(PidError::InvalidBounds {
                min: self.min_output,
                max: self.max_output
            })
        }

        Ok(())
    }
}

impl PidController {

    /// Create a new controller with the given gains.
    ///
    /// Invalid gains are rejected here so that `step` can never fail.
    pub fn new(gains: PidGains) -> Result<Self, PidError> {
        gains.validate()?;

        Ok(Self {
            gains,
            integral: 0f64,
            last_error: 0f64
        })
    }

    /// Get the value of the controller for the given error, `dt` seconds after
    /// the previous step.
    ///
    /// The output is always within `[min_output, max_output]`. A `dt` of zero
    /// produces no derivative term. A non-finite error is not remembered, and
    /// a step whose output cannot be computed returns the neutral output
    /// (zero, clamped to the limits) without changing the integral.
    pub fn step(&mut self, error: f64, dt: f64) -> f64 {
        let integral = self.integral + error * dt;

        let deriv = if dt == 0f64 {
            0f64
        }
        else {
            (error - self.last_error) / dt
        };

        let raw =
            term(self.gains.k_p, error)
            + term(self.gains.k_i, integral)
            + term(self.gains.k_d, deriv);

        if error.is_finite() {
            self.last_error = error;
        }

        // The integral is only kept while the output is unsaturated
        if raw.is_nan() {
            self.neutral_output()
        }
        else if raw > self.gains.max_output {
            self.gains.max_output
        }
        else if raw < self.gains.min_output {
            self.gains.min_output
        }
        else {
            // A disabled integral term can still overflow
            if integral.is_finite() {
                self.integral = integral;
            }
            raw
        }
    }

    /// Zero, clamped to the output limits.
    fn neutral_output(&self) -> f64 {
        clamp(&0f64, &self.gains.min_output, &self.gains.max_output)
    }

    /// Clear both the integral and the derivative history.
    pub fn reset(&mut self) {
        self.integral = 0f64;
        self.last_error = 0f64;
    }

    /// Clear the integral only, keeping the previous error so the next
    /// derivative is still meaningful.
    pub fn clear_integral(&mut self) {
        self.integral = 0f64;
    }

    /// The current integral accumulation.
    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// The error passed into the previous step.
    pub fn last_error(&self) -> f64 {
        self.last_error
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Contribution of one term, a zero gain disables the term even if its input
/// has overflowed.
fn term(gain: f64, value: f64) -> f64 {
    if gain == 0f64 {
        0f64
    }
    else {
        gain * value
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
