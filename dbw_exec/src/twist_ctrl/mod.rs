//! # Twist control module
//!
//! Twist control converts the commanded twist of the vehicle (a linear and an
//! angular velocity) and the cross track error into throttle, brake and
//! steering demands. It is run once per cycle by the exec.
//!
//! Propulsion is handled by a pair of PID controllers operating on the linear
//! velocity error. The throttle controller runs every cycle; if it asks for
//! throttle the vehicle is accelerating, otherwise the brake controller is run
//! on the negated error and the vehicle is braking. Only one of throttle or
//! brake is ever demanded.
//!
//! Steering is the sum of a feed-forward angle, computed from the commanded
//! twist by a `FeedForwardSteering` source such as the `YawController`, and a
//! feedback correction from a PID controller on the cross track error. The
//! feedback correction is smoothed by a low pass filter before being summed.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod diagnostics;
pub mod lowpass;
pub mod params;
pub mod pid;
pub mod state;
pub mod yaw_ctrl;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use diagnostics::*;
pub use lowpass::*;
pub use params::*;
pub use pid::*;
pub use state::*;
pub use yaw_ctrl::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Linear velocity error below which the throttle integral is cleared before
/// the throttle controller is run, so that a large accumulated integral
/// doesn't hold off braking when the vehicle is too fast.
///
/// Units: meters/second
pub const FAST_BRAKE_LINEAR_ERROR_MS: f64 = -1.0;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur while setting up TwistCtrl.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum TwistCtrlError {
    #[error("Invalid throttle controller parameters: {0}")]
    ThrottlePid(PidError),

    #[error("Invalid brake controller parameters: {0}")]
    BrakePid(PidError),

    #[error("Invalid steer controller parameters: {0}")]
    SteerPid(PidError),

    #[error("Invalid steer filter parameters: {0}")]
    SteerFilter(LowPassError),

    #[error("The maximum steer angle must be positive, found {0} rad")]
    InvalidMaxSteerAngle(f64),

    #[error("The sample period must be positive, found {0} s")]
    InvalidSamplePeriod(f64)
}
