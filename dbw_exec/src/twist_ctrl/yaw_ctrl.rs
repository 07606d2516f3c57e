//! # Feed-forward steering
//!
//! The twist controller combines its feedback correction with a feed-forward
//! steering angle computed directly from the commanded twist. Any source of
//! that angle implements `FeedForwardSteering`.
//!
//! `YawController` is the kinematic bicycle model implementation: the yaw rate
//! demanded at the commanded speed is rescaled to the current speed, limited
//! by the maximum lateral acceleration, and turned into a wheel angle through
//! the turn radius.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use util::maths::{clamp, clamp_sym};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Speed below which the lateral acceleration limit is not applied, since the
/// yaw rate limit tends to infinity as speed drops.
///
/// Units: meters/second
const LAT_ACCEL_LIMIT_MIN_SPEED_MS: f64 = 0.1;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A source of feed-forward steering angles.
///
/// Implementations must be pure: querying the angle shall not change any
/// state.
pub trait FeedForwardSteering {
    /// Get the steering angle required to follow the target twist at the
    /// current speed.
    ///
    /// Units: radians
    fn get_steering(
        &self,
        target_linear_velocity_ms: f64,
        target_angular_velocity_rads: f64,
        current_linear_velocity_ms: f64
    ) -> f64;
}

impl<T: FeedForwardSteering + ?Sized> FeedForwardSteering for &T {
    fn get_steering(
        &self,
        target_linear_velocity_ms: f64,
        target_angular_velocity_rads: f64,
        current_linear_velocity_ms: f64
    ) -> f64 {
        (**self).get_steering(
            target_linear_velocity_ms,
            target_angular_velocity_rads,
            current_linear_velocity_ms
        )
    }
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Vehicle geometry and limits used by the `YawController`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YawParams {
    /// Distance between the front and rear axles.
    ///
    /// Units: meters
    pub wheel_base_m: f64,

    /// Ratio between the steering wheel angle and the road wheel angle.
    pub steer_ratio: f64,

    /// Speed used for the turn radius when the vehicle is slower than this.
    ///
    /// Units: meters/second
    pub min_speed_ms: f64,

    /// Maximum lateral acceleration the yaw rate will be limited to.
    ///
    /// Units: meters/second^2
    pub max_lat_accel_mss: f64
}

/// Kinematic feed-forward steering controller.
#[derive(Debug, Clone, Serialize)]
pub struct YawController {
    params: YawParams,

    /// Maximum absolute steering angle.
    ///
    /// Units: radians
    max_steer_angle_rad: f64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum YawCtrlError {
    #[error("YawController parameter {name} must be positive, found {value}")]
    NonPositiveParam {
        name: &'static str,
        value: f64
    }
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl YawController {
    /// Create a new yaw controller from the vehicle parameters and the
    /// steering angle limit.
    pub fn new(params: YawParams, max_steer_angle_rad: f64) -> Result<Self, YawCtrlError> {
        let positive = [
            ("wheel_base_m", params.wheel_base_m),
            ("steer_ratio", params.steer_ratio),
            ("max_lat_accel_mss", params.max_lat_accel_mss),
            ("max_steer_angle_rad", max_steer_angle_rad)
        ];

        for &(name, value) in positive.iter() {
            if !(value > 0f64 && value.is_finite()) {
                return Err(YawCtrlError::NonPositiveParam { name, value })
            }
        }

        // Zero min speed is allowed, it just disables the low speed radius
        if !(params.min_speed_ms >= 0f64 && params.min_speed_ms.is_finite()) {
            return Err(YawCtrlError::NonPositiveParam {
                name: "min_speed_ms",
                value: params.min_speed_ms
            })
        }

        Ok(Self { params, max_steer_angle_rad })
    }

    /// Get the steering angle needed to drive around a turn of the given
    /// radius, saturated at the maximum steering angle.
    fn get_angle(&self, radius_m: f64) -> f64 {
        let angle_rad = (self.params.wheel_base_m / radius_m).atan()
            * self.params.steer_ratio;

        clamp(
            &angle_rad,
            &-self.max_steer_angle_rad,
            &self.max_steer_angle_rad
        )
    }
}

impl FeedForwardSteering for YawController {
    fn get_steering(
        &self,
        target_linear_velocity_ms: f64,
        target_angular_velocity_rads: f64,
        current_linear_velocity_ms: f64
    ) -> f64 {
        // Keep the commanded curvature but apply it at the current speed
        let mut yaw_rate_rads = if target_linear_velocity_ms.abs() > 0f64 {
            current_linear_velocity_ms
                * target_angular_velocity_rads
                / target_linear_velocity_ms
        }
        else {
            0f64
        };

        if current_linear_velocity_ms.abs() > LAT_ACCEL_LIMIT_MIN_SPEED_MS {
            let max_yaw_rate_rads =
                (self.params.max_lat_accel_mss / current_linear_velocity_ms).abs();
            yaw_rate_rads = clamp_sym(&yaw_rate_rads, &max_yaw_rate_rads);
        }

        if yaw_rate_rads.abs() > 0f64 {
            let speed_ms = current_linear_velocity_ms.max(self.params.min_speed_ms);
            self.get_angle(speed_ms / yaw_rate_rads)
        }
        else {
            0f64
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
