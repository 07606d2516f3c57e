//! Twist control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// Internal
use super::{LowPassParams, PidGains, YawParams};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for twist control.
///
/// Any field missing from the parameter file takes the tuned default.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Params {

    /// Time between two calls to `TwistCtrl::control`, used as the time step
    /// of every PID controller.
    ///
    /// Units: seconds
    pub sample_period_s: f64,

    /// Maximum absolute steering angle, limits the steer controller output
    /// and the feed-forward angle.
    ///
    /// Units: radians
    pub max_steer_angle_rad: f64,

    /// Throttle controller, operates on the linear velocity error.
    pub throttle: PidGains,

    /// Brake controller, operates on the negated linear velocity error.
    pub brake: PidGains,

    /// Steer controller gains. Output limits are `+/- max_steer_angle_rad`.
    pub steer: SteerGains,

    /// Filter applied to the steer controller output.
    pub steer_filter: LowPassParams,

    /// Feed-forward yaw controller vehicle parameters.
    pub yaw: YawParams
}

/// Gains of the steer controller.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SteerGains {
    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    pub k_i: f64,

    /// Derivative gain
    pub k_d: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SteerGains {
    /// Get the full PID gains, limited to the given steering angle.
    pub fn with_limit(&self, max_steer_angle_rad: f64) -> PidGains {
        PidGains::new(
            self.k_p, self.k_i, self.k_d,
            -max_steer_angle_rad, max_steer_angle_rad
        )
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            sample_period_s: 0.02,
            max_steer_angle_rad: 8.0,
            throttle: PidGains::new(0.2, 0.005, 0.1, 0.0, 1.0),
            // The 0.1 floor keeps a minimum of brake applied whenever the
            // vehicle is not accelerating
            brake: PidGains::new(100.0, 0.001, 0.1, 0.1, 2000.0),
            steer: SteerGains {
                k_p: 0.7,
                k_i: 0.004,
                k_d: 0.3
            },
            steer_filter: LowPassParams {
                tau_s: 1.5,
                ts_s: 1.0
            },
            yaw: YawParams {
                wheel_base_m: 2.8498,
                steer_ratio: 14.8,
                min_speed_ms: 0.1,
                max_lat_accel_mss: 3.0
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_partial_params_file() {
        let params: Params = toml::from_str(r#"
            sample_period_s = 0.1
            max_steer_angle_rad = 0.5

            [steer]
            k_p = 1.0
            k_i = 0.001
            k_d = 0.5
        "#).unwrap();

        let default = Params::default();

        assert_eq!(params.sample_period_s, 0.1);
        assert_eq!(params.max_steer_angle_rad, 0.5);
        assert_eq!(params.steer, SteerGains { k_p: 1.0, k_i: 0.001, k_d: 0.5 });
        assert_eq!(params.throttle, default.throttle);
        assert_eq!(params.brake, default.brake);
        assert_eq!(params.steer_filter, default.steer_filter);
        assert_eq!(params.yaw, default.yaw);
    }

    #[test]
    fn test_empty_params_file() {
        let params: Params = toml::from_str("").unwrap();
        assert_eq!(params, Params::default());
    }

    #[test]
    fn test_steer_limits() {
        let gains = Params::default().steer.with_limit(8.0);
        assert_eq!(gains.min_output, -8.0);
        assert_eq!(gains.max_output, 8.0);
        assert_eq!(gains.k_p, 0.7);
    }

    #[test]
    fn test_shipped_params_file() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../params/twist_ctrl.toml");
        let params: Params = util::params::load_from_path(path).unwrap();
        assert_eq!(params, Params::default());
    }
}
