//! Twist control module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace, warn};
use serde::Serialize;

// Internal
use super::*;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Twist controller.
///
/// Owns the throttle, brake and steer controllers and the steer filter. The
/// feed-forward source `F` and diagnostics sink `D` are supplied by the
/// caller, who can keep ownership of them by passing references.
pub struct TwistCtrl<F, D> {
    params: Params,

    throttle_pid: PidController,
    brake_pid: PidController,
    steer_pid: PidController,

    /// Filter for the steer controller output
    steer_filter: LowPassFilter,

    feed_forward: F,
    diagnostics: D,

    /// Drive mode of the last cycle, `None` before the first cycle and after
    /// a reset
    mode: Option<DriveMode>,

    report: StatusReport
}

/// Output of one twist control cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ControlOutput {
    /// Throttle or brake demand
    pub propulsion: Propulsion,

    /// Steering angle demand
    ///
    /// Units: radians
    pub steer_rad: f64
}

/// The status report of the last cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct StatusReport {
    /// Linear velocity error (target - current)
    pub linear_error_ms: f64,

    /// True if the throttle integral was cleared because the vehicle was too
    /// fast
    pub fast_brake: bool,

    /// True if the drive mode changed this cycle
    pub mode_changed: bool,

    /// True if the diagnostics sink returned an error
    pub diagnostics_failed: bool
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Propulsion demand. Throttle and brake are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Propulsion {
    /// Throttle demand, in the range (0, 1]
    Throttle(f64),

    /// Brake demand, within the brake controller limits
    Brake(f64)
}

/// The drive modes of TwistCtrl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DriveMode {
    Accelerating,
    Braking
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DriveMode {
    /// Mode transition table.
    ///
    /// The mode is selected every cycle from the throttle controller output
    /// alone, from either mode:
    ///
    /// | Throttle demand | Next mode      |
    /// |-----------------|----------------|
    /// | `> 0`           | `Accelerating` |
    /// | `<= 0`          | `Braking`      |
    pub fn from_throttle_demand(throttle_val: f64) -> Self {
        if throttle_val > 0f64 {
            DriveMode::Accelerating
        }
        else {
            DriveMode::Braking
        }
    }
}

impl Propulsion {
    /// The throttle demand, or `None` when braking.
    pub fn throttle(&self) -> Option<f64> {
        match self {
            Propulsion::Throttle(t) => Some(*t),
            Propulsion::Brake(_) => None
        }
    }

    /// The brake demand, or `None` when accelerating.
    pub fn brake(&self) -> Option<f64> {
        match self {
            Propulsion::Throttle(_) => None,
            Propulsion::Brake(b) => Some(*b)
        }
    }

    pub fn mode(&self) -> DriveMode {
        match self {
            Propulsion::Throttle(_) => DriveMode::Accelerating,
            Propulsion::Brake(_) => DriveMode::Braking
        }
    }
}

impl ControlOutput {
    pub fn throttle(&self) -> Option<f64> {
        self.propulsion.throttle()
    }

    pub fn brake(&self) -> Option<f64> {
        self.propulsion.brake()
    }
}

impl<F, D> TwistCtrl<F, D>
where
    F: FeedForwardSteering,
    D: DiagnosticsSink
{
    /// Initialise the twist controller.
    ///
    /// All parameter errors are reported here, after which `control` cannot
    /// fail.
    pub fn new(
        params: Params,
        feed_forward: F,
        diagnostics: D
    ) -> Result<Self, TwistCtrlError> {

        if !(params.sample_period_s > 0f64 && params.sample_period_s.is_finite()) {
            return Err(TwistCtrlError::InvalidSamplePeriod(params.sample_period_s))
        }

        if !(params.max_steer_angle_rad > 0f64 && params.max_steer_angle_rad.is_finite()) {
            return Err(TwistCtrlError::InvalidMaxSteerAngle(params.max_steer_angle_rad))
        }

        let throttle_pid = PidController::new(params.throttle)
            .map_err(TwistCtrlError::ThrottlePid)?;
        let brake_pid = PidController::new(params.brake)
            .map_err(TwistCtrlError::BrakePid)?;
        let steer_pid = PidController::new(
            params.steer.with_limit(params.max_steer_angle_rad)
        ).map_err(TwistCtrlError::SteerPid)?;

        let steer_filter = LowPassFilter::from_params(&params.steer_filter)
            .map_err(TwistCtrlError::SteerFilter)?;

        Ok(Self {
            params,
            throttle_pid,
            brake_pid,
            steer_pid,
            steer_filter,
            feed_forward,
            diagnostics,
            mode: None,
            report: StatusReport::default()
        })
    }

    /// Perform one cycle of twist control.
    ///
    /// # Inputs
    /// - `target_linear_velocity_ms`: commanded forward speed
    /// - `target_angular_velocity_rads`: commanded yaw rate
    /// - `current_linear_velocity_ms`: measured forward speed
    /// - `cte_m`: cross track error, used as the steer controller error
    pub fn control(
        &mut self,
        target_linear_velocity_ms: f64,
        target_angular_velocity_rads: f64,
        current_linear_velocity_ms: f64,
        cte_m: f64
    ) -> ControlOutput {
        self.report = StatusReport::default();

        let dt = self.params.sample_period_s;

        // ---- PROPULSION ----

        let linear_error_ms = target_linear_velocity_ms - current_linear_velocity_ms;
        self.report.linear_error_ms = linear_error_ms;

        if linear_error_ms < FAST_BRAKE_LINEAR_ERROR_MS {
            self.throttle_pid.clear_integral();
            self.report.fast_brake = true;
        }

        let throttle_val = self.throttle_pid.step(linear_error_ms, dt);

        let mode = DriveMode::from_throttle_demand(throttle_val);
        if self.mode != Some(mode) {
            debug!("TwistCtrl drive mode {:?} -> {:?}", self.mode, mode);
            self.report.mode_changed = true;
        }
        self.mode = Some(mode);

        // Each mode keeps the other mode's controller reset, so nothing
        // carries over when the mode changes
        let propulsion = match mode {
            DriveMode::Accelerating => {
                self.brake_pid.reset();
                Propulsion::Throttle(throttle_val)
            },
            DriveMode::Braking => {
                self.throttle_pid.reset();
                Propulsion::Brake(self.brake_pid.step(-linear_error_ms, dt))
            }
        };

        // ---- STEERING ----

        let steer_feedback_raw_rad = self.steer_pid.step(cte_m, dt);
        let steer_feedback_filtered_rad = self.steer_filter.filt(steer_feedback_raw_rad);

        let steer_feedforward_rad = self.feed_forward.get_steering(
            target_linear_velocity_ms,
            target_angular_velocity_rads,
            current_linear_velocity_ms
        );

        // ---- DIAGNOSTICS ----

        let telemetry = Telemetry {
            steer_feedback_raw_rad,
            steer_feedback_filtered_rad,
            steer_feedforward_rad,
            current_linear_velocity_ms,
            target_linear_velocity_ms,
            throttle: propulsion.throttle(),
            brake: propulsion.brake()
        };

        if let Err(e) = self.diagnostics.log(&telemetry) {
            warn!("TwistCtrl diagnostics error: {}", e);
            self.report.diagnostics_failed = true;
        }

        let output = ControlOutput {
            propulsion,
            steer_rad: steer_feedforward_rad + steer_feedback_filtered_rad
        };

        trace!("TwistCtrl output: {:?}", output);

        output
    }

    /// Reset the throttle and steer controllers.
    ///
    /// The brake controller and the steer filter keep their state.
    pub fn reset(&mut self) {
        self.throttle_pid.reset();
        self.steer_pid.reset();
        self.mode = None;

        debug!("TwistCtrl reset");
    }
}

impl<F, D> TwistCtrl<F, D> {
    /// Drive mode of the last cycle, `None` if no cycle has run since
    /// initialisation or the last reset.
    pub fn mode(&self) -> Option<DriveMode> {
        self.mode
    }

    /// Status report of the last cycle.
    pub fn report(&self) -> &StatusReport {
        &self.report
    }

    pub fn throttle_pid(&self) -> &PidController {
        &self.throttle_pid
    }

    pub fn brake_pid(&self) -> &PidController {
        &self.brake_pid
    }

    pub fn steer_pid(&self) -> &PidController {
        &self.steer_pid
    }

    pub fn steer_filter(&self) -> &LowPassFilter {
        &self.steer_filter
    }

    pub fn diagnostics(&self) -> &D {
        &self.diagnostics
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    /// Feed-forward source returning a fixed angle.
    struct ConstSteering(f64);

    impl FeedForwardSteering for ConstSteering {
        fn get_steering(&self, _: f64, _: f64, _: f64) -> f64 {
            self.0
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        records: Vec<Telemetry>
    }

    impl DiagnosticsSink for RecordingSink {
        fn log(&mut self, telemetry: &Telemetry) -> Result<(), DiagnosticsError> {
            self.records.push(*telemetry);
            Ok(())
        }
    }

    struct FailingSink;

    impl DiagnosticsSink for FailingSink {
        fn log(&mut self, _: &Telemetry) -> Result<(), DiagnosticsError> {
            Err(DiagnosticsError::Other(String::from("sink offline")))
        }
    }

    fn params_with_period(sample_period_s: f64) -> Params {
        Params {
            sample_period_s,
            ..Params::default()
        }
    }

    #[test]
    fn test_accelerating() {
        let mut ctrl = TwistCtrl::new(Params::default(), ConstSteering(0.0), NullSink).unwrap();

        let out = ctrl.control(10.0, 0.0, 5.0, 0.0);

        assert!(out.throttle().unwrap() > 0.0);
        assert!(out.throttle().unwrap() <= 1.0);
        assert_eq!(out.brake(), None);
        assert_eq!(ctrl.mode(), Some(DriveMode::Accelerating));
        assert!(!ctrl.report().fast_brake);
        assert!(ctrl.report().mode_changed);
    }

    #[test]
    fn test_braking() {
        let mut ctrl = TwistCtrl::new(Params::default(), ConstSteering(0.0), NullSink).unwrap();

        let out = ctrl.control(0.0, 0.0, 10.0, 0.0);

        assert_eq!(out.throttle(), None);
        assert!(out.brake().unwrap() >= 0.1);
        assert!(out.brake().unwrap() <= 2000.0);
        assert_eq!(ctrl.mode(), Some(DriveMode::Braking));
        assert!(ctrl.report().fast_brake);

        // Throttle controller is kept reset while braking
        assert_eq!(ctrl.throttle_pid().integral(), 0.0);
        assert_eq!(ctrl.throttle_pid().last_error(), 0.0);
    }

    #[test]
    fn test_mutual_exclusion() {
        let mut ctrl = TwistCtrl::new(Params::default(), ConstSteering(0.1), NullSink).unwrap();

        let speeds = [0.0, 0.5, 3.0, 9.9, 10.0, 10.5, 11.1, 25.0];
        let ctes = [-2.0, 0.0, 0.3];

        for &target in speeds.iter() {
            for &current in speeds.iter().rev() {
                for &cte in ctes.iter() {
                    let out = ctrl.control(target, 0.05, current, cte);

                    assert!(out.throttle().is_some() != out.brake().is_some());
                    assert_eq!(Some(out.propulsion.mode()), ctrl.mode());

                    match out.propulsion {
                        Propulsion::Throttle(t) => assert!(t > 0.0 && t <= 1.0),
                        Propulsion::Brake(b) => assert!(b >= 0.1 && b <= 2000.0)
                    }

                    assert!(out.steer_rad.is_finite());
                }
            }
        }
    }

    #[test]
    fn test_fast_brake_clears_integral() {
        let mut ctrl = TwistCtrl::new(params_with_period(1.0), ConstSteering(0.0), NullSink)
            .unwrap();

        // Build up a large throttle integral without saturating
        for _ in 0..150 {
            ctrl.throttle_pid.step(1.0, 1.0);
        }
        assert_eq!(ctrl.throttle_pid().integral(), 150.0);

        // 1.5 m/s too fast: with the integral kept the throttle output would
        // still be positive (-0.3 + 0.7425 - 0.25)
        let out = ctrl.control(8.5, 0.0, 10.0, 0.0);

        assert!(ctrl.report().fast_brake);
        assert_eq!(out.throttle(), None);
        assert!(out.brake().is_some());
    }

    #[test]
    fn test_slow_brake_keeps_integral() {
        let mut ctrl = TwistCtrl::new(params_with_period(1.0), ConstSteering(0.0), NullSink)
            .unwrap();

        for _ in 0..150 {
            ctrl.throttle_pid.step(1.0, 1.0);
        }

        // Only 0.9 m/s too fast, so the integral still holds the throttle on
        let out = ctrl.control(9.1, 0.0, 10.0, 0.0);

        assert!(!ctrl.report().fast_brake);
        assert!(out.throttle().is_some());
        assert_eq!(out.brake(), None);
        assert_relative_eq!(ctrl.throttle_pid().integral(), 149.1, epsilon = 1e-9);
    }

    #[test]
    fn test_mode_switch_resets_other_controller() {
        let mut ctrl = TwistCtrl::new(Params::default(), ConstSteering(0.0), NullSink).unwrap();

        // Brake gently so the brake controller is not saturated
        ctrl.control(9.0, 0.0, 10.5, 0.0);
        assert_eq!(ctrl.mode(), Some(DriveMode::Braking));
        assert!(ctrl.brake_pid().integral() != 0.0);

        ctrl.control(10.0, 0.0, 5.0, 0.0);
        assert_eq!(ctrl.mode(), Some(DriveMode::Accelerating));
        assert!(ctrl.report().mode_changed);
        assert_eq!(ctrl.brake_pid().integral(), 0.0);
        assert_eq!(ctrl.brake_pid().last_error(), 0.0);
    }

    #[test]
    fn test_steering_blend() {
        let mut ctrl = TwistCtrl::new(
            Params::default(), ConstSteering(0.25), RecordingSink::default()
        ).unwrap();

        // Raw = 0.7*0.1 + 0.004*0.1*0.02 + 0.3*0.1/0.02, which passes through
        // the filter on the first cycle
        let out = ctrl.control(10.0, 0.0, 10.0, 0.1);
        let expected_raw = 0.07 + 0.000008 + 1.5;
        assert_relative_eq!(out.steer_rad, 0.25 + expected_raw, epsilon = 1e-9);

        let out_2 = ctrl.control(10.0, 0.0, 10.0, 0.1);

        let records = &ctrl.diagnostics().records;
        assert_eq!(records.len(), 2);

        let first = records[0];
        assert_relative_eq!(first.steer_feedback_raw_rad, expected_raw, epsilon = 1e-9);
        assert_eq!(first.steer_feedback_filtered_rad, first.steer_feedback_raw_rad);
        assert_eq!(first.steer_feedforward_rad, 0.25);
        assert_eq!(first.target_linear_velocity_ms, 10.0);
        assert_eq!(first.current_linear_velocity_ms, 10.0);
        assert_eq!(first.throttle, out.throttle());
        assert_eq!(first.brake, out.brake());

        // Second cycle is blended with a = 1.0 / (1.5 + 1.0)
        let second = records[1];
        assert_relative_eq!(
            second.steer_feedback_filtered_rad,
            0.4 * second.steer_feedback_raw_rad + 0.6 * first.steer_feedback_filtered_rad,
            epsilon = 1e-9
        );
        assert_relative_eq!(out_2.steer_rad, 0.25 + second.steer_feedback_filtered_rad, epsilon = 1e-12);
    }

    #[test]
    fn test_no_error_no_steer() {
        let mut ctrl = TwistCtrl::new(Params::default(), ConstSteering(0.0), NullSink).unwrap();

        for _ in 0..10 {
            assert_eq!(ctrl.control(10.0, 0.0, 10.0, 0.0).steer_rad, 0.0);
        }
    }

    #[test]
    fn test_steer_feedback_saturates() {
        let mut params = Params::default();
        params.max_steer_angle_rad = 0.5;

        let mut ctrl = TwistCtrl::new(params, ConstSteering(0.0), RecordingSink::default())
            .unwrap();
        ctrl.control(10.0, 0.0, 10.0, 100.0);

        assert_eq!(ctrl.diagnostics().records[0].steer_feedback_raw_rad, 0.5);
    }

    #[test]
    fn test_bad_sample_recovers() {
        let mut ctrl = TwistCtrl::new(Params::default(), ConstSteering(0.0), NullSink).unwrap();
        let mut clean = TwistCtrl::new(Params::default(), ConstSteering(0.0), NullSink).unwrap();

        let out = ctrl.control(10.0, 0.0, std::f64::NAN, std::f64::NAN);
        assert_eq!(out.steer_rad, 0.0);
        assert_eq!(out.brake(), Some(0.1));

        // The bad cycle leaves the same state as a cycle with no error
        clean.control(10.0, 0.0, 10.0, 0.0);

        ctrl.control(10.0, 0.0, 9.0, 0.1);
        clean.control(10.0, 0.0, 9.0, 0.1);

        for _ in 0..3 {
            let out = ctrl.control(10.0, 0.0, 9.5, 0.1);
            assert_eq!(out, clean.control(10.0, 0.0, 9.5, 0.1));
            assert!(out.steer_rad.is_finite());
        }
        assert!(ctrl.steer_pid().integral().is_finite());
        assert!(ctrl.throttle_pid().integral().is_finite());
    }

    #[test]
    fn test_failing_diagnostics() {
        let mut ctrl = TwistCtrl::new(Params::default(), ConstSteering(0.1), FailingSink).unwrap();

        let out = ctrl.control(10.0, 0.0, 5.0, 0.0);

        assert!(ctrl.report().diagnostics_failed);
        assert!(out.throttle().is_some());
        assert_relative_eq!(out.steer_rad, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_reset_keeps_brake_and_filter() {
        let mut ctrl = TwistCtrl::new(Params::default(), ConstSteering(0.0), NullSink).unwrap();

        ctrl.control(9.0, 0.0, 10.5, 0.2);
        let brake_integral = ctrl.brake_pid().integral();
        let brake_last_error = ctrl.brake_pid().last_error();
        let filtered = ctrl.steer_filter().get();
        assert!(brake_integral != 0.0);
        assert!(ctrl.steer_pid().integral() != 0.0);

        ctrl.reset();

        assert_eq!(ctrl.mode(), None);
        assert_eq!(ctrl.throttle_pid().integral(), 0.0);
        assert_eq!(ctrl.throttle_pid().last_error(), 0.0);
        assert_eq!(ctrl.steer_pid().integral(), 0.0);
        assert_eq!(ctrl.steer_pid().last_error(), 0.0);
        assert_eq!(ctrl.brake_pid().integral(), brake_integral);
        assert_eq!(ctrl.brake_pid().last_error(), brake_last_error);
        assert_eq!(ctrl.steer_filter().get(), filtered);
    }

    #[test]
    fn test_borrowed_collaborators() {
        let yaw = YawController::new(Params::default().yaw, 8.0).unwrap();
        let mut sink = RecordingSink::default();

        {
            let mut ctrl = TwistCtrl::new(Params::default(), &yaw, &mut sink).unwrap();
            ctrl.control(10.0, 0.1, 10.0, 0.0);
            ctrl.control(10.0, 0.1, 10.0, 0.0);
        }

        assert_eq!(sink.records.len(), 2);
        assert_eq!(
            sink.records[0].steer_feedforward_rad,
            yaw.get_steering(10.0, 0.1, 10.0)
        );
    }

    #[test]
    fn test_invalid_params() {
        let new = |params: Params| {
            TwistCtrl::new(params, ConstSteering(0.0), NullSink).err()
        };

        let mut p = Params::default();
        p.max_steer_angle_rad = 0.0;
        assert_eq!(new(p), Some(TwistCtrlError::InvalidMaxSteerAngle(0.0)));

        assert_eq!(
            new(params_with_period(-0.02)),
            Some(TwistCtrlError::InvalidSamplePeriod(-0.02))
        );

        let mut p = Params::default();
        p.throttle.min_output = 2.0;
        assert_eq!(
            new(p),
            Some(TwistCtrlError::ThrottlePid(PidError::InvalidBounds { min: 2.0, max: 1.0 }))
        );

        let mut p = Params::default();
        p.brake.k_d = std::f64::NAN;
        assert_eq!(new(p), Some(TwistCtrlError::BrakePid(PidError::NonFiniteParam("k_d"))));

        let mut p = Params::default();
        p.steer_filter.tau_s = 0.0;
        assert_eq!(new(p), Some(TwistCtrlError::SteerFilter(LowPassError::InvalidTau(0.0))));

        assert_eq!(new(Params::default()), None);
    }
}
