//! Main drive-by-wire executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logging and parameters
//!     - Initialise the twist controller and its collaborators
//!     - Main loop, once per replay script row:
//!         - If drive-by-wire is enabled run twist control and archive the
//!           demands, otherwise reset the controller
//!         - Sleep until the end of the cycle
//!
//! # Usage
//!
//! ```text
//! dbw_exec <replay_script.csv>
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{Report, eyre::{WrapErr, eyre}};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use dbw_lib::{
    replay::{ReplayRow, ReplayScript},
    twist_ctrl::{self, ArchiveSink, ControlOutput, DriveMode, TwistCtrl, YawController}
};
use util::{
    archive::Archiver,
    logger::{logger_init, LoggerParams},
    session::{self, Session}
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the executable itself.
#[derive(Debug, Deserialize)]
struct ExecParams {
    /// Target period of one cycle.
    ///
    /// Units: seconds
    cycle_period_s: f64,

    /// Number of consecutive overruns after which execution stops
    max_consec_cycle_overruns: u64,

    #[serde(default)]
    logging: LoggerParams
}

/// A row of the demands archive.
#[derive(Serialize)]
struct DemandsRow {
    time_s: f64,
    dbw_enabled: bool,
    mode: Option<DriveMode>,
    throttle: Option<f64>,
    brake: Option<f64>,
    steer_rad: Option<f64>,
    fast_brake: bool
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    let exec_params: ExecParams = util::params::load("dbw_exec.toml")
        .wrap_err("Could not load exec params")?;

    if !(exec_params.cycle_period_s > 0f64) {
        return Err(eyre!(
            "The cycle period must be positive, found {} s", exec_params.cycle_period_s
        ))
    }

    let session = Session::new("dbw_exec", "sessions")
        .wrap_err("Failed to create the session")?;

    logger_init(&exec_params.logging, &session)
        .wrap_err("Failed to initialise logging")?;

    info!("Drive-By-Wire Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD REPLAY SCRIPT ----

    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    if args.len() != 2 {
        return Err(eyre!(
            "Expected a single replay script argument, found {}", args.len() - 1
        ));
    }

    info!("Loading replay script from \"{}\"", &args[1]);

    let script = ReplayScript::new(&args[1])
        .wrap_err("Failed to load the replay script")?;

    info!(
        "Loaded script lasts {:.02} s and contains {} rows\n",
        script.get_duration(exec_params.cycle_period_s),
        script.get_num_rows()
    );

    // ---- INITIALISE TWIST CONTROL ----

    info!("Initialising modules...");

    let twist_params: twist_ctrl::Params = util::params::load("twist_ctrl.toml")
        .wrap_err("Could not load TwistCtrl params")?;

    if (twist_params.sample_period_s - exec_params.cycle_period_s).abs() > 1e-9 {
        warn!(
            "TwistCtrl sample period ({} s) differs from the cycle period ({} s)",
            twist_params.sample_period_s,
            exec_params.cycle_period_s
        );
    }

    let yaw_ctrl = YawController::new(twist_params.yaw, twist_params.max_steer_angle_rad)
        .wrap_err("Failed to initialise the YawController")?;

    let mut telemetry_sink = ArchiveSink::new(
        Archiver::from_path(&session, "twist_ctrl/telemetry.csv")
            .wrap_err("Failed to create the telemetry archive")?
    );

    let mut demands_archive = Archiver::from_path(&session, "twist_ctrl/demands.csv")
        .wrap_err("Failed to create the demands archive")?;

    let mut twist_ctrl = TwistCtrl::new(twist_params, &yaw_ctrl, &mut telemetry_sink)
        .wrap_err("Failed to initialise TwistCtrl")?;
    info!("TwistCtrl init complete");

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let cycle_period = Duration::from_secs_f64(exec_params.cycle_period_s);
    let mut dbw_enabled = false;
    let mut num_cycles: u64 = 0;
    let mut num_consec_cycle_overruns: u64 = 0;

    for row in script {

        let cycle_start_instant = Instant::now();

        if row.dbw_enabled != dbw_enabled {
            info!(
                "Drive-by-wire {} at {:.02} s",
                if row.dbw_enabled { "enabled" } else { "disabled" },
                session::get_elapsed_seconds()
            );
            dbw_enabled = row.dbw_enabled;
        }

        // ---- CONTROL ALGORITHM PROCESSING ----

        let output = if row.dbw_enabled {
            Some(run_twist_ctrl(&mut twist_ctrl, &row))
        }
        else {
            // The safety driver is in control, don't accumulate error
            twist_ctrl.reset();
            None
        };

        // ---- WRITE ARCHIVES ----

        let demands = DemandsRow {
            time_s: session::get_elapsed_seconds(),
            dbw_enabled: row.dbw_enabled,
            mode: twist_ctrl.mode(),
            throttle: output.and_then(|o| o.throttle()),
            brake: output.and_then(|o| o.brake()),
            steer_rad: output.map(|o| o.steer_rad),
            fast_brake: output.is_some() && twist_ctrl.report().fast_brake
        };

        if let Err(e) = demands_archive.serialise(demands) {
            warn!("Could not archive demands: {}", e);
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => {
                num_consec_cycle_overruns = 0;
                thread::sleep(d);
            },
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
                );
                num_consec_cycle_overruns += 1;

                if num_consec_cycle_overruns > exec_params.max_consec_cycle_overruns {
                    return Err(eyre!(
                        "More than {} consecutive cycle overruns",
                        exec_params.max_consec_cycle_overruns
                    ));
                }
            }
        }

        num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    info!("End of replay script reached after {} cycles", num_cycles);

    // Release the borrow of the sink so the writer can be stopped
    drop(twist_ctrl);

    if telemetry_sink.num_dropped() > 0 {
        warn!("{} telemetry records dropped", telemetry_sink.num_dropped());
    }

    match telemetry_sink.stop() {
        Some(n) => info!("{} telemetry records archived", n),
        None => warn!("Telemetry archive may be incomplete")
    }
    info!("{} demand records archived", demands_archive.num_records());

    info!("End of execution");

    Ok(())
}

/// Run one cycle of twist control on a replay row.
fn run_twist_ctrl(
    twist_ctrl: &mut TwistCtrl<&YawController, &mut ArchiveSink>,
    row: &ReplayRow
) -> ControlOutput {
    let output = twist_ctrl.control(
        row.target_linear_velocity_ms,
        row.target_angular_velocity_rads,
        row.current_linear_velocity_ms,
        row.cte_m
    );

    let report = twist_ctrl.report();

    if report.fast_brake {
        debug!(
            "Fast brake, linear velocity error {:.03} m/s",
            report.linear_error_ms
        );
    }

    output
}
