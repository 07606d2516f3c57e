//! Logger initialisation
//!
//! Records are written to the session log file and, optionally, to stdout.
//! Each line is stamped with the number of seconds since the session epoch.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use std::collections::BTreeMap;
use log::info;
use colored::{ColoredString, Colorize};
use serde::Deserialize;
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Logger configuration, usually read from the `[logging]` table of an exec's
/// parameter file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggerParams {
    /// Most verbose level that will be recorded. Must be `Info` or more
    /// verbose so that warnings and errors can never be filtered out.
    pub min_level: LevelFilter,

    /// Mirror the log file onto stdout.
    pub stdout: bool,

    /// Per-target overrides of `min_level`, e.g. to quieten the per-cycle
    /// telemetry of `dbw_lib::twist_ctrl::diagnostics`.
    pub level_for: BTreeMap<String, LevelFilter>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Expected a log level of at least `INFO`, found `{0}`")]
    InvalidMinLogLevel(LevelFilter),

    #[error("Error initialising the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(log::SetLoggerError)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for LoggerParams {
    fn default() -> Self {
        Self {
            min_level: LevelFilter::Debug,
            stdout: true,
            level_for: BTreeMap::new()
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
/// 
/// # Safety
/// 
/// - This function must only be called once, the global logger cannot be
///   replaced.
pub fn logger_init(
    params: &LoggerParams,
    session: &session::Session
) -> Result<(), LoggerInitError> {

    if params.min_level < log::Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(params.min_level))
    }

    let log_file = fern::log_file(&session.log_file_path)
        .map_err(LoggerInitError::LogFileInitError)?;

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            // Targets are only useful when debugging
            if record.level() > log::Level::Info {
                out.finish(format_args!(
                    "[{:10.6} {}] {}: {}",
                    session::get_elapsed_seconds(),
                    level_tag(record.level()),
                    record.target(),
                    message
                ))
            }
            else {
                out.finish(format_args!(
                    "[{:10.6} {}] {}",
                    session::get_elapsed_seconds(),
                    level_tag(record.level()),
                    message
                ))
            }
        })
        .level(params.min_level);

    for (target, level) in params.level_for.iter() {
        dispatch = dispatch.level_for(target.clone(), *level);
    }

    if params.stdout {
        dispatch = dispatch.chain(std::io::stdout());
    }

    dispatch
        .chain(log_file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    if let Some(epoch) = session::get_epoch() {
        info!("    Session epoch: {}", epoch);
    }
    info!("    Log level: {:?}", params.min_level);
    for (target, level) in params.level_for.iter() {
        info!("    Log level for {}: {:?}", target, level);
    }
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the three letter tag of a log level
fn level_tag(level: log::Level) -> ColoredString {
    match level {
        log::Level::Trace => "TRC".dimmed().italic(),
        log::Level::Debug => "DBG".dimmed(),
        log::Level::Info  => "INF".normal(),
        log::Level::Warn  => "WRN".yellow(),
        log::Level::Error => "ERR".red().bold()
    }
}
