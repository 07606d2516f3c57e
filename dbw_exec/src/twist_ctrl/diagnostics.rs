//! # Twist controller diagnostics
//!
//! Every control cycle the twist controller hands a `Telemetry` record to a
//! `DiagnosticsSink`. Sinks are for observation only: nothing they do can
//! change the control output, and any error they return is reported and then
//! dropped by the controller.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};
use serde::Serialize;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};

// Internal
use util::{archive::Archiver, session};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of records the `ArchiveSink` queue holds before new records are
/// dropped. Ten seconds of telemetry at 50 Hz.
pub const ARCHIVE_QUEUE_CAPACITY: usize = 500;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A consumer of per-cycle twist controller telemetry.
pub trait DiagnosticsSink {
    /// Record the telemetry of one control cycle.
    ///
    /// Implementations must not block the control cycle.
    fn log(&mut self, telemetry: &Telemetry) -> Result<(), DiagnosticsError>;
}

impl<T: DiagnosticsSink + ?Sized> DiagnosticsSink for &mut T {
    fn log(&mut self, telemetry: &Telemetry) -> Result<(), DiagnosticsError> {
        (**self).log(telemetry)
    }
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Telemetry produced by one twist controller cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Telemetry {
    /// Steer PID output before filtering
    pub steer_feedback_raw_rad: f64,

    /// Steer PID output after the low pass filter
    pub steer_feedback_filtered_rad: f64,

    /// Feed-forward steering angle
    pub steer_feedforward_rad: f64,

    pub current_linear_velocity_ms: f64,

    pub target_linear_velocity_ms: f64,

    /// Throttle demand, `None` when braking
    pub throttle: Option<f64>,

    /// Brake demand, `None` when accelerating
    pub brake: Option<f64>
}

/// Sink which discards all telemetry.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

/// Sink which writes telemetry to the log at debug level.
///
/// Only one in every `log_every_n_cycles` records is written so that the log
/// isn't flooded at high control rates.
#[derive(Debug, Clone)]
pub struct LogSink {
    log_every_n_cycles: u64,
    num_cycles: u64,
    num_logged: u64
}

/// Sink which archives every record into a csv file.
///
/// Records are stamped with the session time and queued onto a bounded
/// channel drained by a background writer thread, so `log` never waits on the
/// file system. When the queue is full the record is dropped.
pub struct ArchiveSink {
    sender: Option<SyncSender<ArchiveRow>>,
    writer_handle: Option<JoinHandle<u64>>,
    num_dropped: u64
}

/// A row of the telemetry archive.
#[derive(Debug, Serialize)]
struct ArchiveRow {
    time_s: f64,
    steer_feedback_raw_rad: f64,
    steer_feedback_filtered_rad: f64,
    steer_feedforward_rad: f64,
    current_linear_velocity_ms: f64,
    target_linear_velocity_ms: f64,
    throttle: Option<f64>,
    brake: Option<f64>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised by diagnostics sinks.
#[derive(Debug, thiserror::Error)]
pub enum DiagnosticsError {
    #[error("The telemetry writer has stopped")]
    Disconnected,

    #[error("The telemetry queue is full, record dropped")]
    QueueFull,

    #[error("Diagnostics sink failure: {0}")]
    Other(String)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DiagnosticsSink for NullSink {
    fn log(&mut self, _telemetry: &Telemetry) -> Result<(), DiagnosticsError> {
        Ok(())
    }
}

impl LogSink {
    /// Create a new log sink. A rate of zero is treated as one, i.e. every
    /// record is logged.
    pub fn new(log_every_n_cycles: u64) -> Self {
        Self {
            log_every_n_cycles: log_every_n_cycles.max(1),
            num_cycles: 0,
            num_logged: 0
        }
    }

    /// Number of records which have been written to the log.
    pub fn num_logged(&self) -> u64 {
        self.num_logged
    }
}

impl DiagnosticsSink for LogSink {
    fn log(&mut self, telemetry: &Telemetry) -> Result<(), DiagnosticsError> {
        if self.num_cycles % self.log_every_n_cycles == 0 {
            debug!(
                "steer raw: {:.4}, filt: {:.4}, ff: {:.4} | v: {:.3}/{:.3} m/s | throttle: {:?}, brake: {:?}",
                telemetry.steer_feedback_raw_rad,
                telemetry.steer_feedback_filtered_rad,
                telemetry.steer_feedforward_rad,
                telemetry.current_linear_velocity_ms,
                telemetry.target_linear_velocity_ms,
                telemetry.throttle,
                telemetry.brake
            );
            self.num_logged += 1;
        }

        self.num_cycles += 1;

        Ok(())
    }
}

impl ArchiveSink {
    /// Start the background writer, which takes ownership of the archiver.
    pub fn new(archiver: Archiver) -> Self {
        Self::with_capacity(archiver, ARCHIVE_QUEUE_CAPACITY)
    }

    /// Start the background writer with a queue of the given length.
    pub fn with_capacity(archiver: Archiver, capacity: usize) -> Self {
        let (tx, rx) = sync_channel(capacity);

        let writer_handle = thread::spawn(move || writer_thread(archiver, rx));

        Self {
            sender: Some(tx),
            writer_handle: Some(writer_handle),
            num_dropped: 0
        }
    }

    /// Number of records dropped because the queue was full.
    pub fn num_dropped(&self) -> u64 {
        self.num_dropped
    }

    /// Stop the writer once all queued records have been written, returning
    /// the number of records in the archive.
    pub fn stop(mut self) -> Option<u64> {
        self.close()
    }

    fn close(&mut self) -> Option<u64> {
        // Dropping the sender ends the writer's receive loop
        self.sender.take();

        match self.writer_handle.take() {
            Some(h) => match h.join() {
                Ok(n) => Some(n),
                Err(_) => {
                    warn!("Telemetry writer thread panicked");
                    None
                }
            },
            None => None
        }
    }
}

impl DiagnosticsSink for ArchiveSink {
    fn log(&mut self, telemetry: &Telemetry) -> Result<(), DiagnosticsError> {
        let sender = match self.sender {
            Some(ref s) => s,
            None => return Err(DiagnosticsError::Disconnected)
        };

        // Stamp now rather than on the writer, which may be behind
        let row = ArchiveRow::new(session::get_elapsed_seconds(), telemetry);

        match sender.try_send(row) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.num_dropped += 1;
                Err(DiagnosticsError::QueueFull)
            },
            Err(TrySendError::Disconnected(_)) => Err(DiagnosticsError::Disconnected)
        }
    }
}

impl Drop for ArchiveSink {
    fn drop(&mut self) {
        self.close();
    }
}

impl ArchiveRow {
    fn new(time_s: f64, t: &Telemetry) -> Self {
        Self {
            time_s,
            steer_feedback_raw_rad: t.steer_feedback_raw_rad,
            steer_feedback_filtered_rad: t.steer_feedback_filtered_rad,
            steer_feedforward_rad: t.steer_feedforward_rad,
            current_linear_velocity_ms: t.current_linear_velocity_ms,
            target_linear_velocity_ms: t.target_linear_velocity_ms,
            throttle: t.throttle,
            brake: t.brake
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Drain the telemetry channel into the archive until every sender is gone.
fn writer_thread(mut archiver: Archiver, receiver: Receiver<ArchiveRow>) -> u64 {
    for row in receiver.iter() {
        if let Err(e) = archiver.serialise(row) {
            warn!("Could not archive twist controller telemetry: {}", e);
        }
    }

    archiver.num_records()
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
