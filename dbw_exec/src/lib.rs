//! # Drive-by-wire library.
//!
//! This library allows other crates in the workspace (and the benchmarks) to
//! access items defined inside the drive-by-wire crate.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// Replay input source - reads recorded controller inputs from a csv script
pub mod replay;

/// Twist control module - converts velocity commands into throttle, brake and
/// steering demands
pub mod twist_ctrl;
