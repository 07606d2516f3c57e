//! # Replay script input source
//!
//! A replay script is a csv file holding one row of controller inputs per
//! control cycle, with a header naming the columns:
//!
//! ```text
//! dbw_enabled,target_linear_velocity_ms,target_angular_velocity_rads,current_linear_velocity_ms,cte_m
//! true,10.0,0.0,5.0,0.0
//! ```
//!
//! The exec consumes one row per cycle, so the script's timing is set by the
//! cycle period rather than by timestamps.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The inputs of one control cycle.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ReplayRow {
    /// False when the safety driver has taken control, in which case the
    /// controller is reset instead of run
    pub dbw_enabled: bool,

    pub target_linear_velocity_ms: f64,

    pub target_angular_velocity_rads: f64,

    pub current_linear_velocity_ms: f64,

    pub cte_m: f64
}

/// A loaded replay script.
pub struct ReplayScript {
    script_path: PathBuf,
    rows: VecDeque<ReplayRow>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Could not find the replay script at {0:?}")]
    ScriptNotFound(PathBuf),

    #[error("Could not open the replay script: {0}")]
    ScriptLoadError(csv::Error),

    #[error("Invalid row {row} in the replay script: {source}")]
    InvalidRow {
        row: usize,
        source: csv::Error
    },

    #[error("The replay script contains no rows")]
    ScriptEmpty
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ReplayScript {
    /// Load a replay script from the given path.
    pub fn new<P: AsRef<Path>>(script_path: P) -> Result<Self, ReplayError> {
        let path = PathBuf::from(script_path.as_ref());

        if !path.exists() {
            return Err(ReplayError::ScriptNotFound(path))
        }

        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_path(&path)
            .map_err(ReplayError::ScriptLoadError)?;

        Self::from_reader(reader, path)
    }

    /// Load a replay script from an in-memory string.
    pub fn parse(script: &str) -> Result<Self, ReplayError> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_reader(script.as_bytes());

        Self::from_reader(reader, PathBuf::new())
    }

    fn from_reader<R: std::io::Read>(
        mut reader: csv::Reader<R>,
        script_path: PathBuf
    ) -> Result<Self, ReplayError> {
        let mut rows = VecDeque::new();

        for (i, result) in reader.deserialize().enumerate() {
            // Row 1 is the header
            let row: ReplayRow = result
                .map_err(|source| ReplayError::InvalidRow { row: i + 2, source })?;
            rows.push_back(row);
        }

        if rows.is_empty() {
            return Err(ReplayError::ScriptEmpty)
        }

        Ok(Self { script_path, rows })
    }

    /// Get the number of rows remaining in the script.
    pub fn get_num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Get the length of the remaining script when played at the given cycle
    /// period.
    pub fn get_duration(&self, cycle_period_s: f64) -> f64 {
        self.rows.len() as f64 * cycle_period_s
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }
}

impl Iterator for ReplayScript {
    type Item = ReplayRow;

    fn next(&mut self) -> Option<ReplayRow> {
        self.rows.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.rows.len(), Some(self.rows.len()))
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const SCRIPT: &str = "\
dbw_enabled, target_linear_velocity_ms, target_angular_velocity_rads, current_linear_velocity_ms, cte_m
# Pull away
true, 10.0, 0.0, 0.0, 0.0
true, 10.0, 0.1, 5.0, -0.2
# Safety driver takes over
false, 10.0, 0.1, 5.5, -0.2
";

    #[test]
    fn test_load_script() {
        let mut script = ReplayScript::parse(SCRIPT).unwrap();

        assert_eq!(script.get_num_rows(), 3);
        assert_eq!(script.get_duration(0.5), 1.5);

        assert_eq!(
            script.next(),
            Some(ReplayRow {
                dbw_enabled: true,
                target_linear_velocity_ms: 10.0,
                target_angular_velocity_rads: 0.0,
                current_linear_velocity_ms: 0.0,
                cte_m: 0.0
            })
        );
        assert_eq!(script.next().map(|r| r.cte_m), Some(-0.2));
        assert_eq!(script.next().map(|r| r.dbw_enabled), Some(false));
        assert_eq!(script.next(), None);
    }

    #[test]
    fn test_invalid_row() {
        let script = "\
dbw_enabled,target_linear_velocity_ms,target_angular_velocity_rads,current_linear_velocity_ms,cte_m
true,10.0,0.0,0.0,0.0
true,fast,0.0,0.0,0.0
";
        match ReplayScript::parse(script) {
            Err(ReplayError::InvalidRow { row, .. }) => assert_eq!(row, 3),
            _ => panic!("Expected an invalid row error")
        }
    }

    #[test]
    fn test_empty_script() {
        let script = "dbw_enabled,target_linear_velocity_ms,target_angular_velocity_rads,\
            current_linear_velocity_ms,cte_m\n";
        assert!(matches!(ReplayScript::parse(script), Err(ReplayError::ScriptEmpty)));
    }

    #[test]
    fn test_missing_script() {
        assert!(matches!(
            ReplayScript::new("/definitely/not/a/replay.csv"),
            Err(ReplayError::ScriptNotFound(_))
        ));
    }

    #[test]
    fn test_shipped_script() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../scripts/stop_and_go.csv");
        let script = ReplayScript::new(path).unwrap();

        assert!(script.get_num_rows() > 0);
        assert_eq!(script.script_path(), Path::new(path));
    }
}
