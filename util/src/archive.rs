//! Csv archiving functionality
//!
//! An `Archiver` appends `serde::Serialize` records as rows of a csv file
//! inside the session's archive directory. The header row is written from the
//! field names of the first record, so archived records must be flat structs.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use std::path::Path;
use std::fs::File;
use csv::WriterBuilder;
pub use csv::Writer;
use serde::Serialize;
use thiserror::Error;

// Internal imports
use crate::session::Session;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An object used to write CSV archive files.
pub struct Archiver {
    writer: Writer<File>,

    /// Number of records written so far
    num_records: u64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors that can occur while archiving.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Cannot create the archive file: {0}")]
    CreateError(std::io::Error),

    #[error("Cannot write the record to the archive: {0}")]
    WriteError(csv::Error),

    #[error("Cannot flush the archive: {0}")]
    FlushError(std::io::Error)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Archiver {
    /// Create a new archiver from a paricular path relative to the session's
    /// archive root.
    ///
    /// Any missing parent directories are created. An existing file is 
    /// truncated.
    pub fn from_path<P: AsRef<Path>>(
        session: &Session, path: P
    ) -> Result<Self, ArchiveError> {
        let mut session_path = session.arch_root.clone();
        session_path.push(path);

        Self::from_file_path(session_path)
    }

    /// Create a new archiver writing to an absolute file path.
    pub fn from_file_path<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(ArchiveError::CreateError)?;
        }

        let file = File::create(path).map_err(ArchiveError::CreateError)?;

        let writer = WriterBuilder::new()
            .has_headers(true)
            .from_writer(file);

        Ok(Self {
            writer,
            num_records: 0
        })
    }

    /// Serialise a record into the archive.
    ///
    /// The file is flushed after every record so that archives remain usable
    /// if the exec is killed.
    pub fn serialise<T: Serialize>(
        &mut self, record: T
    ) -> Result<(), ArchiveError> {
        self.writer.serialize(record).map_err(ArchiveError::WriteError)?;
        self.writer.flush().map_err(ArchiveError::FlushError)?;
        self.num_records += 1;

        Ok(())
    }

    /// Get the number of records written so far.
    pub fn num_records(&self) -> u64 {
        self.num_records
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Serialize)]
    struct Record {
        time_s: f64,
        throttle: Option<f64>,
        brake: Option<f64>
    }

    #[test]
    fn test_archive_records() {
        let mut path = std::env::temp_dir();
        path.push(format!("util_archive_test_{}", std::process::id()));
        path.push("records.csv");

        let mut arch = Archiver::from_file_path(&path).unwrap();
        arch.serialise(Record { time_s: 0.0, throttle: Some(0.5), brake: None }).unwrap();
        arch.serialise(Record { time_s: 0.1, throttle: None, brake: Some(100.0) }).unwrap();
        assert_eq!(arch.num_records(), 2);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines, vec![
            "time_s,throttle,brake",
            "0.0,0.5,",
            "0.1,,100.0"
        ]);

        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }
}
