//! Generic parameters functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::de::DeserializeOwned;
use std::fs::read_to_string;
use std::path::Path;
use thiserror::Error;
use toml;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("The software root environment variable (DBW_SW_ROOT) is not set")]
    SwRootNotSet,

    #[error("Cannot load the parmeter file: {0}")]
    FileLoadError(std::io::Error),

    #[error("Cannot read the parameter file: {0}")]
    DeserialiseError(toml::de::Error)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load a parameter file
///
/// The file path is relative to the "$DBW_SW_ROOT/params" directory
pub fn load<P>(param_file_path: &str) -> Result<P, LoadError> 
where
    P: DeserializeOwned
{
    // Get the params dir
    let mut path = crate::host::get_dbw_sw_root()
        .map_err(|_| LoadError::SwRootNotSet)?;
    path.push("params");
    path.push(param_file_path);

    load_from_path(path)
}

/// Load a parameter file from an explicit path, bypassing the params
/// directory.
pub fn load_from_path<P, T>(path: T) -> Result<P, LoadError>
where
    P: DeserializeOwned,
    T: AsRef<Path>
{
    // Load the file into a string
    let params_str = match read_to_string(path) {
        Ok(s) => s,
        Err(e) => return Err(LoadError::FileLoadError(e))
    };

    // Parse the string into the parameter struct
    match toml::from_str(params_str.as_str()) {
        Ok(p) => Ok(p),
        Err(e) => Err(LoadError::DeserialiseError(e))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct TestParams {
        gain: f64,
        name: String
    }

    #[test]
    fn test_load_from_path() {
        let mut path = std::env::temp_dir();
        path.push(format!("util_params_test_{}.toml", std::process::id()));
        std::fs::write(&path, "gain = 0.5\nname = \"throttle\"\n").unwrap();

        let p: TestParams = load_from_path(&path).unwrap();
        assert_eq!(p.gain, 0.5);
        assert_eq!(p.name, "throttle");

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_missing_file() {
        let res: Result<TestParams, _> = load_from_path("/this/file/does/not/exist.toml");
        assert!(matches!(res, Err(LoadError::FileLoadError(_))));
    }
}
