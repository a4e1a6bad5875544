//! Error module for the spike2h5 library.
use std::error::Error;
use std::fmt;

/// Error types for the library.
#[derive(Debug, PartialEq)]
pub enum WranglingError {
    /// Error for I/O operations, e.g., a missing input file.
    IOError(String),
    /// Error for malformed MATLAB files.
    MatFormat(String),
    /// A variable expected in a MATLAB file is absent.
    MissingVariable(String),
    /// Error for a session whose content does not have the expected layout, e.g., a spike table with a single column.
    InvalidSession(String),
    /// No session file matches the requested pattern or index.
    SessionNotFound(String),
    /// Error for invalid parameters, e.g., split ratios not summing to one.
    InvalidParameter(String),
    /// Error raised by the HDF5 library.
    Hdf5Error(String),
    /// Error while reading or writing a configuration file.
    ConfigError(String),
    /// An output file does not match its source session.
    VerificationFailed(String),
}

impl fmt::Display for WranglingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WranglingError::IOError(e) => write!(f, "I/O error: {}", e),
            WranglingError::MatFormat(e) => write!(f, "Malformed MAT file: {}", e),
            WranglingError::MissingVariable(e) => write!(f, "Missing variable: {}", e),
            WranglingError::InvalidSession(e) => write!(f, "Invalid session: {}", e),
            WranglingError::SessionNotFound(e) => write!(f, "Session not found: {}", e),
            WranglingError::InvalidParameter(e) => write!(f, "Invalid parameters: {}", e),
            WranglingError::Hdf5Error(e) => write!(f, "HDF5 error: {}", e),
            WranglingError::ConfigError(e) => write!(f, "Configuration error: {}", e),
            WranglingError::VerificationFailed(e) => write!(f, "Verification failed: {}", e),
        }
    }
}

impl Error for WranglingError {}

impl From<std::io::Error> for WranglingError {
    fn from(e: std::io::Error) -> Self {
        WranglingError::IOError(e.to_string())
    }
}

impl From<hdf5::Error> for WranglingError {
    fn from(e: hdf5::Error) -> Self {
        WranglingError::Hdf5Error(e.to_string())
    }
}
