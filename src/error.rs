//! # Errors
//!
//! Error types shared between the record store, the tracker and the host adapters.
//! None of these are fatal to the host; the engine logs them and carries on.

use std::io;

use thiserror::Error;

/// Errors when asking the host for its live patch list
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EnumerationError {
    /// The count query failed, which means there is no live (stopped) process to enumerate
    #[error("no live process to enumerate patches from")]
    NoProcess,
    /// The count query succeeded but the host failed to hand over the patch list
    #[error("patch enumeration failed")]
    Failed,
}

/// Errors for a single persisted record (or the section as a whole)
#[derive(Debug, Error)]
pub enum RecordError {
    /// The persisted section exists but is not an array of records
    #[error("patch section is not an array")]
    NotAnArray,
    /// The record has no module name, so it can never be matched to a module load
    #[error("record {0} has no module name")]
    MissingModule(usize),
    /// A field is missing or outside of its range
    #[error("record {index} is malformed: {source}")]
    Malformed {
        /// Position of the record in the persisted section
        index: usize,
        /// Underlying decode error
        source: serde_json::Error,
    },
}

/// Errors reading or writing the configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the file failed
    #[error("config file io error: {0}")]
    Io(#[from] io::Error),
    /// The file is not a valid configuration document
    #[error("config file is malformed: {0}")]
    Json(#[from] serde_json::Error),
    /// Toggling was requested before the plugin was initialized
    #[error("plugin is not initialized")]
    NotInitialized,
}

/// Errors for [`crate::host::local::LocalMemory`]
#[derive(Debug, Error)]
pub enum LocalMemoryError {
    /// The address is not mapped, or its protection could not be queried or changed
    #[error("error querying or setting memory protections")]
    ProtectionError(#[from] region::Error),
    /// The address is mapped but not readable
    #[error("address 0x{0:X} is not readable")]
    NotReadable(u64),
    /// The address does not fit in this process' pointer width
    #[error("address 0x{0:X} is out of range for this process")]
    OutOfRange(u64),
}
