//! # Host
//!
//! The primitives the debugger has to provide. Addresses here are always absolute virtual addresses in the debuggee.

use crate::error::EnumerationError;
use crate::tracker::LivePatch;

pub mod local;
#[cfg(test)]
pub(crate) mod mock;

/// Single-byte access to the debuggee's memory
pub trait ProcessMemory {
    /// Error type for failed reads and writes
    type Error: std::error::Error;

    /// Reads one byte at `address`
    fn read_byte(&self, address: u64) -> Result<u8, Self::Error>;

    /// Writes one byte at `address`. The host is expected to register the write in its own patch list.
    fn write_byte(&mut self, address: u64, value: u8) -> Result<(), Self::Error>;
}

/// Access to the host's list of currently applied patches
pub trait PatchEnumerator {
    /// Number of active patches.
    ///
    /// Fails with [`EnumerationError::NoProcess`] when no process is live and stopped.
    fn patch_count(&self) -> Result<usize, EnumerationError>;

    /// Every active patch
    fn patches(&self) -> Result<Vec<LivePatch>, EnumerationError>;
}

/// Resolution of module names from addresses
pub trait ModuleResolver {
    /// Name of the module containing `address`, in the same form the host uses for patch tags
    fn module_name_at(&self, address: u64) -> Option<String>;
}
