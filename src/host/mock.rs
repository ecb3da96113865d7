//! In-memory debugger used by the tests

use std::collections::{BTreeMap, HashSet};

use thiserror::Error;

use super::{ModuleResolver, PatchEnumerator, ProcessMemory};
use crate::error::EnumerationError;
use crate::tracker::LivePatch;

/// Errors from [`MockDebugger`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MockError {
    /// Nothing is mapped at the address
    #[error("nothing mapped at 0x{0:X}")]
    Unmapped(u64),
    /// The write was rejected on purpose
    #[error("write to 0x{0:X} rejected")]
    Rejected(u64),
}

/// Sparse process memory plus a scripted patch list
#[derive(Debug, Default)]
pub struct MockDebugger {
    /// Mapped bytes
    pub memory: BTreeMap<u64, u8>,
    /// Addresses whose writes fail
    pub reject_writes: HashSet<u64>,
    /// Every successful write, in order
    pub writes: Vec<(u64, u8)>,
    /// Active patches; `None` simulates "no live process"
    pub live: Option<Vec<LivePatch>>,
    /// Makes the fetch fail even though the count succeeds
    pub fail_fetch: bool,
    /// Address ranges of loaded modules
    pub modules: Vec<(String, u64, u64)>,
}

impl MockDebugger {
    /// Creates a debugger with a live but empty patch list
    pub fn new() -> Self {
        Self {
            live: Some(Vec::new()),
            ..Self::default()
        }
    }

    /// Maps `bytes` starting at `address`
    pub fn map(&mut self, address: u64, bytes: &[u8]) {
        for (i, &b) in bytes.iter().enumerate() {
            self.memory.insert(address + i as u64, b);
        }
    }

    /// Registers a module covering `base..base + size`
    pub fn add_module(&mut self, name: &str, base: u64, size: u64) {
        self.modules.push((name.to_owned(), base, size));
    }

    /// Simulates the debuggee going away
    pub fn detach(&mut self) {
        self.live = None;
    }
}

impl ProcessMemory for MockDebugger {
    type Error = MockError;

    fn read_byte(&self, address: u64) -> Result<u8, Self::Error> {
        self.memory
            .get(&address)
            .copied()
            .ok_or(MockError::Unmapped(address))
    }

    fn write_byte(&mut self, address: u64, value: u8) -> Result<(), Self::Error> {
        if self.reject_writes.contains(&address) {
            return Err(MockError::Rejected(address));
        }
        let original = self.read_byte(address)?;
        self.memory.insert(address, value);
        self.writes.push((address, value));

        // the host keeps its own patch list in sync with writes
        let module = self.module_name_at(address).unwrap_or_default();
        if let Some(live) = self.live.as_mut() {
            live.push(LivePatch::new(module, address, original, value));
        }
        Ok(())
    }
}

impl PatchEnumerator for MockDebugger {
    fn patch_count(&self) -> Result<usize, EnumerationError> {
        self.live
            .as_ref()
            .map(Vec::len)
            .ok_or(EnumerationError::NoProcess)
    }

    fn patches(&self) -> Result<Vec<LivePatch>, EnumerationError> {
        if self.fail_fetch {
            return Err(EnumerationError::Failed);
        }
        self.live.clone().ok_or(EnumerationError::NoProcess)
    }
}

impl ModuleResolver for MockDebugger {
    fn module_name_at(&self, address: u64) -> Option<String> {
        self.modules
            .iter()
            .find(|(_, base, size)| (*base..base + size).contains(&address))
            .map(|(name, _, _)| name.clone())
    }
}
