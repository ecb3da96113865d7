//! # Tracker
//!
//! Mirrors the host's address-resolved view of the session: the latest base of every loaded module
//! and the last patch list the host managed to enumerate.

use std::collections::HashMap;

use crate::error::EnumerationError;
use crate::host::PatchEnumerator;

/// A patch as the host reports it, at an absolute address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LivePatch {
    /// Module the address belongs to. Empty when the host couldn't associate one.
    pub module: String,
    /// Absolute virtual address
    pub address: u64,
    /// Byte before patching
    pub original_byte: u8,
    /// Byte after patching
    pub new_byte: u8,
}
impl LivePatch {
    /// Creates a new live patch
    pub fn new(module: impl Into<String>, address: u64, original_byte: u8, new_byte: u8) -> Self {
        Self {
            module: module.into(),
            address,
            original_byte,
            new_byte,
        }
    }
}

/// Module name -> most recently observed load base
pub type ModuleBaseTable = HashMap<String, u64>;

/// Where a snapshot of the live patch set came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchSource {
    /// The host enumerated the live process just now
    LiveEnumeration,
    /// The host can't enumerate; this is what it reported at the last process exit
    CachedSnapshot,
    /// Nothing has been observed this session, so the stored records are still the best knowledge
    StoredRecords,
}

/// A patch set together with where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Origin of `patches`
    pub source: PatchSource,
    /// Patches at absolute addresses. Always empty for [`PatchSource::StoredRecords`].
    pub patches: Vec<LivePatch>,
}
impl Snapshot {
    /// Creates a snapshot
    pub fn new(source: PatchSource, patches: Vec<LivePatch>) -> Self {
        Self { source, patches }
    }
}

/// Tracks module bases and the cached patch snapshot
#[derive(Debug, Clone, Default)]
pub struct LivePatchTracker {
    /// Latest base of every module seen loading
    bases: ModuleBaseTable,
    /// Last successfully enumerated patch set. `None` until the first enumeration.
    cached: Option<Vec<LivePatch>>,
}

impl LivePatchTracker {
    /// Creates an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the tracked base of `module`
    pub fn record_module_base(&mut self, module: &str, base: u64) {
        self.bases.insert(module.to_owned(), base);
    }

    /// Latest base of `module`, if it was seen loading
    pub fn module_base(&self, module: &str) -> Option<u64> {
        self.bases.get(module).copied()
    }

    /// The whole base table
    pub fn bases(&self) -> &ModuleBaseTable {
        &self.bases
    }

    /// Forgets every base and the cached snapshot. Both describe addresses of a previous process, so they are
    /// dropped together when a new one starts.
    pub fn reset(&mut self) {
        self.bases.clear();
        self.cached = None;
    }

    /// The cached snapshot, if one was captured
    pub fn cached(&self) -> Option<&[LivePatch]> {
        self.cached.as_deref()
    }

    /// Captures the live patch set into the cache, as done on process exit.
    ///
    /// If the count query fails the previous cache is left alone. If only the fetch fails the cache is emptied,
    /// because the host claimed patches exist but wouldn't give them out.
    pub fn capture<E: PatchEnumerator + ?Sized>(
        &mut self,
        host: &E,
    ) -> Result<usize, EnumerationError> {
        host.patch_count()?;
        match host.patches() {
            Ok(patches) => {
                let count = patches.len();
                self.cached = Some(patches);
                Ok(count)
            }
            Err(e) => {
                self.cached = Some(Vec::new());
                Err(e)
            }
        }
    }

    /// Takes a snapshot of the live patch set, falling back to the cache when the host can't enumerate.
    ///
    /// A successful live enumeration refreshes the cache. A failed fetch after a successful count is an error:
    /// the process is live, so neither the cache nor the stored records can be trusted to be current.
    pub fn snapshot<E: PatchEnumerator + ?Sized>(
        &mut self,
        host: &E,
    ) -> Result<Snapshot, EnumerationError> {
        match host.patch_count() {
            Ok(count) => {
                let patches = host.patches()?;
                if patches.len() != count {
                    log::debug!(
                        "host reported {} patches but enumerated {}",
                        count,
                        patches.len()
                    );
                }
                self.cached = Some(patches.clone());
                Ok(Snapshot::new(PatchSource::LiveEnumeration, patches))
            }
            Err(e) => {
                log::debug!("live enumeration unavailable ({}), using cached patches", e);
                Ok(match &self.cached {
                    Some(patches) => Snapshot::new(PatchSource::CachedSnapshot, patches.clone()),
                    None => Snapshot::new(PatchSource::StoredRecords, Vec::new()),
                })
            }
        }
    }
}
