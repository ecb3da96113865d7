//! Converting the live patch set back into module-relative records.
//!
//! Both save triggers end up here; they only differ in where the [`Snapshot`](crate::tracker::Snapshot) came from.

use std::fmt;

use serde_json::Value;

use crate::record::{store, PatchRecord};
use crate::tracker::{LivePatch, ModuleBaseTable, PatchSource};

/// Records produced from a live patch set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversion {
    /// Patches that could be expressed relative to a module
    pub records: Vec<PatchRecord>,
    /// Patches without a module tag, without a known base, or below their module's base
    pub skipped: usize,
}

/// Why a live patch couldn't be turned into a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The host didn't associate the patch with any module
    NoModule,
    /// The module was never seen loading this session
    UnknownBase,
    /// The address lies below the module's base
    BelowBase(u64),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::NoModule => write!(f, "no module"),
            DropReason::UnknownBase => write!(f, "no module base"),
            DropReason::BelowBase(base) => write!(f, "below module base 0x{:X}", base),
        }
    }
}

/// Converts absolute patches to module-relative records using the latest known bases
pub fn relativize(patches: &[LivePatch], bases: &ModuleBaseTable) -> Conversion {
    let mut conversion = Conversion::default();
    for patch in patches {
        match relativize_one(patch, bases) {
            Ok(record) => conversion.records.push(record),
            Err(reason) => {
                log::debug!(
                    "dropping patch at 0x{:X} ({:?}): {}",
                    patch.address,
                    patch.module,
                    reason
                );
                conversion.skipped += 1;
            }
        }
    }
    conversion
}

/// Converts a single patch relative to its module's base
fn relativize_one(patch: &LivePatch, bases: &ModuleBaseTable) -> Result<PatchRecord, DropReason> {
    if patch.module.is_empty() {
        return Err(DropReason::NoModule);
    }
    let base = *bases.get(&patch.module).ok_or(DropReason::UnknownBase)?;
    let offset = patch
        .address
        .checked_sub(base)
        .ok_or(DropReason::BelowBase(base))?;
    Ok(PatchRecord::new(
        patch.module.clone(),
        offset,
        patch.original_byte,
        patch.new_byte,
    ))
}

/// Result of a save
#[derive(Debug, Clone, PartialEq)]
pub struct SaveReport {
    /// Where the saved patches came from
    pub source: PatchSource,
    /// The serialized section
    pub section: Value,
    /// Records written
    pub saved: usize,
    /// Live patches dropped during conversion
    pub skipped: usize,
}

impl SaveReport {
    /// Builds a report for `records`
    pub fn new(source: PatchSource, records: &[PatchRecord], skipped: usize) -> Self {
        Self {
            source,
            section: store::serialize(records),
            saved: records.len(),
            skipped,
        }
    }
}
