//! Applying stored records to a freshly loaded module.
//!
//! Every write is guarded by the expected original byte, so a module that doesn't match the build a patch was made
//! for is left untouched.

use std::fmt;

use crate::host::ProcessMemory;
use crate::record::{ModulePatchIndex, PatchRecord};

/// What happened to a single record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The new byte was written
    Applied,
    /// The byte at the target differs from the expected original byte
    Mismatch {
        /// Byte found at the target
        found: u8,
    },
    /// The target byte couldn't be read
    ReadFailed,
    /// The host rejected the write
    WriteFailed,
    /// `base + offset` doesn't fit in an address
    OutOfRange,
}

/// Counts for one module load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    /// Module the records belong to
    pub module: String,
    /// Records written successfully
    pub applied: usize,
    /// Records stored for the module
    pub total: usize,
}

impl fmt::Display for ApplyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Applied {}/{} patches", self.applied, self.total)
    }
}

/// Applies a single record against a module loaded at `base`
pub fn apply_record<M: ProcessMemory + ?Sized>(
    memory: &mut M,
    record: &PatchRecord,
    base: u64,
) -> ApplyOutcome {
    let Some(va) = base.checked_add(record.offset) else {
        return ApplyOutcome::OutOfRange;
    };

    let found = match memory.read_byte(va) {
        Ok(b) => b,
        Err(e) => {
            log::debug!("failed to read 0x{:X}: {}", va, e);
            return ApplyOutcome::ReadFailed;
        }
    };
    if found != record.original_byte {
        return ApplyOutcome::Mismatch { found };
    }

    match memory.write_byte(va, record.new_byte) {
        Ok(()) => ApplyOutcome::Applied,
        Err(e) => {
            log::debug!("failed to patch 0x{:X}: {}", va, e);
            ApplyOutcome::WriteFailed
        }
    }
}

/// Applies every record of `module` against its base. `None` when the module has no records.
pub fn apply_module<M: ProcessMemory + ?Sized>(
    index: &ModulePatchIndex,
    memory: &mut M,
    module: &str,
    base: u64,
) -> Option<ApplyReport> {
    if !index.contains_module(module) {
        return None;
    }

    let mut report = ApplyReport {
        module: module.to_owned(),
        applied: 0,
        total: 0,
    };
    for record in index.module(module) {
        report.total += 1;
        match apply_record(memory, record, base) {
            ApplyOutcome::Applied => report.applied += 1,
            ApplyOutcome::Mismatch { found } => log::debug!(
                "{}+0x{:X}: expected 0x{:02X}, found 0x{:02X}",
                module,
                record.offset,
                record.original_byte,
                found
            ),
            ApplyOutcome::OutOfRange => log::debug!(
                "{}+0x{:X}: address overflows base 0x{:X}",
                module,
                record.offset,
                base
            ),
            // logged by `apply_record`
            ApplyOutcome::ReadFailed | ApplyOutcome::WriteFailed => {}
        }
    }
    Some(report)
}

#[cfg(test)]
mod tests {
    use super::{apply_module, apply_record, ApplyOutcome};
    use crate::host::mock::MockDebugger;
    use crate::record::{ModulePatchIndex, PatchRecord};

    #[test]
    /// The record lands at `base + offset`
    fn test_translation() {
        let mut host = MockDebugger::new();
        host.map(0x400010, &[0x90]);
        host.map(0x500010, &[0x90]);
        let record = PatchRecord::new("foo.dll", 0x10, 0x90, 0xCC);

        assert_eq!(
            apply_record(&mut host, &record, 0x400000),
            ApplyOutcome::Applied
        );
        assert_eq!(
            apply_record(&mut host, &record, 0x500000),
            ApplyOutcome::Applied
        );
        assert_eq!(host.writes, [(0x400010, 0xCC), (0x500010, 0xCC)]);
    }

    #[test]
    /// Mismatching, unreadable and unwritable targets are skipped
    fn test_skips() {
        let mut host = MockDebugger::new();
        host.map(0x1000, &[0x74, 0x90]);
        host.reject_writes.insert(0x1001);

        let mismatch = PatchRecord::new("a.dll", 0, 0x90, 0xEB);
        let unwritable = PatchRecord::new("a.dll", 1, 0x90, 0xEB);
        let unmapped = PatchRecord::new("a.dll", 2, 0x90, 0xEB);
        let overflow = PatchRecord::new("a.dll", u64::MAX, 0x90, 0xEB);

        assert_eq!(
            apply_record(&mut host, &mismatch, 0x1000),
            ApplyOutcome::Mismatch { found: 0x74 }
        );
        assert_eq!(
            apply_record(&mut host, &unwritable, 0x1000),
            ApplyOutcome::WriteFailed
        );
        assert_eq!(
            apply_record(&mut host, &unmapped, 0x1000),
            ApplyOutcome::ReadFailed
        );
        assert_eq!(
            apply_record(&mut host, &overflow, 0x1000),
            ApplyOutcome::OutOfRange
        );
        assert!(host.writes.is_empty());
    }

    #[test]
    /// A second apply finds the new bytes already in place and writes nothing
    fn test_idempotent() {
        let mut host = MockDebugger::new();
        host.map(0x1000, &[0x90, 0x90, 0x74]);
        let index: ModulePatchIndex = [
            PatchRecord::new("a.dll", 0, 0x90, 0xCC),
            PatchRecord::new("a.dll", 1, 0x90, 0xCC),
            PatchRecord::new("a.dll", 2, 0x90, 0xCC),
        ]
        .into_iter()
        .collect();

        let first = apply_module(&index, &mut host, "a.dll", 0x1000).unwrap();
        assert_eq!((first.applied, first.total), (2, 3));
        assert_eq!(first.to_string(), "Applied 2/3 patches");

        let second = apply_module(&index, &mut host, "a.dll", 0x1000).unwrap();
        assert_eq!((second.applied, second.total), (0, 3));
        assert_eq!(host.writes.len(), 2);
    }

    #[test]
    /// Modules without records are not reported
    fn test_unknown_module() {
        let mut host = MockDebugger::new();
        assert!(apply_module(&ModulePatchIndex::new(), &mut host, "b.dll", 0x1000).is_none());
    }

    #[test]
    /// A record whose address overflows is counted but never written
    fn test_out_of_range_counted() {
        let mut host = MockDebugger::new();
        host.map(0x1000, &[0x90]);
        let index: ModulePatchIndex = [
            PatchRecord::new("a.dll", u64::MAX, 0x90, 0xCC),
            PatchRecord::new("a.dll", 0, 0x90, 0xCC),
        ]
        .into_iter()
        .collect();

        let report = apply_module(&index, &mut host, "a.dll", 0x1000).unwrap();
        assert_eq!((report.applied, report.total), (1, 2));
        assert_eq!(host.writes, [(0x1000, 0xCC)]);
    }
}
