//! # Record
//!
//! Module-relative patch records and the per-module index they are grouped into.
//! Records never carry absolute addresses; the base is only known once the module loads.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub mod store;

/// A single-byte patch, relative to the base of the module it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatchRecord {
    /// Module name as reported by the host
    #[serde(rename = "mod")]
    pub module: String,
    /// Offset from the module base
    #[serde(rename = "addr")]
    pub offset: u64,
    /// Byte expected at the location before patching
    #[serde(rename = "oldbyte")]
    pub original_byte: u8,
    /// Byte written at the location
    #[serde(rename = "newbyte")]
    pub new_byte: u8,
}
impl PatchRecord {
    /// Creates a new record
    pub fn new(module: impl Into<String>, offset: u64, original_byte: u8, new_byte: u8) -> Self {
        Self {
            module: module.into(),
            offset,
            original_byte,
            new_byte,
        }
    }
}

/// Records grouped by module name.
///
/// The flat insertion order is kept alongside the grouping so the index can be written back in the order it was read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModulePatchIndex {
    /// Every record, in insertion order
    records: Vec<PatchRecord>,
    /// Module name -> positions in `records`
    by_module: HashMap<String, Vec<usize>>,
}

impl ModulePatchIndex {
    /// Creates an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record to the end of its module's sequence
    pub fn push(&mut self, record: PatchRecord) {
        self.by_module
            .entry(record.module.clone())
            .or_default()
            .push(self.records.len());
        self.records.push(record);
    }

    /// Records for `module`, in insertion order. Empty when the module has no patches.
    pub fn module(&self, module: &str) -> impl Iterator<Item = &PatchRecord> + '_ {
        self.by_module
            .get(module)
            .into_iter()
            .flatten()
            .map(move |&i| &self.records[i])
    }

    /// Whether any records exist for `module`
    pub fn contains_module(&self, module: &str) -> bool {
        self.by_module.contains_key(module)
    }

    /// Every record, in insertion order
    pub fn records(&self) -> &[PatchRecord] {
        &self.records
    }

    /// Total number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of distinct modules
    pub fn module_count(&self) -> usize {
        self.by_module.len()
    }
}

impl FromIterator<PatchRecord> for ModulePatchIndex {
    fn from_iter<T: IntoIterator<Item = PatchRecord>>(iter: T) -> Self {
        let mut index = Self::new();
        for record in iter {
            index.push(record);
        }
        index
    }
}
