//! Loading and serializing the persisted patch section.
//!
//! The section is a JSON array of `{ "mod", "addr", "oldbyte", "newbyte" }` objects.
//! A bad record is reported and skipped; it never stops the rest of the section from loading.

use serde::Deserialize;
use serde_json::Value;

use super::{ModulePatchIndex, PatchRecord};
use crate::error::RecordError;

/// Result of loading a persisted section
#[derive(Debug, Default)]
pub struct LoadOutcome {
    /// Every well-formed record
    pub index: ModulePatchIndex,
    /// One entry per record that was skipped
    pub errors: Vec<RecordError>,
}

/// Parses a persisted section into a fresh index.
///
/// `None` (no section yet) and `null` load as an empty index.
pub fn load(section: Option<&Value>) -> LoadOutcome {
    let mut outcome = LoadOutcome::default();

    let entries = match section {
        None | Some(Value::Null) => return outcome,
        Some(Value::Array(entries)) => entries,
        Some(_) => {
            outcome.errors.push(RecordError::NotAnArray);
            return outcome;
        }
    };

    for (index, entry) in entries.iter().enumerate() {
        match parse_record(index, entry) {
            Ok(record) => outcome.index.push(record),
            Err(e) => outcome.errors.push(e),
        }
    }
    outcome
}

/// Parses a single record. Records without a module name are rejected outright.
fn parse_record(index: usize, entry: &Value) -> Result<PatchRecord, RecordError> {
    let has_module = entry
        .get("mod")
        .and_then(Value::as_str)
        .map_or(false, |m| !m.is_empty());
    if !has_module {
        return Err(RecordError::MissingModule(index));
    }

    PatchRecord::deserialize(entry).map_err(|source| RecordError::Malformed { index, source })
}

/// Serializes records, in order, into a persisted section
pub fn serialize<'a>(records: impl IntoIterator<Item = &'a PatchRecord>) -> Value {
    Value::Array(
        records
            .into_iter()
            .map(|r| {
                serde_json::json!({
                    "mod": r.module,
                    "addr": r.offset,
                    "oldbyte": r.original_byte,
                    "newbyte": r.new_byte,
                })
            })
            .collect(),
    )
}
