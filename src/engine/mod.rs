//! # Engine
//!
//! [`AutoPatcher`] owns the session state and exposes one entry point per host notification.
//! Every entry point runs to completion synchronously and handles its own failures; nothing is propagated to the host.

use serde_json::Value;

use crate::config::Config;
use crate::error::EnumerationError;
use crate::host::{ModuleResolver, PatchEnumerator, ProcessMemory};
use crate::record::{store, ModulePatchIndex};
use crate::tracker::{LivePatchTracker, PatchSource};

pub mod apply;
pub mod persist;

pub use apply::{ApplyOutcome, ApplyReport};
pub use persist::{Conversion, DropReason, SaveReport};

/// Key of the plugin's section in the host's database document
pub const PLUGIN_NAME: &str = "AutoExportPatches";

/// Session state: stored records, tracked bases and the cached exit snapshot
#[derive(Debug, Clone, Default)]
pub struct AutoPatcher {
    /// Records loaded from (or last written to) the database
    index: ModulePatchIndex,
    /// Module bases and cached live patches
    tracker: LivePatchTracker,
    /// Plugin configuration
    config: Config,
}

impl AutoPatcher {
    /// Creates an empty session
    pub fn new(config: Config) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Stored records
    pub fn index(&self) -> &ModulePatchIndex {
        &self.index
    }

    /// Tracked bases and cached snapshot
    pub fn tracker(&self) -> &LivePatchTracker {
        &self.tracker
    }

    /// Current configuration
    pub fn config(&self) -> Config {
        self.config
    }

    /// Replaces the configuration
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    /// Records the new base of `module` and applies its stored records there.
    ///
    /// The base is recorded even when the module has no records, so patches made later by hand can still be saved.
    pub fn apply_patches_for_module<M: ProcessMemory + ?Sized>(
        &mut self,
        memory: &mut M,
        module: &str,
        base: u64,
    ) -> Option<ApplyReport> {
        self.tracker.record_module_base(module, base);
        apply::apply_module(&self.index, memory, module, base)
    }

    /// Host notification: a module was loaded at `base`
    pub fn on_module_load<M: ProcessMemory + ?Sized>(
        &mut self,
        memory: &mut M,
        module: &str,
        base: u64,
    ) -> Option<ApplyReport> {
        let report = self.apply_patches_for_module(memory, module, base)?;
        log::info!("{}: {}", report.module, report);
        Some(report)
    }

    /// Host notification: a new process was created with its main image at `image_base`.
    ///
    /// Bases and the exit snapshot from the previous run are dropped. The image name is resolved through the host so it matches the
    /// names used in the database.
    pub fn on_process_create<D: ProcessMemory + ModuleResolver + ?Sized>(
        &mut self,
        host: &mut D,
        image_base: u64,
    ) -> Option<ApplyReport> {
        self.tracker.reset();
        let Some(module) = host.module_name_at(image_base) else {
            log::warn!("no module name for image base 0x{:X}", image_base);
            return None;
        };
        self.on_module_load(host, &module, image_base)
    }

    /// Host notification: the debuggee exited. Captures the live patch set while the host still has it.
    pub fn on_process_exit<E: PatchEnumerator + ?Sized>(&mut self, host: &E) {
        match self.tracker.capture(host) {
            Ok(count) => log::debug!("captured {} patches at process exit", count),
            Err(e) => log::warn!("failed to capture patches at process exit: {}", e),
        }
    }

    /// Host notification: the database was loaded. Replaces every stored record with the ones in `root`.
    pub fn on_load_database(&mut self, root: &Value) -> usize {
        let outcome = store::load(root.get(PLUGIN_NAME));
        for e in &outcome.errors {
            log::warn!("skipping stored patch: {}", e);
        }
        self.index = outcome.index;
        log::info!("loaded {} patches from database", self.index.len());
        self.index.len()
    }

    /// Builds the section to save, from the live process if possible and the exit snapshot otherwise.
    ///
    /// On success the stored records are replaced by the saved ones.
    pub fn persist<E: PatchEnumerator + ?Sized>(
        &mut self,
        host: &E,
    ) -> Result<SaveReport, EnumerationError> {
        let snapshot = self.tracker.snapshot(host)?;
        let report = match snapshot.source {
            PatchSource::StoredRecords => {
                SaveReport::new(PatchSource::StoredRecords, self.index.records(), 0)
            }
            source => {
                let conversion = persist::relativize(&snapshot.patches, self.tracker.bases());
                let report = SaveReport::new(source, &conversion.records, conversion.skipped);
                self.index = conversion.records.into_iter().collect();
                report
            }
        };
        Ok(report)
    }

    /// Host notification: the database is being saved. Writes the plugin's section into `root`.
    ///
    /// With `auto_export_patches` off the stored records are written back unchanged. If the live process can't be
    /// enumerated the document is left untouched.
    pub fn on_save_database<E: PatchEnumerator + ?Sized>(
        &mut self,
        host: &E,
        root: &mut Value,
    ) -> Option<SaveReport> {
        let Some(document) = root.as_object_mut() else {
            log::warn!("database root is not an object, not saving patches");
            return None;
        };

        let report = if self.config.auto_export_patches {
            match self.persist(host) {
                Ok(report) => report,
                Err(e) => {
                    log::warn!("not saving patches: {}", e);
                    return None;
                }
            }
        } else {
            SaveReport::new(PatchSource::StoredRecords, self.index.records(), 0)
        };

        document.insert(PLUGIN_NAME.to_owned(), report.section.clone());
        log::info!(
            "saved {} patches to database ({} skipped)",
            report.saved,
            report.skipped
        );
        Some(report)
    }
}
