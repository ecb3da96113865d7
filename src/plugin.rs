//! # Plugin
//!
//! The debugger calls into the plugin through plain callbacks with no user data, so the session has to live in a
//! global. All state sits behind a single mutex: the host serializes its callbacks, but nothing here relies on it.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use lazy_static::lazy_static;
use serde_json::Value;

use crate::config::Config;
use crate::engine::{ApplyReport, AutoPatcher, SaveReport};
use crate::error::ConfigError;
use crate::host::{ModuleResolver, PatchEnumerator, ProcessMemory};

/// A running plugin session
struct Session {
    /// Session state
    patcher: AutoPatcher,
    /// Where the configuration is read from and written to
    config_path: PathBuf,
}

lazy_static! {
    static ref SESSION: Mutex<Option<Session>> = Mutex::new(None);
}

/// Locks the session. A panic in an earlier callback doesn't make the state unusable.
fn session() -> MutexGuard<'static, Option<Session>> {
    SESSION.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs `f` against the session, or does nothing when the plugin isn't initialized
fn with_session<R>(f: impl FnOnce(&mut Session) -> Option<R>) -> Option<R> {
    session().as_mut().and_then(f)
}

/// Starts a new session, reading the configuration at `config_path`.
///
/// A broken configuration file is reported and the defaults are used instead. Any previous session is discarded.
pub fn plugin_init(config_path: &Path) -> bool {
    let config = Config::load(config_path).unwrap_or_else(|e| {
        log::warn!("using default configuration: {}", e);
        Config::default()
    });
    *session() = Some(Session {
        patcher: AutoPatcher::new(config),
        config_path: config_path.to_owned(),
    });
    true
}

/// Tears the session down
pub fn plugin_stop() -> bool {
    *session() = None;
    true
}

/// Whether `auto_export_patches` is on. `None` before [`plugin_init`].
pub fn auto_export() -> Option<bool> {
    with_session(|s| Some(s.patcher.config().auto_export_patches))
}

/// Flips `auto_export_patches` and writes the configuration file. Returns the new value.
pub fn toggle_auto_export() -> Result<bool, ConfigError> {
    let mut guard = session();
    let current = guard.as_mut().ok_or(ConfigError::NotInitialized)?;

    let mut config = current.patcher.config();
    config.auto_export_patches = !config.auto_export_patches;
    config.save(&current.config_path)?;
    current.patcher.set_config(config);
    Ok(config.auto_export_patches)
}

/// Module load callback
pub fn cb_load_dll<M: ProcessMemory + ?Sized>(
    memory: &mut M,
    module: &str,
    base: u64,
) -> Option<ApplyReport> {
    with_session(|s| s.patcher.on_module_load(memory, module, base))
}

/// Process creation callback
pub fn cb_create_process<D: ProcessMemory + ModuleResolver + ?Sized>(
    host: &mut D,
    image_base: u64,
) -> Option<ApplyReport> {
    with_session(|s| s.patcher.on_process_create(host, image_base))
}

/// Process exit callback
pub fn cb_exit_process<E: PatchEnumerator + ?Sized>(host: &E) {
    with_session(|s| {
        s.patcher.on_process_exit(host);
        Some(())
    });
}

/// Database load callback
pub fn cb_load_db(root: &Value) -> Option<usize> {
    with_session(|s| Some(s.patcher.on_load_database(root)))
}

/// Database save callback
pub fn cb_save_db<E: PatchEnumerator + ?Sized>(host: &E, root: &mut Value) -> Option<SaveReport> {
    with_session(|s| s.patcher.on_save_database(host, root))
}
