//! # entryswap-native
//!
//! Native plugin loaded by the host runtime. Exports the three symbols the
//! managed side binds with `DllImport`:
//!
//! - `__IL2CPP_HOOK(site)`   install on a three-word control block
//! - `__IL2CPP_UNHOOK(site)` uninstall on the same block
//! - `__IL2CPP_LOG(text)`    append a line to the diagnostic log
//!
//! All exports use `extern "system"`: `__stdcall` on 32-bit Windows, the
//! platform C convention everywhere else.
//!
//! The hook exports perform no validation. A null or dangling block, or
//! handles that do not point at live method descriptors, is undefined
//! behaviour, exactly as for [`entryswap_core::install`]. Calls touching the
//! same descriptor must be serialized by the host.

// Export names are fixed by the managed side's DllImport declarations.
#![allow(non_snake_case)]
#![allow(clippy::missing_safety_doc)]

pub mod diag;

use once_cell::sync::Lazy;
use std::ffi::{c_char, CStr};
use std::sync::Arc;

use entryswap_core::{ControlBlock, DiagnosticSink};

pub use diag::DiagnosticLog;

/// Process-wide diagnostic sink, configured once on first use.
static DIAGNOSTICS: Lazy<DiagnosticLog> = Lazy::new(|| {
    let cfg = entryswap_config::config();
    entryswap_config::init_logging(cfg.logging.level);
    DiagnosticLog::from_config(&cfg.diagnostics)
});

pub fn diagnostics() -> &'static DiagnosticLog {
    &DIAGNOSTICS
}

/// The process-wide log as a [`entryswap_core::Hook`] diagnostic sink.
pub fn diagnostic_sink() -> DiagnosticSink {
    Arc::new(|line: &str| diagnostics().append(line))
}

#[no_mangle]
pub unsafe extern "system" fn __IL2CPP_HOOK(site: *mut ControlBlock) {
    entryswap_core::install(&mut *site);
}

#[no_mangle]
pub unsafe extern "system" fn __IL2CPP_UNHOOK(site: *mut ControlBlock) {
    entryswap_core::uninstall(&mut *site);
}

#[no_mangle]
pub unsafe extern "system" fn __IL2CPP_LOG(text: *const c_char) {
    if text.is_null() {
        return;
    }
    let msg = CStr::from_ptr(text).to_string_lossy();
    diagnostics().append(&msg);
}
