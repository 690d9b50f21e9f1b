//! Append-only diagnostic log behind `__IL2CPP_LOG`.
//!
//! Best-effort by contract: a log that cannot be opened or written is skipped
//! without telling the caller.

use entryswap_config::{log_native_debug, DiagnosticsConfig};
use entryswap_core::DiagnosticSink;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct DiagnosticLog {
    path: PathBuf,
    prefix: String,
    enabled: bool,
}

impl DiagnosticLog {
    pub fn new(path: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            prefix: prefix.into(),
            enabled: true,
        }
    }

    pub fn from_config(cfg: &DiagnosticsConfig) -> Self {
        Self {
            path: cfg.log_file.clone(),
            prefix: cfg.prefix.clone(),
            enabled: cfg.enabled,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Append one line. The file is reopened per call so an external rotate
    /// or delete never leaves a stale handle.
    pub fn append(&self, msg: &str) {
        if !self.enabled {
            return;
        }
        let file = OpenOptions::new().create(true).append(true).open(&self.path);
        let mut file = match file {
            Ok(f) => f,
            Err(e) => {
                let path = self.path.to_string_lossy();
                let error = e.to_string();
                log_native_debug!(
                    "Diagnostic log unavailable",
                    path = &*path,
                    error = error.as_str(),
                );
                return;
            }
        };

        let line = format!("{}{}\n", self.prefix, msg);
        if let Err(e) = file.write_all(line.as_bytes()) {
            let error = e.to_string();
            log_native_debug!("Diagnostic write failed", error = error.as_str());
        }
    }

    /// Wrap this log as a sink for [`entryswap_core::Hook::with_diagnostics`].
    pub fn into_sink(self) -> DiagnosticSink {
        Arc::new(move |line: &str| self.append(line))
    }
}
