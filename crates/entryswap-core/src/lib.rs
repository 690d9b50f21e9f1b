//! # entryswap-core
//!
//! Redirects a managed-runtime method to a replacement by swapping the entry
//! point stored in the method's runtime descriptor, and restores it exactly.
//!
//! - [`site`]: the control block plus the unchecked `install`/`uninstall` pair.
//!   Idempotent, allocation-free, unsynchronized.
//! - [`hook`]: validating owner of one site, unhooks on drop.
//! - [`registry`]: hooks keyed by original descriptor.
//! - [`sync`]: recursive-mutex wrapper for callers that cannot serialize
//!   themselves (unix only).

pub mod descriptor;
pub mod hook;
pub mod registry;
pub mod site;
#[cfg(unix)]
pub mod sync;

pub use descriptor::{EntryPoint, MethodDescriptor, ObjectHeader, ReflectionMethod, UNINSTALLED};
pub use hook::{DiagnosticSink, Hook, HookError, Role};
pub use registry::HookRegistry;
pub use site::{install, uninstall, ControlBlock, SiteState};
#[cfg(unix)]
pub use sync::SyncSite;
