//! Interception sites: the control block and the install/uninstall pair.
//!
//! A site is a caller-owned three-word block. Its first word doubles as the
//! install flag and the value to restore, so both operations are idempotent
//! and any sequence of calls converges to one of two states.
//!
//! # Concurrency
//!
//! Nothing here synchronizes. Every install/uninstall that touches a given
//! descriptor must be serialized by the caller, whether through one site or
//! several sites sharing a descriptor. [`ControlBlock`] holds raw pointers and
//! is therefore neither `Send` nor `Sync`. See [`crate::sync::SyncSite`] for
//! the locked variant.
//!
//! # Zero entry points
//!
//! `0` means "not installed". A runtime that ever hands out a zero entry point
//! would make [`install`] record the sentinel and the site would look
//! uninstalled afterwards. Valid compiled code never lives at address zero,
//! so the assumption holds in practice; [`crate::Hook::new`] rejects it up front.

use crate::descriptor::{descriptor_of, EntryPoint, ReflectionMethod, UNINSTALLED};

/// Install state of a site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteState {
    Uninstalled,
    Installed,
}

/// Per-site control block, laid out as the host passes it:
/// `[saved_pointer, original, replacement]`.
///
/// Neither `Send` nor `Sync`: a block cannot cross threads without the
/// caller taking responsibility for serializing access.
///
/// ```compile_fail
/// fn assert_send<T: Send>() {}
/// assert_send::<entryswap_core::ControlBlock>();
/// ```
///
/// ```compile_fail
/// fn assert_sync<T: Sync>() {}
/// assert_sync::<entryswap_core::ControlBlock>();
/// ```
#[repr(C)]
#[derive(Debug)]
pub struct ControlBlock {
    saved_pointer: EntryPoint,
    original: *const ReflectionMethod,
    replacement: *const ReflectionMethod,
}

impl ControlBlock {
    /// A fresh, uninstalled block.
    pub const fn new(
        original: *const ReflectionMethod,
        replacement: *const ReflectionMethod,
    ) -> Self {
        Self {
            saved_pointer: UNINSTALLED,
            original,
            replacement,
        }
    }

    /// Entry point to restore, or [`UNINSTALLED`].
    #[inline]
    pub fn saved_pointer(&self) -> EntryPoint {
        self.saved_pointer
    }

    #[inline]
    pub fn original(&self) -> *const ReflectionMethod {
        self.original
    }

    #[inline]
    pub fn replacement(&self) -> *const ReflectionMethod {
        self.replacement
    }

    #[inline]
    pub fn is_installed(&self) -> bool {
        self.saved_pointer != UNINSTALLED
    }

    pub fn state(&self) -> SiteState {
        if self.is_installed() {
            SiteState::Installed
        } else {
            SiteState::Uninstalled
        }
    }

    /// See [`install`].
    ///
    /// # Safety
    /// Same contract as [`install`].
    #[inline]
    pub unsafe fn install(&mut self) {
        install(self)
    }

    /// See [`uninstall`].
    ///
    /// # Safety
    /// Same contract as [`uninstall`].
    #[inline]
    pub unsafe fn uninstall(&mut self) {
        uninstall(self)
    }
}

/// Redirect the original method to the replacement's compiled code.
///
/// No-op when the site is already installed; a second install must never
/// overwrite the saved original with the replacement's pointer.
///
/// # Safety
/// - `site.original()` and `site.replacement()` point to live reflection
///   handles whose `method` fields point to live descriptors.
/// - No other thread reads or writes the original descriptor's entry point
///   for the duration of the call.
pub unsafe fn install(site: &mut ControlBlock) {
    if site.saved_pointer != UNINSTALLED {
        return;
    }

    let original = descriptor_of(site.original);
    site.saved_pointer = (*original).entry_point;

    let replacement = descriptor_of(site.replacement);
    (*original).entry_point = (*replacement).entry_point;
}

/// Restore the entry point saved by [`install`] and clear the site.
///
/// No-op when the site is not installed.
///
/// # Safety
/// - `site.original()` points to a live reflection handle whose `method` field
///   points to a live descriptor.
/// - No other thread reads or writes that descriptor's entry point for the
///   duration of the call.
pub unsafe fn uninstall(site: &mut ControlBlock) {
    if site.saved_pointer == UNINSTALLED {
        return;
    }

    let original = descriptor_of(site.original);
    (*original).entry_point = site.saved_pointer;

    site.saved_pointer = UNINSTALLED;
}
