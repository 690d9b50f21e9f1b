//! Runtime-owned method records.
//!
//! These mirror the host runtime's layout closely enough for the single field
//! the controller touches. They are never constructed by the controller in
//! production; the host owns them and hands out raw pointers.

use std::ffi::c_void;

/// A compiled-code entry point. `0` is reserved as the "not installed" sentinel.
pub type EntryPoint = usize;

/// Sentinel stored in a control block's saved pointer while uninstalled.
pub const UNINSTALLED: EntryPoint = 0;

/// The runtime's per-method record.
///
/// Only the leading `entry_point` field is modelled; the real record continues
/// past it, which is fine because the controller only ever reaches it through
/// a pointer.
#[repr(C)]
#[derive(Debug)]
pub struct MethodDescriptor {
    /// What call sites jump to.
    pub entry_point: EntryPoint,
}

impl MethodDescriptor {
    pub const fn new(entry_point: EntryPoint) -> Self {
        Self { entry_point }
    }
}

/// Managed object header preceding every reflection object.
#[repr(C)]
#[derive(Debug)]
pub struct ObjectHeader {
    pub klass: *const c_void,
    pub monitor: *mut c_void,
}

impl ObjectHeader {
    pub const fn empty() -> Self {
        Self {
            klass: std::ptr::null(),
            monitor: std::ptr::null_mut(),
        }
    }
}

/// Reflection object the managed side passes for a method.
///
/// The control block stores pointers to these; the descriptor is one hop away.
#[repr(C)]
#[derive(Debug)]
pub struct ReflectionMethod {
    pub header: ObjectHeader,
    pub method: *mut MethodDescriptor,
}

impl ReflectionMethod {
    pub const fn new(method: *mut MethodDescriptor) -> Self {
        Self {
            header: ObjectHeader::empty(),
            method,
        }
    }
}

/// Resolve the descriptor behind a reflection handle.
///
/// # Safety
/// `handle` must point to a live `ReflectionMethod`.
#[inline(always)]
pub(crate) unsafe fn descriptor_of(handle: *const ReflectionMethod) -> *mut MethodDescriptor {
    (*handle).method
}

/// Read the current entry point behind a reflection handle.
///
/// # Safety
/// `handle` must point to a live `ReflectionMethod` whose `method` points to a
/// live `MethodDescriptor`.
#[inline(always)]
pub unsafe fn entry_point_of(handle: *const ReflectionMethod) -> EntryPoint {
    (*descriptor_of(handle)).entry_point
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_matches_host_words() {
        let word = std::mem::size_of::<usize>();
        assert_eq!(std::mem::size_of::<MethodDescriptor>(), word);
        assert_eq!(std::mem::size_of::<ReflectionMethod>(), 3 * word);
        assert_eq!(std::mem::offset_of!(ReflectionMethod, method), 2 * word);
    }

    #[test]
    fn test_entry_point_of_follows_handle() {
        let mut desc = MethodDescriptor::new(0x4000);
        let handle = ReflectionMethod::new(&mut desc);
        assert_eq!(unsafe { entry_point_of(&handle) }, 0x4000);
    }
}
