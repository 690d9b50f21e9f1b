//! Validating, owning wrapper around a single interception site.
//!
//! The core operations trust their caller completely. `Hook` is the layer that
//! checks inputs once, at construction, and then offers a safe toggle API. It
//! also restores the original entry point when dropped.

use std::sync::Arc;

use entryswap_config::{log_hook_debug, log_hook_info};

use crate::descriptor::{
    descriptor_of, entry_point_of, EntryPoint, MethodDescriptor, ReflectionMethod, UNINSTALLED,
};
use crate::site::{ControlBlock, SiteState};

/// Which side of a hook a validation error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Original,
    Replacement,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Original => f.write_str("original"),
            Role::Replacement => f.write_str("replacement"),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HookError {
    #[error("{0} method handle is null")]
    NullHandle(Role),
    #[error("{0} method handle has no descriptor")]
    NullDescriptor(Role),
    #[error("{0} method has no compiled entry point")]
    ZeroEntryPoint(Role),
    #[error("original and replacement resolve to the same descriptor")]
    SameDescriptor,
}

pub type Result<T> = std::result::Result<T, HookError>;

/// Line-oriented diagnostic callback, e.g. the native plugin's log file.
pub type DiagnosticSink = Arc<dyn Fn(&str) + Send + Sync>;

/// An owned interception site.
///
/// The control block is boxed so its address stays fixed; callers may hand
/// [`Hook::site_ptr`] to native code that expects the three-word block.
pub struct Hook {
    site: Box<ControlBlock>,
    label: String,
    diagnostics: Option<DiagnosticSink>,
}

impl std::fmt::Debug for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hook")
            .field("site", &self.site)
            .field("label", &self.label)
            .field("diagnostics", &self.diagnostics.is_some())
            .finish()
    }
}

impl Hook {
    /// Validate both handles and build an uninstalled hook.
    ///
    /// # Safety
    /// Non-null handles must point to live `ReflectionMethod`s, and their
    /// descriptors must stay alive and unmoved for the lifetime of the `Hook`.
    /// Installs and uninstalls touching the original descriptor must be
    /// serialized by the caller.
    pub unsafe fn new(
        original: *const ReflectionMethod,
        replacement: *const ReflectionMethod,
    ) -> Result<Self> {
        let original_desc = check_handle(original, Role::Original)?;
        let replacement_desc = check_handle(replacement, Role::Replacement)?;
        if original_desc == replacement_desc {
            return Err(HookError::SameDescriptor);
        }

        Ok(Self {
            site: Box::new(ControlBlock::new(original, replacement)),
            label: format!("{:p}", original_desc),
            diagnostics: None,
        })
    }

    /// Name used in log events; defaults to the original descriptor address
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Also report every hook/unhook transition to `sink`.
    pub fn with_diagnostics(mut self, sink: DiagnosticSink) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Redirect the original method. Returns `false` if it was already hooked.
    pub fn hook(&mut self) -> bool {
        if self.site.is_installed() {
            log_hook_debug!("Already hooked", label = self.label.as_str());
            return false;
        }
        // Safety: handles validated in `new`, lifetime guaranteed by its contract.
        unsafe { self.site.install() };
        log_hook_info!(
            "Hooked",
            label = self.label.as_str(),
            saved = self.site.saved_pointer(),
            redirected_to = self.current_entry(),
        );
        self.report("Hooked");
        true
    }

    /// Restore the original method. Returns `false` if it was not hooked.
    pub fn unhook(&mut self) -> bool {
        if !self.site.is_installed() {
            log_hook_debug!("Not hooked", label = self.label.as_str());
            return false;
        }
        unsafe { self.site.uninstall() };
        log_hook_info!(
            "Unhooked",
            label = self.label.as_str(),
            restored = self.current_entry(),
        );
        self.report("Unhooked");
        true
    }

    pub fn is_hooked(&self) -> bool {
        self.site.is_installed()
    }

    pub fn state(&self) -> SiteState {
        self.site.state()
    }

    /// Run `f` against the unhooked original, then re-hook if it was hooked.
    ///
    /// This is how replacement code reaches the behaviour it replaced.
    pub fn call_original<R>(&mut self, f: impl FnOnce() -> R) -> R {
        let was_hooked = self.unhook();
        let out = f();
        if was_hooked {
            self.hook();
        }
        out
    }

    pub fn site(&self) -> &ControlBlock {
        &self.site
    }

    /// Stable pointer to the control block for native callers.
    ///
    /// Writes through it must respect the single-writer contract, and the
    /// pointer dangles once the `Hook` is dropped.
    pub fn site_ptr(&mut self) -> *mut ControlBlock {
        &mut *self.site
    }

    /// Address of the original descriptor, the identity used by the registry.
    pub fn key(&self) -> usize {
        unsafe { descriptor_of(self.site.original()) as usize }
    }

    /// Entry point call sites currently jump to.
    pub fn current_entry(&self) -> EntryPoint {
        unsafe { entry_point_of(self.site.original()) }
    }

    /// Entry point an install would redirect to right now.
    pub fn replacement_entry(&self) -> EntryPoint {
        unsafe { entry_point_of(self.site.replacement()) }
    }

    fn report(&self, action: &str) {
        if let Some(sink) = &self.diagnostics {
            sink(&format!("{}: {}", action, self.label));
        }
    }
}

impl Drop for Hook {
    fn drop(&mut self) {
        self.unhook();
    }
}

unsafe fn check_handle(
    handle: *const ReflectionMethod,
    role: Role,
) -> Result<*mut MethodDescriptor> {
    if handle.is_null() {
        return Err(HookError::NullHandle(role));
    }
    let desc = descriptor_of(handle);
    if desc.is_null() {
        return Err(HookError::NullDescriptor(role));
    }
    if (*desc).entry_point == UNINSTALLED {
        return Err(HookError::ZeroEntryPoint(role));
    }
    Ok(desc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leak_handle(entry: EntryPoint) -> &'static ReflectionMethod {
        let desc = Box::leak(Box::new(MethodDescriptor::new(entry)));
        Box::leak(Box::new(ReflectionMethod::new(desc)))
    }

    #[test]
    fn test_rejects_null_handles() {
        let ok = leak_handle(0x1000);
        let err = unsafe { Hook::new(std::ptr::null(), ok) }.unwrap_err();
        assert_eq!(err, HookError::NullHandle(Role::Original));
        let err = unsafe { Hook::new(ok, std::ptr::null()) }.unwrap_err();
        assert_eq!(err, HookError::NullHandle(Role::Replacement));
    }

    #[test]
    fn test_rejects_missing_descriptor() {
        let ok = leak_handle(0x1000);
        let empty = Box::leak(Box::new(ReflectionMethod::new(std::ptr::null_mut())));
        let err = unsafe { Hook::new(ok, empty) }.unwrap_err();
        assert_eq!(err, HookError::NullDescriptor(Role::Replacement));
        assert_eq!(err.to_string(), "replacement method handle has no descriptor");
    }

    #[test]
    fn test_rejects_zero_entry_point() {
        let zero = leak_handle(0);
        let ok = leak_handle(0x2000);
        let err = unsafe { Hook::new(zero, ok) }.unwrap_err();
        assert_eq!(err, HookError::ZeroEntryPoint(Role::Original));
    }

    #[test]
    fn test_rejects_self_replacement() {
        let desc = Box::leak(Box::new(MethodDescriptor::new(0x1000)));
        let a = Box::leak(Box::new(ReflectionMethod::new(desc)));
        let b = Box::leak(Box::new(ReflectionMethod::new(a.method)));
        let err = unsafe { Hook::new(a, b) }.unwrap_err();
        assert_eq!(err, HookError::SameDescriptor);
    }

    #[test]
    fn test_hook_unhook_report_transitions() {
        let o = leak_handle(0x1000);
        let r = leak_handle(0x2000);
        let mut hook = unsafe { Hook::new(o, r) }.unwrap().with_label("Player::Update");

        assert_eq!(hook.label(), "Player::Update");
        assert!(hook.hook());
        assert!(!hook.hook());
        assert_eq!(hook.current_entry(), 0x2000);
        assert_eq!(hook.site().saved_pointer(), 0x1000);

        assert!(hook.unhook());
        assert!(!hook.unhook());
        assert_eq!(hook.current_entry(), 0x1000);
    }

    #[test]
    fn test_drop_restores_original() {
        let o = leak_handle(0x1000);
        let r = leak_handle(0x2000);
        {
            let mut hook = unsafe { Hook::new(o, r) }.unwrap();
            hook.hook();
            assert_eq!(unsafe { entry_point_of(o) }, 0x2000);
        }
        assert_eq!(unsafe { entry_point_of(o) }, 0x1000);
    }

    #[test]
    fn test_call_original_rehooks() {
        let o = leak_handle(0x1000);
        let r = leak_handle(0x2000);
        let mut hook = unsafe { Hook::new(o, r) }.unwrap();
        hook.hook();

        let during = hook.call_original(|| unsafe { entry_point_of(o) });
        assert_eq!(during, 0x1000);
        assert!(hook.is_hooked());
        assert_eq!(hook.current_entry(), 0x2000);
    }

    #[test]
    fn test_call_original_keeps_unhooked_state() {
        let o = leak_handle(0x1000);
        let r = leak_handle(0x2000);
        let mut hook = unsafe { Hook::new(o, r) }.unwrap();

        hook.call_original(|| ());
        assert_eq!(hook.state(), SiteState::Uninstalled);
    }

    #[test]
    fn test_diagnostics_sink_sees_transitions() {
        use std::sync::Mutex;

        let o = leak_handle(0x1000);
        let r = leak_handle(0x2000);
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink_lines = Arc::clone(&lines);
        let sink: DiagnosticSink = Arc::new(move |line: &str| {
            sink_lines.lock().unwrap().push(line.to_string());
        });

        let mut hook = unsafe { Hook::new(o, r) }
            .unwrap()
            .with_label("Player::Update")
            .with_diagnostics(sink);
        hook.hook();
        hook.hook();
        hook.unhook();
        hook.hook();
        drop(hook);

        assert_eq!(
            *lines.lock().unwrap(),
            [
                "Hooked: Player::Update",
                "Unhooked: Player::Update",
                "Hooked: Player::Update",
                "Unhooked: Player::Update",
            ]
        );
    }

    #[test]
    fn test_replacement_entry_tracks_descriptor() {
        let o = leak_handle(0x1000);
        let r = leak_handle(0x2000);
        let hook = unsafe { Hook::new(o, r) }.unwrap();
        assert_eq!(hook.replacement_entry(), 0x2000);
        assert!(format!("{:?}", hook).contains("diagnostics: false"));
    }

    #[test]
    fn test_site_ptr_is_stable() {
        let o = leak_handle(0x1000);
        let r = leak_handle(0x2000);
        let mut hook = unsafe { Hook::new(o, r) }.unwrap();
        let before = hook.site_ptr();
        let mut moved = hook;
        assert_eq!(moved.site_ptr(), before);
    }
}
