//! Internally synchronized interception sites.
//!
//! Additive to the core: [`crate::site::install`] and
//! [`crate::site::uninstall`] stay lock-free and unsynchronized. `SyncSite`
//! serializes every operation on *its own* block behind a recursive mutex. It
//! does not protect a descriptor that is also reachable through another site.

pub(crate) mod recursive_mutex;

use recursive_mutex::RecursiveMutex;

use crate::descriptor::{EntryPoint, ReflectionMethod};
use crate::site::{ControlBlock, SiteState};

/// A control block behind a pthread recursive mutex.
///
/// The mutex is boxed so moving the `SyncSite` never moves an initialized
/// `pthread_mutex_t`.
pub struct SyncSite {
    block: Box<RecursiveMutex<ControlBlock>>,
}

// Safety: the raw pointers inside the block are only dereferenced while the
// mutex is held, and `SyncSite::new` requires the descriptors to stay valid
// and to be mutated only through this site.
unsafe impl Send for SyncSite {}
unsafe impl Sync for SyncSite {}

impl SyncSite {
    /// # Safety
    /// Both handles and their descriptors must outlive the `SyncSite`, and the
    /// original descriptor's entry point must not be written by anything other
    /// than this site while it exists.
    pub unsafe fn new(
        original: *const ReflectionMethod,
        replacement: *const ReflectionMethod,
    ) -> Self {
        Self {
            block: Box::new(RecursiveMutex::new(ControlBlock::new(
                original,
                replacement,
            ))),
        }
    }

    pub fn install(&self) {
        let mut block = self.block.lock();
        // Safety: upheld by the `new` contract; the lock serializes callers.
        unsafe { block.install() }
    }

    pub fn uninstall(&self) {
        let mut block = self.block.lock();
        unsafe { block.uninstall() }
    }

    pub fn state(&self) -> SiteState {
        self.block.lock().state()
    }

    pub fn saved_pointer(&self) -> EntryPoint {
        self.block.lock().saved_pointer()
    }

    /// Run `f` with the original entry point restored, then put the site back
    /// in the state it was in.
    ///
    /// The lock is held throughout, so other threads going through this site
    /// block until it is back in its prior state. `f` may call back into this
    /// site on the same thread.
    pub fn with_original<R>(&self, f: impl FnOnce() -> R) -> R {
        // Only a shared borrow through `held`; nested guards below take `&mut`.
        let held = self.block.lock();
        let was_installed = held.is_installed();
        if was_installed {
            self.uninstall();
        }
        let out = f();
        if was_installed {
            self.install();
        }
        drop(held);
        out
    }

    /// Tear down the wrapper, returning the block as-is.
    pub fn into_block(self) -> ControlBlock {
        self.block.into_inner()
    }

    #[cfg(test)]
    fn mutex_addr(&self) -> *const RecursiveMutex<ControlBlock> {
        &*self.block
    }
}
