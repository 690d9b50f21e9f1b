use std::cell::UnsafeCell;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::sync::Once;

/// A Recursive Mutex using raw pthread primitives.
///
/// A thread may re-acquire a lock it already holds. Replacement code that
/// calls back into its own site (to reach the original) relies on this.
///
/// The pthread mutex is initialized in place on first lock and must not move
/// afterwards, so within the crate it always lives behind a `Box` or `Arc`.
pub struct RecursiveMutex<T> {
    raw: UnsafeCell<libc::pthread_mutex_t>,
    init: Once,
    value: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for RecursiveMutex<T> {}
unsafe impl<T: Send> Sync for RecursiveMutex<T> {}

impl<T> RecursiveMutex<T> {
    pub const fn new(value: T) -> Self {
        Self {
            raw: UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER),
            init: Once::new(),
            value: UnsafeCell::new(value),
        }
    }

    // The static initializer yields a normal mutex; the recursive type needs
    // attributes, applied once before the first lock.
    fn ensure_init(&self) {
        self.init.call_once(|| unsafe {
            let mut attr: libc::pthread_mutexattr_t = std::mem::zeroed();
            libc::pthread_mutexattr_init(&mut attr);
            libc::pthread_mutexattr_settype(&mut attr, libc::PTHREAD_MUTEX_RECURSIVE);
            libc::pthread_mutex_init(self.raw.get(), &attr);
            libc::pthread_mutexattr_destroy(&mut attr);
        });
    }

    pub fn lock(&self) -> RecursiveMutexGuard<'_, T> {
        self.ensure_init();
        unsafe {
            libc::pthread_mutex_lock(self.raw.get());
        }
        RecursiveMutexGuard { mutex: self }
    }

    /// Destroy the mutex where it lives and hand back the value.
    pub fn into_inner(self: Box<Self>) -> T {
        let raw = Box::into_raw(self);
        unsafe {
            (*raw).destroy();
            let value = std::ptr::read((*raw).value.get());
            // Free the allocation without running `Drop` a second time.
            drop(Box::from_raw(raw as *mut ManuallyDrop<Self>));
            value
        }
    }

    fn destroy(&self) {
        if self.init.is_completed() {
            unsafe {
                libc::pthread_mutex_destroy(self.raw.get());
            }
        }
    }
}

impl<T> Drop for RecursiveMutex<T> {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Holding a guard means this thread owns the lock. Nested guards on the same
/// thread must not hold overlapping `&mut` borrows of the data.
pub struct RecursiveMutexGuard<'a, T> {
    mutex: &'a RecursiveMutex<T>,
}

impl<T> Deref for RecursiveMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.mutex.value.get() }
    }
}

impl<T> DerefMut for RecursiveMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.value.get() }
    }
}

impl<T> Drop for RecursiveMutexGuard<'_, T> {
    fn drop(&mut self) {
        unsafe {
            libc::pthread_mutex_unlock(self.mutex.raw.get());
        }
    }
}
