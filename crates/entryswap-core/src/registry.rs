//! Ordered collection of hooks, one per original method descriptor.

use entryswap_config::log_hook_debug;

use crate::hook::Hook;

/// Hooks keyed by the address of the descriptor they redirect.
///
/// Insertion order is preserved so indices handed out by [`HookRegistry::insert`]
/// stay meaningful until something is removed.
#[derive(Debug, Default)]
pub struct HookRegistry {
    hooks: Vec<Hook>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `hook`, replacing any hook on the same descriptor.
    ///
    /// A replaced hook is dropped, which restores the descriptor. If `hook`
    /// was already hooked, it is unwound first and hooked again once stored,
    /// so it saves the true original rather than the replaced hook's entry.
    /// Returns the hook's index.
    pub fn insert(&mut self, mut hook: Hook) -> usize {
        match self.index_of(hook.key()) {
            Some(index) => {
                log_hook_debug!("Replacing hook", label = hook.label(), index = index);
                let rehook = hook.is_hooked();
                let old = &mut self.hooks[index];
                // Unwind in reverse install order: the old hook went on top
                // if it saved the incoming hook's replacement.
                if rehook
                    && old.is_hooked()
                    && old.site().saved_pointer() == hook.replacement_entry()
                {
                    old.unhook();
                }
                hook.unhook();
                self.hooks[index] = hook;
                if rehook {
                    self.hooks[index].hook();
                }
                index
            }
            None => {
                self.hooks.push(hook);
                self.hooks.len() - 1
            }
        }
    }

    pub fn index_of(&self, key: usize) -> Option<usize> {
        self.hooks.iter().position(|h| h.key() == key)
    }

    pub fn get(&self, key: usize) -> Option<&Hook> {
        self.hooks.iter().find(|h| h.key() == key)
    }

    pub fn get_mut(&mut self, key: usize) -> Option<&mut Hook> {
        self.hooks.iter_mut().find(|h| h.key() == key)
    }

    /// Take a hook out without unhooking it.
    pub fn remove(&mut self, key: usize) -> Option<Hook> {
        let index = self.index_of(key)?;
        Some(self.hooks.remove(index))
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Hook> {
        self.hooks.iter()
    }

    /// Returns how many hooks changed state.
    pub fn hook_all(&mut self) -> usize {
        self.hooks.iter_mut().map(Hook::hook).filter(|&changed| changed).count()
    }

    /// Returns how many hooks changed state.
    pub fn unhook_all(&mut self) -> usize {
        self.hooks.iter_mut().map(Hook::unhook).filter(|&changed| changed).count()
    }

    /// Drop every hook, restoring all descriptors.
    pub fn clear(&mut self) {
        self.hooks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{entry_point_of, EntryPoint, MethodDescriptor, ReflectionMethod};

    fn leak_handle(entry: EntryPoint) -> &'static ReflectionMethod {
        let desc = Box::leak(Box::new(MethodDescriptor::new(entry)));
        Box::leak(Box::new(ReflectionMethod::new(desc)))
    }

    fn hook(o: &ReflectionMethod, r: &ReflectionMethod) -> Hook {
        unsafe { Hook::new(o, r) }.unwrap()
    }

    #[test]
    fn test_insert_and_lookup() {
        let (a, b, r) = (leak_handle(0x1000), leak_handle(0x1100), leak_handle(0x2000));
        let mut registry = HookRegistry::new();

        assert_eq!(registry.insert(hook(a, r)), 0);
        assert_eq!(registry.insert(hook(b, r)), 1);
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.index_of(b.method as usize), Some(1));
        assert!(registry.get(a.method as usize).is_some());
        assert!(registry.get(0xdead).is_none());
    }

    #[test]
    fn test_insert_replaces_and_restores() {
        let o = leak_handle(0x1000);
        let (r1, r2) = (leak_handle(0x2000), leak_handle(0x3000));
        let mut registry = HookRegistry::new();

        registry.insert(hook(o, r1));
        registry.get_mut(o.method as usize).unwrap().hook();
        assert_eq!(unsafe { entry_point_of(o) }, 0x2000);

        let index = registry.insert(hook(o, r2));
        assert_eq!(index, 0);
        assert_eq!(registry.len(), 1);
        // The replaced hook restored the original on drop.
        assert_eq!(unsafe { entry_point_of(o) }, 0x1000);

        registry.get_mut(o.method as usize).unwrap().hook();
        assert_eq!(unsafe { entry_point_of(o) }, 0x3000);
    }

    #[test]
    fn test_insert_rehooks_hook_installed_on_top() {
        let o = leak_handle(0x1000);
        let (r1, r2) = (leak_handle(0x2000), leak_handle(0x3000));
        let mut registry = HookRegistry::new();

        let mut first = hook(o, r1);
        first.hook();
        registry.insert(first);
        let mut second = hook(o, r2);
        second.hook();
        assert_eq!(second.site().saved_pointer(), 0x2000);

        registry.insert(second);
        let stored = registry.get(o.method as usize).unwrap();
        assert!(stored.is_hooked());
        assert_eq!(stored.site().saved_pointer(), 0x1000);
        assert_eq!(unsafe { entry_point_of(o) }, 0x3000);

        registry.clear();
        assert_eq!(unsafe { entry_point_of(o) }, 0x1000);
    }

    #[test]
    fn test_insert_unwinds_old_hook_installed_on_top() {
        let o = leak_handle(0x1000);
        let (r1, r2) = (leak_handle(0x2000), leak_handle(0x3000));
        let mut registry = HookRegistry::new();

        let mut incoming = hook(o, r2);
        incoming.hook();
        registry.insert(hook(o, r1));
        registry.get_mut(o.method as usize).unwrap().hook();
        assert_eq!(unsafe { entry_point_of(o) }, 0x2000);

        registry.insert(incoming);
        let stored = registry.get(o.method as usize).unwrap();
        assert_eq!(stored.site().saved_pointer(), 0x1000);
        assert_eq!(unsafe { entry_point_of(o) }, 0x3000);

        registry.clear();
        assert_eq!(unsafe { entry_point_of(o) }, 0x1000);
    }

    #[test]
    fn test_hook_all_and_clear() {
        let (a, b, r) = (leak_handle(0x1000), leak_handle(0x1100), leak_handle(0x2000));
        let mut registry = HookRegistry::new();
        registry.insert(hook(a, r));
        registry.insert(hook(b, r));

        assert_eq!(registry.hook_all(), 2);
        assert_eq!(registry.hook_all(), 0);
        assert!(registry.iter().all(Hook::is_hooked));

        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(unsafe { entry_point_of(a) }, 0x1000);
        assert_eq!(unsafe { entry_point_of(b) }, 0x1100);
    }

    #[test]
    fn test_unhook_all_keeps_entries() {
        let (a, r) = (leak_handle(0x1000), leak_handle(0x2000));
        let mut registry = HookRegistry::new();
        registry.insert(hook(a, r));
        registry.hook_all();

        assert_eq!(registry.unhook_all(), 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(unsafe { entry_point_of(a) }, 0x1000);
    }

    #[test]
    fn test_remove_hands_back_live_hook() {
        let (a, r) = (leak_handle(0x1000), leak_handle(0x2000));
        let mut registry = HookRegistry::new();
        registry.insert(hook(a, r));
        registry.hook_all();

        let mut taken = registry.remove(a.method as usize).unwrap();
        assert!(registry.is_empty());
        assert!(taken.is_hooked());
        assert!(taken.unhook());
        assert!(registry.remove(a.method as usize).is_none());
    }
}
