use crate::overlay::{OverlayEntry, OverlayId, OverlayTarget};
use indexmap::IndexMap;

/// The only owner of overlay entries. Keyed by target so there is never more than one overlay
/// per window or screen; iteration follows insertion order.
#[derive(Debug)]
pub struct OverlayRegistry {
    entries: IndexMap<OverlayTarget, OverlayEntry>,
    next_id: OverlayId,
}

impl OverlayRegistry {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
            next_id: 1,
        }
    }

    pub fn allocate_id(&mut self) -> OverlayId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Adds an entry. Hands it back if its target is already tracked.
    pub fn insert(&mut self, entry: OverlayEntry) -> Result<(), OverlayEntry> {
        if self.entries.contains_key(&entry.target()) {
            return Err(entry);
        }
        self.entries.insert(entry.target(), entry);
        Ok(())
    }

    pub fn contains(&self, target: &OverlayTarget) -> bool {
        self.entries.contains_key(target)
    }

    pub fn get(&self, target: &OverlayTarget) -> Option<&OverlayEntry> {
        self.entries.get(target)
    }

    pub fn get_mut(&mut self, target: &OverlayTarget) -> Option<&mut OverlayEntry> {
        self.entries.get_mut(target)
    }

    pub fn get_by_id(&self, id: OverlayId) -> Option<&OverlayEntry> {
        self.entries.values().find(|e| e.id() == id)
    }

    pub fn get_by_id_mut(&mut self, id: OverlayId) -> Option<&mut OverlayEntry> {
        self.entries.values_mut().find(|e| e.id() == id)
    }

    pub fn remove(&mut self, target: &OverlayTarget) -> Option<OverlayEntry> {
        self.entries.shift_remove(target)
    }

    /// Empties the registry, returning every entry for teardown.
    pub fn drain(&mut self) -> Vec<OverlayEntry> {
        self.entries.drain(..).map(|(_, entry)| entry).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OverlayEntry> {
        self.entries.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut OverlayEntry> {
        self.entries.values_mut()
    }

    pub fn targets(&self) -> impl Iterator<Item = OverlayTarget> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for OverlayRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Bounds;
    use std::time::Instant;

    fn entry(registry: &mut OverlayRegistry, target: OverlayTarget) -> OverlayEntry {
        let id = registry.allocate_id();
        OverlayEntry::new(
            id,
            target,
            id,
            Bounds::new(0.0, 0.0, 100.0, 100.0),
            None,
            Instant::now(),
        )
    }

    #[test]
    fn test_duplicate_target_is_refused() {
        let mut registry = OverlayRegistry::new();
        let first = entry(&mut registry, OverlayTarget::Window(5));
        let second = entry(&mut registry, OverlayTarget::Window(5));

        assert!(registry.insert(first).is_ok());
        let rejected = registry.insert(second).unwrap_err();
        assert_eq!(rejected.id(), 2);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&OverlayTarget::Window(5)).unwrap().id(), 1);
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut registry = OverlayRegistry::new();
        let first = entry(&mut registry, OverlayTarget::Window(5));
        registry.insert(first).unwrap();
        registry.remove(&OverlayTarget::Window(5));

        let again = entry(&mut registry, OverlayTarget::Window(5));
        assert_eq!(again.id(), 2);
        registry.insert(again).unwrap();
        assert!(registry.get_by_id(1).is_none());
        assert!(registry.get_by_id(2).is_some());
    }

    #[test]
    fn test_screen_and_window_targets_are_distinct() {
        let mut registry = OverlayRegistry::new();
        let window = entry(&mut registry, OverlayTarget::Window(0));
        let screen = entry(&mut registry, OverlayTarget::Screen(0));
        registry.insert(window).unwrap();
        registry.insert(screen).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_drain_keeps_insertion_order() {
        let mut registry = OverlayRegistry::new();
        for id in [9, 3, 6] {
            let e = entry(&mut registry, OverlayTarget::Window(id));
            registry.insert(e).unwrap();
        }
        registry.remove(&OverlayTarget::Window(3));

        let targets: Vec<_> = registry.drain().iter().map(|e| e.target()).collect();
        assert_eq!(
            targets,
            vec![OverlayTarget::Window(9), OverlayTarget::Window(6)]
        );
        assert!(registry.is_empty());
    }
}
