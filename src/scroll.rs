use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

/// Last known vertical offset per route key. Cloning shares the map; it lives
/// as long as the process and is never written to disk.
#[derive(Debug, Clone, Default)]
pub struct ScrollStore {
    positions: Arc<RwLock<HashMap<String, u32>>>,
}

impl ScrollStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero is the default position and is never stored.
    pub fn save(&self, key: &str, offset: u32) {
        if offset > 0 {
            self.positions.write().insert(key.to_string(), offset);
        }
    }

    pub fn get(&self, key: &str) -> Option<u32> {
        self.positions.read().get(key).copied()
    }

    pub fn clear(&self, key: &str) {
        self.positions.write().remove(key);
    }

    pub fn len(&self) -> usize {
        self.positions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.read().is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScrollBehavior {
    #[default]
    Instant,
    Smooth,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreOptions {
    /// Zero means "on the next frame".
    pub delay: Duration,
    pub behavior: ScrollBehavior,
}

/// Scroll action the host should perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollTarget {
    pub offset: u32,
    pub delay: Duration,
    pub behavior: ScrollBehavior,
}

/// Per-mount handle. Restores at most once per mount even though the store
/// outlives it.
#[derive(Debug)]
pub struct ScrollRestoration {
    store: ScrollStore,
    key: String,
    options: RestoreOptions,
    restored: bool,
}

impl ScrollRestoration {
    pub fn new(store: ScrollStore, key: impl Into<String>, options: RestoreOptions) -> Self {
        Self {
            store,
            key: key.into(),
            options,
            restored: false,
        }
    }

    pub fn save(&self, offset: u32) {
        self.store.save(&self.key, offset);
    }

    /// Returns the scroll action once `ready` is true (content loaded and laid
    /// out) and an offset is stored. Later calls on the same mount return
    /// `None`.
    pub fn restore(&mut self, ready: bool) -> Option<ScrollTarget> {
        if !ready || self.restored {
            return None;
        }
        let offset = self.store.get(&self.key).filter(|offset| *offset > 0)?;
        self.restored = true;
        Some(ScrollTarget {
            offset,
            delay: self.options.delay,
            behavior: self.options.behavior,
        })
    }

    /// Forgets the stored offset and re-arms restoration for this mount.
    pub fn clear(&mut self) {
        self.store.clear(&self.key);
        self.restored = false;
    }

    /// Records the final offset when the view goes away.
    pub fn finish(self, offset: u32) {
        self.save(offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_offset_does_not_overwrite() {
        let store = ScrollStore::new();
        store.save("/home", 420);
        store.save("/home", 0);
        assert_eq!(store.get("/home"), Some(420));
        store.save("/other", 0);
        assert_eq!(store.get("/other"), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn restore_waits_for_ready_and_fires_once() {
        let store = ScrollStore::new();
        store.save("/category/tv", 900);
        let mut mount =
            ScrollRestoration::new(store.clone(), "/category/tv", RestoreOptions::default());
        assert_eq!(mount.restore(false), None);
        let target = mount.restore(true).unwrap();
        assert_eq!(target.offset, 900);
        assert_eq!(target.behavior, ScrollBehavior::Instant);
        assert_eq!(mount.restore(true), None);
        assert_eq!(store.get("/category/tv"), Some(900));
    }

    #[test]
    fn new_mount_restores_again() {
        let store = ScrollStore::new();
        let first = ScrollRestoration::new(store.clone(), "/", RestoreOptions::default());
        first.save(120);
        first.finish(300);

        let mut second = ScrollRestoration::new(
            store,
            "/",
            RestoreOptions {
                delay: Duration::from_millis(100),
                behavior: ScrollBehavior::Smooth,
            },
        );
        let target = second.restore(true).unwrap();
        assert_eq!(target.offset, 300);
        assert_eq!(target.delay, Duration::from_millis(100));
    }

    #[test]
    fn clear_resets_baseline() {
        let store = ScrollStore::new();
        store.save("/category/movie", 50);
        let mut mount =
            ScrollRestoration::new(store.clone(), "/category/movie", RestoreOptions::default());
        assert!(mount.restore(true).is_some());
        mount.clear();
        assert!(store.is_empty());
        assert_eq!(mount.restore(true), None);
        mount.save(75);
        assert_eq!(mount.restore(true).map(|t| t.offset), Some(75));
    }

    #[test]
    fn isolated_stores_do_not_share() {
        let a = ScrollStore::new();
        let b = ScrollStore::new();
        a.save("/", 10);
        assert_eq!(b.get("/"), None);
    }
}
