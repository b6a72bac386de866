//! Surface registry
//!
//! Resolves opaque hardware-surface ids back to the textures behind them.
//! Each backend adapter owns one registry; there is no process-wide table.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque id of a registered hardware surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(u64);

impl SurfaceId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// Allocator context mapping surface ids to backing textures
pub struct SurfaceRegistry<T> {
    next_id: AtomicU64,
    surfaces: RwLock<HashMap<SurfaceId, T>>,
}

impl<T> SurfaceRegistry<T> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            surfaces: RwLock::new(HashMap::new()),
        }
    }

    /// Register a texture and return its id
    pub fn register(&self, texture: T) -> SurfaceId {
        let id = SurfaceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.surfaces.write().insert(id, texture);
        id
    }

    /// Remove a texture; returns it if it was registered
    pub fn unregister(&self, id: SurfaceId) -> Option<T> {
        self.surfaces.write().remove(&id)
    }

    pub fn contains(&self, id: SurfaceId) -> bool {
        self.surfaces.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.surfaces.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.read().is_empty()
    }

    pub fn clear(&self) {
        self.surfaces.write().clear();
    }
}

impl<T: Clone> SurfaceRegistry<T> {
    /// Resolve an id to (a cloned handle of) its texture
    pub fn get(&self, id: SurfaceId) -> Option<T> {
        self.surfaces.read().get(&id).cloned()
    }
}

impl<T> Default for SurfaceRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for SurfaceRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceRegistry")
            .field("surfaces", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_register_and_resolve() {
        let registry = SurfaceRegistry::new();
        let a = registry.register("decoder pool".to_string());
        let b = registry.register("capture".to_string());
        assert_ne!(a, b);
        assert_eq!(registry.get(a).as_deref(), Some("decoder pool"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unregister() {
        let registry = SurfaceRegistry::new();
        let id = registry.register(7u32);
        assert_eq!(registry.unregister(id), Some(7));
        assert!(registry.get(id).is_none());
        assert!(registry.is_empty());
        assert!(registry.unregister(id).is_none());
    }

    #[test]
    fn test_ids_unique_across_threads() {
        let registry = Arc::new(SurfaceRegistry::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    (0..50).map(|i| registry.register(t * 100 + i)).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids: Vec<SurfaceId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 200);
        assert_eq!(registry.len(), 200);
    }
}
