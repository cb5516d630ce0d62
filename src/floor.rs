//! Floor tracking: which tiles a round removed, and what they were

use crate::types::{Coord, TileId};
use crate::world::TileStore;
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct FloorTracker {
    removed: HashMap<Coord, TileId>,
    tracking: bool,
}

impl FloorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start recording for a new round.
    pub fn begin(&mut self) {
        if !self.removed.is_empty() {
            warn!("Floor tracker started with {} unrestored tiles", self.removed.len());
        }
        self.tracking = true;
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    /// Replace the tile at `at` with air, remembering `original` the first
    /// time this coordinate is removed in the round. Returns true if the
    /// original was recorded by this call.
    pub fn collapse(&mut self, store: &dyn TileStore, world: &str, at: Coord, original: TileId) -> bool {
        let first = !self.removed.contains_key(&at);
        if first {
            self.removed.insert(at, original);
        }
        if !store.set_tile(world, at, TileId::AIR) {
            debug!("Could not clear {} in {}", at, world);
        }
        first
    }

    /// Put back every removed tile and clear the record.
    ///
    /// Returns how many tiles were restored. If the world is not loaded the
    /// record is still cleared.
    pub fn restore(&mut self, store: &dyn TileStore, world: &str) -> usize {
        self.tracking = false;
        if self.removed.is_empty() {
            return 0;
        }
        if !store.is_loaded(world) {
            warn!("World {} not loaded, dropping {} removed tiles", world, self.removed.len());
            self.removed.clear();
            return 0;
        }

        let mut restored = 0;
        for (at, tile) in self.removed.drain() {
            if store.set_tile(world, at, tile) {
                restored += 1;
            }
        }
        restored
    }

    pub fn original(&self, at: Coord) -> Option<TileId> {
        self.removed.get(&at).copied()
    }

    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.removed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::MemoryWorld;

    #[test]
    fn test_second_removal_keeps_first_original() {
        let world = MemoryWorld::new();
        world.load("w");
        let at = Coord::new(3, 64, 3);
        world.set_tile("w", at, TileId::TNT);

        let mut floor = FloorTracker::new();
        floor.begin();
        assert!(floor.collapse(&world, "w", at, TileId::TNT));
        assert_eq!(world.tile("w", at), Some(TileId::AIR));

        // something else ends up there and is removed again
        world.set_tile("w", at, TileId::SAND);
        assert!(!floor.collapse(&world, "w", at, TileId::SAND));
        assert_eq!(floor.original(at), Some(TileId::TNT));
        assert_eq!(floor.removed_count(), 1);

        assert_eq!(floor.restore(&world, "w"), 1);
        assert_eq!(world.tile("w", at), Some(TileId::TNT));
        assert!(floor.is_clean());
        assert!(!floor.is_tracking());
    }

    #[test]
    fn test_restore_is_idempotent() {
        let world = MemoryWorld::new();
        world.load("w");
        let a = Coord::new(0, 64, 0);
        let b = Coord::new(1, 64, 0);
        world.set_tile("w", a, TileId::SAND);
        world.set_tile("w", b, TileId::GRAVEL);

        let mut floor = FloorTracker::new();
        floor.begin();
        floor.collapse(&world, "w", a, TileId::SAND);
        floor.collapse(&world, "w", b, TileId::GRAVEL);

        assert_eq!(floor.restore(&world, "w"), 2);
        assert_eq!(floor.restore(&world, "w"), 0);
        assert_eq!(world.tile("w", a), Some(TileId::SAND));
        assert_eq!(world.tile("w", b), Some(TileId::GRAVEL));
    }

    #[test]
    fn test_unloaded_world_still_clears_record() {
        let world = MemoryWorld::new();
        world.load("w");
        let at = Coord::new(0, 64, 0);
        world.set_tile("w", at, TileId::TNT);

        let mut floor = FloorTracker::new();
        floor.collapse(&world, "w", at, TileId::TNT);
        world.unload("w");
        assert_eq!(floor.restore(&world, "w"), 0);
        assert!(floor.is_clean());
    }
}
