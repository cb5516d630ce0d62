//! Arena creation and region capture

use crate::error::{ArenaError, Result};
use crate::store::{ArenaDefinition, ArenaStore, normalize_name};
use crate::types::{Coord, Position, Region, TileId};
use crate::world::{TileStore, capture_region, scan_spawn_points};
use std::collections::HashSet;
use tracing::info;

/// Write a new, not yet ready arena (no region).
pub fn create_arena(store: &ArenaStore, name: &str, world: &str, spawn: Position) -> Result<ArenaDefinition> {
    let name = normalize_name(name);
    if name.is_empty() {
        return Err(ArenaError::InvalidArenaData("empty arena name".to_string()));
    }
    if store.exists(&name) {
        return Err(ArenaError::ArenaExists(name));
    }

    let definition = ArenaDefinition::new(world, spawn);
    store.save(&name, &definition)?;
    info!("Created arena {} in {}", name, world);
    Ok(definition)
}

/// Region selection in progress for one arena
#[derive(Debug, Clone, PartialEq)]
pub struct SetupSession {
    pub arena_name: String,
    pub pos1: Option<(String, Coord)>,
    pub pos2: Option<(String, Coord)>,
}

impl SetupSession {
    pub fn new(arena_name: &str) -> Self {
        Self {
            arena_name: normalize_name(arena_name),
            pos1: None,
            pos2: None,
        }
    }

    pub fn set_pos1(&mut self, world: &str, at: Coord) {
        self.pos1 = Some((world.to_string(), at));
    }

    pub fn set_pos2(&mut self, world: &str, at: Coord) {
        self.pos2 = Some((world.to_string(), at));
    }

    pub fn is_complete(&self) -> bool {
        self.pos1.is_some() && self.pos2.is_some()
    }

    /// The normalized region, if both corners are set and lie in `world`.
    pub fn region(&self, world: &str) -> Result<Region> {
        let (Some((w1, a)), Some((w2, b))) = (&self.pos1, &self.pos2) else {
            return Err(ArenaError::SetupIncomplete);
        };
        if w1 != world || w2 != world {
            return Err(ArenaError::InvalidRegion(format!(
                "corners must both be in {world} (got {w1} and {w2})"
            )));
        }
        Ok(Region::from_corners(*a, *b))
    }

    /// Capture the baseline and spawn points for the selected region and
    /// save the finished definition.
    pub fn complete(
        &self,
        store: &ArenaStore,
        tiles: &dyn TileStore,
        collapsible: &HashSet<TileId>,
    ) -> Result<ArenaDefinition> {
        let mut definition = store.load(&self.arena_name)?;
        let region = self.region(&definition.world)?;
        if !tiles.is_loaded(&definition.world) {
            return Err(ArenaError::WorldNotLoaded(definition.world.clone()));
        }

        definition.original_blocks = capture_region(tiles, &definition.world, &region);
        definition.spawn_positions = scan_spawn_points(tiles, &definition.world, &region, collapsible);
        definition.region = Some(region);
        store.save(&self.arena_name, &definition)?;

        info!(
            "Arena {} region set: {} tiles captured, {} spawn points",
            self.arena_name,
            definition.original_blocks.len(),
            definition.spawn_positions.len()
        );
        Ok(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::MemoryWorld;
    use crate::store::temp_store;

    #[test]
    fn test_create_refuses_duplicates() {
        let store = temp_store();
        let def = create_arena(&store, "Main", "tnt", Position::new(0.5, 70.0, 0.5)).unwrap();
        assert!(!def.is_ready());
        assert!(matches!(
            create_arena(&store, "main", "tnt", Position::default()),
            Err(ArenaError::ArenaExists(name)) if name == "main"
        ));
        std::fs::remove_dir_all(store.dir()).unwrap();
    }

    #[test]
    fn test_complete_captures_region() {
        let store = temp_store();
        let world = MemoryWorld::new();
        world.load("tnt");
        world.fill("tnt", Coord::new(0, 64, 0), Coord::new(2, 64, 2), TileId::TNT);
        create_arena(&store, "main", "tnt", Position::new(1.5, 70.0, 1.5)).unwrap();

        let mut setup = SetupSession::new("main");
        setup.set_pos1("tnt", Coord::new(2, 66, 2));
        assert!(!setup.is_complete());
        assert!(matches!(
            setup.complete(&store, &world, &HashSet::from([TileId::TNT])),
            Err(ArenaError::SetupIncomplete)
        ));

        setup.set_pos2("tnt", Coord::new(0, 64, 0));
        let def = setup.complete(&store, &world, &HashSet::from([TileId::TNT])).unwrap();
        assert!(def.is_ready());
        assert_eq!(def.original_blocks.len(), 27);
        assert_eq!(def.original_blocks[&Coord::new(1, 64, 1)], TileId::TNT);
        assert_eq!(def.original_blocks[&Coord::new(1, 65, 1)], TileId::AIR);
        assert_eq!(def.spawn_positions.len(), 9);
        assert_eq!(store.load("main").unwrap(), def);
        std::fs::remove_dir_all(store.dir()).unwrap();
    }

    #[test]
    fn test_corners_in_other_world_are_rejected() {
        let store = temp_store();
        let world = MemoryWorld::new();
        world.load("tnt");
        create_arena(&store, "main", "tnt", Position::default()).unwrap();

        let mut setup = SetupSession::new("main");
        setup.set_pos1("tnt", Coord::new(0, 64, 0));
        setup.set_pos2("lobby", Coord::new(4, 64, 4));
        assert!(matches!(
            setup.complete(&store, &world, &HashSet::new()),
            Err(ArenaError::InvalidRegion(_))
        ));
        std::fs::remove_dir_all(store.dir()).unwrap();
    }
}
