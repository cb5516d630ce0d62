//! Tile store collaborator and region scans

use crate::types::{Coord, Position, Region, TileId};
use std::collections::{BTreeMap, HashSet};

/// Read/write access to the terrain of loaded worlds.
///
/// Calls are expected to be fast and synchronous. A world that is not loaded
/// reads as `None` and ignores writes.
pub trait TileStore: Send + Sync {
    fn is_loaded(&self, world: &str) -> bool;

    fn tile(&self, world: &str, at: Coord) -> Option<TileId>;

    /// Returns false if the world is not loaded.
    fn set_tile(&self, world: &str, at: Coord, tile: TileId) -> bool;
}

/// Snapshot every tile of a region, the baseline a reset restores to.
pub fn capture_region(store: &dyn TileStore, world: &str, region: &Region) -> BTreeMap<Coord, TileId> {
    region
        .coords()
        .map(|c| (c, store.tile(world, c).unwrap_or(TileId::AIR)))
        .collect()
}

/// Find safe spawn points on the collapsible floor of a region.
///
/// Each column is scanned top-down; only its topmost collapsible tile is
/// considered, and only if the two tiles above it are air.
pub fn scan_spawn_points(
    store: &dyn TileStore,
    world: &str,
    region: &Region,
    collapsible: &HashSet<TileId>,
) -> Vec<Position> {
    let mut points = Vec::new();
    let air = |c: Coord| store.tile(world, c).is_none_or(TileId::is_air);

    for x in region.min.x..=region.max.x {
        for z in region.min.z..=region.max.z {
            let top = (region.min.y..=region.max.y)
                .rev()
                .map(|y| Coord::new(x, y, z))
                .find(|&c| store.tile(world, c).is_some_and(|t| collapsible.contains(&t)));

            if let Some(tile) = top {
                if air(tile.above(1)) && air(tile.above(2)) {
                    points.push(Position::on_top_of(tile));
                }
            }
        }
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::MemoryWorld;

    #[test]
    fn test_scan_takes_topmost_uncovered_tile() {
        let world = MemoryWorld::new();
        world.load("arena");
        // two stacked floors; only the upper one counts
        world.fill("arena", Coord::new(0, 60, 0), Coord::new(1, 60, 1), TileId::TNT);
        world.fill("arena", Coord::new(0, 64, 0), Coord::new(1, 64, 1), TileId::SAND);
        // covered column yields nothing
        world.set_tile("arena", Coord::new(1, 66, 1), TileId::STONE);

        let region = Region::from_corners(Coord::new(0, 60, 0), Coord::new(1, 70, 1));
        let collapsible = HashSet::from([TileId::TNT, TileId::SAND]);
        let points = scan_spawn_points(&world, "arena", &region, &collapsible);

        assert_eq!(points.len(), 3);
        assert!(points.iter().all(|p| p.y == 65.0));
        assert!(points.contains(&Position::new(0.5, 65.0, 0.5)));
        assert!(!points.contains(&Position::new(1.5, 65.0, 1.5)));
    }

    #[test]
    fn test_capture_region_records_every_tile() {
        let world = MemoryWorld::new();
        world.load("arena");
        world.set_tile("arena", Coord::new(0, 0, 0), TileId::GRAVEL);

        let region = Region::from_corners(Coord::new(1, 1, 1), Coord::new(0, 0, 0));
        let blocks = capture_region(&world, "arena", &region);
        assert_eq!(blocks.len() as u64, region.volume());
        assert_eq!(blocks[&Coord::new(0, 0, 0)], TileId::GRAVEL);
        assert_eq!(blocks[&Coord::new(1, 1, 1)], TileId::AIR);
    }
}
