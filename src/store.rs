//! Arena definition persistence: one JSON file per arena

use crate::error::{ArenaError, Result};
use crate::types::{Coord, Position, Region, TileId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Static identity of an arena as stored on disk.
///
/// `region = None` marks an arena whose setup is not finished; it cannot
/// host a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArenaDefinition {
    pub world: String,
    pub spawn: Position,
    #[serde(default)]
    pub region: Option<Region>,
    #[serde(default, alias = "blocks", with = "coord_keys")]
    pub original_blocks: BTreeMap<Coord, TileId>,
    #[serde(default, alias = "spawn-positions")]
    pub spawn_positions: Vec<Position>,
}

impl ArenaDefinition {
    pub fn new(world: impl Into<String>, spawn: Position) -> Self {
        Self {
            world: world.into(),
            spawn,
            region: None,
            original_blocks: BTreeMap::new(),
            spawn_positions: Vec::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.region.is_some()
    }
}

/// `"x:y:z"` string keys on the wire
mod coord_keys {
    use super::{Coord, TileId};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(map: &BTreeMap<Coord, TileId>, s: S) -> Result<S::Ok, S::Error> {
        s.collect_map(map.iter().map(|(c, t)| (c.to_string(), t)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<Coord, TileId>, D::Error> {
        BTreeMap::<String, TileId>::deserialize(d)?
            .into_iter()
            .map(|(k, v)| k.parse::<Coord>().map(|c| (c, v)).map_err(D::Error::custom))
            .collect()
    }
}

/// Directory of `<name>.json` arena files.
#[derive(Debug, Clone)]
pub struct ArenaStore {
    dir: PathBuf,
}

impl ArenaStore {
    /// Open a store, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", normalize_name(name)))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    /// Arena names, sorted.
    pub fn list_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = match entry {
                Ok(e) => e.path(),
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", self.dir.display(), e);
                    continue;
                }
            };
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn load(&self, name: &str) -> Result<ArenaDefinition> {
        let path = self.path(name);
        if !path.is_file() {
            return Err(ArenaError::ArenaNotFound(normalize_name(name)));
        }
        let contents = std::fs::read_to_string(&path)?;
        serde_json::from_str(&contents)
            .map_err(|e| ArenaError::InvalidArenaData(format!("{}: {}", path.display(), e)))
    }

    pub fn save(&self, name: &str, definition: &ArenaDefinition) -> Result<()> {
        let path = self.path(name);
        std::fs::write(&path, serde_json::to_string_pretty(definition)?)?;
        debug!("Saved arena {}", path.display());
        Ok(())
    }

    /// Deleting a missing arena is not an error.
    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.path(name);
        if path.is_file() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Arena names are case-insensitive.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
pub(crate) fn temp_store() -> ArenaStore {
    use rand::Rng;
    let dir = std::env::temp_dir().join(format!("tnt-run-{:016x}", rand::thread_rng().r#gen::<u64>()));
    ArenaStore::open(dir).unwrap()
}
