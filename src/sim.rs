//! In-memory collaborators for headless runs and tests

use crate::session::{Participant, Session};
use crate::types::{Coord, GameMode, Item, Position, TileId};
use crate::world::TileStore;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Sparse tile store; unset tiles in a loaded world read as air.
#[derive(Debug, Default)]
pub struct MemoryWorld {
    worlds: RwLock<HashMap<String, HashMap<Coord, TileId>>>,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, world: &str) {
        self.worlds
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(world.to_string())
            .or_default();
    }

    pub fn unload(&self, world: &str) {
        self.worlds
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(world);
    }

    /// Set every tile in the box spanned by two corners.
    pub fn fill(&self, world: &str, a: Coord, b: Coord, tile: TileId) {
        let region = crate::types::Region::from_corners(a, b);
        for c in region.coords() {
            self.set_tile(world, c, tile);
        }
    }
}

impl TileStore for MemoryWorld {
    fn is_loaded(&self, world: &str) -> bool {
        self.worlds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(world)
    }

    fn tile(&self, world: &str, at: Coord) -> Option<TileId> {
        let worlds = self.worlds.read().unwrap_or_else(PoisonError::into_inner);
        worlds
            .get(world)
            .map(|tiles| tiles.get(&at).copied().unwrap_or(TileId::AIR))
    }

    fn set_tile(&self, world: &str, at: Coord, tile: TileId) -> bool {
        let mut worlds = self.worlds.write().unwrap_or_else(PoisonError::into_inner);
        match worlds.get_mut(world) {
            Some(tiles) => {
                if tile.is_air() {
                    tiles.remove(&at);
                } else {
                    tiles.insert(at, tile);
                }
                true
            }
            None => false,
        }
    }
}

/// Scripted player that records everything the arena does to it.
#[derive(Debug)]
pub struct SimPlayer {
    name: String,
    online: AtomicBool,
    combat: AtomicBool,
    world: Mutex<Option<String>>,
    position: Mutex<Position>,
    mode: Mutex<GameMode>,
    inventory: Mutex<BTreeMap<usize, Item>>,
    messages: Mutex<Vec<String>>,
    transfers: Mutex<Vec<(String, u16)>>,
    kicked: Mutex<Option<String>>,
    speed: Mutex<Option<(u32, u8)>>,
}

impl SimPlayer {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            online: AtomicBool::new(true),
            combat: AtomicBool::new(false),
            world: Mutex::new(None),
            position: Mutex::new(Position::default()),
            mode: Mutex::new(GameMode::Survival),
            inventory: Mutex::new(BTreeMap::new()),
            messages: Mutex::new(Vec::new()),
            transfers: Mutex::new(Vec::new()),
            kicked: Mutex::new(None),
            speed: Mutex::new(None),
        })
    }

    pub fn handle(self: &Arc<Self>) -> Participant {
        self.clone()
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Walk to a spot without a teleport.
    pub fn move_to(&self, to: Position) {
        *lock(&self.position) = to;
    }

    pub fn enter_world(&self, world: Option<&str>) {
        *lock(&self.world) = world.map(str::to_string);
    }

    pub fn mode(&self) -> GameMode {
        *lock(&self.mode)
    }

    pub fn slot(&self, slot: usize) -> Option<Item> {
        lock(&self.inventory).get(&slot).copied()
    }

    pub fn has_combat_loadout(&self) -> bool {
        self.combat.load(Ordering::SeqCst)
    }

    pub fn messages(&self) -> Vec<String> {
        lock(&self.messages).clone()
    }

    pub fn heard(&self, needle: &str) -> bool {
        lock(&self.messages).iter().any(|m| m.contains(needle))
    }

    pub fn transfers(&self) -> Vec<(String, u16)> {
        lock(&self.transfers).clone()
    }

    pub fn kicked(&self) -> Option<String> {
        lock(&self.kicked).clone()
    }

    pub fn speed(&self) -> Option<(u32, u8)> {
        *lock(&self.speed)
    }
}

impl Session for SimPlayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn world_name(&self) -> Option<String> {
        lock(&self.world).clone()
    }

    fn position(&self) -> Position {
        *lock(&self.position)
    }

    fn teleport(&self, world: &str, to: Position) {
        *lock(&self.world) = Some(world.to_string());
        *lock(&self.position) = to;
    }

    fn set_mode(&self, mode: GameMode) {
        *lock(&self.mode) = mode;
    }

    fn clear_inventory(&self) {
        lock(&self.inventory).clear();
        self.combat.store(false, Ordering::SeqCst);
    }

    fn set_slot(&self, slot: usize, item: Item) {
        lock(&self.inventory).insert(slot, item);
    }

    fn equip_combat_loadout(&self) {
        self.combat.store(true, Ordering::SeqCst);
    }

    fn send_message(&self, message: &str) {
        lock(&self.messages).push(message.to_string());
    }

    fn apply_speed(&self, duration_secs: u32, amplifier: u8) {
        *lock(&self.speed) = Some((duration_secs, amplifier));
    }

    fn launch(&self, height: f64) {
        let mut pos = lock(&self.position);
        *pos = pos.raised(height);
    }

    fn transfer(&self, address: &str, port: u16, message: &str) -> bool {
        if !self.is_online() {
            return false;
        }
        self.send_message(message);
        lock(&self.transfers).push((address.to_string(), port));
        true
    }

    fn kick(&self, message: &str) {
        *lock(&self.kicked) = Some(message.to_string());
        self.set_online(false);
    }
}
