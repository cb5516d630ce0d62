//! Arena registry: every configured arena, indexed by name and by world

use crate::abilities::{Abilities, AbilityUse};
use crate::arena::{Arena, ArenaContext, DamageSource};
use crate::error::{ArenaError, Result};
use crate::session::Participant;
use crate::setup::{SetupSession, create_arena};
use crate::store::{ArenaDefinition, ArenaStore, normalize_name};
use crate::types::{ArenaSummary, Item, Phase, Position};
use crate::world::scan_spawn_points;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Connecting players get a moment to finish loading before auto-join.
const AUTO_JOIN_DELAY_SECS: u64 = 1;

/// An arena behind its per-instance lock. Every mutating call holds it.
pub type SharedArena = Arc<Mutex<Arena>>;

#[derive(Default)]
struct Indexes {
    by_name: HashMap<String, SharedArena>,
    by_world: HashMap<String, SharedArena>,
    worlds: HashMap<String, String>,
}

impl Indexes {
    fn insert(&mut self, name: String, world: String, arena: SharedArena) -> Option<SharedArena> {
        if self.by_world.contains_key(&world) {
            warn!("World {} is shared by several arenas; {} now owns it", world, name);
        }
        self.by_world.insert(world.clone(), arena.clone());
        self.worlds.insert(name.clone(), world);
        self.by_name.insert(name, arena)
    }

    /// Drop an arena. A world it shared falls back to the first remaining
    /// arena (by name) in that world.
    fn remove(&mut self, name: &str) -> Option<SharedArena> {
        let arena = self.by_name.remove(name)?;
        let Some(world) = self.worlds.remove(name) else {
            self.by_world.retain(|_, a| !Arc::ptr_eq(a, &arena));
            return Some(arena);
        };
        let owned = self.by_world.get(&world).is_some_and(|a| Arc::ptr_eq(a, &arena));
        if owned {
            let heir = self
                .worlds
                .iter()
                .filter(|(_, w)| **w == world)
                .map(|(n, _)| n)
                .min()
                .and_then(|n| self.by_name.get(n))
                .cloned();
            match heir {
                Some(next) => {
                    self.by_world.insert(world, next);
                }
                None => {
                    self.by_world.remove(&world);
                }
            }
        }
        Some(arena)
    }
}

pub struct ArenaRegistry {
    store: ArenaStore,
    ctx: ArenaContext,
    indexes: RwLock<Indexes>,
    abilities: Mutex<Abilities>,
    joins: Mutex<()>,
}

impl ArenaRegistry {
    pub fn new(store: ArenaStore, ctx: ArenaContext) -> Self {
        let abilities = Abilities::new(ctx.config.clone());
        Self {
            store,
            ctx,
            indexes: RwLock::new(Indexes::default()),
            abilities: Mutex::new(abilities),
            joins: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &ArenaStore {
        &self.store
    }

    pub fn context(&self) -> &ArenaContext {
        &self.ctx
    }

    /// Load every arena in the store. Returns how many were loaded.
    pub async fn load_all(&self) -> Result<usize> {
        self.reload().await
    }

    /// Rebuild both indexes from the store. Arenas being replaced are reset
    /// first; both indexes are swapped under one write lock.
    pub async fn reload(&self) -> Result<usize> {
        let mut fresh = Indexes::default();
        for name in self.store.list_names()? {
            let definition = match self.load_definition(&name) {
                Ok(def) => def,
                Err(e) => {
                    warn!("Skipping arena {}: {}", name, e);
                    continue;
                }
            };
            let world = definition.world.clone();
            let arena = Arc::new(Mutex::new(Arena::new(name.clone(), definition, &self.ctx)));
            fresh.insert(name, world, arena);
        }

        let mut indexes = self.indexes.write().await;
        for old in indexes.by_name.values() {
            old.lock().await.reset();
        }
        let count = fresh.by_name.len();
        *indexes = fresh;
        info!("Loaded {} arenas", count);
        Ok(count)
    }

    /// Load a definition, filling in spawn points if the region was never scanned.
    fn load_definition(&self, name: &str) -> Result<ArenaDefinition> {
        let mut definition = self.store.load(name)?;
        if definition.spawn_positions.is_empty() && self.ctx.tiles.is_loaded(&definition.world) {
            if let Some(region) = &definition.region {
                let collapsible = self.ctx.config.collapsible_tiles();
                definition.spawn_positions =
                    scan_spawn_points(self.ctx.tiles.as_ref(), &definition.world, region, &collapsible);
                if !definition.spawn_positions.is_empty() {
                    self.store.save(name, &definition)?;
                    debug!("Arena {}: {} spawn points scanned", name, definition.spawn_positions.len());
                }
            }
        }
        Ok(definition)
    }

    /// Add or replace one arena. A replaced arena is reset first.
    pub async fn insert(&self, name: &str, definition: ArenaDefinition) -> SharedArena {
        let name = normalize_name(name);
        let world = definition.world.clone();
        let arena = Arc::new(Mutex::new(Arena::new(name.clone(), definition, &self.ctx)));

        let mut indexes = self.indexes.write().await;
        if let Some(old) = indexes.remove(&name) {
            old.lock().await.reset();
        }
        indexes.insert(name, world, arena.clone());
        arena
    }

    /// Reset and drop an arena from both indexes. The stored file is kept.
    pub async fn remove(&self, name: &str) -> bool {
        let mut indexes = self.indexes.write().await;
        match indexes.remove(&normalize_name(name)) {
            Some(old) => {
                old.lock().await.reset();
                true
            }
            None => false,
        }
    }

    /// Create a new arena on disk and register it (not ready until setup completes).
    pub async fn create(&self, name: &str, world: &str, spawn: Position) -> Result<SharedArena> {
        let definition = create_arena(&self.store, name, world, spawn)?;
        Ok(self.insert(name, definition).await)
    }

    /// Finish region selection and swap in the now-ready arena.
    pub async fn complete_setup(&self, setup: &SetupSession) -> Result<SharedArena> {
        if let Some(arena) = self.get(&setup.arena_name).await {
            if arena.lock().await.phase().is_active() {
                return Err(ArenaError::RoundInProgress);
            }
        }
        let collapsible = self.ctx.config.collapsible_tiles();
        let definition = setup.complete(&self.store, self.ctx.tiles.as_ref(), &collapsible)?;
        Ok(self.insert(&setup.arena_name, definition).await)
    }

    pub async fn get(&self, name: &str) -> Option<SharedArena> {
        self.indexes.read().await.by_name.get(&normalize_name(name)).cloned()
    }

    pub async fn by_world(&self, world: &str) -> Option<SharedArena> {
        self.indexes.read().await.by_world.get(world).cloned()
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indexes.read().await.by_name.keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot of every registered arena.
    pub async fn arenas(&self) -> Vec<SharedArena> {
        self.indexes.read().await.by_name.values().cloned().collect()
    }

    pub async fn summaries(&self) -> Vec<ArenaSummary> {
        let mut out = Vec::new();
        for arena in self.arenas().await {
            out.push(arena.lock().await.summary());
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// The arena a player is currently in, alive or spectating.
    pub async fn arena_of(&self, name: &str) -> Option<SharedArena> {
        for arena in self.arenas().await {
            if arena.lock().await.is_member(name) {
                return Some(arena);
            }
        }
        None
    }

    // =========================================================================
    // Player routing
    // =========================================================================

    /// Joins are serialized so a player can never land in two arenas.
    pub async fn join(&self, arena_name: &str, player: Participant) -> Result<()> {
        let _guard = self.joins.lock().await;
        let arena = self
            .get(arena_name)
            .await
            .ok_or_else(|| ArenaError::ArenaNotFound(normalize_name(arena_name)))?;
        if self.arena_of(player.name()).await.is_some() {
            return Err(ArenaError::AlreadyInArena);
        }

        let mut arena = arena.lock().await;
        if !arena.is_ready() {
            return Err(ArenaError::NotReady(arena.name().to_string()));
        }
        if arena.phase().is_active() {
            return Err(ArenaError::RoundInProgress);
        }
        if arena.player_count() >= self.ctx.config.max_players_per_arena {
            return Err(ArenaError::ArenaFull);
        }
        if !arena.add_participant(player)? {
            return Err(ArenaError::AlreadyInArena);
        }
        Ok(())
    }

    /// Leave whatever arena the player is in, found by their current world
    /// first and by membership otherwise.
    pub async fn leave(&self, player: &Participant, transfer: bool) -> bool {
        let name = player.name();
        if let Some(world) = player.world_name() {
            if let Some(arena) = self.by_world(&world).await {
                let mut arena = arena.lock().await;
                if arena.remove_participant(name, transfer) {
                    return true;
                }
            }
        }
        match self.arena_of(name).await {
            Some(arena) => arena.lock().await.remove_participant(name, transfer),
            None => false,
        }
    }

    /// Player quit the server.
    pub async fn disconnect(&self, player: &Participant) {
        self.leave(player, false).await;
        self.abilities.lock().await.forget(player.name());
    }

    async fn arena_for(&self, player: &Participant) -> Option<SharedArena> {
        let world = player.world_name()?;
        self.by_world(&world).await
    }

    pub async fn handle_fall(&self, player: &Participant) -> bool {
        match self.arena_for(player).await {
            Some(arena) => arena.lock().await.handle_fall(player.name()),
            None => false,
        }
    }

    pub async fn handle_death(&self, player: &Participant) -> bool {
        match self.arena_for(player).await {
            Some(arena) => arena.lock().await.handle_death(player.name()),
            None => false,
        }
    }

    /// Damage outside any arena always goes through.
    pub async fn damage_verdict(&self, victim: &Participant, source: DamageSource<'_>) -> bool {
        match self.arena_for(victim).await {
            Some(arena) => arena.lock().await.damage_verdict(victim.name(), source),
            None => true,
        }
    }

    pub async fn can_move(&self, player: &Participant) -> bool {
        match self.arena_for(player).await {
            Some(arena) => arena.lock().await.can_move(player.name()),
            None => true,
        }
    }

    /// Inventory outside any arena is never locked.
    pub async fn can_rearrange_inventory(&self, player: &Participant, item: Option<Item>) -> bool {
        match self.arena_for(player).await {
            Some(arena) => arena.lock().await.can_rearrange_inventory(player.name(), item),
            None => true,
        }
    }

    /// A spectator used the leave item. False for anyone else.
    pub async fn use_leave_item(&self, player: &Participant) -> bool {
        let arena = match self.arena_for(player).await {
            Some(arena) => arena,
            None => match self.arena_of(player.name()).await {
                Some(arena) => arena,
                None => return false,
            },
        };
        arena.lock().await.use_leave_item(player.name())
    }

    /// Put a freshly connected player into a round. Tries the configured
    /// arena first, then every other arena by name. Returns where they landed.
    pub async fn auto_join(&self, player: &Participant) -> Option<String> {
        let config = self.ctx.config.clone();
        if config.edit_mode {
            debug!("Edit mode on, not auto-joining {}", player.name());
            return None;
        }
        if !config.auto_join_enabled {
            return None;
        }

        tokio::time::sleep(Duration::from_secs(AUTO_JOIN_DELAY_SECS)).await;
        if !player.is_online() {
            return None;
        }

        let preferred = normalize_name(&config.auto_join_arena);
        match self.join(&preferred, player.clone()).await {
            Ok(()) => return Some(preferred),
            Err(e) => debug!("Auto-join of {} into {} failed: {}", player.name(), preferred, e),
        }

        for name in self.names().await.into_iter().filter(|n| *n != preferred) {
            if self.join(&name, player.clone()).await.is_ok() {
                player.send_message(&format!("Joined fallback arena {} instead.", name));
                return Some(name);
            }
        }

        player.send_message("No available TNT Run arenas at the moment.");
        player.send_message("Use /listtnt to see every arena.");
        None
    }

    pub async fn use_speed_boost(&self, player: &Participant) -> AbilityUse {
        let running = match self.arena_for(player).await {
            Some(arena) => {
                let arena = arena.lock().await;
                arena.phase() == Phase::Running && arena.is_alive(player.name())
            }
            None => false,
        };
        if !running {
            return AbilityUse::Unavailable;
        }
        self.abilities.lock().await.use_speed(player)
    }

    pub async fn use_jump_boost(&self, player: &Participant) -> AbilityUse {
        let pvp = match self.arena_for(player).await {
            Some(arena) => {
                let arena = arena.lock().await;
                if arena.phase() != Phase::Running || !arena.is_alive(player.name()) {
                    return AbilityUse::Unavailable;
                }
                arena.is_pvp_enabled()
            }
            None => return AbilityUse::Unavailable,
        };
        self.abilities.lock().await.use_jump(player, pvp)
    }

    // =========================================================================
    // Clock
    // =========================================================================

    /// Floor tick for every running arena.
    pub async fn tick_all(&self) {
        for arena in self.arenas().await {
            let mut arena = arena.lock().await;
            if arena.phase() == Phase::Running {
                arena.tick();
            }
        }
    }

    /// Controller second for every arena.
    pub async fn tick_second_all(&self) {
        for arena in self.arenas().await {
            arena.lock().await.tick_second();
        }
    }

    /// Reset every arena, e.g. on shutdown.
    pub async fn reset_all(&self) {
        for arena in self.arenas().await {
            arena.lock().await.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::session::Session;
    use crate::sim::{MemoryWorld, SimPlayer};
    use crate::store::temp_store;
    use crate::types::{Coord, Region, TileId};

    fn world() -> Arc<MemoryWorld> {
        let world = Arc::new(MemoryWorld::new());
        world.load("tnt");
        world.fill("tnt", Coord::new(0, 64, 0), Coord::new(3, 64, 3), TileId::TNT);
        world
    }

    fn ready_definition() -> ArenaDefinition {
        ready_definition_in("tnt")
    }

    fn ready_definition_in(world: &str) -> ArenaDefinition {
        let mut def = ArenaDefinition::new(world, Position::new(1.5, 65.0, 1.5));
        def.region = Some(Region::from_corners(Coord::new(0, 64, 0), Coord::new(3, 66, 3)));
        def
    }

    /// "main" in world tnt and "backup" in world tnt2, both ready.
    async fn two_arenas(config: GameConfig) -> (ArenaRegistry, ArenaStore) {
        let world = world();
        world.load("tnt2");
        world.fill("tnt2", Coord::new(0, 64, 0), Coord::new(3, 64, 3), TileId::TNT);
        let store = temp_store();
        store.save("main", &ready_definition()).unwrap();
        store.save("backup", &ready_definition_in("tnt2")).unwrap();
        let registry = ArenaRegistry::new(store.clone(), ArenaContext::new(Arc::new(config), world));
        registry.load_all().await.unwrap();
        (registry, store)
    }

    #[tokio::test]
    async fn test_reload_scans_spawns_and_indexes_by_world() {
        let store = temp_store();
        store.save("main", &ready_definition()).unwrap();
        store.save("draft", &ArenaDefinition::new("other", Position::default())).unwrap();

        let ctx = ArenaContext::new(Arc::new(GameConfig::default()), world());
        let registry = ArenaRegistry::new(store.clone(), ctx);
        assert_eq!(registry.load_all().await.unwrap(), 2);
        assert_eq!(registry.names().await, vec!["draft", "main"]);

        assert_eq!(store.load("main").unwrap().spawn_positions.len(), 16);
        let arena = registry.by_world("tnt").await.unwrap();
        assert_eq!(arena.lock().await.name(), "main");
        assert!(registry.get("MAIN").await.is_some());

        let summaries = registry.summaries().await;
        assert!(!summaries[0].ready);
        assert!(summaries[1].ready);
        std::fs::remove_dir_all(store.dir()).unwrap();
    }

    #[tokio::test]
    async fn test_join_refusals() {
        let store = temp_store();
        store.save("main", &ready_definition()).unwrap();
        store.save("draft", &ArenaDefinition::new("other", Position::default())).unwrap();
        let config = GameConfig::default().max_players(2);
        let registry = ArenaRegistry::new(store.clone(), ArenaContext::new(Arc::new(config), world()));
        registry.load_all().await.unwrap();

        let a = SimPlayer::new("a").handle();
        let b = SimPlayer::new("b").handle();
        let c = SimPlayer::new("c").handle();

        assert!(matches!(registry.join("nowhere", a.clone()).await, Err(ArenaError::ArenaNotFound(_))));
        assert!(matches!(registry.join("draft", a.clone()).await, Err(ArenaError::NotReady(_))));

        registry.join("main", a.clone()).await.unwrap();
        assert!(matches!(registry.join("main", a.clone()).await, Err(ArenaError::AlreadyInArena)));
        registry.join("main", b.clone()).await.unwrap();
        assert!(matches!(registry.join("main", c.clone()).await, Err(ArenaError::ArenaFull)));

        assert!(registry.leave(&a, false).await);
        assert!(!registry.leave(&a, false).await);
        std::fs::remove_dir_all(store.dir()).unwrap();
    }

    #[tokio::test]
    async fn test_reload_resets_replaced_arena() {
        let store = temp_store();
        store.save("main", &ready_definition()).unwrap();
        let registry = ArenaRegistry::new(store.clone(), ArenaContext::new(Arc::new(GameConfig::default()), world()));
        registry.load_all().await.unwrap();

        let p = SimPlayer::new("a");
        registry.join("main", p.handle()).await.unwrap();
        let old = registry.get("main").await.unwrap();

        registry.reload().await.unwrap();
        assert_eq!(old.lock().await.player_count(), 0);
        let new = registry.get("main").await.unwrap();
        assert!(!Arc::ptr_eq(&old, &new));
        std::fs::remove_dir_all(store.dir()).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_join_prefers_configured_arena() {
        let (registry, store) = two_arenas(GameConfig::default()).await;
        let p = SimPlayer::new("a");

        assert_eq!(registry.auto_join(&p.handle()).await.as_deref(), Some("main"));
        assert!(registry.get("main").await.unwrap().lock().await.is_member("a"));
        assert!(!p.heard("fallback"));
        std::fs::remove_dir_all(store.dir()).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_join_falls_back_when_configured_arena_is_full() {
        let (registry, store) = two_arenas(GameConfig::default().max_players(1)).await;
        registry.join("main", SimPlayer::new("x").handle()).await.unwrap();

        let p = SimPlayer::new("a");
        assert_eq!(registry.auto_join(&p.handle()).await.as_deref(), Some("backup"));
        assert!(p.heard("Joined fallback arena backup instead."));
        assert_eq!(p.world_name().as_deref(), Some("tnt2"));
        std::fs::remove_dir_all(store.dir()).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_join_falls_back_when_configured_arena_is_not_ready() {
        let world = world();
        world.load("tnt2");
        world.fill("tnt2", Coord::new(0, 64, 0), Coord::new(3, 64, 3), TileId::TNT);
        let store = temp_store();
        store.save("main", &ArenaDefinition::new("tnt", Position::default())).unwrap();
        store.save("backup", &ready_definition_in("tnt2")).unwrap();
        let registry = ArenaRegistry::new(store.clone(), ArenaContext::new(Arc::new(GameConfig::default()), world));
        registry.load_all().await.unwrap();

        let p = SimPlayer::new("a");
        assert_eq!(registry.auto_join(&p.handle()).await.as_deref(), Some("backup"));
        assert!(p.heard("Joined fallback arena backup instead."));
        std::fs::remove_dir_all(store.dir()).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_join_with_nothing_available() {
        let store = temp_store();
        store.save("main", &ready_definition()).unwrap();
        let config = GameConfig::default().max_players(1);
        let registry = ArenaRegistry::new(store.clone(), ArenaContext::new(Arc::new(config), world()));
        registry.load_all().await.unwrap();
        registry.join("main", SimPlayer::new("x").handle()).await.unwrap();

        let p = SimPlayer::new("a");
        assert_eq!(registry.auto_join(&p.handle()).await, None);
        assert!(p.heard("No available TNT Run arenas at the moment."));
        assert!(p.heard("/listtnt"));
        std::fs::remove_dir_all(store.dir()).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_join_skipped() {
        let (registry, store) = two_arenas(GameConfig::default().edit_mode(true)).await;
        let p = SimPlayer::new("a");
        assert_eq!(registry.auto_join(&p.handle()).await, None);
        assert!(registry.arena_of("a").await.is_none());
        assert!(p.messages().is_empty());
        std::fs::remove_dir_all(store.dir()).unwrap();

        let (registry, store) = two_arenas(GameConfig::default().auto_join(false, "main")).await;
        assert_eq!(registry.auto_join(&p.handle()).await, None);
        std::fs::remove_dir_all(store.dir()).unwrap();

        // gone before the delay ran out
        let (registry, store) = two_arenas(GameConfig::default()).await;
        p.set_online(false);
        assert_eq!(registry.auto_join(&p.handle()).await, None);
        assert!(registry.arena_of("a").await.is_none());
        std::fs::remove_dir_all(store.dir()).unwrap();
    }

    #[tokio::test]
    async fn test_player_lands_in_one_arena_only() {
        let (registry, store) = two_arenas(GameConfig::default()).await;
        let a = SimPlayer::new("a").handle();

        let (first, second) = tokio::join!(registry.join("main", a.clone()), registry.join("backup", a.clone()));
        assert!(first.is_ok() ^ second.is_ok());
        assert!(matches!(first.err().or(second.err()), Some(ArenaError::AlreadyInArena)));

        let mut members = 0;
        for arena in registry.arenas().await {
            if arena.lock().await.is_member("a") {
                members += 1;
            }
        }
        assert_eq!(members, 1);
        std::fs::remove_dir_all(store.dir()).unwrap();
    }

    #[tokio::test]
    async fn test_shared_world_falls_back_on_remove() {
        let store = temp_store();
        let registry = ArenaRegistry::new(store.clone(), ArenaContext::new(Arc::new(GameConfig::default()), world()));
        let alpha = registry.insert("alpha", ready_definition()).await;
        let beta = registry.insert("beta", ready_definition()).await;
        assert!(Arc::ptr_eq(&registry.by_world("tnt").await.unwrap(), &beta));

        assert!(registry.remove("beta").await);
        assert!(Arc::ptr_eq(&registry.by_world("tnt").await.unwrap(), &alpha));

        // removing a non-owner leaves the owner alone
        registry.insert("beta", ready_definition()).await;
        assert!(registry.remove("alpha").await);
        assert_eq!(registry.by_world("tnt").await.unwrap().lock().await.name(), "beta");

        assert!(registry.remove("beta").await);
        assert!(registry.by_world("tnt").await.is_none());
        std::fs::remove_dir_all(store.dir()).unwrap();
    }

    #[tokio::test]
    async fn test_leave_item_only_for_spectators() {
        let (registry, store) = two_arenas(GameConfig::default()).await;
        let a = SimPlayer::new("a");
        let stranger = SimPlayer::new("s");

        assert!(!registry.use_leave_item(&stranger.handle()).await);
        assert!(registry.can_rearrange_inventory(&stranger.handle(), None).await);

        registry.join("main", a.handle()).await.unwrap();
        assert!(!registry.use_leave_item(&a.handle()).await);
        assert!(registry.can_rearrange_inventory(&a.handle(), Some(Item::SpeedFeather)).await);
        assert!(registry.get("main").await.unwrap().lock().await.is_alive("a"));
        std::fs::remove_dir_all(store.dir()).unwrap();
    }
}
