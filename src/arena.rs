//! Arena - one floor, one round at a time

use crate::config::GameConfig;
use crate::controller::{Controller, CountdownReason, PvpActivation, WaitStep, WaitingCountdown};
use crate::error::{ArenaError, Result};
use crate::floor::FloorTracker;
use crate::relocation::{Relocator, StayPut};
use crate::session::{Participant, broadcast};
use crate::spawn::SpawnAllocator;
use crate::store::ArenaDefinition;
use crate::types::*;
use crate::world::TileStore;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Arena events emitted to the application
#[derive(Debug, Clone, PartialEq)]
pub enum ArenaEvent {
    /// Player joined the arena
    PlayerJoin(String),
    /// Player left the arena
    PlayerLeave(String),
    /// Player moved from alive to spectators
    PlayerEliminated {
        name: String,
        cause: EliminationCause,
        remaining: usize,
    },
    /// Alive player dropped from the round without spectating (disconnect)
    PlayerForfeit(String),
    /// Enough players; wait timer started
    WaitingStart,
    /// Wait aborted, too few players
    WaitingCancelled,
    /// Countdown started
    CountdownStart(u32),
    /// Countdown tick
    CountdownTick(u32),
    /// Round started
    GameStart,
    /// PVP activates in this many seconds
    PvpWarning(u32),
    /// PVP is on
    PvpActivated,
    /// Round over
    GameOver { winner: Option<String> },
    /// Phase or population changed
    Status(ArenaStatus),
}

/// An event tagged with the arena it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub arena: String,
    pub event: ArenaEvent,
}

/// Where damage to an arena participant came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageSource<'a> {
    Fall,
    Player(&'a str),
    Other,
}

/// Collaborators shared by every arena of a registry
#[derive(Clone)]
pub struct ArenaContext {
    pub config: Arc<GameConfig>,
    pub tiles: Arc<dyn TileStore>,
    pub relocator: Arc<dyn Relocator>,
    pub events: Option<mpsc::UnboundedSender<Notice>>,
    pub spawn_seed: Option<u64>,
}

impl ArenaContext {
    pub fn new(config: Arc<GameConfig>, tiles: Arc<dyn TileStore>) -> Self {
        Self {
            config,
            tiles,
            relocator: Arc::new(StayPut),
            events: None,
            spawn_seed: None,
        }
    }

    pub fn relocator(mut self, relocator: Arc<dyn Relocator>) -> Self {
        self.relocator = relocator;
        self
    }

    pub fn events(mut self, tx: mpsc::UnboundedSender<Notice>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Deterministic spawn order, for tests and replays.
    pub fn spawn_seed(mut self, seed: u64) -> Self {
        self.spawn_seed = Some(seed);
        self
    }
}

/// Arena - owns one round's mutable state
pub struct Arena {
    name: String,
    definition: ArenaDefinition,
    config: Arc<GameConfig>,
    tiles: Arc<dyn TileStore>,
    relocator: Arc<dyn Relocator>,
    events: Option<mpsc::UnboundedSender<Notice>>,
    collapsible: HashSet<TileId>,
    phase: Phase,
    pvp_enabled: bool,
    alive: BTreeMap<String, Participant>,
    spectators: BTreeMap<String, Participant>,
    floor: FloorTracker,
    spawns: SpawnAllocator,
    waiting: Option<WaitingCountdown>,
    pvp_timer: Option<PvpActivation>,
    floor_ticks: u32,
}

impl Arena {
    /// Create a new Arena
    pub fn new(name: impl Into<String>, definition: ArenaDefinition, ctx: &ArenaContext) -> Self {
        let points = definition.spawn_positions.clone();
        let spawns = match ctx.spawn_seed {
            Some(seed) => SpawnAllocator::with_seed(points, definition.spawn, seed),
            None => SpawnAllocator::new(points, definition.spawn),
        };

        Self {
            name: name.into(),
            collapsible: ctx.config.collapsible_tiles(),
            definition,
            config: ctx.config.clone(),
            tiles: ctx.tiles.clone(),
            relocator: ctx.relocator.clone(),
            events: ctx.events.clone(),
            phase: Phase::Idle,
            pvp_enabled: false,
            alive: BTreeMap::new(),
            spectators: BTreeMap::new(),
            floor: FloorTracker::new(),
            spawns,
            waiting: None,
            pvp_timer: None,
            floor_ticks: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn world(&self) -> &str {
        &self.definition.world
    }

    pub fn definition(&self) -> &ArenaDefinition {
        &self.definition
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_ready(&self) -> bool {
        self.definition.is_ready()
    }

    pub fn is_pvp_enabled(&self) -> bool {
        self.pvp_enabled
    }

    pub fn alive_count(&self) -> usize {
        self.alive.len()
    }

    pub fn spectator_count(&self) -> usize {
        self.spectators.len()
    }

    pub fn player_count(&self) -> usize {
        self.alive.len() + self.spectators.len()
    }

    pub fn is_alive(&self, name: &str) -> bool {
        self.alive.contains_key(name)
    }

    pub fn is_spectator(&self, name: &str) -> bool {
        self.spectators.contains_key(name)
    }

    pub fn is_member(&self, name: &str) -> bool {
        self.is_alive(name) || self.is_spectator(name)
    }

    pub fn alive_names(&self) -> Vec<String> {
        self.alive.keys().cloned().collect()
    }

    /// Alive players first, then spectators.
    pub fn participants(&self) -> Vec<Participant> {
        self.alive.values().chain(self.spectators.values()).cloned().collect()
    }

    pub fn floor(&self) -> &FloorTracker {
        &self.floor
    }

    pub fn spawns(&self) -> &SpawnAllocator {
        &self.spawns
    }

    pub fn has_waiting_controller(&self) -> bool {
        self.waiting.is_some()
    }

    pub fn has_pvp_controller(&self) -> bool {
        self.pvp_timer.is_some()
    }

    pub fn status(&self) -> ArenaStatus {
        ArenaStatus {
            phase: self.phase,
            current: self.player_count(),
            capacity: self.config.max_players_per_arena,
        }
    }

    pub fn summary(&self) -> ArenaSummary {
        ArenaSummary {
            name: self.name.clone(),
            world: self.definition.world.clone(),
            ready: self.is_ready(),
            phase: self.phase,
            alive: self.alive.len(),
            spectators: self.spectators.len(),
        }
    }

    // =========================================================================
    // Membership
    // =========================================================================

    /// Add a player to the alive set and place them on the floor.
    ///
    /// Returns `Ok(false)` if the player is already in the arena.
    pub fn add_participant(&mut self, player: Participant) -> Result<bool> {
        let name = player.name().to_string();
        if self.is_member(&name) {
            return Ok(false);
        }
        if !self.is_ready() {
            return Err(ArenaError::NotReady(self.name.clone()));
        }
        if self.phase.is_active() {
            return Err(ArenaError::RoundInProgress);
        }
        if !self.tiles.is_loaded(self.world()) {
            player.send_message("Arena world not loaded!");
            return Err(ArenaError::WorldNotLoaded(self.definition.world.clone()));
        }

        self.alive.insert(name.clone(), player.clone());

        player.set_mode(GameMode::Survival);
        let spawn = self.spawns.next();
        player.teleport(&self.definition.world, spawn);
        self.give_runner_kit(&player);

        let alive = self.alive.len();
        let min = self.config.min_players_to_start;
        if alive >= min && self.phase == Phase::Idle && self.waiting.is_none() {
            self.start_waiting();
        } else if alive < min {
            player.send_message(&format!("Waiting for more players... ({alive}/{min})"));
        } else {
            player.send_message("Waiting for game to start...");
        }

        info!("{} joined arena {} ({} alive)", name, self.name, alive);
        self.emit(ArenaEvent::PlayerJoin(name));
        self.emit_status();
        Ok(true)
    }

    /// Remove a player from whichever set holds them.
    ///
    /// Returns false if the player was not in the arena.
    pub fn remove_participant(&mut self, name: &str, transfer: bool) -> bool {
        let (player, was_alive) = if let Some(p) = self.alive.remove(name) {
            (p, true)
        } else if let Some(p) = self.spectators.remove(name) {
            (p, false)
        } else {
            return false;
        };

        player.set_mode(GameMode::Survival);
        player.clear_inventory();
        if transfer {
            self.relocator.send_to_hub(&player);
        }

        info!("{} left arena {}", name, self.name);
        self.emit(ArenaEvent::PlayerLeave(name.to_string()));
        self.emit_status();

        if self.alive.is_empty() && self.spectators.is_empty() {
            self.reset();
            return true;
        }

        if self.phase == Phase::Running && was_alive {
            self.evaluate_win();
        } else if self.waiting.is_some() && self.alive.len() < self.config.min_players_to_start {
            self.abort_waiting("Countdown cancelled - need more players.");
        }
        true
    }

    /// Move an alive player to the spectators and re-check the round.
    ///
    /// Returns false if the player was not alive.
    pub fn eliminate(&mut self, name: &str, cause: EliminationCause) -> bool {
        if !self.move_to_spectator(name, cause) {
            return false;
        }
        self.evaluate_win();
        true
    }

    fn move_to_spectator(&mut self, name: &str, cause: EliminationCause) -> bool {
        let Some(player) = self.alive.remove(name) else {
            return false;
        };
        self.spectators.insert(name.to_string(), player.clone());

        player.set_mode(GameMode::Spectator);
        player.clear_inventory();
        let lookout = self.definition.spawn.raised(self.config.spectator.spectator_height_offset);
        player.teleport(&self.definition.world, lookout);
        if self.config.spectator.give_leave_item {
            player.set_slot(slots::LEAVE_ITEM, Item::LeaveBed);
        }
        player.send_message("You have been eliminated!");
        player.send_message("You are now spectating. Use /leave to return to hub.");

        let remaining = self.alive.len();
        broadcast(
            self.alive.values(),
            &format!("{name} was eliminated! ({remaining} players remaining)"),
        );

        info!("{} eliminated in {} ({:?}), {} remaining", name, self.name, cause, remaining);
        self.emit(ArenaEvent::PlayerEliminated {
            name: name.to_string(),
            cause,
            remaining,
        });
        self.emit_status();
        true
    }

    fn give_runner_kit(&self, player: &Participant) {
        player.clear_inventory();
        player.set_slot(slots::SPEED_FEATHER, Item::SpeedFeather);
        player.send_message("Use the feather for speed boost!");
    }

    // =========================================================================
    // Phase transitions
    // =========================================================================

    /// The single place the phase changes. Illegal edges are refused.
    fn transition(&mut self, next: Phase) -> bool {
        if self.phase == next {
            return true;
        }
        if !self.phase.can_transition_to(next) {
            warn!("Arena {}: refused transition {} -> {}", self.name, self.phase, next);
            return false;
        }
        debug!("Arena {}: {} -> {}", self.name, self.phase, next);
        self.phase = next;
        self.emit_status();
        true
    }

    fn start_waiting(&mut self) {
        if !self.transition(Phase::Waiting) {
            return;
        }
        self.waiting = Some(WaitingCountdown::new(&self.config));

        let alive = self.alive.len();
        let max = self.config.max_players_per_arena;
        let everyone = self.participants();
        if alive >= max {
            broadcast(&everyone, "Arena is full! Starting countdown...");
        } else {
            broadcast(&everyone, &format!("Waiting for more players... ({alive}/{max})"));
            broadcast(
                &everyone,
                &format!(
                    "Game will start in {} seconds or when arena is full.",
                    self.config.wait_time_seconds
                ),
            );
        }
        broadcast(&everyone, "You cannot move until the game starts!");

        info!("Arena {} waiting with {} players", self.name, alive);
        self.emit(ArenaEvent::WaitingStart);
    }

    fn abort_waiting(&mut self, message: &str) {
        if let Some(mut controller) = self.waiting.take() {
            controller.cancel();
        }
        self.transition(Phase::Idle);
        broadcast(&self.participants(), message);
        info!("Arena {} back to idle: {}", self.name, message);
        self.emit(ArenaEvent::WaitingCancelled);
    }

    /// Countdown finished: the floor goes live.
    pub fn activate(&mut self) -> bool {
        if self.phase != Phase::Countdown {
            warn!("Arena {}: activate() while {}", self.name, self.phase);
            return false;
        }
        if let Some(mut controller) = self.waiting.take() {
            controller.cancel();
        }
        if !self.transition(Phase::Running) {
            return false;
        }

        self.floor.begin();
        self.floor_ticks = 0;
        self.pvp_enabled = false;
        if self.config.pvp_mode.enabled {
            self.pvp_timer = Some(PvpActivation::new(&self.config));
        }

        for player in self.alive.values().filter(|p| p.is_online()) {
            self.give_runner_kit(player);
            player.send_message("Game started! You can now move and play!");
        }
        broadcast(&self.participants(), "=== TNT RUN STARTED! ===");

        info!("Arena {} running with {} players", self.name, self.alive.len());
        self.emit(ArenaEvent::GameStart);
        true
    }

    /// Turn on unrestricted combat and hand out combat gear.
    pub fn activate_pvp(&mut self) -> bool {
        if self.pvp_enabled || self.phase != Phase::Running {
            return false;
        }
        self.pvp_enabled = true;
        if let Some(mut controller) = self.pvp_timer.take() {
            controller.cancel();
        }

        broadcast(&self.participants(), "=== PVP MODE ACTIVATED! ===");
        broadcast(&self.participants(), "Players can now attack each other!");
        for player in self.alive.values().filter(|p| p.is_online()) {
            player.equip_combat_loadout();
            player.send_message("PVP gear equipped! Fight for survival!");
        }

        info!("Arena {}: PVP active", self.name);
        self.emit(ArenaEvent::PvpActivated);
        true
    }

    // =========================================================================
    // Ticks
    // =========================================================================

    /// Floor tick: collapse the tile under every alive player.
    pub fn tick(&mut self) {
        if self.phase != Phase::Running {
            return;
        }
        let world = self.definition.world.as_str();
        if !self.tiles.is_loaded(world) {
            debug!("Arena {}: world {} not loaded, skipping tick", self.name, world);
            return;
        }

        let mut offline = Vec::new();
        for (name, player) in &self.alive {
            if !player.is_online() {
                offline.push(name.clone());
                continue;
            }
            let below = player.position().block_below();
            if let Some(tile) = self.tiles.tile(world, below) {
                if self.collapsible.contains(&tile) {
                    self.floor.collapse(self.tiles.as_ref(), world, below, tile);
                }
            }
        }
        for name in offline {
            self.forfeit(&name);
        }

        self.floor_ticks = self.floor_ticks.wrapping_add(1);
        if self.floor_ticks % self.config.timing.win_check_every.max(1) == 0 {
            self.evaluate_win();
        }
    }

    /// Once-per-second tick for the phase controllers. A PVP timer created by
    /// this tick's activation starts counting on the next one.
    pub fn tick_second(&mut self) {
        self.tick_pvp_timer();

        if let Some(mut controller) = self.waiting.take() {
            if self.phase.is_pregame() {
                let step = controller.tick(self.alive.len());
                self.apply_wait_step(controller, step);
            } else {
                controller.cancel();
            }
        }
    }

    fn tick_pvp_timer(&mut self) {
        let Some(mut controller) = self.pvp_timer.take() else {
            return;
        };
        if self.phase != Phase::Running || self.pvp_enabled {
            controller.cancel();
            return;
        }

        let step = controller.tick();
        if step.warn {
            self.pvp_warning(controller.warning_lead());
        }
        if !controller.is_cancelled() {
            self.pvp_timer = Some(controller);
        }
        if step.activate {
            self.activate_pvp();
        }
    }

    fn apply_wait_step(&mut self, controller: WaitingCountdown, step: WaitStep) {
        let alive = self.alive.len();
        match step {
            WaitStep::Cancelled => {}
            WaitStep::Abort => {
                self.waiting = Some(controller);
                self.abort_waiting("Not enough players! Waiting cancelled.");
            }
            WaitStep::Waiting { remaining } => {
                self.waiting = Some(controller);
                if remaining % 30 == 0 || remaining <= 10 {
                    broadcast(
                        &self.participants(),
                        &format!(
                            "Waiting for more players... ({alive}/{}) - {remaining}s remaining",
                            self.config.max_players_per_arena
                        ),
                    );
                }
            }
            WaitStep::CountdownStarted(reason) => {
                self.waiting = Some(controller);
                if !self.transition(Phase::Countdown) {
                    return;
                }
                let message = match reason {
                    CountdownReason::Full => "Arena is full! Starting countdown...".to_string(),
                    CountdownReason::WaitElapsed => format!("Starting game with {alive} players!"),
                };
                broadcast(&self.participants(), &message);
                self.emit(ArenaEvent::CountdownStart(self.config.countdown_seconds));
            }
            WaitStep::Countdown { remaining } => {
                self.waiting = Some(controller);
                broadcast(
                    &self.participants(),
                    &format!("Game starting in: {remaining} seconds"),
                );
                self.emit(ArenaEvent::CountdownTick(remaining));
            }
            WaitStep::Activate => {
                self.activate();
            }
        }
    }

    fn pvp_warning(&self, lead: u32) {
        broadcast(self.alive.values(), "WARNING: PVP mode will activate soon!");
        broadcast(
            self.alive.values(),
            &format!("PVP mode will activate in {lead} seconds! Get ready for combat!"),
        );
        broadcast(
            self.spectators.values(),
            &format!("PVP mode activating in {lead} seconds!"),
        );
        self.emit(ArenaEvent::PvpWarning(lead));
    }

    // =========================================================================
    // Win condition and round end
    // =========================================================================

    fn forfeit(&mut self, name: &str) {
        if self.alive.remove(name).is_some() {
            info!("{} forfeited in arena {}", name, self.name);
            self.emit(ArenaEvent::PlayerForfeit(name.to_string()));
            self.emit_status();
        }
    }

    /// Drop disconnected players, eliminate fallen ones, and end the round
    /// if at most one runner is left.
    pub fn evaluate_win(&mut self) {
        if self.phase != Phase::Running {
            return;
        }
        let elimination_y = self.config.elimination_y();

        for name in self.alive_names() {
            let Some(player) = self.alive.get(&name).cloned() else {
                continue;
            };
            let in_world = player.world_name().as_deref() == Some(self.world());
            if !player.is_online() || !in_world {
                self.forfeit(&name);
            } else if player.position().y <= elimination_y {
                self.move_to_spectator(&name, EliminationCause::Fell);
            }
        }

        match self.alive.len() {
            1 => {
                let winners: Vec<Participant> = self.alive.values().cloned().collect();
                let message = format!("{} won the TNT Run!", winners[0].name());
                broadcast(&self.participants(), &message);
                self.end_round(winners);
            }
            0 => {
                broadcast(&self.participants(), "No winner! Everyone fell!");
                self.end_round(Vec::new());
            }
            _ => {}
        }
    }

    /// Reset the arena, then hand everyone who took part to relocation.
    pub fn end_round(&mut self, winners: Vec<Participant>) {
        if !self.transition(Phase::Ending) {
            return;
        }
        let everyone = self.participants();
        let winner = winners.first().map(|p| p.name().to_string());
        let outcome = if winners.is_empty() {
            Outcome::GameEnd
        } else {
            Outcome::GameWon
        };

        info!("Arena {} round over, winner: {:?}", self.name, winner);
        self.emit(ArenaEvent::GameOver { winner });

        self.reset();
        self.relocator.relocate(everyone, outcome);
    }

    /// Tear down the round: restore the floor, release every player, cancel
    /// every controller and go idle. Safe to call on an idle arena.
    pub fn reset(&mut self) {
        let restored = self.floor.restore(self.tiles.as_ref(), &self.definition.world);

        for player in self.alive.values().chain(self.spectators.values()) {
            if player.is_online() {
                player.set_mode(GameMode::Survival);
                player.clear_inventory();
            }
        }

        let released = self.player_count();
        self.alive.clear();
        self.spectators.clear();
        self.pvp_enabled = false;
        self.floor_ticks = 0;
        if let Some(mut controller) = self.waiting.take() {
            controller.cancel();
        }
        if let Some(mut controller) = self.pvp_timer.take() {
            controller.cancel();
        }

        let was = self.phase;
        self.transition(Phase::Idle);

        if was != Phase::Idle || released > 0 || restored > 0 {
            info!(
                "Arena {} reset: {} tiles restored, {} players released",
                self.name, restored, released
            );
            if was == Phase::Idle {
                self.emit_status();
            }
        }
    }

    /// Rewrite every tile of the region from the captured baseline.
    pub fn restore_baseline(&mut self) -> Result<usize> {
        if self.phase.is_active() {
            return Err(ArenaError::RoundInProgress);
        }
        let world = self.definition.world.as_str();
        if !self.tiles.is_loaded(world) {
            return Err(ArenaError::WorldNotLoaded(world.to_string()));
        }
        let restored = self
            .definition
            .original_blocks
            .iter()
            .filter(|&(&at, &tile)| self.tiles.set_tile(world, at, tile))
            .count();
        info!("Arena {}: baseline restored ({} tiles)", self.name, restored);
        Ok(restored)
    }

    // =========================================================================
    // Event-path rules
    // =========================================================================

    /// A participant took fall damage; out if at or below the threshold.
    pub fn handle_fall(&mut self, name: &str) -> bool {
        let Some(player) = self.alive.get(name).cloned() else {
            return false;
        };
        if player.position().y > self.config.elimination_y() {
            return false;
        }
        if self.config.spectator.auto_spectate_on_death {
            self.eliminate(name, EliminationCause::Fell)
        } else {
            player.send_message("You fell too far!");
            self.remove_participant(name, false)
        }
    }

    pub fn handle_death(&mut self, name: &str) -> bool {
        if !self.is_alive(name) {
            return false;
        }
        if self.config.spectator.auto_spectate_on_death {
            self.eliminate(name, EliminationCause::Death)
        } else {
            self.remove_participant(name, false)
        }
    }

    /// Whether damage to `victim` should go through. Fall damage never does;
    /// it is turned into an elimination check instead.
    pub fn damage_verdict(&mut self, victim: &str, source: DamageSource<'_>) -> bool {
        if self.is_spectator(victim) {
            return false;
        }
        if !self.is_alive(victim) {
            return true;
        }
        match source {
            DamageSource::Player(attacker) if !self.pvp_enabled => {
                if let Some(p) = self.alive.get(attacker) {
                    p.send_message("PVP is not active yet! Wait for PVP mode.");
                }
                false
            }
            DamageSource::Fall => {
                self.handle_fall(victim);
                false
            }
            _ => true,
        }
    }

    /// Alive players are frozen until the round runs.
    pub fn can_move(&self, name: &str) -> bool {
        !(self.is_alive(name) && self.phase.is_pregame())
    }

    /// Spectators may only move the leave item. `None` is any item the
    /// arena never hands out.
    pub fn can_rearrange_inventory(&self, name: &str, item: Option<Item>) -> bool {
        !self.is_spectator(name) || item == Some(Item::LeaveBed)
    }

    /// A spectator used the leave item: out of the arena and off to the hub.
    pub fn use_leave_item(&mut self, name: &str) -> bool {
        let Some(player) = self.spectators.get(name).cloned() else {
            return false;
        };
        player.send_message("Returning to hub...");
        self.remove_participant(name, true)
    }

    // =========================================================================
    // Events
    // =========================================================================

    fn emit(&self, event: ArenaEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(Notice {
                arena: self.name.clone(),
                event,
            });
        }
    }

    fn emit_status(&self) {
        self.emit(ArenaEvent::Status(self.status()));
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("name", &self.name)
            .field("world", &self.definition.world)
            .field("phase", &self.phase)
            .field("pvp_enabled", &self.pvp_enabled)
            .field("alive", &self.alive.keys().collect::<Vec<_>>())
            .field("spectators", &self.spectators.keys().collect::<Vec<_>>())
            .field("removed_tiles", &self.floor.removed_count())
            .finish()
    }
}
