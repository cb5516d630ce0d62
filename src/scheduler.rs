//! One clock for every arena
//!
//! A single task owns two intervals: the floor tick and the controller
//! second. Each tick locks one arena at a time, so timer steps are applied in
//! order with player joins and leaves on the same arena.

use crate::config::GameConfig;
use crate::registry::ArenaRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info};

pub struct Scheduler;

/// Handle to a running scheduler task
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Scheduler {
    pub fn spawn(registry: Arc<ArenaRegistry>, config: &GameConfig) -> SchedulerHandle {
        let (shutdown, mut stop) = watch::channel(false);
        let floor_period = config.floor_tick();

        let task = tokio::spawn(async move {
            let start = Instant::now();
            let mut floor = interval_at(start + floor_period, floor_period);
            floor.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut second = interval_at(start + Duration::from_secs(1), Duration::from_secs(1));
            second.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!("Scheduler started ({}ms floor tick)", floor_period.as_millis());
            loop {
                tokio::select! {
                    _ = floor.tick() => registry.tick_all().await,
                    _ = second.tick() => registry.tick_second_all().await,
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Scheduler stopped");
        });

        SchedulerHandle { shutdown, task }
    }
}

impl SchedulerHandle {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop ticking and wait for the task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaContext;
    use crate::sim::{MemoryWorld, SimPlayer};
    use crate::store::{ArenaDefinition, temp_store};
    use crate::types::{Coord, Phase, Position, Region, TileId};

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_drives_a_round_to_running() {
        let tiles = Arc::new(MemoryWorld::new());
        tiles.load("tnt");
        tiles.fill("tnt", Coord::new(0, 64, 0), Coord::new(3, 64, 3), TileId::TNT);

        let store = temp_store();
        let mut def = ArenaDefinition::new("tnt", Position::new(1.5, 65.0, 1.5));
        def.region = Some(Region::from_corners(Coord::new(0, 64, 0), Coord::new(3, 66, 3)));
        store.save("main", &def).unwrap();

        let config = GameConfig::default().wait_seconds(2).countdown(2).pvp(false, 3, 30);
        let ctx = ArenaContext::new(Arc::new(config.clone()), tiles);
        let registry = Arc::new(ArenaRegistry::new(store.clone(), ctx));
        registry.load_all().await.unwrap();

        registry.join("main", SimPlayer::new("a").handle()).await.unwrap();
        registry.join("main", SimPlayer::new("b").handle()).await.unwrap();

        let handle = Scheduler::spawn(registry.clone(), &config);
        tokio::time::sleep(Duration::from_millis(4_500)).await;

        let arena = registry.get("main").await.unwrap();
        assert_eq!(arena.lock().await.phase(), Phase::Running);

        assert!(handle.is_running());
        handle.shutdown().await;
        std::fs::remove_dir_all(store.dir()).unwrap();
    }
}
