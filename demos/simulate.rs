//! Headless TNT Run round with scripted players
//!
//! Run with `RUST_LOG=tnt_run=debug cargo run --example simulate`.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tnt_run::sim::{MemoryWorld, SimPlayer};
use tnt_run::{
    ArenaContext, ArenaDefinition, ArenaEvent, ArenaRegistry, ArenaStore, Coord, GameConfig, Position,
    Scheduler, Session, SetupSession, TileId, TileStore,
};
use tokio::sync::mpsc;

const PLAYERS: [&str; 4] = ["alice", "bob", "carol", "dave"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    println!("tnt-run simulation");
    println!("==================\n");

    let config = Arc::new(
        GameConfig::default()
            .max_players(PLAYERS.len())
            .wait_seconds(2)
            .countdown(3)
            .pvp(false, 3, 30)
            .elimination(64, 4),
    );

    // 12x12 floor of TNT at y=64 over a stone pit
    let world = Arc::new(MemoryWorld::new());
    world.load("tnt");
    world.fill("tnt", Coord::new(0, 64, 0), Coord::new(11, 64, 11), TileId::TNT);
    world.fill("tnt", Coord::new(0, 50, 0), Coord::new(11, 50, 11), TileId::STONE);

    let dir = std::env::temp_dir().join("tnt-run-simulate");
    let store = ArenaStore::open(&dir)?;
    store.delete("main")?;

    let (tx, mut events) = mpsc::unbounded_channel();
    let ctx = ArenaContext::new(config.clone(), world.clone()).events(tx);
    let registry = Arc::new(ArenaRegistry::new(store, ctx));

    registry.create("main", "tnt", Position::new(6.0, 65.0, 6.0)).await?;
    let mut setup = SetupSession::new("main");
    setup.set_pos1("tnt", Coord::new(0, 64, 0));
    setup.set_pos2("tnt", Coord::new(11, 66, 11));
    registry.complete_setup(&setup).await?;
    let definition: ArenaDefinition = registry.store().load("main")?;
    println!("Arena ready: {} spawn points\n", definition.spawn_positions.len());

    let players: Vec<Arc<SimPlayer>> = PLAYERS.iter().map(|name| SimPlayer::new(*name)).collect();
    for p in &players {
        registry.join("main", p.handle()).await?;
    }

    let scheduler = Scheduler::spawn(registry.clone(), &config);
    let mut walk = tokio::time::interval(Duration::from_millis(250));
    let deadline = tokio::time::sleep(Duration::from_secs(120));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = walk.tick() => step(&world, &players),
            Some(notice) = events.recv() => {
                match notice.event {
                    ArenaEvent::Status(_) => {}
                    ArenaEvent::GameOver { winner } => {
                        match winner {
                            Some(name) => println!("[{}] Winner: {}", notice.arena, name),
                            None => println!("[{}] No winner", notice.arena),
                        }
                        break;
                    }
                    other => println!("[{}] {:?}", notice.arena, other),
                }
            }
            _ = &mut deadline => {
                println!("Round did not finish in time");
                break;
            }
        }
    }

    scheduler.shutdown().await;
    for summary in registry.summaries().await {
        println!("\n{} ({}): {} alive, {} spectating", summary.name, summary.phase, summary.alive, summary.spectators);
    }
    registry.reset_all().await;
    std::fs::remove_dir_all(dir)?;
    Ok(())
}

/// Random walk on the floor; anyone over a hole drops one tile.
fn step(world: &MemoryWorld, players: &[Arc<SimPlayer>]) {
    let mut rng = rand::thread_rng();
    for p in players.iter().filter(|p| p.world_name().as_deref() == Some("tnt")) {
        let pos = p.position();
        let below = world.tile("tnt", pos.block_below());
        if below.is_none_or(TileId::is_air) && pos.y > 40.0 {
            p.move_to(Position::new(pos.x, pos.y - 1.0, pos.z));
            continue;
        }
        let dx = rng.gen_range(-1..=1) as f64;
        let dz = rng.gen_range(-1..=1) as f64;
        let x = (pos.x + dx).clamp(0.5, 11.5);
        let z = (pos.z + dz).clamp(0.5, 11.5);
        p.move_to(Position::new(x, pos.y, z));
    }
}
