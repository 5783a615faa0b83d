mod swarm;
mod timer;

use instant::Instant;

use swarm::{Den, Swarm};

/// Simulation tick (seconds).
const TICK_RATE: f32 = 1.0 / 60.0;
/// Ticks to simulate before exiting (one simulated minute).
const TOTAL_TICKS: u64 = 3600;
/// Cats sent out each tick.
const SPAWN_PER_TICK: usize = 5;
/// How often to log pool stats (ticks).
const LOG_INTERVAL: u64 = 300;
const SCREEN_W: f32 = 1920.0;
const SCREEN_H: f32 = 1080.0;
const SEED: u64 = 0xCA75;

fn main() {
    env_logger::init();
    log::info!("spawnpool swarm starting up");

    if let Err(e) = run() {
        log::error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

/// Run the headless swarm for a fixed number of ticks.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let den = Den {
        name: "cardboard box".to_string(),
    };
    let mut swarm = Swarm::new(den, SEED, SCREEN_W, SCREEN_H);
    let started = Instant::now();

    for tick in 1..=TOTAL_TICKS {
        swarm.spawn_cats(SPAWN_PER_TICK)?;
        swarm.update(TICK_RATE)?;

        if tick % LOG_INTERVAL == 0 {
            let s = swarm.stats();
            log::info!(
                "tick {} | out: {} | free: {} | capacity: {} | created: {} | reused: {} | grows: {} | {}",
                tick,
                s.active,
                s.free,
                s.capacity,
                s.created,
                s.reuses,
                s.grows,
                swarm.timers.summary(),
            );
        }
    }

    let s = swarm.stats();
    log::info!(
        "done in {:.2}ms: {} spawns served by {} cats",
        started.elapsed().as_secs_f64() * 1000.0,
        s.created + s.reuses,
        s.created,
    );
    Ok(())
}
