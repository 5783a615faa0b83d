use glam::{Quat, Vec3};

use spawnpool::{Placement, Pool, PoolError, PoolStats, Poolable, Pooled};

use crate::timer::{PoolPhase, SpawnTimers};

/// Walking speed for a 1.0-size cat (pixels/second).
const WALK_SPEED: f32 = 60.0;
/// Seconds a cat stays out before heading back to the den.
const CAT_LIFETIME: f32 = 4.0;
/// Screen-edge margin so cats stay visible.
const MARGIN: f32 = 8.0;

/// Owning context for every cat the pool builds.
#[derive(Debug, Clone)]
pub struct Den {
    pub name: String,
}

/// A short-lived wandering cat. Building one (name, coat) is the expensive part.
#[derive(Debug)]
pub struct Cat {
    pub name: String,
    pub color: u32,
    pub size: f32,
    pub den: Option<String>,
    pub pos: Vec3,
    pub vel: Vec3,
    pub lifetime: f32,
    /// Number of times this cat has been spawned.
    pub outings: u32,
}

impl Cat {
    fn new(rng: &mut fastrand::Rng, den: Option<&Den>) -> Self {
        Self {
            name: generate_cat_name(rng),
            color: random_cat_color(rng),
            size: 0.6 + rng.f32() * 0.8, // 0.6x to 1.4x
            den: den.map(|d| d.name.clone()),
            pos: Vec3::ZERO,
            vel: Vec3::ZERO,
            lifetime: 0.0,
            outings: 0,
        }
    }

    pub fn expired(&self) -> bool {
        self.lifetime <= 0.0
    }
}

impl Poolable for Cat {
    type Params = Placement;

    fn on_create(&mut self) {
        log::trace!("{} ({:08x}) moved into {:?}", self.name, self.color, self.den);
    }

    fn on_activate(&mut self, placement: &Placement) {
        self.pos = placement.position;
        // Bigger cats amble.
        self.vel = placement.rotation * Vec3::X * (WALK_SPEED / self.size);
        self.lifetime = CAT_LIFETIME;
        self.outings += 1;
    }

    fn on_deactivate(&mut self) {
        self.vel = Vec3::ZERO;
        self.lifetime = 0.0;
    }
}

/// Pool-backed crowd of cats: spawn, wander, go home, repeat.
pub struct Swarm {
    pool: Pool<Cat, Den>,
    cats: Vec<Pooled<Cat>>,
    rng: fastrand::Rng,
    pub timers: SpawnTimers,
    screen_w: f32,
    screen_h: f32,
}

impl Swarm {
    pub fn new(den: Den, seed: u64, screen_w: f32, screen_h: f32) -> Self {
        let mut factory_rng = fastrand::Rng::with_seed(seed);
        let pool: Pool<Cat, Den> = Pool::new(
            move |_placement: &Placement, den: Option<&Den>| Ok(Cat::new(&mut factory_rng, den)),
            Some(den),
        );
        Self {
            pool,
            cats: Vec::new(),
            rng: fastrand::Rng::with_seed(seed.wrapping_add(1)),
            timers: SpawnTimers::new(),
            screen_w,
            screen_h,
        }
    }

    /// Spawn `count` cats at random spots with random headings.
    pub fn spawn_cats(&mut self, count: usize) -> Result<(), PoolError> {
        for _ in 0..count {
            let pos = Vec3::new(
                self.rng.f32() * self.screen_w,
                self.rng.f32() * self.screen_h,
                0.0,
            );
            let heading = Quat::from_rotation_z(self.rng.f32() * std::f32::consts::TAU);

            self.timers.begin();
            let cat = self.pool.spawn_at_rotated(pos, heading)?;
            self.timers.end(PoolPhase::Spawn);

            self.cats.push(cat);
        }
        Ok(())
    }

    /// Move, age, and send expired cats back to the pool.
    pub fn update(&mut self, dt: f32) -> Result<(), PoolError> {
        let mut i = 0;
        while i < self.cats.len() {
            let cat: &mut Cat = &mut self.cats[i];
            cat.pos += cat.vel * dt;
            cat.pos.x = cat.pos.x.clamp(MARGIN, self.screen_w - MARGIN);
            cat.pos.y = cat.pos.y.clamp(MARGIN, self.screen_h - MARGIN);
            cat.lifetime -= dt;

            if cat.expired() {
                let cat = self.cats.swap_remove(i);
                self.timers.begin();
                self.pool.release(cat)?;
                self.timers.end(PoolPhase::Release);
            } else {
                i += 1;
            }
        }
        Ok(())
    }

    /// Cats currently out.
    pub fn count(&self) -> usize {
        self.cats.len()
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

/// Generate a procedural cat name from name parts.
fn generate_cat_name(rng: &mut fastrand::Rng) -> String {
    const PREFIXES: &[&str] = &["", "", "", "Sir ", "Lady ", "Captain ", "Dr. ", "Little "];
    const NAMES: &[&str] = &[
        "Whiskers", "Mittens", "Shadow", "Luna", "Mochi", "Noodle", "Biscuit", "Pepper",
        "Ginger", "Oreo", "Tofu", "Pickles", "Nugget", "Waffles", "Pixel", "Widget",
    ];
    format!(
        "{}{}",
        PREFIXES[rng.usize(0..PREFIXES.len())],
        NAMES[rng.usize(0..NAMES.len())],
    )
}

/// Random cat-ish coat color, RGBA packed.
fn random_cat_color(rng: &mut fastrand::Rng) -> u32 {
    let palette: &[[u8; 3]] = &[
        [255, 165, 50],  // orange tabby
        [80, 80, 80],    // gray
        [30, 30, 30],    // black
        [240, 240, 235], // white
        [255, 200, 150], // cream
    ];
    let [r, g, b] = palette[rng.usize(0..palette.len())];
    (r as u32) << 24 | (g as u32) << 16 | (b as u32) << 8 | 0xFF
}
