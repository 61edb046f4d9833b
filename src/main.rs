use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bitmask_ecs::{
    Component, ComponentType, EntityId, Schedule, System, SystemSetup, World, WorldConfig,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Pooled entity churn soak runner")]
struct Cli {
    /// Path to a world config YAML file
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 1000)]
    frames: u64,

    /// Seed for the spawn pattern
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Frame delta in milliseconds
    #[arg(long, default_value_t = 16.0)]
    delta: f32,

    /// Overrides `logging.level` from the config
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Debug, Default)]
struct Particle {
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
}
impl Component for Particle {}

#[derive(Debug, Default)]
struct Lifetime {
    remaining_ms: f32,
}
impl Component for Lifetime {}

#[derive(Debug, Default)]
struct Spark;
impl Component for Spark {}

/// Spawns a random burst of pooled particles every frame
struct Spawner {
    rng: ChaCha8Rng,
    max_burst: usize,
}

impl Spawner {
    fn spawn(&mut self, world: &mut World) -> Result<EntityId> {
        let mut types = vec![
            ComponentType::constructible::<Particle>(),
            ComponentType::constructible::<Lifetime>(),
        ];
        if self.rng.gen_bool(0.25) {
            types.push(ComponentType::constructible::<Spark>());
        }
        let id = world.create_pooled_entity(&types)?;

        let entity = world.entity_mut(id)?;
        if let Some(particle) = entity.component_mut::<Particle>() {
            particle.x = 0.0;
            particle.y = 0.0;
            particle.vx = self.rng.gen_range(-1.0..1.0);
            particle.vy = self.rng.gen_range(-1.0..1.0);
        }
        if let Some(lifetime) = entity.component_mut::<Lifetime>() {
            lifetime.remaining_ms = self.rng.gen_range(50.0..1500.0);
        }
        Ok(id)
    }
}

impl System for Spawner {
    fn name(&self) -> &str {
        "spawner"
    }

    fn schedule(&self) -> Schedule {
        Schedule::passive()
    }

    fn initialize(&mut self, _setup: &mut SystemSetup<'_>) -> Result<()> {
        Ok(())
    }

    fn process_system(&mut self, world: &mut World) -> Result<()> {
        let burst = self.rng.gen_range(0..=self.max_burst);
        for _ in 0..burst {
            self.spawn(world)?;
        }
        Ok(())
    }

    fn process_entity(&mut self, _world: &mut World, _entity: EntityId) -> Result<()> {
        Ok(())
    }
}

struct Motion {
    delta_ms: f32,
}

impl System for Motion {
    fn name(&self) -> &str {
        "motion"
    }

    fn initialize(&mut self, setup: &mut SystemSetup<'_>) -> Result<()> {
        setup.require::<Particle>();
        Ok(())
    }

    fn process_entity(&mut self, world: &mut World, entity: EntityId) -> Result<()> {
        let step = self.delta_ms * 0.001;
        if let Some(particle) = world.entity_mut(entity)?.component_mut::<Particle>() {
            particle.x += particle.vx * step;
            particle.y += particle.vy * step;
        }
        Ok(())
    }
}

/// Removes entities whose lifetime ran out; they return to their pool
struct Expiry {
    delta_ms: f32,
    expired: u64,
}

impl System for Expiry {
    fn name(&self) -> &str {
        "expiry"
    }

    fn initialize(&mut self, setup: &mut SystemSetup<'_>) -> Result<()> {
        setup.require::<Lifetime>();
        Ok(())
    }

    fn process_entity(&mut self, world: &mut World, entity: EntityId) -> Result<()> {
        let remaining = match world.entity_mut(entity)?.component_mut::<Lifetime>() {
            Some(lifetime) => {
                lifetime.remaining_ms -= self.delta_ms;
                lifetime.remaining_ms
            }
            None => return Ok(()),
        };
        if remaining <= 0.0 {
            world.remove_entity(entity)?;
            self.expired += 1;
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => WorldConfig::from_yaml(path)?,
        None => WorldConfig::default(),
    };

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .init();

    let mut world = World::with_config(config);
    world.initialize()?;
    world.add_system(Spawner {
        rng: ChaCha8Rng::seed_from_u64(cli.seed),
        max_burst: 6,
    })?;
    world.add_system(Motion { delta_ms: cli.delta })?;
    let expiry = world.add_system(Expiry {
        delta_ms: cli.delta,
        expired: 0,
    })?;

    let mut slowest = 0.0_f64;
    for _ in 0..cli.frames {
        let report = world.update(cli.delta)?;
        let frame_ms: f64 = report.systems.iter().map(|s| s.duration_ms).sum();
        slowest = slowest.max(frame_ms);
    }

    let expired = world.system::<Expiry>(expiry).map_or(0, |s| s.expired);
    info!(frames = world.frame(), live = world.entity_count(), expired, "soak finished");

    println!(
        "Ran {} frames: {} live entities, {} expired, slowest frame {:.3} ms",
        world.frame(),
        world.entity_count(),
        expired,
        slowest
    );
    for signature in world.pool_manager().signatures() {
        if let Some(pool) = world.pool_manager().pool(signature) {
            println!(
                "  pool {signature}: size {} min {} max {} frequency {}",
                pool.len(),
                pool.min_size(),
                pool.max_size(),
                pool.frequency()
            );
        }
    }

    world.dispose()?;
    Ok(())
}
