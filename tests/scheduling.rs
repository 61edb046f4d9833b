use anyhow::{bail, Result};
use bitmask_ecs::{
    Component, EcsError, EntityId, Schedule, System, SystemSetup, World, WorldConfig,
};

#[derive(Debug, Default)]
struct Tick(u32);
impl Component for Tick {}

/// Counts frames in its once-per-frame hook and notes the frames on which
/// the per-entity step ran
struct Recorder {
    name: &'static str,
    schedule: Schedule,
    frames: usize,
    due_frames: Vec<usize>,
}

impl Recorder {
    fn new(name: &'static str, schedule: Schedule) -> Self {
        Self {
            name,
            schedule,
            frames: 0,
            due_frames: Vec::new(),
        }
    }
}

impl System for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn schedule(&self) -> Schedule {
        self.schedule
    }

    fn initialize(&mut self, setup: &mut SystemSetup<'_>) -> Result<()> {
        setup.require::<Tick>();
        Ok(())
    }

    fn process_system(&mut self, _world: &mut World) -> Result<()> {
        self.frames += 1;
        Ok(())
    }

    fn process_entity(&mut self, world: &mut World, entity: EntityId) -> Result<()> {
        if let Some(tick) = world.entity_mut(entity)?.component_mut::<Tick>() {
            tick.0 += 1;
        }
        let frame = self.frames - 1;
        if self.due_frames.last() != Some(&frame) {
            self.due_frames.push(frame);
        }
        Ok(())
    }
}

fn world_with_tick() -> (World, EntityId) {
    let mut world = World::new();
    world.initialize().unwrap();
    let entity = world.create_entity(None).unwrap();
    world.add_component(entity, Tick(0)).unwrap();
    (world, entity)
}

#[test]
fn periodic_system_runs_on_frames_49_and_99() {
    let (mut world, entity) = world_with_tick();
    let id = world
        .add_system(Recorder::new("periodic", Schedule::periodic(50.0)))
        .unwrap();

    for _ in 0..100 {
        world.update(1.0).unwrap();
    }

    let recorder = world.system::<Recorder>(id).unwrap();
    assert_eq!(recorder.frames, 100);
    assert_eq!(recorder.due_frames, vec![49, 99]);
    assert_eq!(world.entity(entity).unwrap().component::<Tick>().unwrap().0, 2);
}

#[test]
fn passive_system_only_gets_the_frame_hook() {
    let (mut world, entity) = world_with_tick();
    let id = world
        .add_system(Recorder::new("passive", Schedule::passive()))
        .unwrap();

    for _ in 0..5 {
        let report = world.update(16.0).unwrap();
        assert_eq!(report.systems[0].processed, None);
    }

    let recorder = world.system::<Recorder>(id).unwrap();
    assert_eq!(recorder.frames, 5);
    assert!(recorder.due_frames.is_empty());
    assert_eq!(world.entity(entity).unwrap().component::<Tick>().unwrap().0, 0);
}

#[test]
fn config_schedule_overrides_system_default() {
    let config = WorldConfig::from_yaml_str(
        "systems:\n  recorder:\n    periodic: true\n    period: 3.0\n",
    )
    .unwrap();
    let mut world = World::with_config(config);
    world.initialize().unwrap();
    let entity = world.create_entity(None).unwrap();
    world.add_component(entity, Tick(0)).unwrap();

    let id = world
        .add_system(Recorder::new("recorder", Schedule::every_frame()))
        .unwrap();
    assert!(world.system_record(id).unwrap().is_periodic());

    for _ in 0..6 {
        world.update(1.0).unwrap();
    }
    assert_eq!(world.system::<Recorder>(id).unwrap().due_frames, vec![2, 5]);
}

#[test]
fn systems_run_in_attachment_order() {
    let (mut world, _) = world_with_tick();
    world
        .add_system(Recorder::new("first", Schedule::every_frame()))
        .unwrap();
    world
        .add_system(Recorder::new("second", Schedule::passive()))
        .unwrap();

    let report = world.update(16.0).unwrap();
    let names: Vec<&str> = report.systems.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["first", "second"]);
}

struct Faulty;

impl System for Faulty {
    fn name(&self) -> &str {
        "faulty"
    }

    fn initialize(&mut self, setup: &mut SystemSetup<'_>) -> Result<()> {
        setup.require::<Tick>();
        Ok(())
    }

    fn process_entity(&mut self, _world: &mut World, entity: EntityId) -> Result<()> {
        bail!("entity {entity} is corrupt")
    }
}

#[test]
fn system_failure_propagates_and_keeps_the_system() {
    let (mut world, _) = world_with_tick();
    let id = world.add_system(Faulty).unwrap();

    let err = world.update(16.0).unwrap_err();
    assert!(matches!(err, EcsError::SystemFailed { ref system, .. } if system == "faulty"));
    assert!(world.system::<Faulty>(id).is_some());
}

struct Refuses;

impl System for Refuses {
    fn name(&self) -> &str {
        "refuses"
    }

    fn initialize(&mut self, _setup: &mut SystemSetup<'_>) -> Result<()> {
        bail!("missing asset")
    }

    fn process_entity(&mut self, _world: &mut World, _entity: EntityId) -> Result<()> {
        Ok(())
    }
}

#[test]
fn failed_initialize_does_not_attach() {
    let mut world = World::new();
    world.initialize().unwrap();
    assert!(matches!(
        world.add_system(Refuses),
        Err(EcsError::SystemFailed { .. })
    ));
    assert!(world.system_ids().is_empty());
}

/// Removes every entity it is fed and detaches itself on the second frame
struct Reaper {
    frames: u32,
    reaped: Vec<EntityId>,
}

impl System for Reaper {
    fn name(&self) -> &str {
        "reaper"
    }

    fn initialize(&mut self, setup: &mut SystemSetup<'_>) -> Result<()> {
        setup.require::<Tick>();
        Ok(())
    }

    fn process_system(&mut self, world: &mut World) -> Result<()> {
        self.frames += 1;
        if self.frames == 2 {
            let ids = world.system_ids();
            for id in ids {
                world.remove_system(id)?;
            }
        }
        Ok(())
    }

    fn process_entity(&mut self, world: &mut World, entity: EntityId) -> Result<()> {
        world.remove_entity(entity)?;
        self.reaped.push(entity);
        Ok(())
    }
}

#[test]
fn systems_may_remove_entities_and_themselves_mid_frame() {
    let (mut world, first) = world_with_tick();
    let second = world.create_entity(None).unwrap();
    world.add_component(second, Tick(0)).unwrap();
    let id = world
        .add_system(Reaper {
            frames: 0,
            reaped: Vec::new(),
        })
        .unwrap();

    world.update(16.0).unwrap();
    assert_eq!(world.entity_count(), 0);
    assert_eq!(world.system::<Reaper>(id).unwrap().reaped, vec![first, second]);

    let report = world.update(16.0).unwrap();
    assert_eq!(report.systems[0].processed, None);
    assert!(world.system_ids().is_empty());
    assert!(world.system::<Reaper>(id).is_none());
}

#[derive(Debug, Default)]
struct Marked;
impl Component for Marked {}

/// On its first entity, replaces the next one in the batch with a fresh
/// entity that reuses the freed id
struct Replacer {
    victim: EntityId,
    mark_replacement: bool,
    seen: Vec<EntityId>,
}

impl System for Replacer {
    fn name(&self) -> &str {
        "replacer"
    }

    fn initialize(&mut self, setup: &mut SystemSetup<'_>) -> Result<()> {
        setup.require::<Marked>();
        Ok(())
    }

    fn process_entity(&mut self, world: &mut World, entity: EntityId) -> Result<()> {
        self.seen.push(entity);
        if entity != self.victim && world.contains(self.victim) {
            world.remove_entity(self.victim)?;
            let replacement = world.create_entity(None)?;
            assert_eq!(replacement, self.victim);
            if self.mark_replacement {
                world.add_component(replacement, Marked)?;
            }
        }
        Ok(())
    }
}

fn run_replacer(mark_replacement: bool) -> Vec<EntityId> {
    let mut world = World::new();
    world.initialize().unwrap();
    let first = world.create_entity(None).unwrap();
    let second = world.create_entity(None).unwrap();
    world.add_component(first, Marked).unwrap();
    world.add_component(second, Marked).unwrap();

    let id = world
        .add_system(Replacer {
            victim: second,
            mark_replacement,
            seen: Vec::new(),
        })
        .unwrap();
    world.update(16.0).unwrap();
    world.system::<Replacer>(id).unwrap().seen.clone()
}

#[test]
fn reused_id_without_required_components_is_skipped() {
    assert_eq!(run_replacer(false), vec![0]);
}

#[test]
fn reused_id_is_not_mistaken_for_the_matched_entity() {
    assert_eq!(run_replacer(true), vec![0]);
}
