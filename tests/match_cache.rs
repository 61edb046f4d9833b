use anyhow::Result;
use bitmask_ecs::{Component, EntityId, System, SystemSetup, World};

#[derive(Debug, Default)]
struct A;
impl Component for A {}

#[derive(Debug, Default)]
struct B;
impl Component for B {}

/// Requires whatever `declare` adds and records what it was fed
struct Probe {
    name: &'static str,
    declare: fn(&mut SystemSetup<'_>),
    seen: Vec<EntityId>,
}

impl Probe {
    fn new(name: &'static str, declare: fn(&mut SystemSetup<'_>)) -> Self {
        Self {
            name,
            declare,
            seen: Vec::new(),
        }
    }
}

impl System for Probe {
    fn name(&self) -> &str {
        self.name
    }

    fn initialize(&mut self, setup: &mut SystemSetup<'_>) -> Result<()> {
        (self.declare)(setup);
        Ok(())
    }

    fn process_system(&mut self, _world: &mut World) -> Result<()> {
        self.seen.clear();
        Ok(())
    }

    fn process_entity(&mut self, _world: &mut World, entity: EntityId) -> Result<()> {
        self.seen.push(entity);
        Ok(())
    }
}

fn requires_a(setup: &mut SystemSetup<'_>) {
    setup.require::<A>();
}

fn requires_a_and_b(setup: &mut SystemSetup<'_>) {
    setup.require::<A>();
    setup.require::<B>();
}

fn requires_nothing(_setup: &mut SystemSetup<'_>) {}

#[test]
fn superset_signatures_match() {
    let mut world = World::new();
    world.initialize().unwrap();
    assert_eq!(world.component_id::<A>().unwrap().bits(), 1);
    assert_eq!(world.component_id::<B>().unwrap().bits(), 2);

    let s1 = world.add_system(Probe::new("s1", requires_a)).unwrap();
    let s2 = world.add_system(Probe::new("s2", requires_a_and_b)).unwrap();

    let e1 = world.create_entity(None).unwrap();
    world.add_component(e1, A).unwrap();
    let e2 = world.create_entity(None).unwrap();
    world.add_component(e2, A).unwrap();
    world.add_component(e2, B).unwrap();

    assert_eq!(world.entities_matching(s1).unwrap(), vec![e1, e2]);
    assert_eq!(world.entities_matching(s2).unwrap(), vec![e2]);
}

#[test]
fn component_changes_keep_primed_caches_exact() {
    let mut world = World::new();
    world.initialize().unwrap();
    let s1 = world.add_system(Probe::new("s1", requires_a)).unwrap();
    let s2 = world.add_system(Probe::new("s2", requires_a_and_b)).unwrap();

    let e1 = world.create_entity(None).unwrap();
    world.add_component(e1, A).unwrap();
    let e2 = world.create_entity(None).unwrap();
    world.add_component(e2, A).unwrap();
    world.add_component(e2, B).unwrap();

    // prime both entries
    world.entities_matching(s1).unwrap();
    world.entities_matching(s2).unwrap();

    world.remove_component::<A>(e2).unwrap();
    assert_eq!(world.entities_matching(s1).unwrap(), vec![e1]);
    assert_eq!(world.entities_matching(s2).unwrap(), Vec::<EntityId>::new());

    world.add_component(e1, B).unwrap();
    assert_eq!(world.entities_matching(s2).unwrap(), vec![e1]);

    world.add_component(e2, A).unwrap();
    assert_eq!(world.entities_matching(s1).unwrap(), vec![e1, e2]);
    assert_eq!(world.entities_matching(s2).unwrap(), vec![e1, e2]);

    world.remove_entity(e1).unwrap();
    assert_eq!(world.entities_matching(s1).unwrap(), vec![e2]);
    assert_eq!(world.entities_matching(s2).unwrap(), vec![e2]);
}

#[test]
fn update_feeds_matched_entities_in_order() {
    let mut world = World::new();
    world.initialize().unwrap();
    let s1 = world.add_system(Probe::new("s1", requires_a)).unwrap();
    let empty = world.add_system(Probe::new("empty", requires_nothing)).unwrap();

    let e1 = world.create_entity(None).unwrap();
    let e2 = world.create_entity(None).unwrap();
    world.add_component(e2, A).unwrap();
    world.add_component(e1, A).unwrap();
    world.add_component(e1, B).unwrap();

    let report = world.update(16.0).unwrap();
    assert_eq!(report.frame, 1);
    assert_eq!(report.systems[0].processed, Some(2));
    assert_eq!(report.systems[1].processed, Some(0));

    assert_eq!(world.system::<Probe>(s1).unwrap().seen, vec![e1, e2]);
    assert!(world.system::<Probe>(empty).unwrap().seen.is_empty());
}

#[test]
fn detached_system_loses_its_cache() {
    let mut world = World::new();
    world.initialize().unwrap();
    let s1 = world.add_system(Probe::new("s1", requires_a)).unwrap();
    let e1 = world.create_entity(None).unwrap();
    world.add_component(e1, A).unwrap();
    assert_eq!(world.entities_matching(s1).unwrap(), vec![e1]);

    world.remove_system(s1).unwrap();
    assert!(world.entities_matching(s1).unwrap_err().is_not_found());
    assert!(world.remove_system(s1).unwrap_err().is_not_found());
    assert!(world.system::<Probe>(s1).is_none());
    assert!(world.system_ids().is_empty());
}
