use super::*;
use crate::components::ContactSensor;
use crate::foundation::time::FIXED_DELTA;
use crate::physics::contact::{self, Participant};
use crate::physics::recording::{Call, RecordingBackend};
use crate::physics::{BodyType, Collider, ContactListener, Shape};
use approx::assert_relative_eq;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

type Log = Rc<RefCell<Vec<String>>>;

fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

fn take(log: &Log) -> Vec<String> {
    std::mem::take(&mut *log.borrow_mut())
}

/// Records every lifecycle callback as `label:event`
struct Probe {
    label: &'static str,
    log: Log,
}

impl Probe {
    fn new(label: &'static str, log: &Log) -> Self {
        Self {
            label,
            log: Rc::clone(log),
        }
    }

    fn push(&self, event: &str) {
        self.log.borrow_mut().push(format!("{}:{event}", self.label));
    }
}

impl Behavior for Probe {
    fn start(&mut self, _ctx: &mut Context<'_>) -> Result<(), SceneError> {
        self.push("start");
        Ok(())
    }

    fn update(&mut self, _ctx: &mut Context<'_>) -> Result<(), SceneError> {
        self.push("update");
        Ok(())
    }

    fn destroy(&mut self, _ctx: &mut Context<'_>) -> Result<(), SceneError> {
        self.push("destroy");
        Ok(())
    }

    fn on_position_changed(&mut self, _ctx: &mut Context<'_>, _old: Vec2, new: Vec2) -> Result<(), SceneError> {
        self.push(&format!("moved({},{})", new.x, new.y));
        Ok(())
    }

    fn on_size_changed(&mut self, _ctx: &mut Context<'_>, _old: Vec2, _new: Vec2) -> Result<(), SceneError> {
        self.push("resized");
        Ok(())
    }
}

#[derive(Default)]
struct Marker;

impl Behavior for Marker {}

/// Attaches a probe to its own entity when started
struct Spawner {
    log: Log,
}

impl Behavior for Spawner {
    fn start(&mut self, ctx: &mut Context<'_>) -> Result<(), SceneError> {
        self.log.borrow_mut().push("spawner:start".to_string());
        ctx.attach(Probe::new("child", &self.log))?;
        Ok(())
    }
}

/// Admits another entity during its first update
struct Admitter {
    target: EntityId,
    done: bool,
}

impl Behavior for Admitter {
    fn update(&mut self, ctx: &mut Context<'_>) -> Result<(), SceneError> {
        if !self.done {
            self.done = true;
            ctx.scene_mut().add_entity(self.target)?;
        }
        Ok(())
    }
}

/// Shifts its entity right by one unit every update
struct Mover {
    log: Log,
}

impl Behavior for Mover {
    fn update(&mut self, ctx: &mut Context<'_>) -> Result<(), SceneError> {
        self.log.borrow_mut().push("mover:update".to_string());
        let position = ctx.position();
        ctx.set_position(position + Vec2::new(1.0, 0.0))
    }

    fn on_position_changed(&mut self, _ctx: &mut Context<'_>, _old: Vec2, new: Vec2) -> Result<(), SceneError> {
        self.log.borrow_mut().push(format!("mover:moved({},{})", new.x, new.y));
        Ok(())
    }
}

/// Counts fixed updates
struct StepCounter {
    steps: Rc<Cell<u32>>,
}

impl Behavior for StepCounter {
    fn fixed_update(&mut self, _ctx: &mut Context<'_>) -> Result<(), SceneError> {
        self.steps.set(self.steps.get() + 1);
        Ok(())
    }
}

/// Contact listener with a fixed answer to the filter
struct Gate {
    label: &'static str,
    accept: bool,
    log: Log,
}

impl Behavior for Gate {
    fn contact_listener(&self) -> Option<&dyn ContactListener> {
        Some(self)
    }

    fn contact_listener_mut(&mut self) -> Option<&mut dyn ContactListener> {
        Some(self)
    }
}

impl ContactListener for Gate {
    fn on_contact_begin(&mut self, _ctx: &mut Context<'_>, _other: EntityId) -> Result<(), SceneError> {
        self.log.borrow_mut().push(format!("{}:begin", self.label));
        Ok(())
    }

    fn on_contact_end(&mut self, _ctx: &mut Context<'_>, _other: EntityId) -> Result<(), SceneError> {
        self.log.borrow_mut().push(format!("{}:end", self.label));
        Ok(())
    }

    fn should_collide(&self, _world: &World, _other: EntityId) -> bool {
        self.accept
    }
}

fn admitted(scene: &mut Scene, name: &str) -> EntityId {
    let id = scene.create_entity(name);
    scene.add_entity(id).unwrap();
    id
}

fn recorded_scene() -> (Scene, crate::physics::recording::CallLog) {
    let (backend, calls) = RecordingBackend::new();
    (Scene::with_backend(PhysicsConfig::default(), Box::new(backend)), calls)
}

fn body_entity(scene: &mut Scene, position: Vec2, body: RigidBody) -> EntityId {
    let id = EntityBuilder::new("body")
        .position(position)
        .size(Vec2::new(20.0, 20.0))
        .spawn(scene);
    scene.add_entity(id).unwrap();
    scene.attach_new(id, body).unwrap();
    id
}

// -------------------------------------------------------------------------
// Lifecycle and deferred mutation
// -------------------------------------------------------------------------

#[test]
fn test_mutation_before_activation_is_immediate() {
    let log = new_log();
    let mut scene = Scene::new();
    let id = admitted(&mut scene, "crate");
    assert!(scene.contains(id));

    scene.attach_new(id, Probe::new("a", &log)).unwrap();
    assert_eq!(take(&log), vec!["a:start"]);
    assert!(scene.world().component::<Probe>(id).is_some());
}

#[test]
fn test_behavior_on_detached_entity_starts_on_admission() {
    let log = new_log();
    let mut scene = Scene::new();
    let id = scene.create_entity("crate");
    let probe = scene.attach_new(id, Probe::new("a", &log)).unwrap();

    assert_eq!(scene.world().attachment(probe), Some(Attachment::Attached(id)));
    assert!(take(&log).is_empty());

    scene.add_entity(id).unwrap();
    assert_eq!(take(&log), vec!["a:start"]);
}

#[test]
fn test_attach_then_detach_before_drain_fires_nothing() {
    let log = new_log();
    let mut scene = Scene::new();
    let id = admitted(&mut scene, "crate");
    scene.activate();

    let probe = scene.attach_new(id, Probe::new("a", &log)).unwrap();
    assert_eq!(scene.world().attachment(probe), Some(Attachment::Pending(id)));
    assert!(scene.world().component::<Probe>(id).is_none());

    scene.detach(probe).unwrap();
    scene.update_state(0.0).unwrap();

    assert!(take(&log).is_empty());
    assert!(scene.world().entity(id).unwrap().behaviors().is_empty());
    assert_eq!(scene.world().attachment(probe), Some(Attachment::Detached));
    assert!(scene.dispose_behavior(probe).is_some());
}

#[test]
fn test_drain_applies_operations_queued_by_start() {
    let log = new_log();
    let mut scene = Scene::new();
    let id = admitted(&mut scene, "crate");
    scene.activate();

    scene.attach_new(id, Spawner { log: Rc::clone(&log) }).unwrap();
    scene.update_state(0.0).unwrap();

    assert_eq!(take(&log), vec!["spawner:start", "child:start"]);
    assert_eq!(scene.world().entity(id).unwrap().behaviors().len(), 2);
    assert!(!scene.world().entity(id).unwrap().is_dirty());

    scene.update_state(0.0).unwrap();
    assert_eq!(take(&log), vec!["child:update"]);
}

#[test]
fn test_update_follows_stable_z_order() {
    let log = new_log();
    let mut scene = Scene::new();
    let labels = ["0", "1", "2", "3"];
    for (label, z_index) in labels.into_iter().zip([2, 1, 2, 0]) {
        let id = EntityBuilder::new(label).z_index(z_index).spawn(&mut scene);
        scene.attach_new(id, Probe::new(label, &log)).unwrap();
        scene.add_entity(id).unwrap();
    }
    scene.activate();
    take(&log);

    scene.update_state(0.0).unwrap();
    assert_eq!(take(&log), vec!["3:update", "1:update", "0:update", "2:update"]);
}

#[test]
fn test_entity_added_during_pass_joins_next_frame() {
    let log = new_log();
    let mut scene = Scene::new();
    let late = scene.create_entity("late");
    scene.attach_new(late, Probe::new("late", &log)).unwrap();
    let host = admitted(&mut scene, "host");
    scene.attach_new(host, Admitter { target: late, done: false }).unwrap();
    scene.activate();

    scene.update_state(0.0).unwrap();
    assert!(take(&log).is_empty());
    assert!(!scene.contains(late));

    scene.update_state(0.0).unwrap();
    assert_eq!(take(&log), vec!["late:start", "late:update"]);
    assert!(scene.contains(late));
}

#[test]
fn test_removal_destroys_but_keeps_behaviors() {
    let log = new_log();
    let mut scene = Scene::new();
    let id = admitted(&mut scene, "crate");
    let probe = scene.attach_new(id, Probe::new("a", &log)).unwrap();

    scene.remove_entity(id).unwrap();
    assert!(!scene.contains(id));
    assert_eq!(scene.world().attachment(probe), Some(Attachment::Attached(id)));

    scene.add_entity(id).unwrap();
    assert_eq!(take(&log), vec!["a:start", "a:destroy", "a:start"]);
}

#[test]
fn test_add_then_remove_in_same_frame_cancels() {
    let log = new_log();
    let mut scene = Scene::new();
    scene.activate();
    let id = scene.create_entity("ghost");
    scene.attach_new(id, Probe::new("ghost", &log)).unwrap();

    scene.add_entity(id).unwrap();
    scene.remove_entity(id).unwrap();
    scene.update_state(0.0).unwrap();

    assert!(!scene.contains(id));
    assert!(take(&log).is_empty());
}

#[test]
fn test_despawn_frees_entity_and_behaviors() {
    let log = new_log();
    let mut scene = Scene::new();
    let id = admitted(&mut scene, "crate");
    scene.attach_new(id, Probe::new("a", &log)).unwrap();
    scene.activate();
    take(&log);

    scene.despawn(id).unwrap();
    assert!(scene.contains(id));

    scene.update_state(0.0).unwrap();
    assert_eq!(take(&log), vec!["a:destroy"]);
    assert!(!scene.world().contains_entity(id));
    assert_eq!(scene.world().behavior_count(), 0);
    assert_eq!(scene.add_entity(id), Err(SceneError::UnknownEntity));
}

#[test]
fn test_attaching_an_attached_behavior_fails() {
    let mut scene = Scene::new();
    let first = admitted(&mut scene, "first");
    let second = admitted(&mut scene, "second");
    let marker = scene.attach_new(first, Marker).unwrap();

    assert_eq!(scene.attach(second, marker), Err(SceneError::AlreadyAttached));
    assert_eq!(scene.world().attachment(marker), Some(Attachment::Attached(first)));
}

#[test]
fn test_detach_all_removes_only_that_type() {
    let log = new_log();
    let mut scene = Scene::new();
    let id = admitted(&mut scene, "crate");
    scene.attach_new(id, Probe::new("a", &log)).unwrap();
    scene.attach_new(id, Marker).unwrap();
    scene.attach_new(id, Probe::new("b", &log)).unwrap();
    take(&log);

    scene.detach_all::<Probe>(id).unwrap();
    assert_eq!(take(&log), vec!["a:destroy", "b:destroy"]);
    assert!(scene.world().component::<Probe>(id).is_none());
    assert!(scene.world().component::<Marker>(id).is_some());
}

#[test]
fn test_transform_notifies_only_on_change() {
    let log = new_log();
    let mut scene = Scene::new();
    let id = admitted(&mut scene, "crate");
    scene.attach_new(id, Probe::new("a", &log)).unwrap();
    take(&log);

    scene.set_position(id, Vec2::zeros()).unwrap();
    assert!(take(&log).is_empty());

    scene.set_position(id, Vec2::new(3.0, 4.0)).unwrap();
    scene.set_size(id, Vec2::new(8.0, 8.0)).unwrap();
    scene.set_size(id, Vec2::new(8.0, 8.0)).unwrap();
    assert_eq!(take(&log), vec!["a:moved(3,4)", "a:resized"]);
}

#[test]
fn test_writer_hears_its_own_transform_change() {
    let log = new_log();
    let mut scene = Scene::new();
    let id = admitted(&mut scene, "crate");
    scene.attach_new(id, Mover { log: Rc::clone(&log) }).unwrap();
    scene.attach_new(id, Probe::new("other", &log)).unwrap();
    scene.activate();
    take(&log);

    scene.update_state(0.0).unwrap();
    assert_eq!(
        take(&log),
        vec!["mover:update", "other:moved(1,0)", "mover:moved(1,0)", "other:update"]
    );

    scene.set_position(id, Vec2::new(5.0, 5.0)).unwrap();
    assert_eq!(take(&log), vec!["mover:moved(5,5)", "other:moved(5,5)"]);
}

#[test]
fn test_lookups_see_admitted_entities_only() {
    let mut scene = Scene::new();
    let hero = EntityBuilder::new("hero").tag("player").spawn(&mut scene);
    let wolf = EntityBuilder::new("wolf").tag("enemy").spawn(&mut scene);
    let bear = EntityBuilder::new("bear").tag("enemy").spawn(&mut scene);
    scene.add_entities([hero, wolf]).unwrap();
    scene.attach_new(wolf, Marker).unwrap();
    scene.attach_new(bear, Marker).unwrap();

    assert_eq!(scene.find_by_name("hero"), Some(hero));
    assert_eq!(scene.find_by_name("bear"), None);
    assert_eq!(scene.find_by_tag("enemy"), Some(wolf));
    assert_eq!(scene.find_all_by_tag("enemy"), vec![wolf]);
    assert_eq!(scene.find_components::<Marker>().len(), 1);
    assert!(scene.find_component::<Probe>().is_none());
}

#[test]
fn test_unknown_ids_are_reported() {
    let mut scene = Scene::new();
    let id = scene.create_entity("temp");
    let marker = scene.insert_behavior(Marker);
    scene.despawn(id).unwrap();

    assert_eq!(scene.add_entity(id), Err(SceneError::UnknownEntity));
    assert_eq!(scene.attach(id, marker), Err(SceneError::UnknownEntity));
    assert_eq!(scene.set_position(id, Vec2::zeros()), Err(SceneError::UnknownEntity));
    assert!(scene.dispose_behavior(marker).is_some());
    assert_eq!(scene.detach(marker), Err(SceneError::UnknownBehavior));
}

// -------------------------------------------------------------------------
// Physics integration
// -------------------------------------------------------------------------

#[test]
fn test_frame_deltas_run_whole_fixed_steps() {
    let steps = Rc::new(Cell::new(0));
    let mut scene = Scene::new();
    let id = admitted(&mut scene, "clock");
    scene
        .attach_new(id, StepCounter { steps: Rc::clone(&steps) })
        .unwrap();
    scene.activate();

    let mut counts = Vec::new();
    for delta in [0.01, 0.02, 0.05, 0.0] {
        scene.update_state(delta).unwrap();
        counts.push(steps.replace(0));
    }
    assert_eq!(counts, vec![0, 1, 3, 0]);
    assert_eq!(scene.physics().step_count(), 4);
}

#[test]
fn test_second_rigid_body_is_refused() {
    let (mut scene, calls) = recorded_scene();
    let id = body_entity(&mut scene, Vec2::zeros(), RigidBody::default());

    let result = scene.attach_new(id, RigidBody::default());
    assert_eq!(result, Err(SceneError::DuplicateRigidBody));
    assert_eq!(scene.physics().body_count(), 1);
    assert_eq!(scene.world().component_ids::<RigidBody>(id).len(), 1);
    assert_eq!(scene.world().behavior_count(), 1);

    // The surviving body still recreates on resize
    calls.borrow_mut().clear();
    scene.set_size(id, Vec2::new(40.0, 40.0)).unwrap();
    assert_eq!(scene.physics().body_count(), 1);
    assert!(scene.rigid_body_mut(id).unwrap().0.has_body());
    assert!(matches!(calls.borrow().as_slice(), [Call::Destroy(_), Call::Create(_)]));
}

#[test]
fn test_rejected_circle_leaves_room_for_a_box() {
    let mut scene = Scene::new();
    let id = EntityBuilder::new("plank")
        .size(Vec2::new(10.0, 12.0))
        .spawn(&mut scene);
    scene.add_entity(id).unwrap();

    let result = scene.attach_new(id, RigidBody::new(BodyType::Dynamic, Collider::Circle));
    assert!(matches!(result, Err(SceneError::InvalidCollider(_))));
    assert!(scene.world().component::<RigidBody>(id).is_none());
    assert!(scene.world().entity(id).unwrap().behaviors().is_empty());

    scene
        .attach_new(id, RigidBody::new(BodyType::Dynamic, Collider::Box))
        .unwrap();
    assert_eq!(scene.physics().body_count(), 1);
}

#[test]
fn test_failed_start_on_admission_detaches_only_the_culprit() {
    let log = new_log();
    let mut scene = Scene::new();
    let id = EntityBuilder::new("crate")
        .size(Vec2::new(20.0, 20.0))
        .spawn(&mut scene);
    scene.attach_new(id, RigidBody::default()).unwrap();
    let second = scene.attach_new(id, RigidBody::default()).unwrap();
    scene.attach_new(id, Probe::new("a", &log)).unwrap();

    assert_eq!(scene.add_entity(id), Err(SceneError::DuplicateRigidBody));
    assert!(scene.contains(id));
    assert_eq!(take(&log), vec!["a:start"]);
    assert_eq!(scene.world().attachment(second), Some(Attachment::Detached));
    assert_eq!(scene.world().component_ids::<RigidBody>(id).len(), 1);
    assert_eq!(scene.physics().body_count(), 1);
}

#[test]
fn test_body_sync_does_not_echo_into_backend() {
    let (mut scene, calls) = recorded_scene();
    let id = body_entity(&mut scene, Vec2::zeros(), RigidBody::default());
    scene.activate();
    calls.borrow_mut().clear();

    scene.update_state(FIXED_DELTA).unwrap();

    let position = scene.world().entity(id).unwrap().position();
    assert_relative_eq!(position.x, 0.0, epsilon = 1e-3);
    assert_relative_eq!(position.y, 20.0, epsilon = 1e-3);
    assert_eq!(*calls.borrow(), vec![Call::Step]);
    assert!(!scene.rigid_body_mut(id).unwrap().0.is_updating());
}

#[test]
fn test_moving_entity_teleports_body() {
    let (mut scene, calls) = recorded_scene();
    let id = body_entity(&mut scene, Vec2::zeros(), RigidBody::default());
    calls.borrow_mut().clear();

    scene.set_position(id, Vec2::new(40.0, 0.0)).unwrap();

    let calls = calls.borrow();
    let [Call::Transform(_, center, angle)] = calls.as_slice() else {
        panic!("expected one transform, got {calls:?}");
    };
    assert_relative_eq!(center.x, 2.5, epsilon = 1e-5);
    assert_relative_eq!(center.y, 0.5, epsilon = 1e-5);
    assert_eq!(*angle, 0.0);
}

#[test]
fn test_resize_recreates_body() {
    let (mut scene, calls) = recorded_scene();
    let id = body_entity(&mut scene, Vec2::zeros(), RigidBody::default());
    let old = scene.rigid_body_mut(id).unwrap().0.body().unwrap();
    calls.borrow_mut().clear();

    scene.set_size(id, Vec2::new(40.0, 40.0)).unwrap();

    let calls = calls.borrow();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], Call::Destroy(old));
    let Call::Create(desc) = &calls[1] else {
        panic!("expected a create call, got {:?}", calls[1]);
    };
    assert_eq!(desc.shape, Shape::Box { half_extents: Vec2::new(1.0, 1.0) });
    assert_eq!(scene.physics().body_count(), 1);
}

#[test]
fn test_contact_requires_both_sides_to_accept() {
    let log = new_log();
    let (mut scene, calls) = recorded_scene();
    let a = body_entity(&mut scene, Vec2::zeros(), RigidBody::default());
    let b = body_entity(&mut scene, Vec2::new(10.0, 0.0), RigidBody::default());
    scene
        .attach_new(a, Gate { label: "a", accept: true, log: Rc::clone(&log) })
        .unwrap();
    scene
        .attach_new(b, Gate { label: "b", accept: false, log: Rc::clone(&log) })
        .unwrap();
    scene.activate();

    scene.update_state(FIXED_DELTA).unwrap();

    assert!(take(&log).is_empty());
    assert!(calls
        .borrow()
        .iter()
        .any(|call| matches!(call, Call::Filter(_, _, false))));
}

#[test]
fn test_contact_reaches_both_sides_when_accepted() {
    let log = new_log();
    let (mut scene, _calls) = recorded_scene();
    let a = body_entity(&mut scene, Vec2::zeros(), RigidBody::default());
    let b = body_entity(&mut scene, Vec2::new(10.0, 0.0), RigidBody::default());
    scene
        .attach_new(a, Gate { label: "a", accept: true, log: Rc::clone(&log) })
        .unwrap();
    scene
        .attach_new(b, Gate { label: "b", accept: true, log: Rc::clone(&log) })
        .unwrap();
    scene.activate();

    scene.update_state(FIXED_DELTA).unwrap();
    assert_eq!(take(&log), vec!["a:begin", "b:begin"]);
}

#[test]
fn test_static_pair_never_collides() {
    let mut scene = Scene::new();
    let a = admitted(&mut scene, "wall");
    let b = admitted(&mut scene, "floor");
    let wall = Participant { entity: a, body_type: BodyType::Static };
    let floor = Participant { entity: b, body_type: BodyType::Static };
    let ball = Participant { entity: b, body_type: BodyType::Dynamic };

    assert!(!contact::accepts_pair(scene.world(), wall, floor));
    assert!(contact::accepts_pair(scene.world(), wall, ball));
}

#[test]
fn test_falling_box_comes_to_rest_on_ground() {
    let mut scene = Scene::new();
    let ground = EntityBuilder::new("ground")
        .position(Vec2::new(0.0, 100.0))
        .size(Vec2::new(200.0, 20.0))
        .spawn(&mut scene);
    scene.add_entity(ground).unwrap();
    scene
        .attach_new(ground, RigidBody::new(BodyType::Static, Collider::Box))
        .unwrap();
    let crate_id = body_entity(&mut scene, Vec2::new(90.0, 0.0), RigidBody::default());
    scene.attach_new(crate_id, ContactSensor::new()).unwrap();
    scene.activate();

    for _ in 0..240 {
        scene.update_state(FIXED_DELTA).unwrap();
    }

    let position = scene.world().entity(crate_id).unwrap().position();
    assert_relative_eq!(position.y, 80.0, epsilon = 1.0);
    assert_relative_eq!(position.x, 90.0, epsilon = 0.5);
    let sensor = scene.world().component::<ContactSensor>(crate_id).unwrap();
    assert!(sensor.is_touching(ground));
}

#[test]
fn test_removed_entity_hears_no_end_contact() {
    let log = new_log();
    let mut scene = Scene::new();
    let ground = EntityBuilder::new("ground")
        .position(Vec2::new(0.0, 100.0))
        .size(Vec2::new(200.0, 20.0))
        .spawn(&mut scene);
    scene.add_entity(ground).unwrap();
    scene
        .attach_new(ground, RigidBody::new(BodyType::Static, Collider::Box))
        .unwrap();
    scene
        .attach_new(ground, Gate { label: "ground", accept: true, log: Rc::clone(&log) })
        .unwrap();
    let crate_id = body_entity(&mut scene, Vec2::new(90.0, 60.0), RigidBody::default());
    scene
        .attach_new(crate_id, Gate { label: "crate", accept: true, log: Rc::clone(&log) })
        .unwrap();
    scene.activate();

    for _ in 0..120 {
        scene.update_state(FIXED_DELTA).unwrap();
    }
    let before = take(&log);
    assert!(before.contains(&"ground:begin".to_string()));
    assert!(before.contains(&"crate:begin".to_string()));

    scene.remove_entity(crate_id).unwrap();
    scene.update_state(FIXED_DELTA).unwrap();
    assert_eq!(take(&log), vec!["ground:end"]);
}
