//! Fixed-step rigid-body physics
//!
//! [`Physics`] sits between the scene and a [`PhysicsBackend`]. It owns the
//! time accumulator that turns variable frame deltas into whole fixed steps,
//! the registry mapping rigid-body behaviors to simulated bodies, and the
//! pixel/meter conversion applied at every boundary crossing.
//!
//! The scene drives a step as:
//!
//! ```text
//! accumulate(frame delta)
//! while step_due():
//!     step(world)          backend step, contact filter consulted
//!     dispatch contacts    begin/end to both sides' listeners
//!     sync bodies          body → entity under the rigid body's guard
//!     fixed update pass    sorted, snapshotted live entities
//!     consume_step()
//! ```

pub mod backend;
pub mod collision;
pub mod contact;
pub mod rigid_body;
pub mod world;

#[cfg(test)]
pub(crate) mod recording;

pub use backend::{
    BodyDesc, BodyHandle, BodyState, ContactEvent, ContactPhase, Iterations, Material,
    PhysicsBackend, RayHit,
};
pub use collision::Shape;
pub use contact::{Contact, ContactListener, Participant};
pub use rigid_body::{BodyType, Collider, RigidBody};
pub use world::ImpulseWorld;

use crate::foundation::math::Vec2;
use crate::foundation::time::FIXED_DELTA;
use crate::scene::{BehaviorId, EntityId, SceneError, World};
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

/// Simulation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// World gravity in simulation units (meters per second squared)
    pub gravity: Vec2,
    /// Length of one step in seconds
    pub fixed_delta: f32,
    /// Velocity solver passes per step
    pub velocity_iterations: u32,
    /// Position solver passes per step
    pub position_iterations: u32,
    /// Scene units to simulation units
    pub pixels_to_meters: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, 9.807),
            fixed_delta: FIXED_DELTA,
            velocity_iterations: 6,
            position_iterations: 2,
            pixels_to_meters: 0.05,
        }
    }
}

/// Registry entry of a simulated body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyRecord {
    /// Backend handle
    pub handle: BodyHandle,
    /// Entity owning the rigid-body behavior
    pub entity: EntityId,
    /// Classification of the body
    pub body_type: BodyType,
}

impl BodyRecord {
    fn participant(&self) -> Participant {
        Participant {
            entity: self.entity,
            body_type: self.body_type,
        }
    }
}

/// A body's simulated state in scene units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncedBody {
    /// The rigid-body behavior owning the body
    pub owner: BehaviorId,
    /// Its entity
    pub entity: EntityId,
    /// Body centre
    pub center: Vec2,
    /// Rotation in degrees
    pub rotation: f32,
    /// Linear velocity in scene units per second
    pub linear_velocity: Vec2,
    /// Angular velocity in radians per second
    pub angular_velocity: f32,
}

/// A ray-cast hit in scene units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    /// Entity owning the hit body
    pub entity: EntityId,
    /// Hit point
    pub point: Vec2,
    /// Surface normal
    pub normal: Vec2,
    /// Position along the ray, `0` at the start and `1` at the end
    pub fraction: f32,
}

/// The scene's physics simulation
pub struct Physics {
    backend: Box<dyn PhysicsBackend>,
    config: PhysicsConfig,
    bodies: SecondaryMap<BehaviorId, BodyRecord>,
    owners: SecondaryMap<BodyHandle, BehaviorId>,
    // End contacts of destroyed bodies, delivered with the next step
    ended: Vec<Contact>,
    accumulator: f32,
    steps: u64,
}

impl Default for Physics {
    fn default() -> Self {
        Self::new(PhysicsConfig::default())
    }
}

impl std::fmt::Debug for Physics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Physics")
            .field("config", &self.config)
            .field("bodies", &self.bodies.len())
            .field("accumulator", &self.accumulator)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

impl Physics {
    /// Simulation backed by the built-in [`ImpulseWorld`]
    pub fn new(config: PhysicsConfig) -> Self {
        Self::with_backend(config, Box::new(ImpulseWorld::new()))
    }

    /// Simulation backed by a custom backend
    pub fn with_backend(mut config: PhysicsConfig, mut backend: Box<dyn PhysicsBackend>) -> Self {
        if config.fixed_delta <= 0.0 {
            log::warn!(
                "Fixed delta {} is not positive, using {}",
                config.fixed_delta,
                FIXED_DELTA
            );
            config.fixed_delta = FIXED_DELTA;
        }
        backend.set_gravity(config.gravity);
        Self {
            backend,
            config,
            bodies: SecondaryMap::new(),
            owners: SecondaryMap::new(),
            ended: Vec::new(),
            accumulator: 0.0,
            steps: 0,
        }
    }

    /// Simulation parameters
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// World gravity in simulation units
    pub fn gravity(&self) -> Vec2 {
        self.config.gravity
    }

    /// Replace world gravity; the live simulation sees it immediately
    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.config.gravity = gravity;
        self.backend.set_gravity(gravity);
    }

    /// Length of one step in seconds
    pub fn fixed_delta(&self) -> f32 {
        self.config.fixed_delta
    }

    /// Frame time not yet consumed by whole steps
    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }

    /// Steps taken since creation
    pub fn step_count(&self) -> u64 {
        self.steps
    }

    /// Scene units to simulation units
    pub fn to_meters(&self, value: Vec2) -> Vec2 {
        value * self.config.pixels_to_meters
    }

    /// Simulation units to scene units
    pub fn to_pixels(&self, value: Vec2) -> Vec2 {
        value / self.config.pixels_to_meters
    }

    /// Number of registered bodies
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Registry entry of a rigid-body behavior's body
    pub fn body(&self, owner: BehaviorId) -> Option<&BodyRecord> {
        self.bodies.get(owner)
    }

    /// Whether a rigid-body behavior currently has a body
    pub fn has_body(&self, owner: BehaviorId) -> bool {
        self.bodies.contains_key(owner)
    }

    /// The backend, for inspection
    pub fn backend(&self) -> &dyn PhysicsBackend {
        self.backend.as_ref()
    }

    pub(crate) fn backend_mut(&mut self) -> &mut dyn PhysicsBackend {
        self.backend.as_mut()
    }

    /// Cast a ray between two scene points
    ///
    /// The callback returns the new clip fraction: below zero ignores the hit,
    /// zero stops the cast, anything else shortens the ray to that fraction.
    pub fn ray_cast(&self, from: Vec2, to: Vec2, mut callback: impl FnMut(RaycastHit) -> f32) {
        let scale = self.config.pixels_to_meters;
        self.backend.ray_cast(from * scale, to * scale, &mut |hit: RayHit| {
            let Some(record) = self.owners.get(hit.body).and_then(|owner| self.bodies.get(*owner))
            else {
                return -1.0;
            };
            callback(RaycastHit {
                entity: record.entity,
                point: hit.point / scale,
                normal: hit.normal,
                fraction: hit.fraction,
            })
        });
    }

    /// Closest entity hit between two scene points
    pub fn ray_cast_closest(&self, from: Vec2, to: Vec2) -> Option<RaycastHit> {
        let mut closest = None;
        self.ray_cast(from, to, |hit| {
            closest = Some(hit);
            hit.fraction
        });
        closest
    }

    pub(crate) fn add_body(
        &mut self,
        owner: BehaviorId,
        entity: EntityId,
        body: &RigidBody,
        position: Vec2,
        size: Vec2,
    ) -> Result<BodyHandle, SceneError> {
        let scale = self.config.pixels_to_meters;
        let shape = body.collider().shape(size, scale)?;
        self.remove_body(owner);

        let desc = BodyDesc {
            body_type: body.body_type(),
            position: (position + size / 2.0) * scale,
            angle: body.rotation().to_radians(),
            linear_velocity: body.linear_velocity() * scale,
            angular_velocity: body.angular_velocity(),
            gravity_scale: body.gravity_scale(),
            fixed_rotation: body.is_fixed_rotation(),
            shape,
            material: body.material(),
            sensor: body.is_trigger(),
        };
        let handle = self.backend.create_body(&desc);
        self.bodies.insert(
            owner,
            BodyRecord {
                handle,
                entity,
                body_type: desc.body_type,
            },
        );
        self.owners.insert(handle, owner);
        log::debug!("Created {:?} body for {:?}", desc.body_type, entity);
        Ok(handle)
    }

    pub(crate) fn remove_body(&mut self, owner: BehaviorId) -> bool {
        let Some(record) = self.bodies.remove(owner) else {
            return false;
        };
        self.owners.remove(record.handle);
        for other in self.backend.destroy_body(record.handle) {
            let Some(other) = self.owners.get(other).and_then(|owner| self.bodies.get(*owner)) else {
                continue;
            };
            self.ended.push(Contact {
                phase: ContactPhase::End,
                a: record.participant(),
                b: other.participant(),
            });
        }
        log::debug!("Destroyed body of {:?}", record.entity);
        true
    }

    pub(crate) fn set_transform(&mut self, body: BodyHandle, center: Vec2, rotation: f32) {
        let scale = self.config.pixels_to_meters;
        self.backend.set_transform(body, center * scale, rotation.to_radians());
    }

    pub(crate) fn set_rotation(&mut self, body: BodyHandle, rotation: f32) {
        if let Some(state) = self.backend.body_state(body) {
            self.backend.set_transform(body, state.position, rotation.to_radians());
        }
    }

    pub(crate) fn set_linear_velocity_axes(&mut self, body: BodyHandle, x: Option<f32>, y: Option<f32>) {
        let Some(state) = self.backend.body_state(body) else {
            return;
        };
        let scale = self.config.pixels_to_meters;
        let velocity = Vec2::new(
            x.map_or(state.linear_velocity.x, |x| x * scale),
            y.map_or(state.linear_velocity.y, |y| y * scale),
        );
        self.backend.set_linear_velocity(body, velocity);
    }

    pub(crate) fn apply_force(&mut self, body: BodyHandle, force: Vec2, point: Option<Vec2>) {
        let scale = self.config.pixels_to_meters;
        self.backend.apply_force(body, force * scale, point.map(|p| p * scale));
    }

    pub(crate) fn apply_linear_impulse(&mut self, body: BodyHandle, impulse: Vec2, point: Option<Vec2>) {
        let scale = self.config.pixels_to_meters;
        self.backend
            .apply_linear_impulse(body, impulse * scale, point.map(|p| p * scale));
    }

    pub(crate) fn accumulate(&mut self, delta: f32) {
        self.accumulator += delta.max(0.0);
    }

    pub(crate) fn step_due(&self) -> bool {
        self.accumulator >= self.config.fixed_delta
    }

    pub(crate) fn consume_step(&mut self) {
        self.accumulator -= self.config.fixed_delta;
        self.steps += 1;
    }

    /// Advance the backend one fixed step; returns contacts to dispatch
    pub(crate) fn step(&mut self, world: &World) -> Vec<Contact> {
        let Self {
            backend,
            config,
            bodies,
            owners,
            ended,
            ..
        } = self;
        let record = |handle: BodyHandle| owners.get(handle).and_then(|owner| bodies.get(*owner));

        let mut filter = |a: BodyHandle, b: BodyHandle| match (record(a), record(b)) {
            (Some(a), Some(b)) => contact::accepts_pair(world, a.participant(), b.participant()),
            _ => true,
        };
        let iterations = Iterations {
            velocity: config.velocity_iterations,
            position: config.position_iterations,
        };
        let events = backend.step(config.fixed_delta, iterations, &mut filter);

        let mut contacts = std::mem::take(ended);
        contacts.extend(events.into_iter().filter_map(|event| {
            Some(Contact {
                phase: event.phase,
                a: record(event.a)?.participant(),
                b: record(event.b)?.participant(),
            })
        }));
        contacts
    }

    /// Current state of every registered body, in scene units
    pub(crate) fn synced_bodies(&self) -> Vec<SyncedBody> {
        let scale = self.config.pixels_to_meters;
        self.bodies
            .iter()
            .filter_map(|(owner, record)| {
                let state = self.backend.body_state(record.handle)?;
                Some(SyncedBody {
                    owner,
                    entity: record.entity,
                    center: state.position / scale,
                    rotation: state.angle.to_degrees(),
                    linear_velocity: state.linear_velocity / scale,
                    angular_velocity: state.angular_velocity,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::recording::{Call, RecordingBackend};
    use super::*;
    use approx::assert_relative_eq;
    use slotmap::SlotMap;

    fn ids() -> (BehaviorId, EntityId) {
        let mut behaviors: SlotMap<BehaviorId, ()> = SlotMap::with_key();
        let mut entities: SlotMap<EntityId, ()> = SlotMap::with_key();
        (behaviors.insert(()), entities.insert(()))
    }

    #[test]
    fn test_accumulator_runs_whole_steps() {
        let mut physics = Physics::default();
        let mut counts = Vec::new();
        for delta in [0.0, 0.033, 0.033, 0.001] {
            physics.accumulate(delta);
            let mut steps = 0;
            while physics.step_due() {
                physics.consume_step();
                steps += 1;
            }
            counts.push(steps);
        }

        assert_eq!(counts, vec![0, 1, 2, 1]);
        assert_eq!(physics.step_count(), 4);
        assert_relative_eq!(physics.accumulator(), 0.067 - 4.0 / 60.0, epsilon = 1e-5);
    }

    #[test]
    fn test_body_description_is_converted_to_meters() {
        let (recording, log) = RecordingBackend::new();
        let mut physics = Physics::with_backend(PhysicsConfig::default(), Box::new(recording));
        let (owner, entity) = ids();
        let body = RigidBody::new(BodyType::Dynamic, Collider::Circle)
            .with_linear_velocity(Vec2::new(20.0, 0.0));

        physics
            .add_body(owner, entity, &body, Vec2::new(100.0, 40.0), Vec2::new(20.0, 20.0))
            .unwrap();

        let calls = log.borrow();
        let Call::Create(desc) = &calls[1] else {
            panic!("expected a create call, got {:?}", calls[1]);
        };
        assert_relative_eq!(desc.position.x, 5.5);
        assert_relative_eq!(desc.position.y, 2.5);
        assert_relative_eq!(desc.linear_velocity.x, 1.0);
        assert_eq!(desc.shape, Shape::Circle { radius: 0.5 });
        assert!(physics.has_body(owner));
    }

    #[test]
    fn test_invalid_collider_creates_nothing() {
        let mut physics = Physics::default();
        let (owner, entity) = ids();
        let body = RigidBody::new(BodyType::Dynamic, Collider::Circle);

        let result = physics.add_body(owner, entity, &body, Vec2::zeros(), Vec2::new(10.0, 12.0));
        assert!(matches!(result, Err(SceneError::InvalidCollider(_))));
        assert_eq!(physics.body_count(), 0);
        assert_eq!(physics.backend().body_count(), 0);
    }

    #[test]
    fn test_gravity_forwards_immediately() {
        let (recording, log) = RecordingBackend::new();
        let mut physics = Physics::with_backend(PhysicsConfig::default(), Box::new(recording));
        physics.set_gravity(Vec2::new(0.0, -1.0));

        assert_eq!(physics.gravity(), Vec2::new(0.0, -1.0));
        assert_eq!(log.borrow().last(), Some(&Call::Gravity(Vec2::new(0.0, -1.0))));
    }

    #[test]
    fn test_ray_cast_reports_scene_units() {
        let mut physics = Physics::default();
        let (owner, entity) = ids();
        let body = RigidBody::new(BodyType::Static, Collider::Box);
        physics
            .add_body(owner, entity, &body, Vec2::new(100.0, -10.0), Vec2::new(20.0, 20.0))
            .unwrap();

        let hit = physics
            .ray_cast_closest(Vec2::zeros(), Vec2::new(200.0, 0.0))
            .unwrap();
        assert_eq!(hit.entity, entity);
        assert_relative_eq!(hit.point.x, 100.0, epsilon = 1e-3);
        assert_relative_eq!(hit.fraction, 0.5, epsilon = 1e-5);
        assert_eq!(hit.normal, Vec2::new(-1.0, 0.0));
    }

    #[test]
    fn test_single_axis_velocity_write_keeps_other_axis() {
        let mut physics = Physics::default();
        let (owner, entity) = ids();
        let body = RigidBody::default().with_linear_velocity(Vec2::new(0.0, 40.0));
        let handle = physics
            .add_body(owner, entity, &body, Vec2::zeros(), Vec2::new(10.0, 10.0))
            .unwrap();

        physics.set_linear_velocity_axes(handle, Some(20.0), None);
        let state = physics.backend().body_state(handle).unwrap();
        assert_relative_eq!(state.linear_velocity.x, 1.0);
        assert_relative_eq!(state.linear_velocity.y, 2.0);
    }
}
