//! Physics backend interface
//!
//! Everything behind this trait works in simulation units (meters, radians,
//! body centres). Unit conversion and the mapping from bodies back to scene
//! entities live in [`Physics`](super::Physics); a backend only knows opaque
//! [`BodyHandle`]s.

use super::collision::Shape;
use super::rigid_body::BodyType;
use crate::foundation::math::Vec2;
use slotmap::new_key_type;

new_key_type! {
    /// Opaque handle of a simulated body
    pub struct BodyHandle;
}

/// Surface and mass parameters of a body's fixture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    /// Mass per unit area
    pub density: f32,
    /// Coulomb friction coefficient
    pub friction: f32,
    /// Bounciness in `[0, 1]`
    pub restitution: f32,
}

/// Declarative description of a body and its single fixture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyDesc {
    /// Static, kinematic or dynamic
    pub body_type: BodyType,
    /// Centre of the body
    pub position: Vec2,
    /// Rotation in radians
    pub angle: f32,
    /// Initial linear velocity
    pub linear_velocity: Vec2,
    /// Initial angular velocity in radians per second
    pub angular_velocity: f32,
    /// Multiplier applied to world gravity
    pub gravity_scale: f32,
    /// Whether contacts and torques may rotate the body
    pub fixed_rotation: bool,
    /// Collision shape around the centre
    pub shape: Shape,
    /// Fixture parameters
    pub material: Material,
    /// Sensors report contacts but get no collision response
    pub sensor: bool,
}

/// Transform and velocities read back after a step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    /// Centre of the body
    pub position: Vec2,
    /// Rotation in radians
    pub angle: f32,
    /// Linear velocity
    pub linear_velocity: Vec2,
    /// Angular velocity in radians per second
    pub angular_velocity: f32,
}

/// Whether two bodies started or stopped touching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactPhase {
    /// The pair touches this step but did not last step
    Begin,
    /// The pair touched last step but no longer does
    End,
}

/// Contact event between two bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactEvent {
    /// Begin or end
    pub phase: ContactPhase,
    /// First body
    pub a: BodyHandle,
    /// Second body
    pub b: BodyHandle,
}

/// A fixture hit by a ray cast
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// The body that was hit
    pub body: BodyHandle,
    /// Hit point
    pub point: Vec2,
    /// Surface normal at the hit point
    pub normal: Vec2,
    /// Position of the hit along the ray, `0` at the start and `1` at the end
    pub fraction: f32,
}

/// Solver iteration counts for one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Iterations {
    /// Velocity constraint passes
    pub velocity: u32,
    /// Position correction passes
    pub position: u32,
}

/// A rigid-body simulation
pub trait PhysicsBackend {
    /// Replace world gravity
    fn set_gravity(&mut self, gravity: Vec2);

    /// Create a body from its description
    fn create_body(&mut self, desc: &BodyDesc) -> BodyHandle;

    /// Destroy a body, returning every body it was touching
    fn destroy_body(&mut self, body: BodyHandle) -> Vec<BodyHandle>;

    /// Advance the world by `dt`
    ///
    /// `filter` is consulted for every touching pair before any collision
    /// response; pairs it rejects get no response and produce no events.
    fn step(
        &mut self,
        dt: f32,
        iterations: Iterations,
        filter: &mut dyn FnMut(BodyHandle, BodyHandle) -> bool,
    ) -> Vec<ContactEvent>;

    /// Current transform and velocities of a body
    fn body_state(&self, body: BodyHandle) -> Option<BodyState>;

    /// Teleport a body
    fn set_transform(&mut self, body: BodyHandle, position: Vec2, angle: f32);

    /// Replace a body's linear velocity
    fn set_linear_velocity(&mut self, body: BodyHandle, velocity: Vec2);

    /// Replace a body's angular velocity
    fn set_angular_velocity(&mut self, body: BodyHandle, velocity: f32);

    /// Change how strongly gravity pulls a body
    fn set_gravity_scale(&mut self, body: BodyHandle, scale: f32);

    /// Lock or unlock rotation
    fn set_fixed_rotation(&mut self, body: BodyHandle, fixed: bool);

    /// Replace fixture parameters; density changes recompute the mass
    fn set_material(&mut self, body: BodyHandle, material: Material);

    /// Accumulate a force for the next step, at the centre or a world point
    fn apply_force(&mut self, body: BodyHandle, force: Vec2, point: Option<Vec2>);

    /// Change velocity immediately, at the centre or a world point
    fn apply_linear_impulse(&mut self, body: BodyHandle, impulse: Vec2, point: Option<Vec2>);

    /// Change angular velocity immediately
    fn apply_angular_impulse(&mut self, body: BodyHandle, impulse: f32);

    /// Cast a ray from `from` to `to`
    ///
    /// The callback returns the new clip fraction: below zero ignores the hit,
    /// zero stops the cast, anything else shortens the ray to that fraction.
    fn ray_cast(&self, from: Vec2, to: Vec2, callback: &mut dyn FnMut(RayHit) -> f32);

    /// Number of live bodies
    fn body_count(&self) -> usize;
}
