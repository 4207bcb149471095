//! Rigid body behavior
//!
//! Bridges an entity's transform to a simulated body. The body is created
//! when the behavior starts, destroyed when it is destroyed, and recreated
//! whenever the entity is resized because the collider is derived from the
//! entity size at creation time.

use super::backend::{BodyHandle, Material};
use super::collision::Shape;
use super::Physics;
use crate::foundation::math::Vec2;
use crate::scene::{Behavior, Context, SceneError};
use serde::{Deserialize, Serialize};

/// How a body takes part in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BodyType {
    /// Never moves
    Static,
    /// Moves by its velocity only; unaffected by forces and contacts
    Kinematic,
    /// Fully simulated
    #[default]
    Dynamic,
}

impl BodyType {
    /// Look up a body type by name, case-insensitively
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "static" => Some(Self::Static),
            "kinematic" => Some(Self::Kinematic),
            "dynamic" => Some(Self::Dynamic),
            _ => None,
        }
    }
}

/// Collider shape derived from the entity size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Collider {
    /// Box covering the entity
    #[default]
    Box,
    /// Circle inscribed in a square entity
    Circle,
}

impl Collider {
    /// Look up a collider by name, case-insensitively
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "box" => Some(Self::Box),
            "circle" => Some(Self::Circle),
            _ => None,
        }
    }

    /// Build the simulation shape for an entity of `size`, scaled by `scale`
    pub fn shape(self, size: Vec2, scale: f32) -> Result<Shape, SceneError> {
        if size.x <= 0.0 || size.y <= 0.0 {
            return Err(SceneError::NonPositiveSize {
                width: size.x,
                height: size.y,
            });
        }
        match self {
            Self::Box => Ok(Shape::Box {
                half_extents: size * scale / 2.0,
            }),
            Self::Circle if size.x != size.y => Err(SceneError::InvalidCollider(format!(
                "circle needs equal width and height, got {}x{}",
                size.x, size.y
            ))),
            Self::Circle => Ok(Shape::Circle {
                radius: size.x * scale / 2.0,
            }),
        }
    }
}

/// Behavior owning one simulated body
///
/// Runtime setters take the [`Physics`] so they can forward to the live body;
/// get both from [`Scene::rigid_body_mut`](crate::scene::Scene::rigid_body_mut)
/// or [`Context::rigid_body_mut`].
#[derive(Debug, Clone)]
pub struct RigidBody {
    body_type: BodyType,
    collider: Collider,
    gravity_scale: f32,
    density: f32,
    friction: f32,
    restitution: f32,
    fixed_rotation: bool,
    trigger: bool,
    linear_velocity: Vec2,
    angular_velocity: f32,
    rotation: f32,
    body: Option<BodyHandle>,
    // Set while the simulation writes back into the entity
    updating: bool,
}

impl Default for RigidBody {
    fn default() -> Self {
        Self::new(BodyType::Dynamic, Collider::Box)
    }
}

impl RigidBody {
    /// Body with default parameters: gravity scale 1, density 1, no friction, no bounce
    pub fn new(body_type: BodyType, collider: Collider) -> Self {
        Self {
            body_type,
            collider,
            gravity_scale: 1.0,
            density: 1.0,
            friction: 0.0,
            restitution: 0.0,
            fixed_rotation: false,
            trigger: false,
            linear_velocity: Vec2::zeros(),
            angular_velocity: 0.0,
            rotation: 0.0,
            body: None,
            updating: false,
        }
    }

    /// Builder: gravity multiplier
    pub fn with_gravity_scale(mut self, gravity_scale: f32) -> Self {
        self.gravity_scale = gravity_scale;
        self
    }

    /// Builder: density, clamped at zero
    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density.max(0.0);
        self
    }

    /// Builder: friction, clamped at zero
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction.max(0.0);
        self
    }

    /// Builder: restitution, clamped at zero
    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution.max(0.0);
        self
    }

    /// Builder: lock rotation
    pub fn with_fixed_rotation(mut self, fixed_rotation: bool) -> Self {
        self.fixed_rotation = fixed_rotation;
        self
    }

    /// Builder: make the body a sensor
    pub fn with_trigger(mut self, trigger: bool) -> Self {
        self.trigger = trigger;
        self
    }

    /// Builder: initial linear velocity in scene units per second
    pub fn with_linear_velocity(mut self, velocity: Vec2) -> Self {
        self.linear_velocity = velocity;
        self
    }

    /// Body classification, fixed at construction
    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    /// Collider kind, fixed at construction
    pub fn collider(&self) -> Collider {
        self.collider
    }

    /// Gravity multiplier
    pub fn gravity_scale(&self) -> f32 {
        self.gravity_scale
    }

    /// Mass per unit area
    pub fn density(&self) -> f32 {
        self.density
    }

    /// Friction coefficient
    pub fn friction(&self) -> f32 {
        self.friction
    }

    /// Restitution coefficient
    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    /// Whether rotation is locked
    pub fn is_fixed_rotation(&self) -> bool {
        self.fixed_rotation
    }

    /// Whether the body is a sensor
    pub fn is_trigger(&self) -> bool {
        self.trigger
    }

    /// Linear velocity in scene units per second, as of the last sync
    pub fn linear_velocity(&self) -> Vec2 {
        self.linear_velocity
    }

    /// Angular velocity in radians per second
    pub fn angular_velocity(&self) -> f32 {
        self.angular_velocity
    }

    /// Rotation in degrees
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    /// Handle of the live body, if created
    pub fn body(&self) -> Option<BodyHandle> {
        self.body
    }

    /// Whether a simulated body currently exists
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    pub(crate) fn material(&self) -> Material {
        Material {
            density: self.density,
            friction: self.friction,
            restitution: self.restitution,
        }
    }

    /// Change the gravity multiplier
    pub fn set_gravity_scale(&mut self, physics: &mut Physics, gravity_scale: f32) {
        self.gravity_scale = gravity_scale;
        if let Some(body) = self.body {
            physics.backend_mut().set_gravity_scale(body, gravity_scale);
        }
    }

    /// Change the density, clamped at zero
    pub fn set_density(&mut self, physics: &mut Physics, density: f32) {
        self.density = density.max(0.0);
        self.push_material(physics);
    }

    /// Change the friction, clamped at zero
    pub fn set_friction(&mut self, physics: &mut Physics, friction: f32) {
        self.friction = friction.max(0.0);
        self.push_material(physics);
    }

    /// Change the restitution, clamped at zero
    pub fn set_restitution(&mut self, physics: &mut Physics, restitution: f32) {
        self.restitution = restitution.max(0.0);
        self.push_material(physics);
    }

    fn push_material(&self, physics: &mut Physics) {
        if let Some(body) = self.body {
            physics.backend_mut().set_material(body, self.material());
        }
    }

    /// Lock or unlock rotation
    pub fn set_fixed_rotation(&mut self, physics: &mut Physics, fixed_rotation: bool) {
        self.fixed_rotation = fixed_rotation;
        if let Some(body) = self.body {
            physics.backend_mut().set_fixed_rotation(body, fixed_rotation);
        }
    }

    /// Mark the body as a sensor; takes effect when the body is next created
    pub fn set_trigger(&mut self, trigger: bool) {
        self.trigger = trigger;
    }

    /// Change the angular velocity
    pub fn set_angular_velocity(&mut self, physics: &mut Physics, angular_velocity: f32) {
        self.angular_velocity = angular_velocity;
        if let Some(body) = self.body {
            physics.backend_mut().set_angular_velocity(body, angular_velocity);
        }
    }

    /// Change the linear velocity in scene units per second
    ///
    /// Only axes that differ from the current value are written to the body,
    /// so the other axis keeps whatever the simulation produced.
    pub fn set_linear_velocity(&mut self, physics: &mut Physics, velocity: Vec2) {
        let old = std::mem::replace(&mut self.linear_velocity, velocity);
        if self.updating {
            return;
        }
        if let Some(body) = self.body {
            let x = (old.x != velocity.x).then_some(velocity.x);
            let y = (old.y != velocity.y).then_some(velocity.y);
            physics.set_linear_velocity_axes(body, x, y);
        }
    }

    /// Change the rotation in degrees
    pub fn set_rotation(&mut self, physics: &mut Physics, rotation: f32) {
        self.rotation = rotation;
        if let Some(body) = self.body {
            physics.set_rotation(body, rotation);
        }
    }

    /// Apply a force at the body's centre
    pub fn add_force(&self, physics: &mut Physics, force: Vec2) {
        if let Some(body) = self.body {
            physics.apply_force(body, force, None);
        }
    }

    /// Apply a force at a scene point
    pub fn add_force_at(&self, physics: &mut Physics, force: Vec2, point: Vec2) {
        if let Some(body) = self.body {
            physics.apply_force(body, force, Some(point));
        }
    }

    /// Apply a linear impulse at the body's centre
    pub fn add_linear_impulse(&self, physics: &mut Physics, impulse: Vec2) {
        if let Some(body) = self.body {
            physics.apply_linear_impulse(body, impulse, None);
        }
    }

    /// Apply a linear impulse at a scene point
    pub fn add_linear_impulse_at(&self, physics: &mut Physics, impulse: Vec2, point: Vec2) {
        if let Some(body) = self.body {
            physics.apply_linear_impulse(body, impulse, Some(point));
        }
    }

    /// Apply an angular impulse
    pub fn add_angular_impulse(&self, physics: &mut Physics, impulse: f32) {
        if let Some(body) = self.body {
            physics.backend_mut().apply_angular_impulse(body, impulse);
        }
    }

    /// Whether the simulation is currently writing into this body's entity
    pub fn is_updating(&self) -> bool {
        self.updating
    }

    /// Take the simulated state and raise the guard before the entity is moved
    pub(crate) fn begin_sync(&mut self, linear_velocity: Vec2, angular_velocity: f32, rotation: f32) {
        self.updating = true;
        self.linear_velocity = linear_velocity;
        self.angular_velocity = angular_velocity;
        self.rotation = rotation;
    }

    pub(crate) fn end_sync(&mut self) {
        self.updating = false;
    }
}

impl Behavior for RigidBody {
    fn start(&mut self, ctx: &mut Context<'_>) -> Result<(), SceneError> {
        if ctx.world().has_component::<RigidBody>(ctx.entity_id()) {
            return Err(SceneError::DuplicateRigidBody);
        }
        let (owner, entity) = (ctx.behavior_id(), ctx.entity_id());
        let (position, size) = (ctx.position(), ctx.size());
        let handle = ctx.physics_mut().add_body(owner, entity, self, position, size)?;
        self.body = Some(handle);
        Ok(())
    }

    fn destroy(&mut self, ctx: &mut Context<'_>) -> Result<(), SceneError> {
        if self.body.take().is_some() {
            let owner = ctx.behavior_id();
            ctx.physics_mut().remove_body(owner);
        }
        Ok(())
    }

    fn on_position_changed(
        &mut self,
        ctx: &mut Context<'_>,
        _old: Vec2,
        new: Vec2,
    ) -> Result<(), SceneError> {
        let Some(body) = self.body else {
            return Ok(());
        };
        if !self.updating {
            let size = ctx.size();
            let rotation = self.rotation;
            ctx.physics_mut().set_transform(body, new + size / 2.0, rotation);
        }
        Ok(())
    }

    fn on_size_changed(
        &mut self,
        ctx: &mut Context<'_>,
        _old: Vec2,
        _new: Vec2,
    ) -> Result<(), SceneError> {
        if self.body.is_none() || self.updating {
            return Ok(());
        }
        log::debug!("Recreating body of {:?} after resize", ctx.entity_id());
        self.destroy(ctx)?;
        self.start(ctx)
    }
}
