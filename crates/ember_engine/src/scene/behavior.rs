//! Behavior units and their callback context
//!
//! A behavior is per-entity logic with lifecycle callbacks. The scene checks a
//! behavior out of the arena while one of its callbacks runs and hands it a
//! [`Context`] with mutable access to everything else, so callbacks may freely
//! read other behaviors, move their entity, or schedule structural changes.

use super::camera::Camera;
use super::entity::Entity;
use super::world::{BehaviorId, EntityId, World};
use super::{Scene, SceneError};
use crate::foundation::math::Vec2;
use crate::physics::contact::ContactListener;
use crate::physics::rigid_body::RigidBody;
use crate::physics::Physics;
use crate::render::Drawable;
use std::any::Any;

/// Where a behavior currently belongs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    /// Owned by nobody; may be attached
    Detached,
    /// Queued for attachment; not yet visible to lookups
    Pending(EntityId),
    /// In the entity's live behavior list
    Attached(EntityId),
}

impl Attachment {
    /// Entity this behavior is attached or pending on
    pub fn owner(self) -> Option<EntityId> {
        match self {
            Self::Detached => None,
            Self::Pending(owner) | Self::Attached(owner) => Some(owner),
        }
    }
}

/// Upcast helper for concrete-type lookups
pub trait AsAny {
    /// Borrow as `Any`
    fn as_any(&self) -> &dyn Any;

    /// Mutably borrow as `Any`
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Per-entity logic with lifecycle callbacks
///
/// Every callback defaults to a no-op. Errors abort the pass that invoked the
/// callback and propagate to whoever triggered it.
#[allow(unused_variables)]
pub trait Behavior: AsAny + 'static {
    /// The behavior became live on an entity that is in the scene
    ///
    /// An error detaches the behavior again.
    fn start(&mut self, ctx: &mut Context<'_>) -> Result<(), SceneError> {
        Ok(())
    }

    /// Once per frame, in z-order
    fn update(&mut self, ctx: &mut Context<'_>) -> Result<(), SceneError> {
        Ok(())
    }

    /// Once per physics step, after bodies were synced
    fn fixed_update(&mut self, ctx: &mut Context<'_>) -> Result<(), SceneError> {
        Ok(())
    }

    /// The behavior is being detached or its entity left the scene
    fn destroy(&mut self, ctx: &mut Context<'_>) -> Result<(), SceneError> {
        Ok(())
    }

    /// The owning entity moved
    ///
    /// Changes made while this behavior's own callback runs arrive after it returns.
    fn on_position_changed(
        &mut self,
        ctx: &mut Context<'_>,
        old: Vec2,
        new: Vec2,
    ) -> Result<(), SceneError> {
        Ok(())
    }

    /// The owning entity was resized
    fn on_size_changed(
        &mut self,
        ctx: &mut Context<'_>,
        old: Vec2,
        new: Vec2,
    ) -> Result<(), SceneError> {
        Ok(())
    }

    /// Contact-listener capability, if this behavior has it
    fn contact_listener(&self) -> Option<&dyn ContactListener> {
        None
    }

    /// Mutable contact-listener capability, if this behavior has it
    fn contact_listener_mut(&mut self) -> Option<&mut dyn ContactListener> {
        None
    }
}

/// What a behavior callback can reach
pub struct Context<'a> {
    scene: &'a mut Scene,
    entity: EntityId,
    behavior: BehaviorId,
}

impl<'a> Context<'a> {
    pub(crate) fn new(scene: &'a mut Scene, entity: EntityId, behavior: BehaviorId) -> Self {
        Self {
            scene,
            entity,
            behavior,
        }
    }

    /// The owning entity
    pub fn entity_id(&self) -> EntityId {
        self.entity
    }

    /// The behavior receiving this callback
    pub fn behavior_id(&self) -> BehaviorId {
        self.behavior
    }

    /// The owning entity's data
    pub fn entity(&self) -> Option<&Entity> {
        self.scene.world().entity(self.entity)
    }

    /// The owning entity's top-left corner
    pub fn position(&self) -> Vec2 {
        self.entity().map_or_else(Vec2::zeros, Entity::position)
    }

    /// The owning entity's size
    pub fn size(&self) -> Vec2 {
        self.entity().map_or_else(Vec2::zeros, Entity::size)
    }

    /// Move the owning entity, notifying its behaviors
    pub fn set_position(&mut self, position: Vec2) -> Result<(), SceneError> {
        self.scene.set_position(self.entity, position)
    }

    /// Resize the owning entity, notifying its behaviors
    pub fn set_size(&mut self, size: Vec2) -> Result<(), SceneError> {
        self.scene.set_size(self.entity, size)
    }

    /// Attach a new behavior to the owning entity
    pub fn attach<B: Behavior>(&mut self, behavior: B) -> Result<BehaviorId, SceneError> {
        self.scene.attach_new(self.entity, behavior)
    }

    /// Attach an existing detached behavior to the owning entity
    pub fn attach_existing(&mut self, behavior: BehaviorId) -> Result<(), SceneError> {
        self.scene.attach(self.entity, behavior)
    }

    /// Detach a behavior from whatever it is attached to
    pub fn detach(&mut self, behavior: BehaviorId) -> Result<(), SceneError> {
        self.scene.detach(behavior)
    }

    /// Detach the behavior receiving this callback
    pub fn detach_self(&mut self) -> Result<(), SceneError> {
        self.scene.detach(self.behavior)
    }

    /// Detach every live behavior of type `T` from the owning entity
    pub fn detach_all<T: Behavior>(&mut self) -> Result<(), SceneError> {
        self.scene.detach_all::<T>(self.entity)
    }

    /// First live behavior of type `T` on the owning entity
    pub fn component<T: Behavior>(&self) -> Option<&T> {
        self.scene.world().component::<T>(self.entity)
    }

    /// Mutable first live behavior of type `T` on the owning entity
    pub fn component_mut<T: Behavior>(&mut self) -> Option<&mut T> {
        let id = self.scene.world().component_id::<T>(self.entity)?;
        self.scene.world_mut().behavior_mut::<T>(id)
    }

    /// The first rigid body on the owning entity, with the physics to drive it
    pub fn rigid_body_mut(&mut self) -> Option<(&mut RigidBody, &mut Physics)> {
        self.scene.rigid_body_mut(self.entity)
    }

    /// Remove the owning entity from the scene and free it
    pub fn despawn(&mut self) -> Result<(), SceneError> {
        self.scene.despawn(self.entity)
    }

    /// The whole scene
    pub fn scene(&self) -> &Scene {
        self.scene
    }

    /// The whole scene, mutably
    pub fn scene_mut(&mut self) -> &mut Scene {
        self.scene
    }

    /// The entity and behavior arena
    pub fn world(&self) -> &World {
        self.scene.world()
    }

    /// The physics simulation
    pub fn physics(&self) -> &Physics {
        self.scene.physics()
    }

    /// The physics simulation, mutably
    pub fn physics_mut(&mut self) -> &mut Physics {
        self.scene.physics_mut()
    }

    /// The scene camera
    pub fn camera(&self) -> &Camera {
        self.scene.camera()
    }

    /// Length of the current frame in seconds
    pub fn delta(&self) -> f32 {
        self.scene.delta()
    }

    /// Length of one physics step in seconds
    pub fn fixed_delta(&self) -> f32 {
        self.scene.physics().fixed_delta()
    }

    /// Queue a drawable for this frame's presentation
    pub fn draw(&mut self, drawable: Drawable) {
        self.scene.draw_list_mut().push(drawable);
    }

    /// Ask the host loop to stop after this frame
    pub fn request_stop(&mut self) {
        self.scene.request_stop();
    }
}
