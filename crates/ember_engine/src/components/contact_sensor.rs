//! Contact tracking
//!
//! A [`ContactSensor`] keeps the set of entities its entity currently touches.
//! Pair it with a [`RigidBody`] on the same entity.

use crate::physics::contact::ContactListener;
use crate::physics::RigidBody;
use crate::scene::{Behavior, Context, EntityId, SceneError, World};
use std::collections::BTreeSet;

/// Tracks the entities touching its entity
#[derive(Debug, Clone, Default)]
pub struct ContactSensor {
    touching: Vec<EntityId>,
    ignored_tags: BTreeSet<String>,
    ignore_triggers: bool,
}

impl ContactSensor {
    /// Sensor accepting every contact
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: reject contacts with entities carrying `tag`
    pub fn ignore_tag(mut self, tag: impl Into<String>) -> Self {
        self.ignored_tags.insert(tag.into());
        self
    }

    /// Builder: reject contacts with trigger bodies
    pub fn ignore_triggers(mut self, ignore: bool) -> Self {
        self.ignore_triggers = ignore;
        self
    }

    /// Entities currently touching, in order of first contact
    pub fn touching(&self) -> &[EntityId] {
        &self.touching
    }

    /// Whether `other` is currently touching
    pub fn is_touching(&self, other: EntityId) -> bool {
        self.touching.contains(&other)
    }

    /// Whether anything is touching
    pub fn is_empty(&self) -> bool {
        self.touching.is_empty()
    }
}

impl Behavior for ContactSensor {
    fn fixed_update(&mut self, ctx: &mut Context<'_>) -> Result<(), SceneError> {
        let scene = ctx.scene();
        self.touching.retain(|id| scene.contains(*id));
        Ok(())
    }

    fn destroy(&mut self, _ctx: &mut Context<'_>) -> Result<(), SceneError> {
        self.touching.clear();
        Ok(())
    }

    fn contact_listener(&self) -> Option<&dyn ContactListener> {
        Some(self)
    }

    fn contact_listener_mut(&mut self) -> Option<&mut dyn ContactListener> {
        Some(self)
    }
}

impl ContactListener for ContactSensor {
    fn on_contact_begin(&mut self, _ctx: &mut Context<'_>, other: EntityId) -> Result<(), SceneError> {
        if !self.touching.contains(&other) {
            self.touching.push(other);
        }
        Ok(())
    }

    fn on_contact_end(&mut self, _ctx: &mut Context<'_>, other: EntityId) -> Result<(), SceneError> {
        self.touching.retain(|id| *id != other);
        Ok(())
    }

    fn should_collide(&self, world: &World, other: EntityId) -> bool {
        let Some(entity) = world.entity(other) else {
            return true;
        };
        if self.ignored_tags.iter().any(|tag| entity.has_tag(tag)) {
            return false;
        }
        !(self.ignore_triggers
            && world
                .component::<RigidBody>(other)
                .is_some_and(RigidBody::is_trigger))
    }
}
