//! Contact listening and the symmetric pair filter

use super::backend::ContactPhase;
use super::rigid_body::BodyType;
use crate::scene::{Context, EntityId, SceneError, World};

/// Capability of behaviors that react to their entity's rigid body touching others
///
/// Expose it from a behavior through
/// [`Behavior::contact_listener`](crate::scene::Behavior::contact_listener) and
/// [`Behavior::contact_listener_mut`](crate::scene::Behavior::contact_listener_mut).
#[allow(unused_variables)]
pub trait ContactListener {
    /// The owning entity started touching `other`
    fn on_contact_begin(&mut self, ctx: &mut Context<'_>, other: EntityId) -> Result<(), SceneError> {
        Ok(())
    }

    /// The owning entity stopped touching `other`
    ///
    /// Only entities still in the scene hear about it; an entity removed
    /// while touching others gets no end events after its `destroy`.
    fn on_contact_end(&mut self, ctx: &mut Context<'_>, other: EntityId) -> Result<(), SceneError> {
        Ok(())
    }

    /// Whether the owning entity may collide with `other`
    ///
    /// A pair collides only when every listener on both sides agrees.
    fn should_collide(&self, world: &World, other: EntityId) -> bool {
        true
    }
}

/// One side of a contact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Participant {
    /// The entity owning the body
    pub entity: EntityId,
    /// Classification of its body
    pub body_type: BodyType,
}

/// Contact between two entities' bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact {
    /// Begin or end
    pub phase: ContactPhase,
    /// First side
    pub a: Participant,
    /// Second side
    pub b: Participant,
}

/// Whether `this` accepts a contact with `other`
///
/// Two static bodies never collide; otherwise every contact listener on
/// `this` must accept `other`.
pub fn should_collide(world: &World, this: Participant, other: Participant) -> bool {
    if this.body_type == BodyType::Static && other.body_type == BodyType::Static {
        return false;
    }
    world
        .contact_listeners(this.entity)
        .all(|listener| listener.should_collide(world, other.entity))
}

/// Whether both sides accept each other
pub fn accepts_pair(world: &World, a: Participant, b: Participant) -> bool {
    should_collide(world, a, b) && should_collide(world, b, a)
}
