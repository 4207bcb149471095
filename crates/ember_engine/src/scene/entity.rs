//! Entity ("game object") data
//!
//! An entity is a named, tagged container of behaviors with a position, a size
//! and a z-order key. Position and size are observable: they can only be
//! written through [`Scene::set_position`](crate::scene::Scene::set_position)
//! and [`Scene::set_size`](crate::scene::Scene::set_size), which notify every
//! attached behavior before returning.

use super::pending::PendingQueue;
use super::world::BehaviorId;
use crate::foundation::math::{Bounds, Vec2};
use std::collections::BTreeSet;

/// Structural change to an entity's behavior list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BehaviorOp {
    Attach(BehaviorId),
    Detach(BehaviorId),
}

/// A named, tagged container of behaviors
#[derive(Debug)]
pub struct Entity {
    name: String,
    tags: BTreeSet<String>,
    z_index: i32,
    position: Vec2,
    size: Vec2,
    behaviors: Vec<BehaviorId>,
    pub(crate) pending: PendingQueue<BehaviorOp>,
    pub(crate) in_scene: bool,
}

impl Entity {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: BTreeSet::new(),
            z_index: 0,
            position: Vec2::zeros(),
            size: Vec2::zeros(),
            behaviors: Vec::new(),
            pending: PendingQueue::new(),
            in_scene: false,
        }
    }

    /// Human-readable name; not unique
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tags attached to this entity
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Whether the entity carries `tag`
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Add a tag; returns `false` if it was already present
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        self.tags.insert(tag.into())
    }

    /// Remove a tag; returns whether it was present
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        self.tags.remove(tag)
    }

    /// Update/paint priority; lower values run first
    pub fn z_index(&self) -> i32 {
        self.z_index
    }

    /// Change the update/paint priority, effective from the next frame pass
    pub fn set_z_index(&mut self, z_index: i32) {
        self.z_index = z_index;
    }

    /// Top-left corner in scene units
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Width and height in scene units
    pub fn size(&self) -> Vec2 {
        self.size
    }

    /// Position and size as a rectangle
    pub fn bounds(&self) -> Bounds {
        Bounds::from_position_size(self.position, self.size)
    }

    /// Live behaviors in attachment order
    ///
    /// Behaviors waiting in the pending queue are not listed until drained.
    pub fn behaviors(&self) -> &[BehaviorId] {
        &self.behaviors
    }

    /// Whether structural changes are waiting to be applied
    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Whether the entity is currently admitted to its scene
    pub fn in_scene(&self) -> bool {
        self.in_scene
    }

    pub(crate) fn store_position(&mut self, position: Vec2) -> Vec2 {
        std::mem::replace(&mut self.position, position)
    }

    pub(crate) fn store_size(&mut self, size: Vec2) -> Vec2 {
        std::mem::replace(&mut self.size, size)
    }

    pub(crate) fn push_behavior(&mut self, id: BehaviorId) {
        self.behaviors.push(id);
    }

    pub(crate) fn remove_behavior(&mut self, id: BehaviorId) -> bool {
        let before = self.behaviors.len();
        self.behaviors.retain(|existing| *existing != id);
        self.behaviors.len() != before
    }

    pub(crate) fn is_detach_queued(&self, id: BehaviorId) -> bool {
        self.pending.contains(|op| *op == BehaviorOp::Detach(id))
    }
}

/// Fluent description of a new entity
///
/// ```rust
/// use ember_engine::prelude::*;
///
/// let mut scene = Scene::new();
/// let player = EntityBuilder::new("player")
///     .position(Vec2::new(10.0, 20.0))
///     .size(Vec2::new(16.0, 16.0))
///     .z_index(2)
///     .tag("hero")
///     .spawn(&mut scene);
/// assert_eq!(scene.world().entity(player).unwrap().z_index(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct EntityBuilder {
    name: String,
    position: Vec2,
    size: Vec2,
    z_index: i32,
    tags: Vec<String>,
}

impl EntityBuilder {
    /// Start describing an entity
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Initial top-left corner
    pub fn position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    /// Initial size
    pub fn size(mut self, size: Vec2) -> Self {
        self.size = size;
        self
    }

    /// Update/paint priority
    pub fn z_index(mut self, z_index: i32) -> Self {
        self.z_index = z_index;
        self
    }

    /// Add a tag
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Create the entity in the scene's arena without admitting it
    pub fn spawn(self, scene: &mut crate::scene::Scene) -> super::world::EntityId {
        let mut entity = Entity::new(self.name);
        entity.position = self.position;
        entity.size = self.size;
        entity.z_index = self.z_index;
        entity.tags.extend(self.tags);
        scene.world_mut().insert_entity(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entity_is_detached_and_clean() {
        let entity = Entity::new("crate");
        assert_eq!(entity.name(), "crate");
        assert!(!entity.in_scene());
        assert!(!entity.is_dirty());
        assert!(entity.behaviors().is_empty());
        assert_eq!(entity.bounds(), Bounds::new(0.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn test_tags() {
        let mut entity = Entity::new("enemy");
        assert!(entity.add_tag("hostile"));
        assert!(!entity.add_tag("hostile"));
        assert!(entity.has_tag("hostile"));
        assert!(entity.remove_tag("hostile"));
        assert!(!entity.has_tag("hostile"));
    }
}
