//! Entity and behavior arena
//!
//! The `World` owns every entity and behavior that exists, admitted to the
//! scene or not. Lookups here see only live behavior lists; pending
//! attachments stay invisible until drained.

use super::behavior::{Attachment, Behavior};
use super::entity::Entity;
use crate::physics::contact::ContactListener;
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Stable handle of an entity
    pub struct EntityId;

    /// Stable handle of a behavior
    pub struct BehaviorId;
}

pub(crate) struct BehaviorSlot {
    // `None` while the behavior's own callback is running
    behavior: Option<Box<dyn Behavior>>,
    attachment: Attachment,
}

/// Arena of entities and behaviors
#[derive(Default)]
pub struct World {
    entities: SlotMap<EntityId, Entity>,
    behaviors: SlotMap<BehaviorId, BehaviorSlot>,
}

impl World {
    /// Create an empty world
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached entity
    pub fn create_entity(&mut self, name: impl Into<String>) -> EntityId {
        self.insert_entity(Entity::new(name))
    }

    pub(crate) fn insert_entity(&mut self, entity: Entity) -> EntityId {
        self.entities.insert(entity)
    }

    /// Look up an entity
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Look up an entity for tag or z-order changes
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    /// Whether the entity exists in the arena
    pub fn contains_entity(&self, id: EntityId) -> bool {
        self.entities.contains_key(id)
    }

    /// Every entity in the arena, admitted or not
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter()
    }

    /// Number of entities in the arena
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Store a detached behavior
    pub fn insert_behavior(&mut self, behavior: Box<dyn Behavior>) -> BehaviorId {
        self.behaviors.insert(BehaviorSlot {
            behavior: Some(behavior),
            attachment: Attachment::Detached,
        })
    }

    /// Number of behaviors in the arena
    pub fn behavior_count(&self) -> usize {
        self.behaviors.len()
    }

    /// Attachment state of a behavior
    pub fn attachment(&self, id: BehaviorId) -> Option<Attachment> {
        self.behaviors.get(id).map(|slot| slot.attachment)
    }

    pub(crate) fn set_attachment(&mut self, id: BehaviorId, attachment: Attachment) {
        if let Some(slot) = self.behaviors.get_mut(id) {
            slot.attachment = attachment;
        }
    }

    /// Borrow a behavior as a trait object
    pub fn dyn_behavior(&self, id: BehaviorId) -> Option<&dyn Behavior> {
        self.behaviors.get(id)?.behavior.as_deref()
    }

    /// Borrow a behavior as its concrete type
    pub fn behavior<T: Behavior>(&self, id: BehaviorId) -> Option<&T> {
        self.dyn_behavior(id)?.as_any().downcast_ref::<T>()
    }

    /// Mutably borrow a behavior as its concrete type
    pub fn behavior_mut<T: Behavior>(&mut self, id: BehaviorId) -> Option<&mut T> {
        self.behaviors
            .get_mut(id)?
            .behavior
            .as_deref_mut()?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    /// First live behavior of type `T` on an entity, in attachment order
    pub fn component<T: Behavior>(&self, entity: EntityId) -> Option<&T> {
        self.live_behaviors(entity)
            .find_map(|id| self.behavior::<T>(id))
    }

    /// Id of the first live behavior of type `T` on an entity
    pub fn component_id<T: Behavior>(&self, entity: EntityId) -> Option<BehaviorId> {
        self.live_behaviors(entity)
            .find(|id| self.behavior::<T>(*id).is_some())
    }

    /// Ids of every live behavior of type `T` on an entity
    pub fn component_ids<T: Behavior>(&self, entity: EntityId) -> Vec<BehaviorId> {
        self.live_behaviors(entity)
            .filter(|id| self.behavior::<T>(*id).is_some())
            .collect()
    }

    /// Whether an entity has a live behavior of type `T`
    pub fn has_component<T: Behavior>(&self, entity: EntityId) -> bool {
        self.component_id::<T>(entity).is_some()
    }

    /// Live behaviors of an entity that implement the contact-listener capability
    pub fn contact_listeners(&self, entity: EntityId) -> impl Iterator<Item = &dyn ContactListener> {
        self.live_behaviors(entity)
            .filter_map(|id| self.dyn_behavior(id))
            .filter_map(|behavior| behavior.contact_listener())
    }

    fn live_behaviors(&self, entity: EntityId) -> impl Iterator<Item = BehaviorId> + '_ {
        self.entities
            .get(entity)
            .map(|entity| entity.behaviors())
            .unwrap_or_default()
            .iter()
            .copied()
    }

    /// Check a behavior out of the arena for the duration of one of its callbacks
    pub(crate) fn take_behavior(&mut self, id: BehaviorId) -> Option<Box<dyn Behavior>> {
        self.behaviors.get_mut(id)?.behavior.take()
    }

    /// Whether a behavior's own callback is running
    pub(crate) fn is_checked_out(&self, id: BehaviorId) -> bool {
        self.behaviors.get(id).is_some_and(|slot| slot.behavior.is_none())
    }

    /// Return a checked-out behavior; dropped if its slot was freed meanwhile
    pub(crate) fn restore_behavior(&mut self, id: BehaviorId, behavior: Box<dyn Behavior>) {
        if let Some(slot) = self.behaviors.get_mut(id) {
            slot.behavior = Some(behavior);
        }
    }

    /// Remove a detached behavior from the arena
    pub(crate) fn remove_behavior(&mut self, id: BehaviorId) -> Option<Box<dyn Behavior>> {
        match self.behaviors.get(id)?.attachment {
            Attachment::Detached => self.behaviors.remove(id)?.behavior,
            _ => None,
        }
    }

    /// Free an entity and every behavior attached or pending on it
    pub(crate) fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.entities.remove(id)?;
        self.behaviors.retain(|_, slot| match slot.attachment {
            Attachment::Attached(owner) | Attachment::Pending(owner) => owner != id,
            Attachment::Detached => true,
        });
        Some(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Context;
    use crate::scene::SceneError;

    #[derive(Default)]
    struct Marker(u32);

    impl Behavior for Marker {}

    struct Other;

    impl Behavior for Other {
        fn start(&mut self, _ctx: &mut Context<'_>) -> Result<(), SceneError> {
            Ok(())
        }
    }

    #[test]
    fn test_downcast_lookup() {
        let mut world = World::new();
        let id = world.insert_behavior(Box::new(Marker(4)));

        assert_eq!(world.behavior::<Marker>(id).map(|m| m.0), Some(4));
        assert!(world.behavior::<Other>(id).is_none());

        world.behavior_mut::<Marker>(id).unwrap().0 = 9;
        assert_eq!(world.behavior::<Marker>(id).unwrap().0, 9);
        assert_eq!(world.attachment(id), Some(Attachment::Detached));
    }

    #[test]
    fn test_component_lookup_sees_live_list_in_order() {
        let mut world = World::new();
        let entity = world.create_entity("e");
        let first = world.insert_behavior(Box::new(Marker(1)));
        let other = world.insert_behavior(Box::new(Other));
        let second = world.insert_behavior(Box::new(Marker(2)));
        let pending = world.insert_behavior(Box::new(Marker(3)));

        for id in [other, first, second] {
            world.entity_mut(entity).unwrap().push_behavior(id);
            world.set_attachment(id, Attachment::Attached(entity));
        }
        world.set_attachment(pending, Attachment::Pending(entity));

        assert_eq!(world.component::<Marker>(entity).map(|m| m.0), Some(1));
        assert_eq!(world.component_ids::<Marker>(entity), vec![first, second]);
        assert!(world.has_component::<Other>(entity));
    }

    #[test]
    fn test_checked_out_behavior_is_invisible() {
        let mut world = World::new();
        let entity = world.create_entity("e");
        let id = world.insert_behavior(Box::new(Marker(1)));
        world.entity_mut(entity).unwrap().push_behavior(id);

        let taken = world.take_behavior(id).unwrap();
        assert!(world.component::<Marker>(entity).is_none());
        world.restore_behavior(id, taken);
        assert!(world.component::<Marker>(entity).is_some());
    }

    #[test]
    fn test_remove_entity_frees_its_behaviors() {
        let mut world = World::new();
        let entity = world.create_entity("e");
        let attached = world.insert_behavior(Box::new(Marker(1)));
        let loose = world.insert_behavior(Box::new(Marker(2)));
        world.set_attachment(attached, Attachment::Attached(entity));

        assert!(world.remove_entity(entity).is_some());
        assert!(world.attachment(attached).is_none());
        assert!(world.attachment(loose).is_some());
        assert!(world.remove_behavior(loose).is_some());
        assert_eq!(world.behavior_count(), 0);
    }
}
