//! Scene: live entities, deferred mutation and the per-frame update
//!
//! ## Structure
//!
//! ```text
//! Scene
//!  ├─ World      arena of entities and behaviors
//!  ├─ entities   admitted entities, sorted by z-order each frame
//!  ├─ pending    queued admissions/removals
//!  ├─ Physics    fixed-step simulation
//!  ├─ Camera
//!  └─ DrawList   drawables pushed by this frame's updates
//! ```
//!
//! ## Mutation rules
//!
//! Structural changes (admitting or removing entities, attaching or detaching
//! behaviors) never touch a list while it is being walked. Each entity has a
//! pending queue that is drained at the end of every pass over it; the scene
//! has one drained at the start of every frame. Before [`Scene::activate`]
//! changes requested outside a pass are applied on the spot.
//!
//! A drain applies operations in the order they were queued and keeps going
//! until the queue is empty, so operations queued by the `start`/`destroy`
//! callbacks it fires are applied by the same drain.

pub mod behavior;
pub mod camera;
pub mod entity;
pub mod pending;
pub mod registry;
pub mod world;

#[cfg(test)]
mod tests;

pub use behavior::{AsAny, Attachment, Behavior, Context};
pub use camera::Camera;
pub use entity::{Entity, EntityBuilder};
pub use pending::PendingQueue;
pub use registry::{BehaviorBlueprint, BehaviorRegistry, EntityBlueprint, ParamValue, Params, SceneBlueprint};
pub use world::{BehaviorId, EntityId, World};

use crate::foundation::math::Vec2;
use crate::physics::contact::{self, Contact};
use crate::physics::rigid_body::RigidBody;
use crate::physics::{ContactPhase, Physics, PhysicsBackend, PhysicsConfig};
use crate::render::DrawList;
use entity::BehaviorOp;
use thiserror::Error;

/// Configuration errors raised while building or running a scene
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    /// The behavior already belongs to an entity
    #[error("Behavior is already attached to an entity")]
    AlreadyAttached,

    /// The entity already has a live rigid body
    #[error("Entity cannot have more than one rigid body")]
    DuplicateRigidBody,

    /// The collider does not fit the entity size
    #[error("Invalid collider: {0}")]
    InvalidCollider(String),

    /// A body cannot be built from a zero or negative size
    #[error("Size must be positive, got {width}x{height}")]
    NonPositiveSize {
        /// Requested width
        width: f32,
        /// Requested height
        height: f32,
    },

    /// The entity id does not refer to a live entity
    #[error("Unknown entity")]
    UnknownEntity,

    /// The behavior id does not refer to a live behavior
    #[error("Unknown behavior")]
    UnknownBehavior,

    /// A factory with this key is already registered
    #[error("Behavior factory already registered: {0}")]
    DuplicateFactory(String),

    /// A blueprint parameter has the wrong type or value
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// What is wrong with it
        reason: String,
    },

    /// Error raised by application behaviors
    #[error("{0}")]
    Custom(String),
}

/// Structural change to the scene's entity list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SceneOp {
    Add(EntityId),
    Remove { id: EntityId, release: bool },
}

/// Callback type shared by passes and notifications
type Callback<'f> = &'f dyn Fn(&mut dyn Behavior, &mut Context<'_>) -> Result<(), SceneError>;

/// Transform change for one behavior of the changed entity
#[derive(Debug, Clone, Copy, PartialEq)]
enum Notice {
    Moved { old: Vec2, new: Vec2 },
    Resized { old: Vec2, new: Vec2 },
}

impl Notice {
    fn deliver(self, behavior: &mut dyn Behavior, ctx: &mut Context<'_>) -> Result<(), SceneError> {
        match self {
            Self::Moved { old, new } => behavior.on_position_changed(ctx, old, new),
            Self::Resized { old, new } => behavior.on_size_changed(ctx, old, new),
        }
    }
}

/// The authoritative set of live entities
pub struct Scene {
    world: World,
    entities: Vec<EntityId>,
    pending: PendingQueue<SceneOp>,
    // Notices for behaviors whose callback was running when the change happened
    notices: Vec<(BehaviorId, Notice)>,
    initialized: bool,
    // Number of passes currently walking some entity
    depth: u32,
    physics: Physics,
    camera: Camera,
    draw_list: DrawList,
    delta: f32,
    stop_requested: bool,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Empty scene with default physics
    pub fn new() -> Self {
        Self::with_physics(Physics::default())
    }

    /// Empty scene with the given physics parameters
    pub fn with_config(config: PhysicsConfig) -> Self {
        Self::with_physics(Physics::new(config))
    }

    /// Empty scene simulated by a custom backend
    pub fn with_backend(config: PhysicsConfig, backend: Box<dyn PhysicsBackend>) -> Self {
        Self::with_physics(Physics::with_backend(config, backend))
    }

    /// Empty scene around an existing simulation
    pub fn with_physics(physics: Physics) -> Self {
        Self {
            world: World::new(),
            entities: Vec::new(),
            pending: PendingQueue::new(),
            notices: Vec::new(),
            initialized: false,
            depth: 0,
            physics,
            camera: Camera::default(),
            draw_list: DrawList::new(),
            delta: 0.0,
            stop_requested: false,
        }
    }

    /// Switch to deferred mutation; called once by the host before the first frame
    pub fn activate(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;
        log::info!("Scene activated with {} entities", self.entities.len());
    }

    /// Whether [`Self::activate`] has run
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The entity and behavior arena
    pub fn world(&self) -> &World {
        &self.world
    }

    /// The entity and behavior arena, mutably
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Admitted entities, in the order of the last update pass
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    /// Whether an entity is admitted
    pub fn contains(&self, id: EntityId) -> bool {
        self.world.entity(id).is_some_and(Entity::in_scene)
    }

    /// The physics simulation
    pub fn physics(&self) -> &Physics {
        &self.physics
    }

    /// The physics simulation, mutably
    pub fn physics_mut(&mut self) -> &mut Physics {
        &mut self.physics
    }

    /// The camera
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// The camera, mutably
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Drawables pushed so far this frame
    pub fn draw_list(&self) -> &DrawList {
        &self.draw_list
    }

    /// Drawables pushed so far this frame, mutably
    pub fn draw_list_mut(&mut self) -> &mut DrawList {
        &mut self.draw_list
    }

    /// Hand this frame's drawables to the presenter and start an empty list
    pub fn take_draw_list(&mut self) -> DrawList {
        std::mem::take(&mut self.draw_list)
    }

    /// Length of the frame being updated
    pub fn delta(&self) -> f32 {
        self.delta
    }

    /// Ask the host loop to stop
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    /// Whether a stop was requested
    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    /// Create a detached entity in the arena
    pub fn create_entity(&mut self, name: impl Into<String>) -> EntityId {
        self.world.create_entity(name)
    }

    /// Store a detached behavior in the arena
    pub fn insert_behavior<B: Behavior>(&mut self, behavior: B) -> BehaviorId {
        self.world.insert_behavior(Box::new(behavior))
    }

    /// Take a detached behavior back out of the arena
    pub fn dispose_behavior(&mut self, id: BehaviorId) -> Option<Box<dyn Behavior>> {
        self.world.remove_behavior(id)
    }

    // ---------------------------------------------------------------------
    // Entity admission
    // ---------------------------------------------------------------------

    /// Admit an entity; its behaviors start when the admission is applied
    pub fn add_entity(&mut self, id: EntityId) -> Result<(), SceneError> {
        let entity = self.world.entity(id).ok_or(SceneError::UnknownEntity)?;
        let queued_add = self.pending.contains(|op| *op == SceneOp::Add(id));
        let queued_remove = self
            .pending
            .contains(|op| matches!(op, SceneOp::Remove { id: other, .. } if *other == id));
        if queued_add || (entity.in_scene() && !queued_remove) {
            return Ok(());
        }
        self.pending.push(SceneOp::Add(id));
        self.settle()
    }

    /// Admit several entities in order
    pub fn add_entities(&mut self, ids: impl IntoIterator<Item = EntityId>) -> Result<(), SceneError> {
        ids.into_iter().try_for_each(|id| self.add_entity(id))
    }

    /// Remove an entity; its behaviors are destroyed but stay attached
    pub fn remove_entity(&mut self, id: EntityId) -> Result<(), SceneError> {
        let entity = self.world.entity(id).ok_or(SceneError::UnknownEntity)?;
        let in_scene = entity.in_scene();
        if self.pending.cancel(|op| *op == SceneOp::Add(id)) {
            return Ok(());
        }
        if !in_scene || self.pending.contains(|op| matches!(op, SceneOp::Remove { id: other, .. } if *other == id)) {
            return Ok(());
        }
        self.pending.push(SceneOp::Remove { id, release: false });
        self.settle()
    }

    /// Remove an entity and free it with all its behaviors
    pub fn despawn(&mut self, id: EntityId) -> Result<(), SceneError> {
        if !self.world.contains_entity(id) {
            return Err(SceneError::UnknownEntity);
        }
        self.pending.cancel(|op| *op == SceneOp::Add(id));
        if !self.pending.contains(|op| *op == SceneOp::Remove { id, release: true }) {
            self.pending.push(SceneOp::Remove { id, release: true });
        }
        self.settle()
    }

    // ---------------------------------------------------------------------
    // Behavior attachment
    // ---------------------------------------------------------------------

    /// Store a behavior and attach it to an entity
    ///
    /// A behavior whose `start` fails is dropped again.
    pub fn attach_new<B: Behavior>(&mut self, entity: EntityId, behavior: B) -> Result<BehaviorId, SceneError> {
        if !self.world.contains_entity(entity) {
            return Err(SceneError::UnknownEntity);
        }
        let id = self.insert_behavior(behavior);
        if let Err(error) = self.attach(entity, id) {
            self.world.remove_behavior(id);
            return Err(error);
        }
        Ok(id)
    }

    /// Attach a detached behavior to an entity
    ///
    /// The behavior becomes visible to lookups, and starts if the entity is
    /// admitted, once the entity's pending queue is drained. If `start` fails
    /// the behavior is detached again and the error is returned.
    pub fn attach(&mut self, entity: EntityId, behavior: BehaviorId) -> Result<(), SceneError> {
        match self.world.attachment(behavior) {
            None => return Err(SceneError::UnknownBehavior),
            Some(Attachment::Detached) => {}
            Some(_) => return Err(SceneError::AlreadyAttached),
        }
        let target = self.world.entity_mut(entity).ok_or(SceneError::UnknownEntity)?;
        target.pending.push(BehaviorOp::Attach(behavior));
        self.world.set_attachment(behavior, Attachment::Pending(entity));
        self.flush_entity(entity)
    }

    /// Detach a behavior from its entity
    ///
    /// Detaching a behavior whose attachment is still pending cancels it
    /// without any callback.
    pub fn detach(&mut self, behavior: BehaviorId) -> Result<(), SceneError> {
        match self.world.attachment(behavior) {
            None => Err(SceneError::UnknownBehavior),
            Some(Attachment::Detached) => Ok(()),
            Some(Attachment::Pending(entity)) => {
                if let Some(target) = self.world.entity_mut(entity) {
                    target.pending.cancel(|op| *op == BehaviorOp::Attach(behavior));
                }
                self.world.set_attachment(behavior, Attachment::Detached);
                Ok(())
            }
            Some(Attachment::Attached(entity)) => {
                if let Some(target) = self.world.entity_mut(entity) {
                    if !target.is_detach_queued(behavior) {
                        target.pending.push(BehaviorOp::Detach(behavior));
                    }
                }
                self.flush_entity(entity)
            }
        }
    }

    /// Detach every behavior of type `T` from an entity
    pub fn detach_all<T: Behavior>(&mut self, entity: EntityId) -> Result<(), SceneError> {
        let target = self.world.entity(entity).ok_or(SceneError::UnknownEntity)?;
        let pending: Vec<BehaviorId> = target
            .pending
            .iter()
            .filter_map(|op| match op {
                BehaviorOp::Attach(id) => Some(*id),
                BehaviorOp::Detach(_) => None,
            })
            .filter(|id| self.world.behavior::<T>(*id).is_some())
            .collect();
        let live = self.world.component_ids::<T>(entity);

        for id in pending.into_iter().chain(live) {
            self.detach(id)?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Observable transform
    // ---------------------------------------------------------------------

    /// Move an entity and notify its behaviors if the position changed
    ///
    /// A behavior whose own callback is running is notified when it returns.
    pub fn set_position(&mut self, entity: EntityId, position: Vec2) -> Result<(), SceneError> {
        let target = self.world.entity_mut(entity).ok_or(SceneError::UnknownEntity)?;
        let old = target.store_position(position);
        if old == position {
            return Ok(());
        }
        self.notify(entity, Notice::Moved { old, new: position })
    }

    /// Resize an entity and notify its behaviors if the size changed
    ///
    /// A behavior whose own callback is running is notified when it returns.
    pub fn set_size(&mut self, entity: EntityId, size: Vec2) -> Result<(), SceneError> {
        let target = self.world.entity_mut(entity).ok_or(SceneError::UnknownEntity)?;
        let old = target.store_size(size);
        if old == size {
            return Ok(());
        }
        self.notify(entity, Notice::Resized { old, new: size })
    }

    fn notify(&mut self, entity: EntityId, notice: Notice) -> Result<(), SceneError> {
        let busy: Vec<BehaviorId> = self
            .world
            .entity(entity)
            .map(|target| {
                target
                    .behaviors()
                    .iter()
                    .copied()
                    .filter(|id| self.world.is_checked_out(*id))
                    .collect()
            })
            .unwrap_or_default();
        self.notices.extend(busy.into_iter().map(|id| (id, notice)));
        self.visit(entity, &|behavior, ctx| notice.deliver(behavior, ctx))
    }

    /// Change an entity's z-order, effective from the next frame
    pub fn set_z_index(&mut self, entity: EntityId, z_index: i32) -> Result<(), SceneError> {
        let target = self.world.entity_mut(entity).ok_or(SceneError::UnknownEntity)?;
        target.set_z_index(z_index);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Lookups over admitted entities
    // ---------------------------------------------------------------------

    /// First admitted entity with this name
    pub fn find_by_name(&self, name: &str) -> Option<EntityId> {
        self.live().find(|(_, entity)| entity.name() == name).map(|(id, _)| id)
    }

    /// Every admitted entity with this name
    pub fn find_all_by_name(&self, name: &str) -> Vec<EntityId> {
        self.live()
            .filter(|(_, entity)| entity.name() == name)
            .map(|(id, _)| id)
            .collect()
    }

    /// First admitted entity carrying this tag
    pub fn find_by_tag(&self, tag: &str) -> Option<EntityId> {
        self.live().find(|(_, entity)| entity.has_tag(tag)).map(|(id, _)| id)
    }

    /// Every admitted entity carrying this tag
    pub fn find_all_by_tag(&self, tag: &str) -> Vec<EntityId> {
        self.live()
            .filter(|(_, entity)| entity.has_tag(tag))
            .map(|(id, _)| id)
            .collect()
    }

    /// First behavior of type `T` across admitted entities
    pub fn find_component<T: Behavior>(&self) -> Option<&T> {
        self.entities.iter().find_map(|id| self.world.component::<T>(*id))
    }

    /// The first behavior of type `T` on each admitted entity that has one
    pub fn find_components<T: Behavior>(&self) -> Vec<&T> {
        self.entities
            .iter()
            .filter_map(|id| self.world.component::<T>(*id))
            .collect()
    }

    /// The first rigid body on an entity, with the physics to drive it
    pub fn rigid_body_mut(&mut self, entity: EntityId) -> Option<(&mut RigidBody, &mut Physics)> {
        let id = self.world.component_id::<RigidBody>(entity)?;
        let body = self.world.behavior_mut::<RigidBody>(id)?;
        Some((body, &mut self.physics))
    }

    fn live(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities
            .iter()
            .filter_map(|id| self.world.entity(*id).map(|entity| (*id, entity)))
    }

    // ---------------------------------------------------------------------
    // Frame update
    // ---------------------------------------------------------------------

    /// Run one frame: drain, sort, update in z-order, then step physics
    pub fn update_state(&mut self, delta: f32) -> Result<(), SceneError> {
        self.delta = delta;
        self.drain_scene()?;

        let world = &self.world;
        self.entities
            .sort_by_key(|id| world.entity(*id).map_or(0, Entity::z_index));

        for id in self.entities.clone() {
            if self.contains(id) {
                self.visit(id, &|behavior, ctx| behavior.update(ctx))?;
            }
        }

        self.step_physics(delta)
    }

    fn step_physics(&mut self, delta: f32) -> Result<(), SceneError> {
        self.physics.accumulate(delta);
        while self.physics.step_due() {
            let contacts = self.physics.step(&self.world);
            self.dispatch_contacts(contacts)?;
            self.sync_bodies()?;

            for id in self.entities.clone() {
                if self.contains(id) {
                    self.visit(id, &|behavior, ctx| behavior.fixed_update(ctx))?;
                }
            }
            self.physics.consume_step();
        }
        Ok(())
    }

    fn dispatch_contacts(&mut self, contacts: Vec<Contact>) -> Result<(), SceneError> {
        for contact in contacts {
            if !contact::accepts_pair(&self.world, contact.a, contact.b) {
                continue;
            }
            self.notify_contact(contact.phase, contact.a.entity, contact.b.entity)?;
            self.notify_contact(contact.phase, contact.b.entity, contact.a.entity)?;
        }
        Ok(())
    }

    fn notify_contact(&mut self, phase: ContactPhase, entity: EntityId, other: EntityId) -> Result<(), SceneError> {
        if !self.contains(entity) {
            return Ok(());
        }
        self.visit(entity, &|behavior, ctx| match behavior.contact_listener_mut() {
            Some(listener) => match phase {
                ContactPhase::Begin => listener.on_contact_begin(ctx, other),
                ContactPhase::End => listener.on_contact_end(ctx, other),
            },
            None => Ok(()),
        })
    }

    fn sync_bodies(&mut self) -> Result<(), SceneError> {
        for synced in self.physics.synced_bodies() {
            let Some(size) = self.world.entity(synced.entity).map(Entity::size) else {
                continue;
            };
            let Some(body) = self.world.behavior_mut::<RigidBody>(synced.owner) else {
                continue;
            };
            body.begin_sync(synced.linear_velocity, synced.angular_velocity, synced.rotation);
            let result = self.set_position(synced.entity, synced.center - size / 2.0);
            if let Some(body) = self.world.behavior_mut::<RigidBody>(synced.owner) {
                body.end_sync();
            }
            result?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Passes and drains
    // ---------------------------------------------------------------------

    /// Invoke `callback` on every live behavior of an entity, stopping at the first error
    fn visit(&mut self, entity: EntityId, callback: Callback<'_>) -> Result<(), SceneError> {
        self.walk(entity, false, &mut |scene: &mut Self, id: BehaviorId| {
            scene.call_behavior(entity, id, callback)
        })
    }

    /// Start every live behavior of a newly admitted entity
    ///
    /// A behavior that fails to start is detached and the others still start;
    /// the first error is returned.
    fn start_all(&mut self, entity: EntityId) -> Result<(), SceneError> {
        self.walk(entity, true, &mut |scene: &mut Self, id: BehaviorId| {
            scene.start_behavior(entity, id)
        })
    }

    /// Run `call` for each live behavior of an entity
    ///
    /// The entity is busy for the duration; if this call made it busy, its
    /// pending queue is drained afterwards.
    fn walk(
        &mut self,
        entity: EntityId,
        keep_going: bool,
        call: &mut dyn FnMut(&mut Self, BehaviorId) -> Result<(), SceneError>,
    ) -> Result<(), SceneError> {
        let Some(target) = self.world.entity_mut(entity) else {
            return Ok(());
        };
        let owner = target.pending.enter();
        let snapshot = target.behaviors().to_vec();
        self.depth += 1;

        let mut result = Ok(());
        for id in snapshot {
            if self.world.attachment(id) != Some(Attachment::Attached(entity)) {
                continue;
            }
            let outcome = call(&mut *self, id);
            if result.is_ok() {
                result = outcome;
            }
            if (result.is_err() && !keep_going) || !self.world.contains_entity(entity) {
                break;
            }
        }

        if owner {
            if let Some(target) = self.world.entity_mut(entity) {
                target.pending.leave();
            }
            let drained = self.drain_entity(entity);
            if result.is_ok() {
                result = drained;
            }
        }
        self.depth -= 1;
        result?;
        self.settle()
    }

    fn call_behavior(&mut self, entity: EntityId, id: BehaviorId, callback: Callback<'_>) -> Result<(), SceneError> {
        // Already checked out: its own callback is running further up the stack
        let Some(mut behavior) = self.world.take_behavior(id) else {
            return Ok(());
        };
        let result = callback(behavior.as_mut(), &mut Context::new(self, entity, id));
        self.world.restore_behavior(id, behavior);
        if result.is_err() {
            self.notices.retain(|(owner, _)| *owner != id);
            return result;
        }
        self.deliver_notices(entity, id)
    }

    /// Hand a returning behavior the transform changes it missed
    fn deliver_notices(&mut self, entity: EntityId, id: BehaviorId) -> Result<(), SceneError> {
        while let Some(index) = self.notices.iter().position(|(owner, _)| *owner == id) {
            let (_, notice) = self.notices.remove(index);
            if self.world.attachment(id) == Some(Attachment::Attached(entity)) {
                self.call_behavior(entity, id, &|behavior, ctx| notice.deliver(behavior, ctx))?;
            }
        }
        Ok(())
    }

    fn start_behavior(&mut self, entity: EntityId, id: BehaviorId) -> Result<(), SceneError> {
        let result = self.call_behavior(entity, id, &|behavior, ctx| behavior.start(ctx));
        if let Err(error) = &result {
            if let Some(target) = self.world.entity_mut(entity) {
                target.remove_behavior(id);
            }
            self.world.set_attachment(id, Attachment::Detached);
            log::warn!("Behavior {id:?} failed to start on {entity:?} and was detached: {error}");
        }
        result
    }

    /// Apply an entity's queue now unless the scene is active
    fn flush_entity(&mut self, entity: EntityId) -> Result<(), SceneError> {
        if !self.initialized {
            self.drain_entity(entity)?;
        }
        self.settle()
    }

    fn drain_entity(&mut self, entity: EntityId) -> Result<(), SceneError> {
        let Some(target) = self.world.entity_mut(entity) else {
            return Ok(());
        };
        if target.pending.is_empty() || !target.pending.enter() {
            return Ok(());
        }
        self.depth += 1;
        let result = self.apply_behavior_ops(entity);
        if let Some(target) = self.world.entity_mut(entity) {
            target.pending.leave();
        }
        self.depth -= 1;
        result
    }

    fn apply_behavior_ops(&mut self, entity: EntityId) -> Result<(), SceneError> {
        let mut applied = 0_usize;
        while let Some(op) = self.world.entity_mut(entity).and_then(|target| target.pending.pop()) {
            applied += 1;
            match op {
                BehaviorOp::Attach(id) => {
                    if self.world.attachment(id) != Some(Attachment::Pending(entity)) {
                        continue;
                    }
                    let Some(target) = self.world.entity_mut(entity) else {
                        break;
                    };
                    target.push_behavior(id);
                    let in_scene = target.in_scene();
                    self.world.set_attachment(id, Attachment::Attached(entity));
                    if in_scene {
                        self.start_behavior(entity, id)?;
                    }
                }
                BehaviorOp::Detach(id) => {
                    let Some(target) = self.world.entity_mut(entity) else {
                        break;
                    };
                    if !target.remove_behavior(id) {
                        continue;
                    }
                    let result = if target.in_scene() {
                        self.call_behavior(entity, id, &|behavior, ctx| behavior.destroy(ctx))
                    } else {
                        Ok(())
                    };
                    self.world.set_attachment(id, Attachment::Detached);
                    result?;
                }
            }
        }
        if applied > 0 {
            log::trace!("Applied {applied} behavior operations on {entity:?}");
        }
        Ok(())
    }

    /// Drain the scene queue if nothing is walking the scene and it is not active
    fn settle(&mut self) -> Result<(), SceneError> {
        if self.initialized || self.depth > 0 || self.pending.is_empty() {
            return Ok(());
        }
        self.drain_scene()
    }

    fn drain_scene(&mut self) -> Result<(), SceneError> {
        if self.pending.is_empty() || !self.pending.enter() {
            return Ok(());
        }
        let result = self.apply_scene_ops();
        self.pending.leave();
        result
    }

    fn apply_scene_ops(&mut self) -> Result<(), SceneError> {
        let mut applied = 0_usize;
        while let Some(op) = self.pending.pop() {
            applied += 1;
            match op {
                SceneOp::Add(id) => self.admit(id)?,
                SceneOp::Remove { id, release } => self.evict(id, release)?,
            }
        }
        log::trace!("Applied {applied} scene operations");
        Ok(())
    }

    fn admit(&mut self, id: EntityId) -> Result<(), SceneError> {
        let Some(target) = self.world.entity_mut(id) else {
            return Ok(());
        };
        if target.in_scene {
            return Ok(());
        }
        target.in_scene = true;
        log::debug!("Entity '{}' joined the scene", target.name());
        self.entities.push(id);
        self.start_all(id)
    }

    fn evict(&mut self, id: EntityId, release: bool) -> Result<(), SceneError> {
        let Some(target) = self.world.entity_mut(id) else {
            return Ok(());
        };
        if target.in_scene {
            target.in_scene = false;
            log::debug!("Entity '{}' left the scene", target.name());
            self.entities.retain(|other| *other != id);
            self.visit(id, &|behavior, ctx| behavior.destroy(ctx))?;
        }
        if release {
            self.world.remove_entity(id);
        }
        Ok(())
    }
}
