//! Data-driven instantiation
//!
//! A [`SceneBlueprint`] lists entities with their transform, tags and
//! behaviors. Behaviors are named by a string key and built by the factory
//! registered under that key in a [`BehaviorRegistry`].
//!
//! ```ron
//! (
//!     entities: [
//!         (
//!             name: "crate",
//!             position: (40.0, 0.0),
//!             size: (20.0, 20.0),
//!             behaviors: [
//!                 (kind: "rigid_body", params: {"density": 2.0}),
//!                 (kind: "lifetime", params: {"seconds": 5.0}),
//!             ],
//!         ),
//!     ],
//! )
//! ```

use super::behavior::Behavior;
use super::entity::EntityBuilder;
use super::world::EntityId;
use super::{Scene, SceneError};
use crate::components::{ContactSensor, Lifetime};
use crate::config::Config;
use crate::foundation::math::Vec2;
use crate::physics::{BodyType, Collider, RigidBody};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A blueprint parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// `true` / `false`
    Bool(bool),
    /// Any number
    Number(f64),
    /// Any string
    Text(String),
}

/// Named parameters of one behavior
pub type Params = BTreeMap<String, ParamValue>;

/// One behavior of an entity blueprint
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BehaviorBlueprint {
    /// Registry key
    pub kind: String,
    /// Factory parameters
    #[serde(default)]
    pub params: Params,
}

/// Description of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityBlueprint {
    /// Entity name
    pub name: String,
    /// Top-left corner
    pub position: Vec2,
    /// Width and height
    pub size: Vec2,
    /// Update/paint priority
    pub z_index: i32,
    /// Tags
    pub tags: Vec<String>,
    /// Behaviors in attachment order
    pub behaviors: Vec<BehaviorBlueprint>,
}

impl Default for EntityBlueprint {
    fn default() -> Self {
        Self {
            name: String::new(),
            position: Vec2::zeros(),
            size: Vec2::zeros(),
            z_index: 0,
            tags: Vec::new(),
            behaviors: Vec::new(),
        }
    }
}

/// Description of a scene's initial entities
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneBlueprint {
    /// Entities in admission order
    pub entities: Vec<EntityBlueprint>,
}

impl Config for SceneBlueprint {}

type Factory = Box<dyn Fn(&Params) -> Result<Box<dyn Behavior>, SceneError>>;

/// String keys to behavior factories
#[derive(Default)]
pub struct BehaviorRegistry {
    factories: BTreeMap<String, Factory>,
}

impl std::fmt::Debug for BehaviorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorRegistry")
            .field("kinds", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl BehaviorRegistry {
    /// Registry without any factory
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `rigid_body`, `lifetime` and `contact_sensor`
    pub fn with_builtins() -> Self {
        let mut factories: BTreeMap<String, Factory> = BTreeMap::new();
        factories.insert("rigid_body".to_string(), Box::new(rigid_body));
        factories.insert("lifetime".to_string(), Box::new(lifetime));
        factories.insert("contact_sensor".to_string(), Box::new(contact_sensor));
        Self { factories }
    }

    /// Register a factory under `kind`
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F) -> Result<(), SceneError>
    where
        F: Fn(&Params) -> Result<Box<dyn Behavior>, SceneError> + 'static,
    {
        let kind = kind.into();
        if self.factories.contains_key(&kind) {
            return Err(SceneError::DuplicateFactory(kind));
        }
        self.factories.insert(kind, Box::new(factory));
        Ok(())
    }

    /// Whether a factory is registered under `kind`
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered keys in order
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build a behavior; `None` if nothing is registered under `kind`
    pub fn create(&self, kind: &str, params: &Params) -> Option<Result<Box<dyn Behavior>, SceneError>> {
        self.factories.get(kind).map(|factory| factory(params))
    }

    /// Create an entity from a blueprint, attach its behaviors and admit it
    pub fn instantiate(&self, scene: &mut Scene, blueprint: &EntityBlueprint) -> Result<EntityId, SceneError> {
        let mut builder = EntityBuilder::new(blueprint.name.as_str())
            .position(blueprint.position)
            .size(blueprint.size)
            .z_index(blueprint.z_index);
        for tag in &blueprint.tags {
            builder = builder.tag(tag.as_str());
        }
        let entity = builder.spawn(scene);

        for behavior in &blueprint.behaviors {
            let Some(created) = self.create(&behavior.kind, &behavior.params) else {
                log::warn!(
                    "Unknown behavior kind '{}' on entity '{}', skipping",
                    behavior.kind,
                    blueprint.name
                );
                continue;
            };
            let id = scene.world_mut().insert_behavior(created?);
            scene.attach(entity, id)?;
        }

        scene.add_entity(entity)?;
        Ok(entity)
    }

    /// Instantiate every entity of a scene blueprint in order
    pub fn instantiate_scene(&self, scene: &mut Scene, blueprint: &SceneBlueprint) -> Result<Vec<EntityId>, SceneError> {
        blueprint
            .entities
            .iter()
            .map(|entity| self.instantiate(scene, entity))
            .collect()
    }
}

fn invalid(name: &str, reason: impl Into<String>) -> SceneError {
    SceneError::InvalidParameter {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Numeric parameter, if present
#[allow(clippy::cast_possible_truncation)]
pub fn number(params: &Params, name: &str) -> Result<Option<f32>, SceneError> {
    match params.get(name) {
        None => Ok(None),
        Some(ParamValue::Number(value)) if value.is_finite() => Ok(Some(*value as f32)),
        Some(other) => Err(invalid(name, format!("expected a finite number, got {other:?}"))),
    }
}

/// Boolean parameter, if present
pub fn flag(params: &Params, name: &str) -> Result<Option<bool>, SceneError> {
    match params.get(name) {
        None => Ok(None),
        Some(ParamValue::Bool(value)) => Ok(Some(*value)),
        Some(other) => Err(invalid(name, format!("expected a boolean, got {other:?}"))),
    }
}

/// Text parameter, if present
pub fn text<'p>(params: &'p Params, name: &str) -> Result<Option<&'p str>, SceneError> {
    match params.get(name) {
        None => Ok(None),
        Some(ParamValue::Text(value)) => Ok(Some(value.as_str())),
        Some(other) => Err(invalid(name, format!("expected text, got {other:?}"))),
    }
}

fn rigid_body(params: &Params) -> Result<Box<dyn Behavior>, SceneError> {
    let body_type = match text(params, "body_type")? {
        None => BodyType::default(),
        Some(name) => BodyType::from_name(name).ok_or_else(|| invalid("body_type", format!("unknown body type '{name}'")))?,
    };
    let collider = match text(params, "collider")? {
        None => Collider::default(),
        Some(name) => Collider::from_name(name).ok_or_else(|| invalid("collider", format!("unknown collider '{name}'")))?,
    };

    let mut body = RigidBody::new(body_type, collider);
    if let Some(value) = number(params, "gravity_scale")? {
        body = body.with_gravity_scale(value);
    }
    if let Some(value) = number(params, "density")? {
        body = body.with_density(value);
    }
    if let Some(value) = number(params, "friction")? {
        body = body.with_friction(value);
    }
    if let Some(value) = number(params, "restitution")? {
        body = body.with_restitution(value);
    }
    if let Some(value) = flag(params, "fixed_rotation")? {
        body = body.with_fixed_rotation(value);
    }
    if let Some(value) = flag(params, "trigger")? {
        body = body.with_trigger(value);
    }
    Ok(Box::new(body))
}

fn lifetime(params: &Params) -> Result<Box<dyn Behavior>, SceneError> {
    let seconds = number(params, "seconds")?.ok_or_else(|| invalid("seconds", "missing"))?;
    Ok(Box::new(Lifetime::new(seconds)))
}

fn contact_sensor(params: &Params) -> Result<Box<dyn Behavior>, SceneError> {
    let mut sensor = ContactSensor::new();
    if let Some(ignore) = flag(params, "ignore_triggers")? {
        sensor = sensor.ignore_triggers(ignore);
    }
    // Comma-separated list
    if let Some(tags) = text(params, "ignored_tags")? {
        for tag in tags.split(',').map(str::trim).filter(|tag| !tag.is_empty()) {
            sensor = sensor.ignore_tag(tag);
        }
    }
    Ok(Box::new(sensor))
}
