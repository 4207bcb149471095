//! # Ember Engine
//!
//! A 2D game runtime built around a deterministic entity lifecycle.
//!
//! ## Features
//!
//! - **Entities and behaviors**: named, tagged entities carrying polymorphic
//!   behaviors with start/update/fixed-update/destroy callbacks
//! - **Safe structural mutation**: attaching, detaching, admitting and removing
//!   while a pass is running is queued and applied by a fixed-point drain
//! - **Fixed-step physics**: an accumulator turns frame deltas into whole steps;
//!   rigid bodies sync back to their entities without echoing
//! - **Data-driven scenes**: RON/TOML blueprints instantiated through a
//!   behavior registry
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ember_engine::prelude::*;
//!
//! struct MyApp;
//!
//! impl Application for MyApp {
//!     fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
//!         let scene = engine.scene_mut();
//!         let ball = EntityBuilder::new("ball")
//!             .size(Vec2::new(16.0, 16.0))
//!             .spawn(scene);
//!         scene.attach_new(ball, RigidBody::new(BodyType::Dynamic, Collider::Circle))?;
//!         scene.add_entity(ball)?;
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::default();
//!     let mut app = MyApp;
//!     Engine::run(config, &mut app)?;
//!     Ok(())
//! }
//! ```

pub mod components;
pub mod config;
pub mod foundation;
pub mod physics;
pub mod render;
pub mod scene;

mod application;
mod engine;

pub use application::{AppError, Application};
pub use engine::{Engine, EngineConfig, EngineError, WindowConfig};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        components::{ContactSensor, Lifetime},
        config::Config,
        foundation::{
            math::{Bounds, Vec2},
            time::{Clock, FpsTarget},
        },
        physics::{BodyType, Collider, ContactListener, Physics, PhysicsConfig, RigidBody},
        render::{Color, DrawList, Drawable, Paint},
        scene::{
            Behavior, BehaviorId, BehaviorRegistry, Camera, Context, EntityBuilder, EntityId,
            Scene, SceneBlueprint, SceneError, World,
        },
        AppError, Application, Engine, EngineConfig, EngineError, WindowConfig,
    };
}
