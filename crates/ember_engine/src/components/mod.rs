//! Reusable behaviors
//!
//! Small behaviors most games need, available to blueprints through the
//! built-in entries of [`BehaviorRegistry`](crate::scene::BehaviorRegistry).

pub mod contact_sensor;
pub mod lifetime;

pub use contact_sensor::ContactSensor;
pub use lifetime::Lifetime;
