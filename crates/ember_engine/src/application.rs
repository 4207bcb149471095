//! Application trait and lifecycle management

use crate::config::ConfigError;
use crate::engine::{Engine, EngineError};
use crate::render::DrawList;
use crate::scene::SceneError;
use thiserror::Error;

/// Application lifecycle trait
///
/// Implement this trait to drive a game with the engine. The host loop calls
/// `update` before the scene runs its frame and `render` after it, with the
/// drawables the scene's behaviors collected.
#[allow(unused_variables)]
pub trait Application {
    /// Initialize the application
    ///
    /// Called once before the scene is activated: entities admitted here are
    /// started immediately.
    fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError>;

    /// Update the application
    ///
    /// # Arguments
    /// * `engine` - Mutable reference to the engine
    /// * `delta_time` - Time since last frame in seconds
    fn update(&mut self, engine: &mut Engine, delta_time: f32) -> Result<(), AppError> {
        Ok(())
    }

    /// Present one frame
    ///
    /// `draw_list` holds everything the scene's behaviors pushed this frame.
    fn render(&mut self, engine: &Engine, draw_list: &DrawList) -> Result<(), AppError> {
        Ok(())
    }

    /// Cleanup the application
    ///
    /// Called once when the loop has stopped.
    fn cleanup(&mut self, engine: &mut Engine) {}
}

/// Application-level errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Engine error propagated to application level
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Custom application error
    #[error("Application error: {0}")]
    Custom(String),

    /// Configuration or blueprint file error
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl From<SceneError> for AppError {
    fn from(error: SceneError) -> Self {
        Self::Engine(EngineError::Scene(error))
    }
}
