//! Core engine implementation
//!
//! [`Engine`] is the explicit runtime context handed to the application: it
//! owns the frame clock, the active scene and the configuration. There is no
//! global state; everything reaches the scene through the engine.

use crate::application::Application;
use crate::config::{Config, ConfigError};
use crate::foundation::math::Vec2;
use crate::foundation::time::{Clock, FpsTarget};
use crate::physics::PhysicsConfig;
use crate::scene::{Scene, SceneError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main engine struct
///
/// The engine coordinates the clock and the scene and runs the main loop.
pub struct Engine {
    clock: Clock,
    scene: Scene,
    config: EngineConfig,
    /// Whether the application was initialized and the scene activated
    started: bool,
    /// Whether the loop should continue
    running: bool,
}

impl Engine {
    /// Create a new engine instance
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        log::info!(
            "Initializing engine: '{}' {}x{}",
            config.window.title,
            config.window.width,
            config.window.height
        );

        let mut scene = Scene::with_config(config.physics.clone());
        scene.camera_mut().set_viewport(config.window.viewport());

        Ok(Self {
            clock: Clock::new(config.fps_target).with_fixed_delta(scene.physics().fixed_delta()),
            scene,
            config,
            started: false,
            running: false,
        })
    }

    /// Run the engine main loop with the given application
    ///
    /// The loop paces itself to the configured frame rate and runs until the
    /// application or a behavior requests a stop.
    pub fn run<T: Application>(config: EngineConfig, app: &mut T) -> Result<(), EngineError> {
        let mut engine = Self::new(config)?;
        engine.start(app)?;

        log::info!("Starting main loop...");
        while engine.running {
            engine.clock.tick();
            let delta_time = engine.clock.delta_time();
            engine.frame(app, delta_time)?;
        }

        engine.finish(app);
        Ok(())
    }

    /// Run at most `frames` frames of `delta_time` seconds without pacing
    ///
    /// Initializes the application first and cleans it up afterwards, like
    /// [`Self::run`]. Returns the number of frames that ran before the loop
    /// stopped.
    pub fn run_frames<T: Application>(
        &mut self,
        app: &mut T,
        frames: u32,
        delta_time: f32,
    ) -> Result<u32, EngineError> {
        self.start(app)?;

        let mut count = 0;
        while self.running && count < frames {
            self.clock.advance(delta_time);
            self.frame(app, delta_time)?;
            count += 1;
        }

        self.finish(app);
        Ok(count)
    }

    fn start<T: Application>(&mut self, app: &mut T) -> Result<(), EngineError> {
        if self.started {
            return Ok(());
        }
        app.initialize(self)
            .map_err(|e| EngineError::ApplicationError(format!("App initialization: {e}")))?;
        self.scene.activate();
        self.started = true;
        self.running = true;
        Ok(())
    }

    fn frame<T: Application>(&mut self, app: &mut T, delta_time: f32) -> Result<(), EngineError> {
        app.update(self, delta_time)
            .map_err(|e| EngineError::ApplicationError(format!("App update: {e}")))?;

        self.scene.update_state(delta_time)?;

        let draw_list = self.scene.take_draw_list();
        app.render(self, &draw_list)
            .map_err(|e| EngineError::ApplicationError(format!("App render: {e}")))?;

        if self.scene.stop_requested() {
            log::info!("Stop requested by the scene");
            self.running = false;
        }
        Ok(())
    }

    fn finish<T: Application>(&mut self, app: &mut T) {
        self.running = false;
        app.cleanup(self);
        log::info!(
            "Engine shutdown complete after {} frames ({:.1} fps average)",
            self.clock.frame_count(),
            self.clock.average_fps()
        );
    }

    /// Request engine shutdown after the current frame
    pub fn quit(&mut self) {
        log::info!("Engine shutdown requested");
        self.running = false;
    }

    /// Whether the main loop is running
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The active scene
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Mutable access to the active scene
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// Replace the active scene, returning the previous one
    ///
    /// The new scene is activated right away when the loop has already started.
    pub fn set_scene(&mut self, mut scene: Scene) -> Scene {
        scene.camera_mut().set_viewport(self.config.window.viewport());
        self.clock.set_fixed_delta(scene.physics().fixed_delta());
        if self.started {
            scene.activate();
        }
        log::debug!("Switching scene ({} entities)", scene.entities().len());
        std::mem::replace(&mut self.scene, scene)
    }

    /// The frame clock
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Mutable access to the frame clock, to change its pacing target
    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    /// Get the current frame delta time
    pub fn delta_time(&self) -> f32 {
        self.clock.delta_time()
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Window configuration
    pub window: WindowConfig,

    /// Loop pacing
    pub fps_target: FpsTarget,

    /// Physics simulation parameters
    pub physics: PhysicsConfig,
}

impl Config for EngineConfig {}

impl EngineConfig {
    /// Reject values the engine cannot start with
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(EngineError::NonPositiveDimension {
                width: self.window.width,
                height: self.window.height,
            });
        }
        Ok(())
    }
}

/// Window configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,

    /// Window width
    pub width: u32,

    /// Window height
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: String::new(),
            width: 960,
            height: 540,
        }
    }
}

impl WindowConfig {
    /// Window size as a scene-unit vector
    #[allow(clippy::cast_precision_loss)]
    pub fn viewport(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }
}

/// Engine-level errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Scene configuration error raised during a frame
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Application error
    #[error("Application error: {0}")]
    ApplicationError(String),

    /// Window width or height is zero
    #[error("Window dimensions must be positive, got {width}x{height}")]
    NonPositiveDimension {
        /// Configured width
        width: u32,
        /// Configured height
        height: u32,
    },
}
