//! Physics sandbox
//!
//! Loads a small scene from a blueprint, then keeps dropping crates and balls
//! onto a ramp and the ground. Runs headless for a fixed number of frames by
//! default, or paced in real time with `--realtime <seconds>`.
//!
//! ```text
//! sandbox [--frames N] [--realtime SECONDS] [--seed N] [--config engine.toml]
//! ```

use ember_engine::config::ConfigFormat;
use ember_engine::foundation::{logging, time::FIXED_DELTA};
use ember_engine::prelude::*;
use ember_engine::scene::registry::{number, text};
use ember_engine::scene::Params;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

const SCENE: &str = include_str!("../scenes/sandbox.ron");

#[derive(Error, Debug)]
enum SandboxError {
    #[error("Missing value for {0}")]
    MissingValue(String),

    #[error("Invalid value '{value}' for {flag}")]
    InvalidValue { flag: String, value: String },

    #[error("Unknown argument: {0}")]
    UnknownArgument(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// How the loop is driven
#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Headless { frames: u32 },
    Realtime { seconds: f32 },
}

#[derive(Debug)]
struct Options {
    mode: Mode,
    seed: u64,
    config: Option<String>,
}

impl Options {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, SandboxError> {
        let mut options = Self {
            mode: Mode::Headless { frames: 600 },
            seed: 7,
            config: None,
        };
        while let Some(flag) = args.next() {
            let mut value = || args.next().ok_or_else(|| SandboxError::MissingValue(flag.clone()));
            match flag.as_str() {
                "--frames" => {
                    let frames = parse_value(&flag, &value()?)?;
                    options.mode = Mode::Headless { frames };
                }
                "--realtime" => {
                    let seconds = parse_value(&flag, &value()?)?;
                    options.mode = Mode::Realtime { seconds };
                }
                "--seed" => options.seed = parse_value(&flag, &value()?)?,
                "--config" => options.config = Some(value()?),
                _ => return Err(SandboxError::UnknownArgument(flag)),
            }
        }
        Ok(options)
    }
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T, SandboxError> {
    value.parse().map_err(|_| SandboxError::InvalidValue {
        flag: flag.to_string(),
        value: value.to_string(),
    })
}

fn color_named(name: &str) -> Option<Color> {
    match name {
        "gray" => Some(Color::rgb(0.5, 0.5, 0.5)),
        "orange" => Some(Color::rgb(1.0, 0.6, 0.1)),
        "teal" => Some(Color::rgb(0.1, 0.7, 0.7)),
        "white" => Some(Color::WHITE),
        _ => None,
    }
}

/// Draws its entity as a filled rectangle, or an oval for round bodies
struct Painter {
    color: Color,
}

impl Behavior for Painter {
    fn update(&mut self, ctx: &mut Context<'_>) -> Result<(), SceneError> {
        let Some(bounds) = ctx.entity().map(|entity| entity.bounds()) else {
            return Ok(());
        };
        let paint = Paint::fill(self.color);
        let round = ctx
            .component::<RigidBody>()
            .is_some_and(|body| body.collider() == Collider::Circle);
        ctx.draw(if round {
            Drawable::Oval { bounds, paint }
        } else {
            Drawable::Rect { bounds, paint }
        });
        Ok(())
    }
}

/// Drops a random crate or ball every `interval` seconds
struct Spawner {
    interval: f32,
    max_alive: usize,
    elapsed: f32,
    spawned: u32,
    rng: StdRng,
}

impl Spawner {
    fn spawn(&mut self, ctx: &mut Context<'_>) -> Result<(), SceneError> {
        let width = ctx.size().x;
        let side = self.rng.gen_range(12.0_f32..28.0);
        let x = self.rng.gen_range(0.0..(width - side).max(1.0));
        let collider = if self.rng.gen_bool(0.5) {
            Collider::Box
        } else {
            Collider::Circle
        };
        let color = if collider == Collider::Box {
            Color::rgb(1.0, 0.6, 0.1)
        } else {
            Color::rgb(0.1, 0.7, 0.7)
        };
        let body = RigidBody::new(BodyType::Dynamic, collider)
            .with_restitution(self.rng.gen_range(0.0..0.5))
            .with_friction(0.4);

        self.spawned += 1;
        let scene = ctx.scene_mut();
        let id = EntityBuilder::new(format!("drop-{}", self.spawned))
            .position(Vec2::new(x, -side))
            .size(Vec2::new(side, side))
            .z_index(1)
            .tag("drop")
            .spawn(scene);
        scene.attach_new(id, body)?;
        scene.attach_new(id, Painter { color })?;
        scene.attach_new(id, Lifetime::new(6.0))?;
        scene.add_entity(id)
    }
}

impl Behavior for Spawner {
    fn update(&mut self, ctx: &mut Context<'_>) -> Result<(), SceneError> {
        self.elapsed += ctx.delta();
        if self.elapsed < self.interval {
            return Ok(());
        }
        self.elapsed -= self.interval;
        if ctx.scene().find_all_by_tag("drop").len() < self.max_alive {
            self.spawn(ctx)?;
        }
        Ok(())
    }
}

fn registry(seed: u64) -> Result<BehaviorRegistry, SceneError> {
    let mut registry = BehaviorRegistry::with_builtins();
    registry.register("painter", |params: &Params| {
        let color = text(params, "color")?.and_then(color_named).unwrap_or(Color::WHITE);
        Ok(Box::new(Painter { color }))
    })?;
    registry.register("spawner", move |params: &Params| {
        let interval = number(params, "interval")?.unwrap_or(0.5).max(FIXED_DELTA);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let max_alive = number(params, "max_alive")?.unwrap_or(20.0).max(0.0) as usize;
        Ok(Box::new(Spawner {
            interval,
            max_alive,
            elapsed: 0.0,
            spawned: 0,
            rng: StdRng::seed_from_u64(seed),
        }))
    })?;
    Ok(registry)
}

struct Sandbox {
    seed: u64,
    limit: Option<f32>,
    frames: u64,
}

impl Application for Sandbox {
    fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
        let blueprint = SceneBlueprint::parse(SCENE, ConfigFormat::Ron)?;
        let registry = registry(self.seed)?;
        let ids = registry.instantiate_scene(engine.scene_mut(), &blueprint)?;
        log::info!("Sandbox ready with {} entities", ids.len());
        Ok(())
    }

    fn update(&mut self, engine: &mut Engine, _delta_time: f32) -> Result<(), AppError> {
        if self.limit.is_some_and(|limit| engine.clock().total_time() >= limit) {
            engine.quit();
        }
        Ok(())
    }

    fn render(&mut self, engine: &Engine, draw_list: &DrawList) -> Result<(), AppError> {
        self.frames += 1;
        if self.frames % 60 == 0 {
            let scene = engine.scene();
            log::info!(
                "frame {}: {} entities, {} bodies, {} of {} drawables visible",
                self.frames,
                scene.entities().len(),
                scene.physics().body_count(),
                draw_list.visible(scene.camera()).count(),
                draw_list.len()
            );
        }
        Ok(())
    }

    fn cleanup(&mut self, engine: &mut Engine) {
        log::info!(
            "Sandbox finished: {} frames, {} physics steps",
            self.frames,
            engine.scene().physics().step_count()
        );
    }
}

fn run(options: Options) -> Result<(), SandboxError> {
    let config = match &options.config {
        Some(path) => EngineConfig::load_from_file(path).map_err(EngineError::from)?,
        None => EngineConfig {
            window: WindowConfig {
                title: "Ember Sandbox".to_string(),
                ..WindowConfig::default()
            },
            ..EngineConfig::default()
        },
    };

    match options.mode {
        Mode::Headless { frames } => {
            let mut app = Sandbox {
                seed: options.seed,
                limit: None,
                frames: 0,
            };
            let mut engine = Engine::new(config)?;
            engine.run_frames(&mut app, frames, FIXED_DELTA)?;
        }
        Mode::Realtime { seconds } => {
            let mut app = Sandbox {
                seed: options.seed,
                limit: Some(seconds),
                frames: 0,
            };
            Engine::run(config, &mut app)?;
        }
    }
    Ok(())
}

fn main() {
    logging::init();
    let result = Options::parse(std::env::args().skip(1)).and_then(run);
    if let Err(e) = result {
        log::error!("{e}");
        std::process::exit(1);
    }
}
