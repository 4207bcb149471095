//! Timed despawn

use crate::scene::{Behavior, Context, SceneError};

/// Despawns its entity after a number of seconds of scene time
#[derive(Debug, Clone, PartialEq)]
pub struct Lifetime {
    remaining: f32,
    expired: bool,
}

impl Lifetime {
    /// Expire after `seconds`
    pub fn new(seconds: f32) -> Self {
        Self {
            remaining: seconds,
            expired: false,
        }
    }

    /// Seconds left before the entity is despawned
    pub fn remaining(&self) -> f32 {
        self.remaining.max(0.0)
    }

    /// Whether the despawn was requested
    pub fn is_expired(&self) -> bool {
        self.expired
    }
}

impl Behavior for Lifetime {
    fn update(&mut self, ctx: &mut Context<'_>) -> Result<(), SceneError> {
        if self.expired {
            return Ok(());
        }
        self.remaining -= ctx.delta();
        if self.remaining <= 0.0 {
            self.expired = true;
            ctx.despawn()?;
        }
        Ok(())
    }
}
