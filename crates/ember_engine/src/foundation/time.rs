//! Time management utilities
//!
//! The `Clock` tracks elapsed time, produces the variable frame delta and the
//! constant fixed-step delta, and paces the host loop to an `FpsTarget`.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Constant simulation step in seconds
pub const FIXED_DELTA: f32 = 1.0 / 60.0;

/// Below this remaining wait the clock yields instead of sleeping
const SLEEP_PRECISION: Duration = Duration::from_millis(2);

/// Target frame rate for loop pacing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FpsTarget {
    /// 30 frames per second
    Fps30,
    /// 45 frames per second
    Fps45,
    /// 60 frames per second
    #[default]
    Fps60,
    /// 90 frames per second
    Fps90,
    /// 120 frames per second
    Fps120,
    /// 144 frames per second
    Fps144,
    /// 165 frames per second
    Fps165,
    /// 240 frames per second
    Fps240,
    /// Never sleep between frames
    NoLimit,
    /// Any other rate; zero falls back to 60
    Custom(u32),
}

impl FpsTarget {
    const NAMED: [(&'static str, FpsTarget); 9] = [
        ("FPS_30", FpsTarget::Fps30),
        ("FPS_45", FpsTarget::Fps45),
        ("FPS_60", FpsTarget::Fps60),
        ("FPS_90", FpsTarget::Fps90),
        ("FPS_120", FpsTarget::Fps120),
        ("FPS_144", FpsTarget::Fps144),
        ("FPS_165", FpsTarget::Fps165),
        ("FPS_240", FpsTarget::Fps240),
        ("NO_LIMIT", FpsTarget::NoLimit),
    ];

    /// Look up a named target; unknown names yield `None`
    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMED
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(_, target)| *target)
    }

    /// Frames per second, or `None` when unlimited
    pub const fn frames_per_second(self) -> Option<u32> {
        match self {
            Self::Fps30 => Some(30),
            Self::Fps45 => Some(45),
            Self::Fps60 | Self::Custom(0) => Some(60),
            Self::Fps90 => Some(90),
            Self::Fps120 => Some(120),
            Self::Fps144 => Some(144),
            Self::Fps165 => Some(165),
            Self::Fps240 => Some(240),
            Self::NoLimit => None,
            Self::Custom(fps) => Some(fps),
        }
    }

    /// Duration of one frame at this rate
    pub fn frame_time(self) -> Option<Duration> {
        self.frames_per_second()
            .map(|fps| Duration::from_secs_f64(1.0 / f64::from(fps)))
    }
}

/// Frame clock for the host loop
pub struct Clock {
    start: Instant,
    last_frame: Instant,
    delta_time: f32,
    total_time: f32,
    frame_count: u64,
    target: FpsTarget,
    fixed_delta: f32,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(FpsTarget::default())
    }
}

impl Clock {
    /// Create a new clock pacing to the given target
    pub fn new(target: FpsTarget) -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_frame: now,
            delta_time: 0.0,
            total_time: 0.0,
            frame_count: 0,
            target,
            fixed_delta: FIXED_DELTA,
        }
    }

    /// Same clock reporting another physics step length
    pub fn with_fixed_delta(mut self, fixed_delta: f32) -> Self {
        self.set_fixed_delta(fixed_delta);
        self
    }

    /// Wait for the next frame deadline, then record the elapsed frame time
    pub fn tick(&mut self) {
        self.sync();
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.advance(elapsed);
    }

    /// Record a frame of the given length without consulting the wall clock
    pub fn advance(&mut self, delta_time: f32) {
        self.delta_time = delta_time.max(0.0);
        self.total_time += self.delta_time;
        self.frame_count += 1;
    }

    /// Time elapsed since the clock was created
    pub fn ticks(&self) -> Duration {
        self.start.elapsed()
    }

    /// Length of the last frame in seconds
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Length of one physics step in seconds
    pub fn fixed_delta(&self) -> f32 {
        self.fixed_delta
    }

    /// Report the step length of the simulation being driven; non-positive values are ignored
    pub fn set_fixed_delta(&mut self, fixed_delta: f32) {
        if fixed_delta > 0.0 {
            self.fixed_delta = fixed_delta;
        }
    }

    /// Sum of all recorded frame deltas
    pub fn total_time(&self) -> f32 {
        self.total_time
    }

    /// Number of recorded frames
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Average FPS since the clock was created
    pub fn average_fps(&self) -> f32 {
        if self.total_time > 0.0 {
            self.frame_count as f32 / self.total_time
        } else {
            0.0
        }
    }

    /// FPS derived from the last frame
    pub fn current_fps(&self) -> f32 {
        if self.delta_time > 0.0 {
            1.0 / self.delta_time
        } else {
            0.0
        }
    }

    /// Current pacing target
    pub fn target(&self) -> FpsTarget {
        self.target
    }

    /// Change the pacing target
    pub fn set_target(&mut self, target: FpsTarget) {
        self.target = target;
    }

    fn sync(&self) {
        let Some(frame_time) = self.target.frame_time() else {
            return;
        };
        let deadline = self.last_frame + frame_time;
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let remaining = deadline - now;
            if remaining > SLEEP_PRECISION {
                std::thread::sleep(remaining - SLEEP_PRECISION);
            } else {
                std::thread::yield_now();
            }
        }
    }
}
