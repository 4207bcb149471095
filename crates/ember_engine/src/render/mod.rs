//! # Draw collection
//!
//! Behaviors describe what to show each frame by pushing [`Drawable`]s into
//! the scene's [`DrawList`]. The engine hands the list to the application's
//! `render` callback and starts a fresh one every frame. Rasterisation belongs
//! to the presenter; this module only carries geometry and paint.

use crate::foundation::math::{Bounds, Vec2};
use crate::scene::Camera;
use serde::{Deserialize, Serialize};

/// Linear RGBA color, components in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    /// Red
    pub r: f32,
    /// Green
    pub g: f32,
    /// Blue
    pub b: f32,
    /// Alpha
    pub a: f32,
}

impl Color {
    /// Opaque black
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    /// Opaque white
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    /// Opaque red
    pub const RED: Self = Self::rgb(1.0, 0.0, 0.0);
    /// Opaque green
    pub const GREEN: Self = Self::rgb(0.0, 1.0, 0.0);
    /// Opaque blue
    pub const BLUE: Self = Self::rgb(0.0, 0.0, 1.0);
    /// Fully transparent
    pub const TRANSPARENT: Self = Self::rgba(0.0, 0.0, 0.0, 0.0);

    /// Opaque color
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::rgba(r, g, b, 1.0)
    }

    /// Color with alpha
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Color from 8-bit channels
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        let channel = |value: u8| f32::from(value) / 255.0;
        Self::rgba(channel(r), channel(g), channel(b), channel(a))
    }

    /// Same color with another alpha
    pub const fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Outline paint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    /// Line color
    pub color: Color,
    /// Line width in scene units
    pub width: f32,
}

/// Fill and outline of a closed shape
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Paint {
    /// Interior color, if filled
    pub fill: Option<Color>,
    /// Outline, if stroked
    pub stroke: Option<Stroke>,
}

impl Paint {
    /// Filled without outline
    pub fn fill(color: Color) -> Self {
        Self {
            fill: Some(color),
            stroke: None,
        }
    }

    /// Outline only
    pub fn stroke(color: Color, width: f32) -> Self {
        Self {
            fill: None,
            stroke: Some(Stroke { color, width }),
        }
    }

    fn stroke_width(&self) -> f32 {
        self.stroke.map_or(0.0, |stroke| stroke.width)
    }
}

/// Something to present this frame, in scene units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Drawable {
    /// Axis-aligned rectangle
    Rect {
        /// Area covered
        bounds: Bounds,
        /// Fill and outline
        paint: Paint,
    },
    /// Ellipse inscribed in a rectangle
    Oval {
        /// Enclosing rectangle
        bounds: Bounds,
        /// Fill and outline
        paint: Paint,
    },
    /// Line segment
    Line {
        /// Start point
        from: Vec2,
        /// End point
        to: Vec2,
        /// Line paint
        stroke: Stroke,
    },
    /// Single line of text, `position` is the top-left corner
    Text {
        /// Top-left corner
        position: Vec2,
        /// Contents
        text: String,
        /// Font size in scene units
        size: f32,
        /// Text color
        color: Color,
    },
    /// Texture stretched over a rectangle
    Sprite {
        /// Area covered
        bounds: Bounds,
        /// Texture key, resolved by the presenter
        texture: String,
        /// Clockwise rotation around the centre, in degrees
        rotation: f32,
    },
}

// Average glyph advance relative to font size, used to estimate text extents
const GLYPH_ASPECT: f32 = 0.6;

impl Drawable {
    /// Area the drawable may touch
    ///
    /// Outlines extend half their width outside the shape. Text extents are
    /// estimated from the character count since metrics live with the presenter.
    #[allow(clippy::cast_precision_loss)]
    pub fn bounds(&self) -> Bounds {
        match self {
            Self::Rect { bounds, paint } | Self::Oval { bounds, paint } => {
                inflate(bounds, paint.stroke_width() / 2.0)
            }
            Self::Line { from, to, stroke } => {
                let min = from.inf(to);
                let max = from.sup(to);
                inflate(&Bounds::from_position_size(min, max - min), stroke.width / 2.0)
            }
            Self::Text { position, text, size, .. } => {
                let width = text.chars().count() as f32 * size * GLYPH_ASPECT;
                Bounds::from_position_size(*position, Vec2::new(width, *size))
            }
            Self::Sprite { bounds, rotation, .. } => {
                if rotation % 360.0 == 0.0 {
                    return *bounds;
                }
                // Rotated quad stays within the circle around its centre
                let half_diagonal = bounds.size().norm() / 2.0;
                let center = bounds.center();
                Bounds::new(
                    center.x - half_diagonal,
                    center.y - half_diagonal,
                    half_diagonal * 2.0,
                    half_diagonal * 2.0,
                )
            }
        }
    }

    /// Whether any part lands inside a viewport of the given size seen through `camera`
    pub fn is_visible(&self, camera: &Camera, viewport: Vec2) -> bool {
        let bounds = self.bounds();
        let view = Bounds::from_position_size(camera.offset(), viewport);
        bounds.intersects(&view)
    }
}

fn inflate(bounds: &Bounds, amount: f32) -> Bounds {
    Bounds::new(
        bounds.x - amount,
        bounds.y - amount,
        bounds.width + amount * 2.0,
        bounds.height + amount * 2.0,
    )
}

/// Drawables collected during one frame, in push order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawList {
    items: Vec<Drawable>,
}

impl DrawList {
    /// Empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a drawable
    pub fn push(&mut self, drawable: Drawable) {
        self.items.push(drawable);
    }

    /// Drawables in push order
    pub fn items(&self) -> &[Drawable] {
        &self.items
    }

    /// Drawables visible through `camera` in a viewport of its size
    pub fn visible<'a>(&'a self, camera: &'a Camera) -> impl Iterator<Item = &'a Drawable> + 'a {
        let viewport = camera.viewport();
        self.items
            .iter()
            .filter(move |drawable| drawable.is_visible(camera, viewport))
    }

    /// Number of drawables
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing was pushed
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Remove every drawable
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<'a> IntoIterator for &'a DrawList {
    type Item = &'a Drawable;
    type IntoIter = std::slice::Iter<'a, Drawable>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
