//! 2D view offset
//!
//! The camera is the scene-space point drawn at the viewport's top-left
//! corner. Drawables subtract it when presented; visibility tests use it
//! together with the viewport size.

use crate::foundation::math::{Bounds, Vec2};
use rand::Rng;

/// Scene view offset and viewport size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    offset: Vec2,
    viewport: Vec2,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec2::new(960.0, 540.0))
    }
}

impl Camera {
    /// Camera at the origin looking through a viewport of the given size
    pub fn new(viewport: Vec2) -> Self {
        Self {
            offset: Vec2::zeros(),
            viewport,
        }
    }

    /// Scene point at the viewport's top-left corner
    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    /// Move the view to an absolute offset
    pub fn set_offset(&mut self, offset: Vec2) {
        self.offset = offset;
    }

    /// Viewport size in scene units
    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    /// Change the viewport size
    pub fn set_viewport(&mut self, viewport: Vec2) {
        self.viewport = viewport;
    }

    /// Visible scene region
    pub fn view_bounds(&self) -> Bounds {
        Bounds::from_position_size(self.offset, self.viewport)
    }

    /// Center the view on a rectangle
    pub fn center_on(&mut self, bounds: &Bounds) {
        self.offset = bounds.center() - self.viewport / 2.0;
    }

    /// Move the view by a relative amount
    pub fn translate(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Jitter the view by up to `force` on each axis
    pub fn shake(&mut self, force: f32) {
        self.shake_with(&mut rand::thread_rng(), force);
    }

    /// [`Self::shake`] with a caller-provided generator
    pub fn shake_with<R: Rng + ?Sized>(&mut self, rng: &mut R, force: f32) {
        let force = force.abs();
        if force == 0.0 {
            return;
        }
        let jitter = Vec2::new(rng.gen_range(-force..=force), rng.gen_range(-force..=force));
        self.offset += jitter;
    }

    /// Convert a scene point to viewport coordinates
    pub fn to_view(&self, point: Vec2) -> Vec2 {
        point - self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_center_on_bounds() {
        let mut camera = Camera::new(Vec2::new(100.0, 50.0));
        camera.center_on(&Bounds::new(200.0, 100.0, 20.0, 10.0));

        assert_relative_eq!(camera.offset().x, 160.0);
        assert_relative_eq!(camera.offset().y, 80.0);
        assert_relative_eq!(camera.to_view(Vec2::new(210.0, 105.0)).x, 50.0);
    }

    #[test]
    fn test_shake_stays_within_force() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut camera = Camera::default();
        for _ in 0..32 {
            camera.set_offset(Vec2::zeros());
            camera.shake_with(&mut rng, 3.0);
            assert!(camera.offset().x.abs() <= 3.0);
            assert!(camera.offset().y.abs() <= 3.0);
        }
    }

    #[test]
    fn test_zero_shake_is_still() {
        let mut camera = Camera::default();
        camera.translate(Vec2::new(1.0, 2.0));
        camera.shake(0.0);
        assert_eq!(camera.offset(), Vec2::new(1.0, 2.0));
    }
}
