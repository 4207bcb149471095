//! 2D collision primitives
//!
//! Boxes are axis-aligned around the body centre; body rotation is simulated
//! but does not turn the collision box. All intersection routines take shape
//! centres and return data oriented from the first shape to the second.

use crate::foundation::math::Vec2;

/// Collision shape around a body centre
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    /// Axis-aligned box
    Box {
        /// Half width and half height
        half_extents: Vec2,
    },
    /// Circle
    Circle {
        /// Circle radius
        radius: f32,
    },
}

impl Shape {
    /// Enclosed area
    pub fn area(&self) -> f32 {
        match *self {
            Self::Box { half_extents } => 4.0 * half_extents.x * half_extents.y,
            Self::Circle { radius } => std::f32::consts::PI * radius * radius,
        }
    }

    /// Rotational inertia of the shape for the given mass
    pub fn inertia(&self, mass: f32) -> f32 {
        match *self {
            Self::Box { half_extents } => {
                let size = half_extents * 2.0;
                mass * size.norm_squared() / 12.0
            }
            Self::Circle { radius } => 0.5 * mass * radius * radius,
        }
    }

    /// Half extents of the enclosing axis-aligned box
    pub fn half_extents(&self) -> Vec2 {
        match *self {
            Self::Box { half_extents } => half_extents,
            Self::Circle { radius } => Vec2::new(radius, radius),
        }
    }
}

/// Overlap between two shapes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Manifold {
    /// Unit normal pointing from the first shape to the second
    pub normal: Vec2,
    /// Penetration depth along the normal
    pub depth: f32,
}

/// Test two shapes for overlap; touching edges do not count
pub fn collide(a: &Shape, center_a: Vec2, b: &Shape, center_b: Vec2) -> Option<Manifold> {
    match (*a, *b) {
        (Shape::Box { half_extents: ha }, Shape::Box { half_extents: hb }) => {
            box_box(ha, center_a, hb, center_b)
        }
        (Shape::Circle { radius: ra }, Shape::Circle { radius: rb }) => {
            circle_circle(ra, center_a, rb, center_b)
        }
        (Shape::Box { half_extents }, Shape::Circle { radius }) => {
            box_circle(half_extents, center_a, radius, center_b)
        }
        (Shape::Circle { radius }, Shape::Box { half_extents }) => {
            box_circle(half_extents, center_b, radius, center_a).map(|m| Manifold {
                normal: -m.normal,
                depth: m.depth,
            })
        }
    }
}

fn box_box(ha: Vec2, ca: Vec2, hb: Vec2, cb: Vec2) -> Option<Manifold> {
    let d = cb - ca;
    let overlap_x = ha.x + hb.x - d.x.abs();
    let overlap_y = ha.y + hb.y - d.y.abs();
    if overlap_x <= 0.0 || overlap_y <= 0.0 {
        return None;
    }

    // Resolve along the axis of least penetration
    if overlap_x < overlap_y {
        Some(Manifold {
            normal: Vec2::new(sign(d.x), 0.0),
            depth: overlap_x,
        })
    } else {
        Some(Manifold {
            normal: Vec2::new(0.0, sign(d.y)),
            depth: overlap_y,
        })
    }
}

fn circle_circle(ra: f32, ca: Vec2, rb: f32, cb: Vec2) -> Option<Manifold> {
    let d = cb - ca;
    let radii = ra + rb;
    let distance_squared = d.norm_squared();
    if distance_squared >= radii * radii {
        return None;
    }

    let distance = distance_squared.sqrt();
    let normal = if distance > f32::EPSILON {
        d / distance
    } else {
        Vec2::new(0.0, 1.0)
    };
    Some(Manifold {
        normal,
        depth: radii - distance,
    })
}

fn box_circle(half: Vec2, box_center: Vec2, radius: f32, circle_center: Vec2) -> Option<Manifold> {
    let d = circle_center - box_center;
    let clamped = Vec2::new(d.x.clamp(-half.x, half.x), d.y.clamp(-half.y, half.y));

    if clamped == d {
        // Circle centre inside the box: push out through the nearest face
        let to_face_x = half.x - d.x.abs();
        let to_face_y = half.y - d.y.abs();
        return Some(if to_face_x < to_face_y {
            Manifold {
                normal: Vec2::new(sign(d.x), 0.0),
                depth: radius + to_face_x,
            }
        } else {
            Manifold {
                normal: Vec2::new(0.0, sign(d.y)),
                depth: radius + to_face_y,
            }
        });
    }

    let outside = d - clamped;
    let distance_squared = outside.norm_squared();
    if distance_squared >= radius * radius {
        return None;
    }
    let distance = distance_squared.sqrt();
    Some(Manifold {
        normal: outside / distance,
        depth: radius - distance,
    })
}

fn sign(value: f32) -> f32 {
    if value < 0.0 {
        -1.0
    } else {
        1.0
    }
}

/// Intersect the segment `from → to` with a shape
///
/// Returns the entry fraction along the segment and the surface normal.
/// Segments starting inside the shape report no hit.
pub fn ray_cast(shape: &Shape, center: Vec2, from: Vec2, to: Vec2) -> Option<(f32, Vec2)> {
    match *shape {
        Shape::Box { half_extents } => ray_box(half_extents, center, from, to),
        Shape::Circle { radius } => ray_circle(radius, center, from, to),
    }
}

fn ray_box(half: Vec2, center: Vec2, from: Vec2, to: Vec2) -> Option<(f32, Vec2)> {
    let min = center - half;
    let max = center + half;
    let direction = to - from;

    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;
    let mut normal = Vec2::zeros();

    for axis in 0..2 {
        if direction[axis].abs() < f32::EPSILON {
            if from[axis] <= min[axis] || from[axis] >= max[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / direction[axis];
        let mut t1 = (min[axis] - from[axis]) * inv;
        let mut t2 = (max[axis] - from[axis]) * inv;
        let mut face = -1.0;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
            face = 1.0;
        }
        if t1 > t_enter {
            t_enter = t1;
            normal = Vec2::zeros();
            normal[axis] = face;
        }
        t_exit = t_exit.min(t2);
        if t_enter > t_exit {
            return None;
        }
    }

    if t_enter < 0.0 || t_enter > 1.0 {
        return None;
    }
    Some((t_enter, normal))
}

fn ray_circle(radius: f32, center: Vec2, from: Vec2, to: Vec2) -> Option<(f32, Vec2)> {
    let offset = from - center;
    let c = offset.norm_squared() - radius * radius;
    if c <= 0.0 {
        return None;
    }

    let direction = to - from;
    let a = direction.norm_squared();
    if a < f32::EPSILON {
        return None;
    }
    let b = offset.dot(&direction);
    let discriminant = b * b - a * c;
    if discriminant < 0.0 {
        return None;
    }

    let t = (-b - discriminant.sqrt()) / a;
    if !(0.0..=1.0).contains(&t) {
        return None;
    }
    let point = from + direction * t;
    Some((t, (point - center) / radius))
}
