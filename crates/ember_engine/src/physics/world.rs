//! Built-in impulse-based rigid-body world
//!
//! A small sequential-impulse solver over axis-aligned boxes and circles:
//! integrate velocities, resolve contact velocities for the configured number
//! of passes, integrate positions, then push overlapping bodies apart for the
//! configured number of position passes. Touching pairs are compared with the
//! previous step to produce begin/end events.

use super::backend::{
    BodyDesc, BodyHandle, BodyState, ContactEvent, ContactPhase, Iterations, Material,
    PhysicsBackend, RayHit,
};
use super::collision::{self, Manifold, Shape};
use super::rigid_body::BodyType;
use crate::foundation::math::Vec2;
use slotmap::SlotMap;
use std::collections::BTreeSet;

/// Penetration allowed before position correction kicks in
const LINEAR_SLOP: f32 = 0.005;

/// Fraction of the remaining penetration removed per position pass
const BAUMGARTE: f32 = 0.2;

/// Approach speeds below this do not bounce
const RESTITUTION_THRESHOLD: f32 = 1.0;

#[derive(Debug, Clone)]
struct Body {
    body_type: BodyType,
    shape: Shape,
    material: Material,
    sensor: bool,
    position: Vec2,
    angle: f32,
    velocity: Vec2,
    angular_velocity: f32,
    gravity_scale: f32,
    fixed_rotation: bool,
    force: Vec2,
    torque: f32,
    inv_mass: f32,
    inv_inertia: f32,
}

impl Body {
    fn new(desc: &BodyDesc) -> Self {
        let mut body = Self {
            body_type: desc.body_type,
            shape: desc.shape,
            material: desc.material,
            sensor: desc.sensor,
            position: desc.position,
            angle: desc.angle,
            velocity: Vec2::zeros(),
            angular_velocity: 0.0,
            gravity_scale: desc.gravity_scale,
            fixed_rotation: desc.fixed_rotation,
            force: Vec2::zeros(),
            torque: 0.0,
            inv_mass: 0.0,
            inv_inertia: 0.0,
        };
        if body.body_type != BodyType::Static {
            body.velocity = desc.linear_velocity;
            body.angular_velocity = desc.angular_velocity;
        }
        body.update_mass();
        body
    }

    fn update_mass(&mut self) {
        if self.body_type != BodyType::Dynamic {
            self.inv_mass = 0.0;
            self.inv_inertia = 0.0;
            return;
        }

        let mut mass = self.shape.area() * self.material.density;
        if mass <= 0.0 {
            mass = 1.0;
        }
        self.inv_mass = 1.0 / mass;

        let inertia = self.shape.inertia(mass);
        self.inv_inertia = if self.fixed_rotation || inertia <= 0.0 {
            0.0
        } else {
            1.0 / inertia
        };
    }

    fn is_dynamic(&self) -> bool {
        self.body_type == BodyType::Dynamic
    }

    fn torque_at(&self, point: Option<Vec2>, amount: Vec2) -> f32 {
        point.map_or(0.0, |point| cross(point - self.position, amount))
    }
}

fn cross(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

#[derive(Debug, Clone, Copy)]
struct Contact {
    a: BodyHandle,
    b: BodyHandle,
    manifold: Manifold,
}

/// The default [`PhysicsBackend`]
#[derive(Debug, Default)]
pub struct ImpulseWorld {
    gravity: Vec2,
    bodies: SlotMap<BodyHandle, Body>,
    touching: BTreeSet<(BodyHandle, BodyHandle)>,
}

impl ImpulseWorld {
    /// Create an empty world without gravity
    pub fn new() -> Self {
        Self::default()
    }

    /// Current gravity
    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    /// Pairs that touched during the last step
    pub fn touching_pairs(&self) -> impl Iterator<Item = (BodyHandle, BodyHandle)> + '_ {
        self.touching.iter().copied()
    }

    fn integrate_velocities(&mut self, dt: f32) {
        let gravity = self.gravity;
        for body in self.bodies.values_mut() {
            if body.is_dynamic() {
                body.velocity += (gravity * body.gravity_scale + body.force * body.inv_mass) * dt;
                body.angular_velocity += body.torque * body.inv_inertia * dt;
            }
            body.force = Vec2::zeros();
            body.torque = 0.0;
        }
    }

    fn find_contacts(
        &self,
        filter: &mut dyn FnMut(BodyHandle, BodyHandle) -> bool,
    ) -> (BTreeSet<(BodyHandle, BodyHandle)>, Vec<Contact>) {
        let handles: Vec<BodyHandle> = self.bodies.keys().collect();
        let mut touching = BTreeSet::new();
        let mut contacts = Vec::new();

        for (index, &a) in handles.iter().enumerate() {
            for &b in &handles[index + 1..] {
                let (body_a, body_b) = (&self.bodies[a], &self.bodies[b]);
                if !body_a.is_dynamic() && !body_b.is_dynamic() {
                    continue;
                }
                let Some(manifold) =
                    collision::collide(&body_a.shape, body_a.position, &body_b.shape, body_b.position)
                else {
                    continue;
                };
                if !filter(a, b) {
                    continue;
                }

                touching.insert(ordered(a, b));
                if !body_a.sensor && !body_b.sensor {
                    contacts.push(Contact { a, b, manifold });
                }
            }
        }
        (touching, contacts)
    }

    fn solve_velocities(&mut self, contacts: &[Contact], iterations: u32) {
        for _ in 0..iterations {
            for contact in contacts {
                let Some([a, b]) = self.bodies.get_disjoint_mut([contact.a, contact.b]) else {
                    continue;
                };
                let inv_mass_sum = a.inv_mass + b.inv_mass;
                if inv_mass_sum <= 0.0 {
                    continue;
                }

                let normal = contact.manifold.normal;
                let relative = b.velocity - a.velocity;
                let approach = relative.dot(&normal);
                if approach >= 0.0 {
                    continue;
                }

                let restitution = if -approach > RESTITUTION_THRESHOLD {
                    a.material.restitution.max(b.material.restitution)
                } else {
                    0.0
                };
                let impulse = -(1.0 + restitution) * approach / inv_mass_sum;
                a.velocity -= normal * impulse * a.inv_mass;
                b.velocity += normal * impulse * b.inv_mass;

                let relative = b.velocity - a.velocity;
                let tangent = relative - normal * relative.dot(&normal);
                let tangent_speed = tangent.norm();
                if tangent_speed <= f32::EPSILON {
                    continue;
                }
                let tangent = tangent / tangent_speed;
                let friction = (a.material.friction * b.material.friction).sqrt();
                let friction_impulse = (tangent_speed / inv_mass_sum).min(friction * impulse);
                a.velocity += tangent * friction_impulse * a.inv_mass;
                b.velocity -= tangent * friction_impulse * b.inv_mass;
            }
        }
    }

    fn integrate_positions(&mut self, dt: f32) {
        for body in self.bodies.values_mut() {
            if body.body_type == BodyType::Static {
                continue;
            }
            body.position += body.velocity * dt;
            if !body.fixed_rotation {
                body.angle += body.angular_velocity * dt;
            }
        }
    }

    fn correct_positions(&mut self, contacts: &[Contact], iterations: u32) {
        for _ in 0..iterations {
            for contact in contacts {
                let Some([a, b]) = self.bodies.get_disjoint_mut([contact.a, contact.b]) else {
                    continue;
                };
                let inv_mass_sum = a.inv_mass + b.inv_mass;
                if inv_mass_sum <= 0.0 {
                    continue;
                }
                let Some(manifold) = collision::collide(&a.shape, a.position, &b.shape, b.position)
                else {
                    continue;
                };

                let correction = (manifold.depth - LINEAR_SLOP).max(0.0) * BAUMGARTE / inv_mass_sum;
                a.position -= manifold.normal * correction * a.inv_mass;
                b.position += manifold.normal * correction * b.inv_mass;
            }
        }
    }
}

fn ordered(a: BodyHandle, b: BodyHandle) -> (BodyHandle, BodyHandle) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl PhysicsBackend for ImpulseWorld {
    fn set_gravity(&mut self, gravity: Vec2) {
        self.gravity = gravity;
    }

    fn create_body(&mut self, desc: &BodyDesc) -> BodyHandle {
        self.bodies.insert(Body::new(desc))
    }

    fn destroy_body(&mut self, body: BodyHandle) -> Vec<BodyHandle> {
        if self.bodies.remove(body).is_none() {
            return Vec::new();
        }
        let mut others = Vec::new();
        self.touching.retain(|&(a, b)| {
            if a == body {
                others.push(b);
                false
            } else if b == body {
                others.push(a);
                false
            } else {
                true
            }
        });
        others
    }

    fn step(
        &mut self,
        dt: f32,
        iterations: Iterations,
        filter: &mut dyn FnMut(BodyHandle, BodyHandle) -> bool,
    ) -> Vec<ContactEvent> {
        self.integrate_velocities(dt);

        let (touching, contacts) = self.find_contacts(filter);
        self.solve_velocities(&contacts, iterations.velocity);
        self.integrate_positions(dt);
        self.correct_positions(&contacts, iterations.position);

        let mut events: Vec<ContactEvent> = touching
            .difference(&self.touching)
            .map(|&(a, b)| ContactEvent {
                phase: ContactPhase::Begin,
                a,
                b,
            })
            .collect();
        events.extend(self.touching.difference(&touching).map(|&(a, b)| ContactEvent {
            phase: ContactPhase::End,
            a,
            b,
        }));
        self.touching = touching;
        events
    }

    fn body_state(&self, body: BodyHandle) -> Option<BodyState> {
        self.bodies.get(body).map(|body| BodyState {
            position: body.position,
            angle: body.angle,
            linear_velocity: body.velocity,
            angular_velocity: body.angular_velocity,
        })
    }

    fn set_transform(&mut self, body: BodyHandle, position: Vec2, angle: f32) {
        if let Some(body) = self.bodies.get_mut(body) {
            body.position = position;
            body.angle = angle;
        }
    }

    fn set_linear_velocity(&mut self, body: BodyHandle, velocity: Vec2) {
        if let Some(body) = self.bodies.get_mut(body) {
            if body.body_type != BodyType::Static {
                body.velocity = velocity;
            }
        }
    }

    fn set_angular_velocity(&mut self, body: BodyHandle, velocity: f32) {
        if let Some(body) = self.bodies.get_mut(body) {
            if body.body_type != BodyType::Static {
                body.angular_velocity = velocity;
            }
        }
    }

    fn set_gravity_scale(&mut self, body: BodyHandle, scale: f32) {
        if let Some(body) = self.bodies.get_mut(body) {
            body.gravity_scale = scale;
        }
    }

    fn set_fixed_rotation(&mut self, body: BodyHandle, fixed: bool) {
        if let Some(body) = self.bodies.get_mut(body) {
            body.fixed_rotation = fixed;
            if fixed {
                body.angular_velocity = 0.0;
            }
            body.update_mass();
        }
    }

    fn set_material(&mut self, body: BodyHandle, material: Material) {
        if let Some(body) = self.bodies.get_mut(body) {
            body.material = material;
            body.update_mass();
        }
    }

    fn apply_force(&mut self, body: BodyHandle, force: Vec2, point: Option<Vec2>) {
        if let Some(body) = self.bodies.get_mut(body) {
            if body.is_dynamic() {
                let torque = body.torque_at(point, force);
                body.force += force;
                body.torque += torque;
            }
        }
    }

    fn apply_linear_impulse(&mut self, body: BodyHandle, impulse: Vec2, point: Option<Vec2>) {
        if let Some(body) = self.bodies.get_mut(body) {
            if body.is_dynamic() {
                let torque = body.torque_at(point, impulse);
                body.velocity += impulse * body.inv_mass;
                body.angular_velocity += body.inv_inertia * torque;
            }
        }
    }

    fn apply_angular_impulse(&mut self, body: BodyHandle, impulse: f32) {
        if let Some(body) = self.bodies.get_mut(body) {
            if body.is_dynamic() {
                body.angular_velocity += body.inv_inertia * impulse;
            }
        }
    }

    fn ray_cast(&self, from: Vec2, to: Vec2, callback: &mut dyn FnMut(RayHit) -> f32) {
        let mut max_fraction = 1.0;
        for (handle, body) in &self.bodies {
            let Some((fraction, normal)) = collision::ray_cast(&body.shape, body.position, from, to)
            else {
                continue;
            };
            if fraction > max_fraction {
                continue;
            }

            let hit = RayHit {
                body: handle,
                point: from + (to - from) * fraction,
                normal,
                fraction,
            };
            let clip = callback(hit);
            if clip == 0.0 {
                return;
            }
            if clip > 0.0 {
                max_fraction = clip;
            }
        }
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }
}
