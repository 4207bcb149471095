//! Backend that records every call, for tests
//!
//! Each step moves every non-static body down by one meter and reports a
//! begin event for every pair of bodies on its first step.

use super::backend::{
    BodyDesc, BodyHandle, BodyState, ContactEvent, ContactPhase, Iterations, Material,
    PhysicsBackend, RayHit,
};
use super::rigid_body::BodyType;
use crate::foundation::math::Vec2;
use slotmap::SlotMap;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Gravity(Vec2),
    Create(BodyDesc),
    Destroy(BodyHandle),
    Step,
    Filter(BodyHandle, BodyHandle, bool),
    Transform(BodyHandle, Vec2, f32),
    LinearVelocity(BodyHandle, Vec2),
    AngularVelocity(BodyHandle, f32),
    GravityScale(BodyHandle, f32),
    FixedRotation(BodyHandle, bool),
    Material(BodyHandle, Material),
    Force(BodyHandle, Vec2, Option<Vec2>),
    Impulse(BodyHandle, Vec2, Option<Vec2>),
    AngularImpulse(BodyHandle, f32),
}

pub(crate) type CallLog = Rc<RefCell<Vec<Call>>>;

pub(crate) struct RecordingBackend {
    log: CallLog,
    bodies: SlotMap<BodyHandle, (BodyDesc, BodyState)>,
    stepped: bool,
}

impl RecordingBackend {
    pub(crate) fn new() -> (Self, CallLog) {
        let log = CallLog::default();
        let backend = Self {
            log: Rc::clone(&log),
            bodies: SlotMap::with_key(),
            stepped: false,
        };
        (backend, log)
    }

    fn record(&self, call: Call) {
        self.log.borrow_mut().push(call);
    }
}

impl PhysicsBackend for RecordingBackend {
    fn set_gravity(&mut self, gravity: Vec2) {
        self.record(Call::Gravity(gravity));
    }

    fn create_body(&mut self, desc: &BodyDesc) -> BodyHandle {
        self.record(Call::Create(*desc));
        let state = BodyState {
            position: desc.position,
            angle: desc.angle,
            linear_velocity: desc.linear_velocity,
            angular_velocity: desc.angular_velocity,
        };
        self.bodies.insert((*desc, state))
    }

    fn destroy_body(&mut self, body: BodyHandle) -> Vec<BodyHandle> {
        self.record(Call::Destroy(body));
        self.bodies.remove(body);
        Vec::new()
    }

    fn step(
        &mut self,
        _dt: f32,
        _iterations: Iterations,
        filter: &mut dyn FnMut(BodyHandle, BodyHandle) -> bool,
    ) -> Vec<ContactEvent> {
        self.record(Call::Step);
        let handles: Vec<BodyHandle> = self.bodies.keys().collect();
        let mut events = Vec::new();
        if !self.stepped {
            for (index, &a) in handles.iter().enumerate() {
                for &b in &handles[index + 1..] {
                    let accepted = filter(a, b);
                    self.record(Call::Filter(a, b, accepted));
                    events.push(ContactEvent {
                        phase: ContactPhase::Begin,
                        a,
                        b,
                    });
                }
            }
            self.stepped = true;
        }
        for (desc, state) in self.bodies.values_mut() {
            if desc.body_type != BodyType::Static {
                state.position.y += 1.0;
            }
        }
        events
    }

    fn body_state(&self, body: BodyHandle) -> Option<BodyState> {
        self.bodies.get(body).map(|(_, state)| *state)
    }

    fn set_transform(&mut self, body: BodyHandle, position: Vec2, angle: f32) {
        self.record(Call::Transform(body, position, angle));
        if let Some((_, state)) = self.bodies.get_mut(body) {
            state.position = position;
            state.angle = angle;
        }
    }

    fn set_linear_velocity(&mut self, body: BodyHandle, velocity: Vec2) {
        self.record(Call::LinearVelocity(body, velocity));
        if let Some((_, state)) = self.bodies.get_mut(body) {
            state.linear_velocity = velocity;
        }
    }

    fn set_angular_velocity(&mut self, body: BodyHandle, velocity: f32) {
        self.record(Call::AngularVelocity(body, velocity));
    }

    fn set_gravity_scale(&mut self, body: BodyHandle, scale: f32) {
        self.record(Call::GravityScale(body, scale));
    }

    fn set_fixed_rotation(&mut self, body: BodyHandle, fixed: bool) {
        self.record(Call::FixedRotation(body, fixed));
    }

    fn set_material(&mut self, body: BodyHandle, material: Material) {
        self.record(Call::Material(body, material));
    }

    fn apply_force(&mut self, body: BodyHandle, force: Vec2, point: Option<Vec2>) {
        self.record(Call::Force(body, force, point));
    }

    fn apply_linear_impulse(&mut self, body: BodyHandle, impulse: Vec2, point: Option<Vec2>) {
        self.record(Call::Impulse(body, impulse, point));
    }

    fn apply_angular_impulse(&mut self, body: BodyHandle, impulse: f32) {
        self.record(Call::AngularImpulse(body, impulse));
    }

    fn ray_cast(&self, _from: Vec2, _to: Vec2, _callback: &mut dyn FnMut(RayHit) -> f32) {}

    fn body_count(&self) -> usize {
        self.bodies.len()
    }
}
