//! Deterministic stand-in world
//!
//! Semi-implicit Euler under gravity with the same sub-stepping as the real
//! world. Bodies never collide or rotate.

use glam::Vec3;

use super::{
    BodyHandle, BodyTransform, DEFAULT_GRAVITY, FIXED_TIME_STEP, PhysicsWorld, Pose, SubStepper,
    TeardownEvent, TeardownReport, effective_mass,
};

#[derive(Debug, Clone, Copy)]
struct StubBody {
    /// Position before the most recent internal step
    previous: Vec3,
    position: Vec3,
    velocity: Vec3,
    dynamic: bool,
}

#[derive(Debug, Default)]
pub struct StubWorld {
    bodies: Vec<StubBody>,
    stepper: SubStepper,
    steps_taken: u64,
}

impl StubWorld {
    /// Internal steps run so far
    pub const fn steps_taken(&self) -> u64 {
        self.steps_taken
    }
}

impl PhysicsWorld for StubWorld {
    fn create() -> Self {
        Self::default()
    }

    fn add_box(&mut self, position: Vec3, _size: Vec3, mass: f32) -> BodyHandle {
        let handle = BodyHandle::new(self.bodies.len());
        self.bodies.push(StubBody {
            previous: position,
            position,
            velocity: Vec3::ZERO,
            dynamic: effective_mass(mass) > 0.0,
        });
        handle
    }

    fn step(&mut self, dt: f32) {
        let steps = self.stepper.advance(dt);
        for _ in 0..steps {
            for body in self.bodies.iter_mut().filter(|b| b.dynamic) {
                body.previous = body.position;
                body.velocity += DEFAULT_GRAVITY * FIXED_TIME_STEP;
                body.position += body.velocity * FIXED_TIME_STEP;
            }
        }
        self.steps_taken += u64::from(steps);
    }

    fn transform(&self, body: Option<BodyHandle>) -> BodyTransform {
        body.and_then(|handle| self.bodies.get(handle.index()))
            .map_or(BodyTransform::IDENTITY, |b| {
                Pose::at(b.previous).blend(Pose::at(b.position), self.stepper.alpha())
            })
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn destroy(self) -> TeardownReport {
        let mut report = TeardownReport::default();
        let count = self.bodies.len();
        for index in (0..count).rev() {
            report.record(TeardownEvent::RigidBody(BodyHandle::new(index)));
        }
        for index in (0..count).rev() {
            report.record(TeardownEvent::CollisionShape(BodyHandle::new(index)));
        }
        report.record_world();
        report
    }
}
