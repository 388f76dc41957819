//! Physics simulation using rapier3d

use glam::{Quat, Vec3};
use rapier3d::na::UnitQuaternion;
use rapier3d::prelude::*;

use super::{
    BodyHandle, BodyTransform, DEFAULT_GRAVITY, FIXED_TIME_STEP, PhysicsWorld, Pose, SubStepper,
    TeardownEvent, TeardownReport, effective_mass,
};

/// Convert rapier3d UnitQuaternion to glam Quat
fn rapier_to_quat(uq: &UnitQuaternion<f32>) -> Quat {
    let q = uq.quaternion();
    Quat::from_xyzw(q.i, q.j, q.k, q.w)
}

fn pose_of(body: &RigidBody) -> Pose {
    let translation = body.translation();
    Pose {
        position: Vec3::new(translation.x, translation.y, translation.z),
        rotation: rapier_to_quat(body.rotation()),
    }
}

#[derive(Debug, Clone, Copy)]
struct BoxBody {
    body: RigidBodyHandle,
    collider: ColliderHandle,
    /// Pose before the most recent internal step
    previous: Pose,
}

/// Physics world backed by rapier3d
pub struct RapierWorld {
    /// Gravity vector
    gravity: Vec3,
    /// Physics pipeline
    pipeline: PhysicsPipeline,
    /// Island manager
    island_manager: IslandManager,
    /// Broad phase
    broad_phase: DefaultBroadPhase,
    /// Narrow phase
    narrow_phase: NarrowPhase,
    /// Rigid body set
    rigid_body_set: RigidBodySet,
    /// Collider set
    collider_set: ColliderSet,
    /// Impulse joint set
    impulse_joint_set: ImpulseJointSet,
    /// Multibody joint set
    multibody_joint_set: MultibodyJointSet,
    /// CCD solver
    ccd_solver: CCDSolver,
    /// Integration parameters, fixed to one internal step
    integration_parameters: IntegrationParameters,
    stepper: SubStepper,
    /// Boxes in insertion order, indexed by `BodyHandle`
    boxes: Vec<BoxBody>,
}

impl RapierWorld {
    /// Create a new physics world with custom gravity
    pub fn with_gravity(gravity: Vec3) -> Self {
        let integration_parameters = IntegrationParameters {
            dt: FIXED_TIME_STEP,
            ..Default::default()
        };

        log::info!("Physics world created, gravity {gravity}");

        Self {
            gravity,
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            integration_parameters,
            stepper: SubStepper::new(),
            boxes: Vec::new(),
        }
    }

    /// Gravity the world was created with
    pub const fn gravity(&self) -> Vec3 {
        self.gravity
    }

    fn step_once(&mut self) {
        for entry in &mut self.boxes {
            if let Some(body) = self.rigid_body_set.get(entry.body) {
                entry.previous = pose_of(body);
            }
        }

        self.pipeline.step(
            &vector![self.gravity.x, self.gravity.y, self.gravity.z],
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );
    }
}

impl PhysicsWorld for RapierWorld {
    fn create() -> Self {
        Self::with_gravity(DEFAULT_GRAVITY)
    }

    fn add_box(&mut self, position: Vec3, size: Vec3, mass: f32) -> BodyHandle {
        let mass = effective_mass(mass);
        let half = size.abs() * 0.5;

        let builder = if mass == 0.0 {
            RigidBodyBuilder::fixed()
        } else {
            RigidBodyBuilder::dynamic()
        };
        let body = builder
            .translation(vector![position.x, position.y, position.z])
            .build();
        let body = self.rigid_body_set.insert(body);

        let mut collider = ColliderBuilder::cuboid(half.x, half.y, half.z);
        if mass > 0.0 {
            collider = collider.mass(mass);
        }
        let collider = self.collider_set.insert_with_parent(
            collider.build(),
            body,
            &mut self.rigid_body_set,
        );

        log::debug!("Added physics box at {position} with mass {mass:.2}");

        let handle = BodyHandle::new(self.boxes.len());
        self.boxes.push(BoxBody {
            body,
            collider,
            previous: Pose::at(position),
        });
        handle
    }

    fn step(&mut self, dt: f32) {
        let steps = self.stepper.advance(dt);
        if self.boxes.is_empty() {
            return;
        }
        for _ in 0..steps {
            self.step_once();
        }
    }

    fn transform(&self, body: Option<BodyHandle>) -> BodyTransform {
        let Some((entry, body)) = body
            .and_then(|handle| self.boxes.get(handle.index()))
            .and_then(|entry| Some((entry, self.rigid_body_set.get(entry.body)?)))
        else {
            return BodyTransform::IDENTITY;
        };

        entry.previous.blend(pose_of(body), self.stepper.alpha())
    }

    fn body_count(&self) -> usize {
        self.boxes.len()
    }

    fn destroy(mut self) -> TeardownReport {
        let mut report = TeardownReport::default();

        for (index, entry) in self.boxes.iter().enumerate().rev() {
            self.rigid_body_set.remove(
                entry.body,
                &mut self.island_manager,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                false,
            );
            report.record(TeardownEvent::RigidBody(BodyHandle::new(index)));
        }

        for (index, entry) in self.boxes.iter().enumerate().rev() {
            self.collider_set.remove(
                entry.collider,
                &mut self.island_manager,
                &mut self.rigid_body_set,
                false,
            );
            report.record(TeardownEvent::CollisionShape(BodyHandle::new(index)));
        }

        let Self {
            pipeline,
            island_manager,
            rigid_body_set,
            impulse_joint_set,
            multibody_joint_set,
            ccd_solver,
            integration_parameters,
            broad_phase,
            narrow_phase,
            collider_set,
            ..
        } = self;

        drop(pipeline);
        drop(island_manager);
        drop(rigid_body_set);
        report.record(TeardownEvent::DynamicsWorld);

        drop(impulse_joint_set);
        drop(multibody_joint_set);
        drop(ccd_solver);
        drop(integration_parameters);
        report.record(TeardownEvent::ConstraintSolver);

        drop(broad_phase);
        report.record(TeardownEvent::Broadphase);

        drop(narrow_phase);
        report.record(TeardownEvent::Dispatcher);

        drop(collider_set);
        report.record(TeardownEvent::CollisionConfiguration);

        log::info!("Physics world destroyed");
        report
    }
}
