//! Physics simulation module
//!
//! Rigid boxes under constant gravity, consumed through a small capability
//! interface: add a box, step, read a body's transform, tear down. The world
//! exclusively owns every body and shape created through it; callers only
//! hold [`BodyHandle`]s, which die with the world.

mod rapier;
mod stub;

pub use rapier::RapierWorld;
pub use stub::StubWorld;

use glam::{Mat3, Mat4, Quat, Vec3};

/// Gravity of every world
pub const DEFAULT_GRAVITY: Vec3 = Vec3::new(0.0, -9.81, 0.0);
/// Internal simulation step in seconds
pub const FIXED_TIME_STEP: f32 = 1.0 / 60.0;
/// Most internal steps taken by one `step` call
pub const MAX_SUB_STEPS: u32 = 10;

/// Tolerance when splitting accumulated time into whole steps
const STEP_EPSILON: f32 = 1e-5;

/// Handle to a body owned by a physics world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(u32);

impl BodyHandle {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

/// World position and rotation of a body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyTransform {
    pub position: Vec3,
    pub rotation: Mat3,
}

impl BodyTransform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Mat3::IDENTITY,
    };

    /// Rotation as a homogeneous matrix with zero translation
    pub fn rotation_matrix(&self) -> Mat4 {
        Mat4::from_mat3(self.rotation)
    }

    /// Translation after rotation, ready to use as a model matrix
    pub fn to_model_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position) * self.rotation_matrix()
    }
}

impl Default for BodyTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Position and orientation of a body at one internal step
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub(crate) const fn at(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    /// Blend from this pose toward `next`; `t` of 1 or more is `next` exactly
    pub(crate) fn blend(self, next: Self, t: f32) -> BodyTransform {
        if t >= 1.0 {
            return BodyTransform {
                position: next.position,
                rotation: Mat3::from_quat(next.rotation),
            };
        }
        let t = t.max(0.0);
        BodyTransform {
            position: self.position.lerp(next.position, t),
            rotation: Mat3::from_quat(self.rotation.slerp(next.rotation, t)),
        }
    }
}

/// One object released while a world is torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownEvent {
    /// A body and its motion state
    RigidBody(BodyHandle),
    /// The collision shape of a body
    CollisionShape(BodyHandle),
    DynamicsWorld,
    ConstraintSolver,
    Broadphase,
    Dispatcher,
    CollisionConfiguration,
}

/// Release order recorded by [`PhysicsWorld::destroy`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    events: Vec<TeardownEvent>,
}

impl TeardownReport {
    pub(crate) fn record(&mut self, event: TeardownEvent) {
        self.events.push(event);
    }

    /// Record every world-level label in release order
    ///
    /// For worlds that own no world-level objects of their own.
    pub(crate) fn record_world(&mut self) {
        self.events.extend([
            TeardownEvent::DynamicsWorld,
            TeardownEvent::ConstraintSolver,
            TeardownEvent::Broadphase,
            TeardownEvent::Dispatcher,
            TeardownEvent::CollisionConfiguration,
        ]);
    }

    pub fn events(&self) -> &[TeardownEvent] {
        &self.events
    }

    /// Number of bodies released
    pub fn bodies_released(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, TeardownEvent::RigidBody(_)))
            .count()
    }
}

/// Rigid-body simulation behind the engine
pub trait PhysicsWorld {
    /// Create an empty world with [`DEFAULT_GRAVITY`]
    fn create() -> Self
    where
        Self: Sized;

    /// Add a box of full extents `size` centred at `position`
    ///
    /// A mass of zero makes the body static. Negative masses are logged and
    /// treated as zero.
    fn add_box(&mut self, position: Vec3, size: Vec3, mass: f32) -> BodyHandle;

    /// Advance by `dt` seconds in fixed internal steps
    fn step(&mut self, dt: f32);

    /// Current transform of a body; identity for `None` or an unknown handle
    fn transform(&self, body: Option<BodyHandle>) -> BodyTransform;

    fn body_count(&self) -> usize;

    /// Release bodies, then shapes, then the world itself
    fn destroy(self) -> TeardownReport
    where
        Self: Sized;
}

/// Splits frame time into fixed simulation steps
///
/// The simulation runs ahead of the requested time by less than one step,
/// so every call that adds time moves the reported pose forward. Reported
/// poses blend the last two internal steps by [`SubStepper::alpha`]. A call
/// needing more than [`MAX_SUB_STEPS`] runs that many and drops the rest.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubStepper {
    /// Simulated time not yet requested, in `[0, FIXED_TIME_STEP)`
    lead: f32,
}

impl SubStepper {
    pub const fn new() -> Self {
        Self { lead: 0.0 }
    }

    /// Add `dt` and return how many fixed steps to run now
    pub fn advance(&mut self, dt: f32) -> u32 {
        if dt.is_nan() || dt <= 0.0 {
            return 0;
        }

        let behind = dt - self.lead;
        if behind <= STEP_EPSILON {
            self.lead = (self.lead - dt).max(0.0);
            return 0;
        }

        let steps = ((behind - STEP_EPSILON) / FIXED_TIME_STEP).ceil().max(1.0);
        if steps > MAX_SUB_STEPS as f32 {
            self.lead = 0.0;
            return MAX_SUB_STEPS;
        }
        self.lead = (steps * FIXED_TIME_STEP - behind).max(0.0);
        steps as u32
    }

    /// Simulated time ahead of the requested time
    pub const fn lead(&self) -> f32 {
        self.lead
    }

    /// Weight of the newest step in the reported pose, in `[0, 1]`
    pub fn alpha(&self) -> f32 {
        (1.0 - self.lead / FIXED_TIME_STEP).clamp(0.0, 1.0)
    }
}

/// Mass validation shared by the implementations
pub(crate) fn effective_mass(mass: f32) -> f32 {
    if mass < 0.0 || mass.is_nan() {
        log::warn!("Box mass {mass} is invalid, treating the body as static");
        0.0
    } else {
        mass
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_frame_one_step() {
        let mut stepper = SubStepper::new();
        assert_eq!(stepper.advance(FIXED_TIME_STEP), 1);
        assert!(stepper.lead() < STEP_EPSILON);
        assert!((stepper.alpha() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_short_frames_run_one_step_ahead() {
        let mut stepper = SubStepper::new();
        assert_eq!(stepper.advance(FIXED_TIME_STEP / 2.0), 1);
        assert!((stepper.alpha() - 0.5).abs() < 1e-3);

        assert_eq!(stepper.advance(FIXED_TIME_STEP / 2.0), 0);
        assert!((stepper.alpha() - 1.0).abs() < 1e-3);

        assert_eq!(stepper.advance(FIXED_TIME_STEP / 3.0), 1);
        assert!((stepper.alpha() - 1.0 / 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_long_frame_is_clamped() {
        let mut stepper = SubStepper::new();
        assert_eq!(stepper.advance(1.0), MAX_SUB_STEPS);
        // Excess time was dropped, not carried over
        assert_eq!(stepper.lead(), 0.0);
        assert_eq!(stepper.alpha(), 1.0);
        assert_eq!(stepper.advance(0.0), 0);
    }

    #[test]
    fn test_invalid_dt() {
        let mut stepper = SubStepper::new();
        assert_eq!(stepper.advance(-1.0), 0);
        assert_eq!(stepper.advance(f32::NAN), 0);
        assert_eq!(stepper.lead(), 0.0);
    }

    #[test]
    fn test_pose_blend() {
        let from = Pose::at(Vec3::new(0.0, 4.0, 0.0));
        let to = Pose {
            position: Vec3::new(0.0, 2.0, 0.0),
            rotation: Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
        };

        let half = from.blend(to, 0.5);
        assert!(half.position.abs_diff_eq(Vec3::new(0.0, 3.0, 0.0), 1e-6));
        let quarter_turn = Mat3::from_rotation_y(std::f32::consts::FRAC_PI_4);
        assert!(half.rotation.abs_diff_eq(quarter_turn, 1e-5));

        assert_eq!(from.blend(to, 1.0).position, to.position);
        assert_eq!(from.blend(to, 0.0).position, from.position);
    }

    #[test]
    fn test_model_matrix_rotates_then_translates() {
        let transform = BodyTransform {
            position: Vec3::new(0.0, 5.0, 0.0),
            rotation: Mat3::from_rotation_y(std::f32::consts::FRAC_PI_2),
        };
        let moved = transform.to_model_matrix().transform_point3(Vec3::X);
        assert!(moved.abs_diff_eq(Vec3::new(0.0, 5.0, -1.0), 1e-6));

        let rotation = transform.rotation_matrix();
        assert_eq!(rotation.w_axis, glam::Vec4::W);
        assert_eq!(rotation.x_axis.w, 0.0);
    }

    #[test]
    fn test_identity_transform() {
        assert_eq!(BodyTransform::default().to_model_matrix(), Mat4::IDENTITY);
    }
}
