//! Physics world backed by Rapier3d.

use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};
use rapier3d::dynamics::{
    CCDSolver, GenericJoint, GenericJointBuilder, ImpulseJointHandle, ImpulseJointSet,
    IntegrationParameters, IslandManager, JointAxesMask, JointAxis, MotorModel,
    MultibodyJointSet, RigidBodyBuilder, RigidBodyHandle, RigidBodySet,
};
use rapier3d::geometry::{BroadPhaseMultiSap, ColliderBuilder, ColliderSet, NarrowPhase};
use rapier3d::pipeline::{PhysicsPipeline, QueryPipeline};

use super::model::{translation, ActuatorId, ActuatorKind, GeomKind, Joint, JointKind, Model};
use super::Simulation;

/// Default collider density (kg/m^3).
const DENSITY: f32 = 1000.0;
/// Default sliding friction.
const FRICTION: f32 = 1.0;

/// Rapier state derived from a model; rebuilt on reset.
struct RapierState {
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: BroadPhaseMultiSap,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,

    // Model body index -> Rapier body
    body_handles: Vec<RigidBodyHandle>,
    // Model joint index -> Rapier joint (none for free joints)
    joint_handles: Vec<Option<ImpulseJointHandle>>,
}

/// A running simulation of a [`Model`].
pub struct PhysicsWorld {
    model: Model,
    state: RapierState,
    gravity: Vector3<f32>,
    integration_params: IntegrationParameters,
    ctrl: Vec<f64>,
    time: f64,
}

impl PhysicsWorld {
    /// Create a simulation at the model's initial configuration.
    pub fn new(model: Model) -> Self {
        let state = RapierState::build(&model);
        let gravity = model.options.gravity.cast::<f32>();
        let integration_params = IntegrationParameters {
            dt: model.options.timestep as f32,
            ..IntegrationParameters::default()
        };
        let ctrl = vec![0.0; model.actuators.len()];
        PhysicsWorld {
            model,
            state,
            gravity,
            integration_params,
            ctrl,
            time: 0.0,
        }
    }

    /// World pose of a model body.
    pub fn body_pose(&self, body: usize) -> Isometry3<f64> {
        let handle = self.state.body_handles[body];
        to_model(self.state.bodies[handle].position())
    }

    /// Position of a hinge (radians) or slide joint, measured from the initial configuration.
    ///
    /// Ball and free joints have no scalar position and report 0.
    pub fn joint_position(&self, joint: usize) -> f64 {
        let joint = &self.model.joints[joint];
        let body = &self.model.bodies[joint.body];
        let Some(parent) = body.parent else {
            return 0.0;
        };
        let frame2 = joint_frame(joint);
        let frame1 = body.local_pose * frame2;
        let world1 = self.body_pose(parent) * frame1;
        let world2 = self.body_pose(joint.body) * frame2;
        let relative = world1.inverse() * world2;
        match joint.kind {
            JointKind::Hinge => relative.rotation.scaled_axis().x,
            JointKind::Slide => relative.translation.vector.x,
            JointKind::Ball | JointKind::Free => 0.0,
        }
    }

    /// Push control values into the joint motors and body forces.
    fn apply_controls(&mut self) {
        let state = &mut self.state;

        for actuator in &self.model.actuators {
            if let ActuatorKind::Motor { .. } = actuator.kind {
                let joint = &self.model.joints[actuator.joint];
                for body in [Some(joint.body), self.model.bodies[joint.body].parent]
                    .into_iter()
                    .flatten()
                {
                    if let Some(rb) = state.bodies.get_mut(state.body_handles[body]) {
                        rb.reset_forces(false);
                        rb.reset_torques(false);
                    }
                }
            }
        }

        for (index, actuator) in self.model.actuators.iter().enumerate() {
            let mut value = self.ctrl[index];
            if let Some((lo, hi)) = actuator.ctrl_range {
                value = value.clamp(lo, hi);
            }
            let joint = &self.model.joints[actuator.joint];
            let axis = motor_axis(joint.kind);

            match actuator.kind {
                ActuatorKind::Position { kp, kv } => {
                    if let Some(handle) = state.joint_handles[actuator.joint] {
                        if let Some(j) = state.impulse_joints.get_mut(handle, true) {
                            j.data
                                .set_motor_position(axis, value as f32, kp as f32, kv as f32);
                        }
                    }
                }
                ActuatorKind::Velocity { kv } => {
                    if let Some(handle) = state.joint_handles[actuator.joint] {
                        if let Some(j) = state.impulse_joints.get_mut(handle, true) {
                            j.data.set_motor_velocity(axis, value as f32, kv as f32);
                        }
                    }
                }
                ActuatorKind::Motor { gear } => {
                    let child = state.body_handles[joint.body];
                    let Some(rb) = state.bodies.get(child) else {
                        continue;
                    };
                    let direction = rb.position().rotation * joint.axis.cast::<f32>();
                    let effort = direction * (value * gear) as f32;
                    let parent = self.model.bodies[joint.body]
                        .parent
                        .map(|p| state.body_handles[p]);

                    for (handle, sign) in [(Some(child), 1.0f32), (parent, -1.0)] {
                        let Some(rb) = handle.and_then(|h| state.bodies.get_mut(h)) else {
                            continue;
                        };
                        match joint.kind {
                            JointKind::Hinge => rb.add_torque(effort * sign, true),
                            JointKind::Slide => rb.add_force(effort * sign, true),
                            JointKind::Ball | JointKind::Free => {}
                        }
                    }
                }
            }
        }
    }
}

impl Simulation for PhysicsWorld {
    fn model(&self) -> &Model {
        &self.model
    }

    fn ctrl(&self, id: ActuatorId) -> f64 {
        self.ctrl[id.0]
    }

    fn set_ctrl(&mut self, id: ActuatorId, value: f64) {
        self.ctrl[id.0] = value;
    }

    fn reset(&mut self) {
        self.state = RapierState::build(&self.model);
        self.ctrl.iter_mut().for_each(|c| *c = 0.0);
        self.time = 0.0;
    }

    fn step(&mut self) {
        self.apply_controls();

        let state = &mut self.state;
        state.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut state.islands,
            &mut state.broad_phase,
            &mut state.narrow_phase,
            &mut state.bodies,
            &mut state.colliders,
            &mut state.impulse_joints,
            &mut state.multibody_joints,
            &mut state.ccd_solver,
            Some(&mut state.query_pipeline),
            &(),
            &(),
        );
        self.time += self.model.options.timestep;
    }

    fn time(&self) -> f64 {
        self.time
    }

    fn geom_pose(&self, geom: usize) -> Isometry3<f64> {
        let geom = &self.model.geoms[geom];
        self.body_pose(geom.body) * geom.local_pose
    }
}

impl RapierState {
    fn build(model: &Model) -> Self {
        let mut state = RapierState {
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: BroadPhaseMultiSap::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            body_handles: Vec::with_capacity(model.bodies.len()),
            joint_handles: vec![None; model.joints.len()],
        };

        // Bodies welded (transitively) to the world never move.
        let mut fixed = vec![false; model.bodies.len()];
        for (index, body) in model.bodies.iter().enumerate() {
            let joint = model.joints.iter().position(|j| j.body == index);
            fixed[index] = match body.parent {
                None => true,
                Some(parent) => joint.is_none() && fixed[parent],
            };

            let builder = if fixed[index] {
                RigidBodyBuilder::fixed()
            } else {
                RigidBodyBuilder::dynamic()
            };
            let handle = state
                .bodies
                .insert(builder.position(to_physics(&body.world_pose)).build());
            state.body_handles.push(handle);

            let Some(parent) = body.parent else {
                continue;
            };
            if fixed[index] {
                continue;
            }
            let parent_handle = state.body_handles[parent];

            let generic = match joint {
                Some(j) => match joint_to_rapier(&model.joints[j], &body.local_pose) {
                    Some(generic) => generic,
                    None => continue,
                },
                None => GenericJointBuilder::new(JointAxesMask::LOCKED_FIXED_AXES)
                    .local_frame1(to_physics(&body.local_pose))
                    .local_frame2(Isometry3::identity())
                    .contacts_enabled(false)
                    .build(),
            };
            let joint_handle = state
                .impulse_joints
                .insert(parent_handle, handle, generic, true);
            if let Some(j) = joint {
                state.joint_handles[j] = Some(joint_handle);
            }
        }

        for geom in &model.geoms {
            let [a, b, c] = geom.size.map(|s| s as f32);
            let local = to_physics(&geom.local_pose);
            let builder = match geom.kind {
                GeomKind::Plane => ColliderBuilder::halfspace(Vector3::z_axis()),
                GeomKind::Sphere => ColliderBuilder::ball(a),
                GeomKind::Capsule => ColliderBuilder::capsule_z(b, a),
                GeomKind::Cylinder => ColliderBuilder::cylinder(b, a),
                GeomKind::Box => ColliderBuilder::cuboid(a, b, c),
            };
            // Rapier cylinders run along y; model cylinders run along z.
            let local = if geom.kind == GeomKind::Cylinder {
                local
                    * UnitQuaternion::from_axis_angle(
                        &Vector3::x_axis(),
                        std::f32::consts::FRAC_PI_2,
                    )
            } else {
                local
            };
            let collider = builder
                .position(local)
                .density(DENSITY)
                .friction(FRICTION)
                .build();
            let parent = state.body_handles[geom.body];
            state
                .colliders
                .insert_with_parent(collider, parent, &mut state.bodies);
        }

        state
    }
}

/// Joint frame in its body: origin at the anchor, x along the joint axis.
fn joint_frame(joint: &Joint) -> Isometry3<f64> {
    let mut frame = translation(joint.pos.coords);
    frame.rotation = UnitQuaternion::rotation_between(&Vector3::x(), &joint.axis)
        .unwrap_or_else(|| {
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::PI)
        });
    frame
}

/// Rapier joint for a model joint; `None` for free joints.
fn joint_to_rapier(joint: &Joint, body_in_parent: &Isometry3<f64>) -> Option<GenericJoint> {
    let frame2 = joint_frame(joint);
    let frame1 = body_in_parent * frame2;

    let mask = match joint.kind {
        JointKind::Hinge => JointAxesMask::LOCKED_REVOLUTE_AXES,
        JointKind::Slide => JointAxesMask::LOCKED_PRISMATIC_AXES,
        JointKind::Ball => JointAxesMask::LOCKED_SPHERICAL_AXES,
        JointKind::Free => return None,
    };

    let mut builder = GenericJointBuilder::new(mask)
        .local_frame1(to_physics(&frame1))
        .local_frame2(to_physics(&frame2))
        .contacts_enabled(false);

    if matches!(joint.kind, JointKind::Hinge | JointKind::Slide) {
        let axis = motor_axis(joint.kind);
        if let Some((lo, hi)) = joint.range {
            builder = builder.limits(axis, [lo as f32, hi as f32]);
        }
        builder = builder.motor_model(axis, MotorModel::ForceBased);
    }

    Some(builder.build())
}

fn motor_axis(kind: JointKind) -> JointAxis {
    match kind {
        JointKind::Slide => JointAxis::LinX,
        _ => JointAxis::AngX,
    }
}

fn to_physics(iso: &Isometry3<f64>) -> Isometry3<f32> {
    let q = iso.rotation.quaternion();
    Isometry3::from_parts(
        Translation3::from(iso.translation.vector.cast::<f32>()),
        UnitQuaternion::from_quaternion(Quaternion::new(
            q.w as f32, q.i as f32, q.j as f32, q.k as f32,
        )),
    )
}

fn to_model(iso: &Isometry3<f32>) -> Isometry3<f64> {
    let q = iso.rotation.quaternion();
    Isometry3::from_parts(
        Translation3::from(iso.translation.vector.cast::<f64>()),
        UnitQuaternion::from_quaternion(Quaternion::new(
            q.w as f64, q.i as f64, q.j as f64, q.k as f64,
        )),
    )
}
