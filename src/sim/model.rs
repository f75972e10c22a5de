//! Static model description: bodies, joints, geoms and actuators.

use std::path::Path;

use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};

use super::error::ModelError;
use super::mjcf;

/// Index of an actuator control slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActuatorId(pub usize);

/// A rigid body in the kinematic tree. Body 0 is the world.
#[derive(Debug, Clone)]
pub struct Body {
    /// Optional body name.
    pub name: Option<String>,
    /// Parent body index, `None` for the world.
    pub parent: Option<usize>,
    /// Pose relative to the parent body.
    pub local_pose: Isometry3<f64>,
    /// Pose in world coordinates at the initial configuration.
    pub world_pose: Isometry3<f64>,
}

/// Degrees of freedom a joint grants its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointKind {
    /// Rotation about an axis.
    Hinge,
    /// Translation along an axis.
    Slide,
    /// Rotation about a point.
    Ball,
    /// Unconstrained motion.
    Free,
}

/// A joint connecting a body to its parent.
#[derive(Debug, Clone)]
pub struct Joint {
    /// Optional joint name.
    pub name: Option<String>,
    /// Body the joint moves.
    pub body: usize,
    /// Joint type.
    pub kind: JointKind,
    /// Anchor in the body frame.
    pub pos: Point3<f64>,
    /// Axis in the body frame (unit length).
    pub axis: Vector3<f64>,
    /// Limits (radians for hinges, length for slides).
    pub range: Option<(f64, f64)>,
}

/// Primitive collision/visual shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeomKind {
    /// Plane through the geom origin with normal +z.
    Plane,
    /// `size[0]` = radius.
    Sphere,
    /// `size[0]` = radius, `size[1]` = half length along z.
    Capsule,
    /// `size[0]` = radius, `size[1]` = half length along z.
    Cylinder,
    /// `size` = half extents.
    Box,
}

/// A geom attached to a body.
#[derive(Debug, Clone)]
pub struct Geom {
    /// Optional geom name.
    pub name: Option<String>,
    /// Owning body.
    pub body: usize,
    /// Shape type.
    pub kind: GeomKind,
    /// Shape parameters, see [`GeomKind`].
    pub size: [f64; 3],
    /// Pose in the body frame.
    pub local_pose: Isometry3<f64>,
    /// Color.
    pub rgba: [f32; 4],
}

impl Geom {
    /// Radius of a sphere bounding the geom, `None` for planes.
    pub fn bounding_radius(&self) -> Option<f64> {
        let [a, b, c] = self.size;
        match self.kind {
            GeomKind::Plane => None,
            GeomKind::Sphere => Some(a),
            GeomKind::Capsule => Some(a + b),
            GeomKind::Cylinder => Some((a * a + b * b).sqrt()),
            GeomKind::Box => Some((a * a + b * b + c * c).sqrt()),
        }
    }
}

/// How an actuator turns its control value into motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActuatorKind {
    /// Servo toward a target position.
    Position { kp: f64, kv: f64 },
    /// Servo toward a target velocity.
    Velocity { kv: f64 },
    /// Direct torque or force, scaled by `gear`.
    Motor { gear: f64 },
}

/// A named control input driving one joint.
#[derive(Debug, Clone)]
pub struct Actuator {
    /// Optional actuator name.
    pub name: Option<String>,
    /// Driven joint.
    pub joint: usize,
    /// Transmission.
    pub kind: ActuatorKind,
    /// Control clamp, when limited.
    pub ctrl_range: Option<(f64, f64)>,
}

/// Global simulation options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelOptions {
    /// Integration step in seconds.
    pub timestep: f64,
    /// Gravity in world coordinates.
    pub gravity: Vector3<f64>,
}

impl Default for ModelOptions {
    fn default() -> Self {
        ModelOptions {
            timestep: 0.002,
            gravity: Vector3::new(0.0, 0.0, -9.81),
        }
    }
}

/// Size statistics used for camera scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Statistic {
    /// Center of the model at its initial configuration.
    pub center: Point3<f64>,
    /// Characteristic model size.
    pub extent: f64,
}

/// A complete static model.
#[derive(Debug, Clone)]
pub struct Model {
    /// Simulation options.
    pub options: ModelOptions,
    /// Body tree; parents always precede children.
    pub bodies: Vec<Body>,
    /// Joints.
    pub joints: Vec<Joint>,
    /// Geoms.
    pub geoms: Vec<Geom>,
    /// Actuators, indexed by [`ActuatorId`].
    pub actuators: Vec<Actuator>,
    /// Size statistics.
    pub stat: Statistic,
}

impl Model {
    /// Load a model from an XML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let xml = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_xml_str(&xml)
    }

    /// Load a model from an XML string.
    pub fn from_xml_str(xml: &str) -> Result<Self, ModelError> {
        let mut model = mjcf::parse(xml)?;
        model.stat = model.compute_statistic();
        log::debug!(
            "loaded model: {} bodies, {} joints, {} geoms, {} actuators",
            model.bodies.len(),
            model.joints.len(),
            model.geoms.len(),
            model.actuators.len()
        );
        Ok(model)
    }

    /// Resolve an actuator name to its control slot.
    pub fn actuator_id(&self, name: &str) -> Option<ActuatorId> {
        self.actuators
            .iter()
            .position(|a| a.name.as_deref() == Some(name))
            .map(ActuatorId)
    }

    /// Resolve a joint name to its index.
    pub fn joint_id(&self, name: &str) -> Option<usize> {
        self.joints
            .iter()
            .position(|j| j.name.as_deref() == Some(name))
    }

    /// World pose of a geom at the initial configuration.
    pub fn geom_world_pose(&self, geom: &Geom) -> Isometry3<f64> {
        self.bodies[geom.body].world_pose * geom.local_pose
    }

    /// Bounding box of all finite geoms, expanded by their bounding radius.
    fn compute_statistic(&self) -> Statistic {
        let mut min = Vector3::repeat(f64::INFINITY);
        let mut max = Vector3::repeat(f64::NEG_INFINITY);
        for geom in &self.geoms {
            let Some(radius) = geom.bounding_radius() else {
                continue;
            };
            let center = self.geom_world_pose(geom).translation.vector;
            min = min.inf(&center.add_scalar(-radius));
            max = max.sup(&center.add_scalar(radius));
        }
        for body in self.bodies.iter().skip(1) {
            let p = body.world_pose.translation.vector;
            min = min.inf(&p);
            max = max.sup(&p);
        }

        if min.x > max.x {
            return Statistic {
                center: Point3::origin(),
                extent: 1.0,
            };
        }
        let center = Point3::from((min + max) * 0.5);
        let extent = ((max - min).norm() * 0.5).max(0.1);
        Statistic { center, extent }
    }
}

/// Identity-rotation pose helper.
pub(crate) fn translation(pos: Vector3<f64>) -> Isometry3<f64> {
    Isometry3::from_parts(Translation3::from(pos), UnitQuaternion::identity())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const ARM: &str = r#"
<mujoco>
  <worldbody>
    <geom type="plane" size="2 2 0.1"/>
    <body name="upper" pos="0 0 1">
      <joint name="shoulder" type="hinge" axis="0 1 0"/>
      <geom type="capsule" fromto="0 0 0 0 0 0.5" size="0.05"/>
      <body name="lower" pos="0 0 0.5">
        <joint name="elbow" type="hinge" axis="0 1 0"/>
        <geom type="box" size="0.05 0.05 0.25" pos="0 0 0.25"/>
      </body>
    </body>
  </worldbody>
  <actuator>
    <position name="joint1" joint="shoulder" kp="50"/>
    <position name="joint2" joint="elbow" kp="50"/>
  </actuator>
</mujoco>"#;

    #[test]
    fn resolves_actuators_by_name() {
        let model = Model::from_xml_str(ARM).unwrap();
        assert_eq!(model.actuator_id("joint1"), Some(ActuatorId(0)));
        assert_eq!(model.actuator_id("joint2"), Some(ActuatorId(1)));
        assert_eq!(model.actuator_id("joint3"), None);
        assert_eq!(model.joint_id("elbow"), Some(1));
    }

    #[test]
    fn composes_world_poses() {
        let model = Model::from_xml_str(ARM).unwrap();
        let lower = &model.bodies[2];
        assert_relative_eq!(lower.world_pose.translation.vector.z, 1.5);
        let box_pose = model.geom_world_pose(&model.geoms[2]);
        assert_relative_eq!(box_pose.translation.vector.z, 1.75);
    }

    #[test]
    fn statistic_ignores_planes() {
        let model = Model::from_xml_str(ARM).unwrap();
        assert!(model.stat.extent > 0.3);
        assert!(model.stat.extent < 1.5);
        assert!(model.stat.center.z > 0.9);
    }

    #[test]
    fn empty_world_has_unit_extent() {
        let model = Model::from_xml_str("<mujoco><worldbody/></mujoco>").unwrap();
        assert_eq!(model.bodies.len(), 1);
        assert_relative_eq!(model.stat.extent, 1.0);
    }

    #[test]
    fn missing_file_is_reported() {
        let err = Model::from_file("/nonexistent/model.xml").unwrap_err();
        assert!(matches!(err, ModelError::Io { .. }));
    }
}
