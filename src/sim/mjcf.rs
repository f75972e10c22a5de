//! Loader for the subset of MJCF XML that the physics backend supports.

use std::collections::HashMap;

use nalgebra::{Isometry3, Point3, Quaternion, Translation3, Unit, UnitQuaternion, Vector3};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::error::ModelError;
use super::model::{
    translation, Actuator, ActuatorKind, Body, Geom, GeomKind, Joint, JointKind, Model,
    ModelOptions, Statistic,
};

const DEFAULT_RGBA: [f32; 4] = [0.5, 0.5, 0.5, 1.0];

/// Where the parser currently is in the document.
#[derive(Debug, Clone, Copy)]
enum Context {
    Document,
    Mujoco,
    Body(usize),
    Actuator,
}

/// An actuator whose joint is resolved after the whole document is read.
struct PendingActuator {
    name: Option<String>,
    joint: String,
    kind: ActuatorKind,
    ctrl_range: Option<(f64, f64)>,
}

struct Builder {
    angle_degrees: bool,
    options: ModelOptions,
    bodies: Vec<Body>,
    joints: Vec<Joint>,
    geoms: Vec<Geom>,
    actuators: Vec<PendingActuator>,
    saw_root: bool,
}

/// Attributes of one element, decoded and unescaped.
struct Attrs {
    element: String,
    values: HashMap<String, String>,
}

impl Attrs {
    fn read(e: &BytesStart) -> Result<Self, ModelError> {
        let element = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let mut values = HashMap::new();
        for attr in e.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            values.insert(key, value);
        }
        Ok(Attrs { element, values })
    }

    fn str(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    fn name(&self) -> Option<String> {
        self.str("name").map(str::to_string)
    }

    fn invalid(&self, attribute: &str, value: &str) -> ModelError {
        ModelError::InvalidAttribute {
            element: self.element.clone(),
            attribute: attribute.to_string(),
            value: value.to_string(),
        }
    }

    fn floats(&self, name: &str) -> Result<Option<Vec<f64>>, ModelError> {
        let Some(raw) = self.str(name) else {
            return Ok(None);
        };
        raw.split_whitespace()
            .map(|s| match s.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(v),
                _ => Err(self.invalid(name, raw)),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    fn fixed<const N: usize>(&self, name: &str) -> Result<Option<[f64; N]>, ModelError> {
        match self.floats(name)? {
            None => Ok(None),
            Some(v) => {
                let raw = self.str(name).unwrap_or_default();
                <[f64; N]>::try_from(v.as_slice())
                    .map(Some)
                    .map_err(|_| self.invalid(name, raw))
            }
        }
    }

    fn float(&self, name: &str, default: f64) -> Result<f64, ModelError> {
        Ok(self.fixed::<1>(name)?.map(|[v]| v).unwrap_or(default))
    }

    fn vec3(&self, name: &str) -> Result<Option<Vector3<f64>>, ModelError> {
        Ok(self.fixed::<3>(name)?.map(Vector3::from))
    }

    /// `limited` is "true", "false" or "auto"; auto means limited when a range is given.
    fn limited(&self, flag: &str, has_range: bool) -> Result<bool, ModelError> {
        match self.str(flag) {
            None | Some("auto") => Ok(has_range),
            Some("true") => Ok(true),
            Some("false") => Ok(false),
            Some(other) => Err(self.invalid(flag, other)),
        }
    }

    fn range(&self, name: &str, flag: &str) -> Result<Option<(f64, f64)>, ModelError> {
        let range = self.fixed::<2>(name)?;
        if !self.limited(flag, range.is_some())? {
            return Ok(None);
        }
        match range {
            Some([lo, hi]) if lo <= hi => Ok(Some((lo, hi))),
            Some(_) => Err(self.invalid(name, self.str(name).unwrap_or_default())),
            None => Err(ModelError::MissingAttribute {
                element: self.element.clone(),
                attribute: name.to_string(),
            }),
        }
    }
}

impl Builder {
    fn new() -> Self {
        Builder {
            angle_degrees: true,
            options: ModelOptions::default(),
            bodies: vec![Body {
                name: Some("world".to_string()),
                parent: None,
                local_pose: Isometry3::identity(),
                world_pose: Isometry3::identity(),
            }],
            joints: Vec::new(),
            geoms: Vec::new(),
            actuators: Vec::new(),
            saw_root: false,
        }
    }

    fn angle(&self, value: f64) -> f64 {
        if self.angle_degrees {
            value.to_radians()
        } else {
            value
        }
    }

    /// Orientation from `quat`, `euler` or `axisangle`, identity when absent.
    fn orientation(&self, attrs: &Attrs) -> Result<UnitQuaternion<f64>, ModelError> {
        if let Some([w, x, y, z]) = attrs.fixed::<4>("quat")? {
            let q = Quaternion::new(w, x, y, z);
            if q.norm() == 0.0 {
                return Err(attrs.invalid("quat", attrs.str("quat").unwrap_or_default()));
            }
            return Ok(UnitQuaternion::from_quaternion(q));
        }
        if let Some([a, b, c]) = attrs.fixed::<3>("euler")? {
            let rx = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), self.angle(a));
            let ry = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), self.angle(b));
            let rz = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), self.angle(c));
            return Ok(rx * ry * rz);
        }
        if let Some([x, y, z, a]) = attrs.fixed::<4>("axisangle")? {
            let axis = Vector3::new(x, y, z);
            if axis.norm() == 0.0 {
                return Err(attrs.invalid("axisangle", attrs.str("axisangle").unwrap_or_default()));
            }
            return Ok(UnitQuaternion::from_axis_angle(
                &Unit::new_normalize(axis),
                self.angle(a),
            ));
        }
        Ok(UnitQuaternion::identity())
    }

    fn pose(&self, attrs: &Attrs) -> Result<Isometry3<f64>, ModelError> {
        let pos = attrs.vec3("pos")?.unwrap_or_else(Vector3::zeros);
        Ok(Isometry3::from_parts(
            Translation3::from(pos),
            self.orientation(attrs)?,
        ))
    }

    /// Handle an opening tag; returns the context to descend into, or `None` to skip its children.
    fn start(&mut self, ctx: Context, e: &BytesStart) -> Result<Option<Context>, ModelError> {
        let attrs = Attrs::read(e)?;
        match (ctx, attrs.element.as_str()) {
            (Context::Document, "mujoco") => {
                self.saw_root = true;
                Ok(Some(Context::Mujoco))
            }
            (Context::Document, other) => Err(ModelError::UnexpectedRoot(other.to_string())),
            (Context::Mujoco, "compiler") => {
                match attrs.str("angle") {
                    None => {}
                    Some("degree") => self.angle_degrees = true,
                    Some("radian") => self.angle_degrees = false,
                    Some(other) => return Err(attrs.invalid("angle", other)),
                }
                Ok(None)
            }
            (Context::Mujoco, "option") => {
                self.options.timestep = attrs.float("timestep", self.options.timestep)?;
                if self.options.timestep <= 0.0 {
                    let raw = attrs.str("timestep").unwrap_or_default();
                    return Err(attrs.invalid("timestep", raw));
                }
                if let Some(g) = attrs.vec3("gravity")? {
                    self.options.gravity = g;
                }
                Ok(None)
            }
            (Context::Mujoco, "worldbody") => Ok(Some(Context::Body(0))),
            (Context::Mujoco, "actuator") => Ok(Some(Context::Actuator)),
            (Context::Body(parent), "body") => {
                self.body(parent, &attrs).map(|b| Some(Context::Body(b)))
            }
            (Context::Body(body), "joint") => {
                self.joint(body, &attrs, None)?;
                Ok(None)
            }
            (Context::Body(body), "freejoint") => {
                self.joint(body, &attrs, Some(JointKind::Free))?;
                Ok(None)
            }
            (Context::Body(body), "geom") => {
                self.geom(body, &attrs)?;
                Ok(None)
            }
            (Context::Actuator, kind @ ("position" | "velocity" | "motor")) => {
                let kind = kind.to_string();
                self.actuator(&kind, &attrs)?;
                Ok(None)
            }
            (_, other) => {
                log::debug!("skipping unsupported element <{}>", other);
                Ok(None)
            }
        }
    }

    fn body(&mut self, parent: usize, attrs: &Attrs) -> Result<usize, ModelError> {
        let local_pose = self.pose(attrs)?;
        let world_pose = self.bodies[parent].world_pose * local_pose;
        self.bodies.push(Body {
            name: attrs.name(),
            parent: Some(parent),
            local_pose,
            world_pose,
        });
        Ok(self.bodies.len() - 1)
    }

    fn joint(
        &mut self,
        body: usize,
        attrs: &Attrs,
        forced: Option<JointKind>,
    ) -> Result<(), ModelError> {
        if body == 0 {
            return Err(ModelError::Unsupported(
                "joints cannot be attached to the world body".to_string(),
            ));
        }
        if self.joints.iter().any(|j| j.body == body) {
            return Err(ModelError::Unsupported(format!(
                "body {:?} has more than one joint",
                self.bodies[body].name.as_deref().unwrap_or("<unnamed>")
            )));
        }

        let kind = match forced {
            Some(kind) => kind,
            None => match attrs.str("type").unwrap_or("hinge") {
                "hinge" => JointKind::Hinge,
                "slide" => JointKind::Slide,
                "ball" => JointKind::Ball,
                "free" => JointKind::Free,
                other => return Err(attrs.invalid("type", other)),
            },
        };

        let axis = attrs.vec3("axis")?.unwrap_or_else(Vector3::z);
        if axis.norm() == 0.0 {
            return Err(attrs.invalid("axis", attrs.str("axis").unwrap_or_default()));
        }

        let range = match kind {
            JointKind::Hinge => attrs
                .range("range", "limited")?
                .map(|(lo, hi)| (self.angle(lo), self.angle(hi))),
            JointKind::Slide => attrs.range("range", "limited")?,
            JointKind::Ball | JointKind::Free => None,
        };

        self.joints.push(Joint {
            name: attrs.name(),
            body,
            kind,
            pos: Point3::from(attrs.vec3("pos")?.unwrap_or_else(Vector3::zeros)),
            axis: axis.normalize(),
            range,
        });
        Ok(())
    }

    fn geom(&mut self, body: usize, attrs: &Attrs) -> Result<(), ModelError> {
        let kind = match attrs.str("type").unwrap_or("sphere") {
            "plane" => GeomKind::Plane,
            "sphere" => GeomKind::Sphere,
            "capsule" => GeomKind::Capsule,
            "cylinder" => GeomKind::Cylinder,
            "box" => GeomKind::Box,
            other => {
                return Err(ModelError::Unsupported(format!("geom type {:?}", other)));
            }
        };
        if kind == GeomKind::Plane && body != 0 {
            return Err(ModelError::Unsupported(
                "plane geoms must belong to the world body".to_string(),
            ));
        }

        let given = attrs.floats("size")?.unwrap_or_default();
        if given.len() > 3 {
            return Err(attrs.invalid("size", attrs.str("size").unwrap_or_default()));
        }
        let mut size = [0.0; 3];
        size[..given.len()].copy_from_slice(&given);

        let local_pose = match attrs.fixed::<6>("fromto")? {
            Some(ends) => from_to(kind, ends, &mut size).ok_or_else(|| {
                ModelError::Unsupported(format!("fromto on {:?} geoms", kind))
            })?,
            None => self.pose(attrs)?,
        };

        let needed = match kind {
            GeomKind::Plane => 0,
            GeomKind::Sphere => 1,
            GeomKind::Capsule | GeomKind::Cylinder => 2,
            GeomKind::Box => 3,
        };
        if size[..needed].iter().any(|&s| s <= 0.0) {
            return Err(attrs.invalid("size", attrs.str("size").unwrap_or_default()));
        }

        let rgba = match attrs.fixed::<4>("rgba")? {
            Some(c) => c.map(|v| v.clamp(0.0, 1.0) as f32),
            None => DEFAULT_RGBA,
        };

        self.geoms.push(Geom {
            name: attrs.name(),
            body,
            kind,
            size,
            local_pose,
            rgba,
        });
        Ok(())
    }

    fn actuator(&mut self, element: &str, attrs: &Attrs) -> Result<(), ModelError> {
        let joint = attrs
            .str("joint")
            .ok_or_else(|| ModelError::MissingAttribute {
                element: element.to_string(),
                attribute: "joint".to_string(),
            })?
            .to_string();
        let kind = match element {
            "position" => ActuatorKind::Position {
                kp: attrs.float("kp", 1.0)?,
                kv: attrs.float("kv", 0.0)?,
            },
            "velocity" => ActuatorKind::Velocity {
                kv: attrs.float("kv", 1.0)?,
            },
            _ => ActuatorKind::Motor {
                gear: attrs
                    .floats("gear")?
                    .and_then(|g| g.first().copied())
                    .unwrap_or(1.0),
            },
        };
        self.actuators.push(PendingActuator {
            name: attrs.name(),
            joint,
            kind,
            ctrl_range: attrs.range("ctrlrange", "ctrllimited")?,
        });
        Ok(())
    }

    fn finish(self) -> Result<Model, ModelError> {
        if !self.saw_root {
            return Err(ModelError::Empty);
        }

        let mut actuators = Vec::with_capacity(self.actuators.len());
        for pending in self.actuators {
            let joint = self
                .joints
                .iter()
                .position(|j| j.name.as_deref() == Some(pending.joint.as_str()))
                .ok_or_else(|| ModelError::UnknownJoint {
                    actuator: pending.name.clone().unwrap_or_default(),
                    joint: pending.joint.clone(),
                })?;
            if matches!(self.joints[joint].kind, JointKind::Ball | JointKind::Free) {
                return Err(ModelError::Unsupported(format!(
                    "actuator on {:?} joint {:?}",
                    self.joints[joint].kind, pending.joint
                )));
            }
            actuators.push(Actuator {
                name: pending.name,
                joint,
                kind: pending.kind,
                ctrl_range: pending.ctrl_range,
            });
        }

        Ok(Model {
            options: self.options,
            bodies: self.bodies,
            joints: self.joints,
            geoms: self.geoms,
            actuators,
            stat: Statistic {
                center: Point3::origin(),
                extent: 1.0,
            },
        })
    }
}

/// Pose for a geom given by its two end points; writes the half length into `size`.
fn from_to(kind: GeomKind, ends: [f64; 6], size: &mut [f64; 3]) -> Option<Isometry3<f64>> {
    let a = Vector3::new(ends[0], ends[1], ends[2]);
    let b = Vector3::new(ends[3], ends[4], ends[5]);
    let dir = b - a;
    let half = dir.norm() * 0.5;
    match kind {
        GeomKind::Capsule | GeomKind::Cylinder => size[1] = half,
        GeomKind::Box => {
            if size[1] == 0.0 {
                size[1] = size[0];
            }
            size[2] = half;
        }
        GeomKind::Plane | GeomKind::Sphere => return None,
    }
    let rotation = UnitQuaternion::rotation_between(&Vector3::z(), &dir).unwrap_or_else(|| {
        if dir.z < 0.0 {
            UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f64::consts::PI)
        } else {
            UnitQuaternion::identity()
        }
    });
    let mut pose = translation((a + b) * 0.5);
    pose.rotation = rotation;
    Some(pose)
}

/// Parse an MJCF document.
pub fn parse(xml: &str) -> Result<Model, ModelError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut builder = Builder::new();
    let mut stack = vec![Context::Document];

    loop {
        let ctx = stack.last().copied().unwrap_or(Context::Document);
        match reader.read_event()? {
            Event::Start(e) => match builder.start(ctx, &e)? {
                Some(next) => stack.push(next),
                None => {
                    let end = e.to_end().into_owned();
                    reader.read_to_end(end.name())?;
                }
            },
            Event::Empty(e) => {
                builder.start(ctx, &e)?;
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() > 1 {
        return Err(ModelError::Truncated);
    }

    builder.finish()
}
