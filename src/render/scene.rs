use nalgebra::Isometry3;

use crate::camera::Camera;
use crate::sim::{GeomKind, Simulation};

/// User-togglable drawing options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisualOptions {
    pub wireframe: bool,
}

/// Geom snapshot taken for one frame
#[derive(Debug, Clone)]
pub struct SceneGeom {
    pub kind: GeomKind,
    pub size: [f64; 3],
    pub pose: Isometry3<f64>,
    pub rgba: [f32; 4],
}

/// Everything needed to draw one frame, with a fixed geom capacity.
#[derive(Debug, Clone)]
pub struct Scene {
    max_geom: usize,
    geoms: Vec<SceneGeom>,
    camera: Camera,
    extent: f64,
    wireframe: bool,
    warned: bool,
}

impl Scene {
    pub fn new(max_geom: usize) -> Self {
        Scene {
            max_geom,
            geoms: Vec::with_capacity(max_geom),
            camera: Camera::default(),
            extent: 1.0,
            wireframe: false,
            warned: false,
        }
    }

    /// Snapshot the simulation, options and camera
    pub fn update<S: Simulation + ?Sized>(
        &mut self,
        sim: &S,
        options: &VisualOptions,
        camera: &Camera,
    ) {
        let model = sim.model();
        if model.geoms.len() > self.max_geom && !self.warned {
            log::warn!(
                "model has {} geoms, only the first {} are drawn",
                model.geoms.len(),
                self.max_geom
            );
            self.warned = true;
        }

        self.geoms.clear();
        self.geoms.extend(
            model
                .geoms
                .iter()
                .enumerate()
                .take(self.max_geom)
                .map(|(id, geom)| SceneGeom {
                    kind: geom.kind,
                    size: geom.size,
                    pose: sim.geom_pose(id),
                    rgba: geom.rgba,
                }),
        );
        self.camera = *camera;
        self.extent = model.stat.extent;
        self.wireframe = options.wireframe;
    }

    pub fn geoms(&self) -> &[SceneGeom] {
        &self.geoms
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Model extent, used to scale clip planes and infinite planes
    pub fn extent(&self) -> f64 {
        self.extent
    }

    pub fn wireframe(&self) -> bool {
        self.wireframe
    }
}
