//! Orbit camera driven by mouse drags.

use nalgebra::{Matrix4, Perspective3, Point3, Vector3};

/// Vertical field of view in degrees.
pub const FOVY_DEG: f64 = 45.0;

/// Smallest allowed distance, as a fraction of the model extent.
const MIN_DISTANCE: f64 = 0.01;

/// Elevation is kept away from the poles so the view basis stays defined.
const MAX_ELEVATION: f64 = 89.0;

/// What a mouse drag does to the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraAction {
    /// Orbit freely (azimuth and elevation)
    RotateV,
    /// Orbit about the vertical axis only
    RotateH,
    /// Pan in the view plane
    MoveV,
    /// Pan in the horizontal plane
    MoveH,
    /// Move toward or away from the lookat point
    Zoom,
}

/// Free camera orbiting a lookat point. Angles are in degrees, z is up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub lookat: Point3<f64>,
    pub distance: f64,
    pub azimuth: f64,
    pub elevation: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Camera {
            lookat: Point3::origin(),
            distance: 2.0,
            azimuth: 90.0,
            elevation: -45.0,
        }
    }
}

impl Camera {
    /// Unit vector from the eye toward the lookat point
    pub fn forward(&self) -> Vector3<f64> {
        let (sin_az, cos_az) = self.azimuth.to_radians().sin_cos();
        let (sin_el, cos_el) = self.elevation.to_radians().sin_cos();
        Vector3::new(cos_el * cos_az, cos_el * sin_az, sin_el)
    }

    /// Screen-right and screen-up vectors
    pub fn basis(&self) -> (Vector3<f64>, Vector3<f64>) {
        let forward = self.forward();
        let right = forward.cross(&Vector3::z()).normalize();
        let up = right.cross(&forward);
        (right, up)
    }

    pub fn eye(&self) -> Point3<f64> {
        self.lookat - self.forward() * self.distance
    }

    pub fn view(&self) -> Matrix4<f64> {
        let (_, up) = self.basis();
        Matrix4::look_at_rh(&self.eye(), &self.lookat, &up)
    }

    /// Projection for the given aspect ratio, with clip planes scaled to the model
    pub fn projection(&self, aspect: f64, extent: f64) -> Perspective3<f64> {
        let znear = (0.01 * extent).min(self.distance * 0.5).max(1e-4);
        let zfar = 50.0 * extent + self.distance;
        Perspective3::new(aspect.max(1e-3), FOVY_DEG.to_radians(), znear, zfar)
    }

    /// Apply a drag. `reldx`/`reldy` are displacements divided by the window height.
    pub fn move_camera(&mut self, action: CameraAction, reldx: f64, reldy: f64, extent: f64) {
        match action {
            CameraAction::RotateV => {
                self.azimuth -= reldx * 180.0;
                self.elevation =
                    (self.elevation - reldy * 180.0).clamp(-MAX_ELEVATION, MAX_ELEVATION);
            }
            CameraAction::RotateH => {
                self.azimuth -= reldx * 180.0;
            }
            CameraAction::MoveV => {
                let (right, up) = self.basis();
                let scale = self.pan_scale();
                self.lookat += (-reldx * right + reldy * up) * scale;
            }
            CameraAction::MoveH => {
                let (right, _) = self.basis();
                let ahead = Vector3::z().cross(&right);
                let scale = self.pan_scale();
                self.lookat += (-reldx * right + reldy * ahead) * scale;
            }
            CameraAction::Zoom => {
                let extent = extent.max(1e-6);
                let step = (1.0 + self.distance / extent / 3.0).ln() * reldy * 9.0 * extent;
                self.distance = (self.distance + step).max(MIN_DISTANCE * extent);
            }
        }
        self.azimuth = self.azimuth.rem_euclid(360.0);
    }

    /// World distance covered by a drag across the full window height
    fn pan_scale(&self) -> f64 {
        2.0 * self.distance * (FOVY_DEG.to_radians() / 2.0).tan()
    }
}
