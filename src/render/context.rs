use nalgebra::{Matrix4, Point3};

use super::math::{apply_lighting, calculate_normal, normalize, rgba_to_rgb};
use super::mesh::Mesh;
use super::raster::{draw_line, draw_triangle, Framebuffer, Rgb, Vertex};
use super::scene::{Scene, SceneGeom};

const BACKGROUND: Rgb = [20, 24, 32];

/// Software rasterizer that owns the framebuffer the window presents
#[derive(Debug, Default)]
pub struct RenderContext {
    framebuffer: Framebuffer,
}

impl RenderContext {
    pub fn new() -> Self {
        RenderContext::default()
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    /// Draw `scene` into a framebuffer of `viewport` (width, height) pixels
    pub fn render(&mut self, viewport: (usize, usize), scene: &Scene) {
        let (width, height) = viewport;
        self.framebuffer.resize(width, height);
        self.framebuffer.clear(BACKGROUND);
        if width == 0 || height == 0 {
            return;
        }

        let camera = scene.camera();
        let view = camera.view();
        let projection = camera.projection(width as f64 / height as f64, scene.extent());
        let viewer = Viewer {
            view,
            projection: projection.to_homogeneous(),
            znear: projection.znear(),
            width: width as f64,
            height: height as f64,
        };
        // Headlight at the eye
        let light_pos = [0.0, 0.0, 0.0];
        let plane_half_size = 5.0 * scene.extent();

        for geom in scene.geoms() {
            if geom.rgba[3] <= 0.0 {
                continue;
            }
            let mesh = Mesh::for_geom(geom.kind, geom.size, plane_half_size);
            let vertices = viewer.project(geom, &mesh);
            let color = rgba_to_rgb(geom.rgba);

            for (&(a, b, c, d), &shade) in mesh.faces.iter().zip(&mesh.shade) {
                let quad = [a, b, c, d].map(|i| vertices[i]);
                let [Some(v0), Some(v1), Some(v2), Some(v3)] = quad else {
                    continue;
                };
                let face_color = apply_lighting(color, shade);

                if scene.wireframe() {
                    for (p, q) in [(v0, v1), (v1, v2), (v2, v3), (v3, v0)] {
                        draw_line(
                            p.screen_position[0],
                            p.screen_position[1],
                            q.screen_position[0],
                            q.screen_position[1],
                            &mut self.framebuffer,
                            face_color,
                        );
                    }
                } else {
                    draw_triangle(&v0, &v1, &v2, &mut self.framebuffer, &light_pos, face_color);
                    draw_triangle(&v0, &v2, &v3, &mut self.framebuffer, &light_pos, face_color);
                }
            }
        }
    }
}

struct Viewer {
    view: Matrix4<f64>,
    projection: Matrix4<f64>,
    znear: f64,
    width: f64,
    height: f64,
}

impl Viewer {
    /// View-space vertices with averaged normals and screen positions.
    /// Vertices closer than the near plane are `None`.
    fn project(&self, geom: &SceneGeom, mesh: &Mesh) -> Vec<Option<Vertex>> {
        let model_view = self.view * geom.pose.to_homogeneous();
        let positions: Vec<[f64; 3]> = mesh
            .vertices
            .iter()
            .map(|&[x, y, z]| {
                let p = model_view.transform_point(&Point3::new(x, y, z));
                [p.x, p.y, p.z]
            })
            .collect();

        let mut vertex_normals = vec![[0.0; 3]; positions.len()];
        for &(a, b, c, d) in &mesh.faces {
            let first = calculate_normal(&positions[a], &positions[b], &positions[c]);
            let second = calculate_normal(&positions[a], &positions[c], &positions[d]);
            let normal = normalize([0, 1, 2].map(|i| first[i] + second[i]));
            for index in [a, b, c, d] {
                for i in 0..3 {
                    vertex_normals[index][i] += normal[i];
                }
            }
        }

        positions
            .into_iter()
            .zip(vertex_normals)
            .map(|(position, normal)| {
                if -position[2] < self.znear {
                    return None;
                }
                let ndc = self
                    .projection
                    .transform_point(&Point3::new(position[0], position[1], position[2]));
                Some(Vertex {
                    position,
                    screen_position: [
                        (ndc.x + 1.0) * 0.5 * self.width,
                        (1.0 - ndc.y) * 0.5 * self.height,
                    ],
                    normal: normalize(normal),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::render::VisualOptions;
    use crate::sim::{Model, PhysicsWorld};

    fn scene_for(xml: &str, wireframe: bool) -> Scene {
        let world = PhysicsWorld::new(Model::from_xml_str(xml).unwrap());
        let mut scene = Scene::new(2000);
        scene.update(&world, &VisualOptions { wireframe }, &Camera::default());
        scene
    }

    fn lit_pixels(fb: &Framebuffer) -> usize {
        (0..fb.height())
            .flat_map(|y| (0..fb.width()).map(move |x| (x, y)))
            .filter(|&(x, y)| fb.pixel(x, y) != BACKGROUND)
            .count()
    }

    const BALL: &str = r#"<mujoco><worldbody>
        <geom type="sphere" size="0.3" rgba="1 0 0 1"/>
    </worldbody></mujoco>"#;

    #[test]
    fn sphere_at_lookat_covers_center() {
        let scene = scene_for(BALL, false);
        let mut context = RenderContext::new();
        context.render((80, 60), &scene);

        let fb = context.framebuffer();
        assert_eq!((fb.width(), fb.height()), (80, 60));
        let center = fb.pixel(40, 30);
        assert!(center[0] > 0);
        assert_eq!(center[1], 0);
        assert_eq!(fb.pixel(0, 0), BACKGROUND);
    }

    #[test]
    fn wireframe_draws_fewer_pixels() {
        let cube = r#"<mujoco><worldbody>
            <geom type="box" size="0.3 0.3 0.3"/>
        </worldbody></mujoco>"#;
        let mut context = RenderContext::new();
        context.render((80, 60), &scene_for(cube, false));
        let solid = lit_pixels(context.framebuffer());
        context.render((80, 60), &scene_for(cube, true));
        let wire = lit_pixels(context.framebuffer());
        assert!(wire > 0);
        assert!(wire < solid);
    }

    #[test]
    fn transparent_geoms_are_skipped() {
        let scene = scene_for(
            r#"<mujoco><worldbody>
                <geom type="sphere" size="0.3" rgba="1 0 0 0"/>
            </worldbody></mujoco>"#,
            false,
        );
        let mut context = RenderContext::new();
        context.render((40, 30), &scene);
        assert_eq!(lit_pixels(context.framebuffer()), 0);
    }

    #[test]
    fn empty_viewport_is_harmless() {
        let mut context = RenderContext::new();
        context.render((0, 0), &scene_for(BALL, false));
        assert_eq!(context.framebuffer().width(), 0);
    }
}
