//! Tessellation of geom primitives into quad meshes in the geom frame.

use std::f64::consts::{PI, TAU};

use crate::sim::GeomKind;

/// Segments around the axis of round shapes
const SEGMENTS: usize = 16;
/// Rings per hemisphere
const RINGS: usize = 6;
/// Cells per side of a plane grid
const PLANE_CELLS: usize = 10;

/// Quad mesh. Triangles are split as (a, b, c) and (a, c, d).
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<[f64; 3]>,
    pub faces: Vec<(usize, usize, usize, usize)>,
    /// Per-face brightness factor, used for plane checkers
    pub shade: Vec<f64>,
}

impl Mesh {
    /// Tessellate a geom. `plane_half_size` replaces zero plane extents.
    pub fn for_geom(kind: GeomKind, size: [f64; 3], plane_half_size: f64) -> Mesh {
        let [a, b, c] = size;
        match kind {
            GeomKind::Box => Mesh::cuboid([a, b, c]),
            GeomKind::Sphere => Mesh::lathe(&hemisphere_profile(a, 0.0)),
            GeomKind::Capsule => Mesh::lathe(&hemisphere_profile(a, b)),
            GeomKind::Cylinder => Mesh::lathe(&[
                (0.0, -b),
                (a, -b),
                (a, b),
                (0.0, b),
            ]),
            GeomKind::Plane => {
                let half_x = if a > 0.0 { a } else { plane_half_size };
                let half_y = if b > 0.0 { b } else { plane_half_size };
                Mesh::grid(half_x, half_y, PLANE_CELLS)
            }
        }
    }

    /// Box with separate vertices per face, so faces shade flat
    fn cuboid(half: [f64; 3]) -> Mesh {
        let corners = [
            [-1.0, -1.0, -1.0], // 0
            [1.0, -1.0, -1.0],  // 1
            [1.0, 1.0, -1.0],   // 2
            [-1.0, 1.0, -1.0],  // 3
            [-1.0, -1.0, 1.0],  // 4
            [1.0, -1.0, 1.0],   // 5
            [1.0, 1.0, 1.0],    // 6
            [-1.0, 1.0, 1.0],   // 7
        ];
        let faces = [
            (0, 1, 2, 3),
            (5, 4, 7, 6),
            (4, 0, 3, 7),
            (1, 5, 6, 2),
            (4, 5, 1, 0),
            (3, 2, 6, 7),
        ];

        let mut mesh = Mesh::default();
        for (a, b, c, d) in faces {
            let base = mesh.vertices.len();
            for corner in [a, b, c, d] {
                let [x, y, z] = corners[corner];
                mesh.vertices.push([x * half[0], y * half[1], z * half[2]]);
            }
            mesh.faces.push((base, base + 1, base + 2, base + 3));
            mesh.shade.push(1.0);
        }
        mesh
    }

    /// Surface of revolution about z for a (radius, z) profile, bottom to top
    fn lathe(profile: &[(f64, f64)]) -> Mesh {
        let mut mesh = Mesh::default();
        for &(radius, z) in profile {
            for j in 0..SEGMENTS {
                let (sin, cos) = (TAU * j as f64 / SEGMENTS as f64).sin_cos();
                mesh.vertices.push([radius * cos, radius * sin, z]);
            }
        }
        for i in 0..profile.len().saturating_sub(1) {
            for j in 0..SEGMENTS {
                let next = (j + 1) % SEGMENTS;
                mesh.faces.push((
                    i * SEGMENTS + j,
                    i * SEGMENTS + next,
                    (i + 1) * SEGMENTS + next,
                    (i + 1) * SEGMENTS + j,
                ));
                mesh.shade.push(1.0);
            }
        }
        mesh
    }

    /// Flat checkered grid in the xy plane
    fn grid(half_x: f64, half_y: f64, cells: usize) -> Mesh {
        let mut mesh = Mesh::default();
        let row = cells + 1;
        for i in 0..=cells {
            for j in 0..=cells {
                let x = -half_x + 2.0 * half_x * j as f64 / cells as f64;
                let y = -half_y + 2.0 * half_y * i as f64 / cells as f64;
                mesh.vertices.push([x, y, 0.0]);
            }
        }
        for i in 0..cells {
            for j in 0..cells {
                mesh.faces.push((
                    i * row + j,
                    i * row + j + 1,
                    (i + 1) * row + j + 1,
                    (i + 1) * row + j,
                ));
                mesh.shade.push(if (i + j) % 2 == 0 { 1.0 } else { 0.7 });
            }
        }
        mesh
    }
}

/// Profile of a sphere of `radius` split at the equator by a cylinder of
/// half length `half_length`
fn hemisphere_profile(radius: f64, half_length: f64) -> Vec<(f64, f64)> {
    let mut profile = Vec::with_capacity(2 * RINGS + 2);
    for k in 0..=RINGS {
        let angle = -PI / 2.0 + PI / 2.0 * k as f64 / RINGS as f64;
        profile.push((radius * angle.cos(), radius * angle.sin() - half_length));
    }
    for k in 0..=RINGS {
        let angle = PI / 2.0 * k as f64 / RINGS as f64;
        profile.push((radius * angle.cos(), radius * angle.sin() + half_length));
    }
    profile
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bounds(mesh: &Mesh) -> ([f64; 3], [f64; 3]) {
        let mut min = [f64::INFINITY; 3];
        let mut max = [f64::NEG_INFINITY; 3];
        for v in &mesh.vertices {
            for i in 0..3 {
                min[i] = min[i].min(v[i]);
                max[i] = max[i].max(v[i]);
            }
        }
        (min, max)
    }

    #[test]
    fn box_spans_half_extents() {
        let mesh = Mesh::for_geom(GeomKind::Box, [0.1, 0.2, 0.3], 1.0);
        assert_eq!(mesh.faces.len(), 6);
        assert_eq!(mesh.vertices.len(), 24);
        let (min, max) = bounds(&mesh);
        assert_eq!(max, [0.1, 0.2, 0.3]);
        assert_eq!(min, [-0.1, -0.2, -0.3]);
    }

    #[test]
    fn capsule_adds_half_length_to_caps() {
        let mesh = Mesh::for_geom(GeomKind::Capsule, [0.05, 0.25, 0.0], 1.0);
        let (min, max) = bounds(&mesh);
        assert_relative_eq!(max[2], 0.3, epsilon = 1e-12);
        assert_relative_eq!(min[2], -0.3, epsilon = 1e-12);
        assert_relative_eq!(max[0], 0.05, epsilon = 1e-12);
    }

    #[test]
    fn sphere_vertices_lie_on_surface() {
        let mesh = Mesh::for_geom(GeomKind::Sphere, [0.5, 0.0, 0.0], 1.0);
        for v in &mesh.vertices {
            let r = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
            assert_relative_eq!(r, 0.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn infinite_plane_uses_fallback_size() {
        let mesh = Mesh::for_geom(GeomKind::Plane, [0.0, 0.0, 0.1], 4.0);
        let (min, max) = bounds(&mesh);
        assert_eq!((min[0], max[0]), (-4.0, 4.0));
        assert_eq!((min[1], max[1]), (-4.0, 4.0));
        assert_eq!(mesh.faces.len(), PLANE_CELLS * PLANE_CELLS);
        assert!(mesh.shade.contains(&0.7));

        let sized = Mesh::for_geom(GeomKind::Plane, [2.0, 1.0, 0.1], 4.0);
        let (_, max) = bounds(&sized);
        assert_eq!((max[0], max[1]), (2.0, 1.0));
    }

    #[test]
    fn face_indices_are_in_range() {
        for kind in [GeomKind::Box, GeomKind::Sphere, GeomKind::Cylinder, GeomKind::Plane] {
            let mesh = Mesh::for_geom(kind, [0.1, 0.1, 0.1], 1.0);
            assert_eq!(mesh.faces.len(), mesh.shade.len());
            for &(a, b, c, d) in &mesh.faces {
                for i in [a, b, c, d] {
                    assert!(i < mesh.vertices.len());
                }
            }
        }
    }
}
