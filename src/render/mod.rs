//! Software rendering of the simulation scene.

mod context;
mod math;
mod mesh;
mod raster;
mod scene;

pub use context::RenderContext;
pub use mesh::Mesh;
pub use raster::{draw_line, draw_triangle, Framebuffer, Rgb, Vertex};
pub use scene::{Scene, SceneGeom, VisualOptions};
