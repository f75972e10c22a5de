use super::math::{apply_lighting, calculate_light_intensity, edge_function, normalize};

/// 8-bit RGB color
pub type Rgb = [u8; 3];

/// Vertex structure with view-space position, screen position, and normal
#[derive(Debug, Clone, Copy)]
pub struct Vertex {
    pub position: [f64; 3],
    pub screen_position: [f64; 2],
    pub normal: [f64; 3],
}

impl Vertex {
    /// Distance in front of the camera (the camera looks down -z)
    pub fn depth(&self) -> f64 {
        -self.position[2]
    }
}

/// Color buffer with a matching depth buffer
#[derive(Debug, Clone, Default)]
pub struct Framebuffer {
    width: usize,
    height: usize,
    pixels: Vec<Rgb>,
    z_buffer: Vec<f64>,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        let mut framebuffer = Framebuffer::default();
        framebuffer.resize(width, height);
        framebuffer
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.pixels.resize(width * height, [0; 3]);
        self.z_buffer.resize(width * height, f64::INFINITY);
    }

    /// Fill with `color` and reset depth
    pub fn clear(&mut self, color: Rgb) {
        self.pixels.fill(color);
        self.z_buffer.fill(f64::INFINITY);
    }

    pub fn pixel(&self, x: usize, y: usize) -> Rgb {
        self.pixels[y * self.width + x]
    }

    fn set(&mut self, x: usize, y: usize, color: Rgb) {
        let offset = y * self.width + x;
        self.pixels[offset] = color;
    }
}

/// Draws a triangle with per-pixel lighting and depth testing.
///
/// Either winding is accepted.
pub fn draw_triangle(
    v0: &Vertex,
    v1: &Vertex,
    v2: &Vertex,
    framebuffer: &mut Framebuffer,
    light_pos: &[f64; 3],
    base_color: Rgb,
) {
    let width = framebuffer.width;
    let height = framebuffer.height;
    if width == 0 || height == 0 {
        return;
    }

    // Compute bounding box of the triangle
    let min_x = v0.screen_position[0]
        .min(v1.screen_position[0])
        .min(v2.screen_position[0])
        .floor()
        .max(0.0) as usize;
    let max_x = v0.screen_position[0]
        .max(v1.screen_position[0])
        .max(v2.screen_position[0])
        .ceil()
        .min(width as f64 - 1.0) as usize;
    let min_y = v0.screen_position[1]
        .min(v1.screen_position[1])
        .min(v2.screen_position[1])
        .floor()
        .max(0.0) as usize;
    let max_y = v0.screen_position[1]
        .max(v1.screen_position[1])
        .max(v2.screen_position[1])
        .ceil()
        .min(height as f64 - 1.0) as usize;

    let area = edge_function(&v0.screen_position, &v1.screen_position, &v2.screen_position);
    if area == 0.0 || !area.is_finite() {
        return;
    }

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let p = [x as f64 + 0.5, y as f64 + 0.5];

            // Normalized barycentric coordinates; all non-negative inside for either winding
            let w0 = edge_function(&v1.screen_position, &v2.screen_position, &p) / area;
            let w1 = edge_function(&v2.screen_position, &v0.screen_position, &p) / area;
            let w2 = edge_function(&v0.screen_position, &v1.screen_position, &p) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }

            let depth = v0.depth() * w0 + v1.depth() * w1 + v2.depth() * w2;
            let offset = y * width + x;
            if depth >= framebuffer.z_buffer[offset] {
                continue;
            }
            framebuffer.z_buffer[offset] = depth;

            let position = [0, 1, 2].map(|i| {
                v0.position[i] * w0 + v1.position[i] * w1 + v2.position[i] * w2
            });
            let normal = normalize(
                [0, 1, 2].map(|i| v0.normal[i] * w0 + v1.normal[i] * w1 + v2.normal[i] * w2),
            );

            let light_intensity = calculate_light_intensity(&normal, &position, light_pos);
            framebuffer.set(x, y, apply_lighting(base_color, light_intensity));
        }
    }
}

/// Draws a line between two points using Bresenham's algorithm
pub fn draw_line(x0: f64, y0: f64, x1: f64, y1: f64, framebuffer: &mut Framebuffer, color: Rgb) {
    if ![x0, y0, x1, y1].iter().all(|v| v.is_finite()) {
        return;
    }
    let width = framebuffer.width as isize;
    let height = framebuffer.height as isize;
    let (mut x0, mut y0, x1, y1) = (
        x0.round() as isize,
        y0.round() as isize,
        x1.round() as isize,
        y1.round() as isize,
    );
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy; // error value e_xy

    loop {
        if x0 >= 0 && x0 < width && y0 >= 0 && y0 < height {
            framebuffer.set(x0 as usize, y0 as usize, color);
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(x: f64, y: f64, depth: f64) -> Vertex {
        Vertex {
            position: [0.0, 0.0, -depth],
            screen_position: [x, y],
            normal: [0.0, 0.0, 1.0],
        }
    }

    #[test]
    fn fills_either_winding() {
        let light = [0.0, 0.0, 10.0];
        for flip in [false, true] {
            let mut fb = Framebuffer::new(10, 10);
            let (a, b, c) = (vertex(0.0, 0.0, 1.0), vertex(10.0, 0.0, 1.0), vertex(0.0, 10.0, 1.0));
            if flip {
                draw_triangle(&a, &c, &b, &mut fb, &light, [255, 0, 0]);
            } else {
                draw_triangle(&a, &b, &c, &mut fb, &light, [255, 0, 0]);
            }
            assert_ne!(fb.pixel(1, 1), [0, 0, 0]);
            assert_eq!(fb.pixel(9, 9), [0, 0, 0]);
        }
    }

    #[test]
    fn nearer_triangle_wins() {
        let light = [0.0, 0.0, 10.0];
        let mut fb = Framebuffer::new(4, 4);
        let quad = |depth| {
            [vertex(0.0, 0.0, depth), vertex(8.0, 0.0, depth), vertex(0.0, 8.0, depth)]
        };
        let [a, b, c] = quad(1.0);
        draw_triangle(&a, &b, &c, &mut fb, &light, [0, 255, 0]);
        let [a, b, c] = quad(2.0);
        draw_triangle(&a, &b, &c, &mut fb, &light, [255, 0, 0]);
        assert_eq!(fb.pixel(0, 0)[0], 0);
        assert!(fb.pixel(0, 0)[1] > 0);
    }

    #[test]
    fn line_is_clipped_to_buffer() {
        let mut fb = Framebuffer::new(5, 5);
        draw_line(-10.0, 2.0, 20.0, 2.0, &mut fb, [9, 9, 9]);
        for x in 0..5 {
            assert_eq!(fb.pixel(x, 2), [9, 9, 9]);
        }
        assert_eq!(fb.pixel(0, 0), [0, 0, 0]);
    }

    #[test]
    fn clear_resets_depth() {
        let mut fb = Framebuffer::new(2, 2);
        let light = [0.0, 0.0, 10.0];
        let (a, b, c) = (vertex(0.0, 0.0, 1.0), vertex(4.0, 0.0, 1.0), vertex(0.0, 4.0, 1.0));
        draw_triangle(&a, &b, &c, &mut fb, &light, [0, 255, 0]);
        fb.clear([1, 2, 3]);
        assert_eq!(fb.pixel(0, 0), [1, 2, 3]);
        let (a, b, c) = (vertex(0.0, 0.0, 5.0), vertex(4.0, 0.0, 5.0), vertex(0.0, 4.0, 5.0));
        draw_triangle(&a, &b, &c, &mut fb, &light, [255, 0, 0]);
        assert!(fb.pixel(0, 0)[0] > 0);
    }
}
