use super::raster::Rgb;

/// Edge function used in rasterization
pub fn edge_function(a: &[f64; 2], b: &[f64; 2], c: &[f64; 2]) -> f64 {
    (c[0] - a[0]) * (b[1] - a[1]) - (c[1] - a[1]) * (b[0] - a[0])
}

/// Scales a vector to unit length; zero vectors stay zero
pub fn normalize(v: [f64; 3]) -> [f64; 3] {
    let length = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if length == 0.0 {
        return [0.0; 3];
    }
    [v[0] / length, v[1] / length, v[2] / length]
}

/// Calculates the normal vector of a triangle
pub fn calculate_normal(a: &[f64; 3], b: &[f64; 3], c: &[f64; 3]) -> [f64; 3] {
    let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    normalize([
        u[1] * v[2] - u[2] * v[1],
        u[2] * v[0] - u[0] * v[2],
        u[0] * v[1] - u[1] * v[0],
    ])
}

/// Light intensity at a surface point. Both faces are lit.
pub fn calculate_light_intensity(
    normal: &[f64; 3],
    position: &[f64; 3],
    light_pos: &[f64; 3],
) -> f64 {
    let light_dir = normalize([
        light_pos[0] - position[0],
        light_pos[1] - position[1],
        light_pos[2] - position[2],
    ]);
    let dot_product =
        normal[0] * light_dir[0] + normal[1] * light_dir[1] + normal[2] * light_dir[2];
    dot_product.abs().max(0.1) // Ensure a minimum ambient light
}

/// Applies lighting to a color
pub fn apply_lighting(color: Rgb, intensity: f64) -> Rgb {
    color.map(|c| (c as f64 * intensity).clamp(0.0, 255.0) as u8)
}

/// Converts a model color to 8-bit RGB
pub fn rgba_to_rgb(rgba: [f32; 4]) -> Rgb {
    [rgba[0], rgba[1], rgba[2]].map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_triangle_has_zero_normal() {
        let p = [1.0, 2.0, 3.0];
        assert_eq!(calculate_normal(&p, &p, &p), [0.0; 3]);
    }

    #[test]
    fn facing_light_is_full_intensity() {
        let intensity = calculate_light_intensity(&[0.0, 0.0, 1.0], &[0.0; 3], &[0.0, 0.0, 5.0]);
        assert!((intensity - 1.0).abs() < 1e-12);
        let grazing = calculate_light_intensity(&[1.0, 0.0, 0.0], &[0.0; 3], &[0.0, 0.0, 5.0]);
        assert_eq!(grazing, 0.1);
    }

    #[test]
    fn lighting_scales_color() {
        assert_eq!(apply_lighting([200, 100, 0], 0.5), [100, 50, 0]);
        assert_eq!(rgba_to_rgb([1.0, 0.5, 0.0, 1.0]), [255, 128, 0]);
    }
}
