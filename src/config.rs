use std::time::Duration;

/// Degrees to radians
pub const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;

/// Window and renderer settings
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    /// Requested window width in pixels
    pub width: u32,
    /// Requested window height in pixels
    pub height: u32,
    /// Window title
    pub title: String,
    /// Pixel size of one terminal cell (width, height)
    pub cell_size: (u32, u32),
    /// Frames per display refresh to wait for; 0 disables pacing
    pub swap_interval: u32,
    /// Display refresh rate used for pacing
    pub refresh_rate: u32,
    /// Maximum number of geoms a scene can hold
    pub max_geom: usize,
    /// Joint sweep settings
    pub ramp: RampConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        ViewerConfig {
            width: 1200,
            height: 900,
            title: "Simulate".to_string(),
            cell_size: (10, 20),
            swap_interval: 1,
            refresh_rate: 60,
            max_geom: 2000,
            ramp: RampConfig::default(),
        }
    }
}

impl ViewerConfig {
    /// Defaults, with `SIMVIEW_NO_VSYNC` turning frame pacing off
    pub fn from_env() -> Self {
        let mut config = ViewerConfig::default();
        if std::env::var_os("SIMVIEW_NO_VSYNC").is_some() {
            config.swap_interval = 0;
        }
        config
    }

    /// Terminal grid (columns, rows) matching the requested window size
    pub fn grid_size(&self) -> (u16, u16) {
        let cols = (self.width / self.cell_size.0.max(1)).clamp(1, u16::MAX as u32);
        let rows = (self.height / self.cell_size.1.max(1)).clamp(1, u16::MAX as u32);
        (cols as u16, rows as u16)
    }

    /// Time budget of one frame, `None` when pacing is off
    pub fn frame_duration(&self) -> Option<Duration> {
        if self.swap_interval == 0 || self.refresh_rate == 0 {
            return None;
        }
        Some(Duration::from_secs_f64(
            self.swap_interval as f64 / self.refresh_rate as f64,
        ))
    }
}

/// Scripted joint sweep settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampConfig {
    /// Ceiling for both joint targets, in radians
    pub max_angle: f64,
    /// Per-frame increment, in radians
    pub increment: f64,
}

impl RampConfig {
    pub fn from_degrees(max_angle_deg: f64) -> Self {
        let max_angle = max_angle_deg * DEG_TO_RAD;
        RampConfig {
            max_angle,
            increment: max_angle / 100.0,
        }
    }
}

impl Default for RampConfig {
    fn default() -> Self {
        RampConfig::from_degrees(45.0)
    }
}
