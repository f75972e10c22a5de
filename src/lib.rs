//! Console viewer for rigid-body simulations.
//!
//! Loads an MJCF model, steps it with rapier, and draws it into the terminal.
//! Mouse drags orbit, pan and zoom the camera; the `joint1`/`joint2`
//! actuators sweep to a fixed ceiling and `r` resets the run.

pub mod app;
pub mod camera;
pub mod config;
pub mod control;
pub mod error;
pub mod input;
pub mod render;
pub mod sim;
pub mod window;

pub use app::simulate;
pub use config::{RampConfig, ViewerConfig};
pub use error::ViewerError;
