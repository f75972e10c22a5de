use std::path::Path;

use crate::config::ViewerConfig;
use crate::control::ControlLoop;
use crate::error::ViewerError;
use crate::render::{RenderContext, Scene};
use crate::sim::{Model, PhysicsWorld, Simulation};
use crate::window::TerminalWindow;

/// Load `model_path` and run the interactive viewer until the window closes.
///
/// The model is loaded before the terminal is touched, so a bad model never
/// leaves the terminal in raw mode.
pub fn simulate(model_path: &Path, config: &ViewerConfig) -> Result<(), ViewerError> {
    let model = Model::from_file(model_path)?;
    log::info!(
        "loaded {}: {} bodies, {} joints, {} geoms, {} actuators",
        model_path.display(),
        model.bodies.len(),
        model.joints.len(),
        model.geoms.len(),
        model.actuators.len()
    );
    let world = PhysicsWorld::new(model);
    let mut control = ControlLoop::new(world, config.ramp);
    let mut scene = Scene::new(config.max_geom);
    let mut context = RenderContext::new();

    // Anything logged from here on lands on the alternate screen
    let mut window = TerminalWindow::create(config)?;

    while !window.should_close() {
        window.poll_events(&mut control)?;
        if window.should_close() {
            break;
        }
        control.per_frame_update();
        control.render_frame(&mut window, &mut scene, &mut context)?;
    }

    log::info!("window closed after {:.3} s of simulated time", control.sim().time());
    Ok(())
}
