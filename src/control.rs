//! Interactive control loop: camera dragging, scripted joint sweep, and the
//! step/render cadence.

use std::io;
use std::time::Instant;

use crate::camera::{Camera, CameraAction};
use crate::config::RampConfig;
use crate::input::{Action, InputHandler, KeyCode, MouseButton, WindowInfo};
use crate::render::{RenderContext, Scene, VisualOptions};
use crate::sim::{ActuatorId, Simulation};
use crate::window::Surface;

/// Actuators swept by the joint ramp
pub const ACTUATOR_NAMES: [&str; 2] = ["joint1", "joint2"];

/// Scroll zoom equals a vertical drag of this fraction of the window height
const SCROLL_ZOOM: f64 = 0.05;

/// Phase of the joint sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampPhase {
    Ramping,
    Holding,
}

/// Two joint targets advanced in lockstep toward a ceiling
#[derive(Debug, Clone, PartialEq)]
pub struct JointRamp {
    targets: [f64; 2],
    config: RampConfig,
}

impl JointRamp {
    pub fn new(config: RampConfig) -> Self {
        JointRamp {
            targets: [0.0; 2],
            config,
        }
    }

    pub fn targets(&self) -> [f64; 2] {
        self.targets
    }

    pub fn phase(&self) -> RampPhase {
        if self.targets.iter().all(|&t| t < self.config.max_angle) {
            RampPhase::Ramping
        } else {
            RampPhase::Holding
        }
    }

    /// Step both targets toward the ceiling; returns false once holding
    pub fn advance(&mut self) -> bool {
        if self.phase() == RampPhase::Holding {
            return false;
        }
        for target in &mut self.targets {
            *target = (*target + self.config.increment).min(self.config.max_angle);
        }
        true
    }

    pub fn reset(&mut self) {
        self.targets = [0.0; 2];
    }
}

/// Which mouse buttons are held
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Buttons {
    pub left: bool,
    pub middle: bool,
    pub right: bool,
}

impl Buttons {
    fn set(&mut self, button: MouseButton, held: bool) {
        match button {
            MouseButton::Left => self.left = held,
            MouseButton::Middle => self.middle = held,
            MouseButton::Right => self.right = held,
        }
    }

    fn any(&self) -> bool {
        self.left || self.middle || self.right
    }

    /// Camera action for a drag with these buttons held
    fn drag_action(&self, shift: bool) -> CameraAction {
        if self.right {
            if shift {
                CameraAction::MoveH
            } else {
                CameraAction::MoveV
            }
        } else if self.left {
            if shift {
                CameraAction::RotateH
            } else {
                CameraAction::RotateV
            }
        } else {
            CameraAction::Zoom
        }
    }
}

/// Frames-per-second estimate refreshed once a second
#[derive(Debug)]
struct FpsCounter {
    frames_since_last_update: usize,
    last_fps_calculation: Instant,
    fps: f64,
}

impl FpsCounter {
    fn new() -> Self {
        FpsCounter {
            frames_since_last_update: 0,
            last_fps_calculation: Instant::now(),
            fps: 0.0,
        }
    }

    fn tick(&mut self) {
        self.frames_since_last_update += 1;
        let now = Instant::now();
        let duration = now.duration_since(self.last_fps_calculation);
        if duration.as_secs_f64() >= 1.0 {
            self.fps = self.frames_since_last_update as f64 / duration.as_secs_f64();
            self.frames_since_last_update = 0;
            self.last_fps_calculation = now;
        }
    }
}

/// Owns the simulation plus all interactive state.
pub struct ControlLoop<S: Simulation> {
    sim: S,
    camera: Camera,
    options: VisualOptions,
    buttons: Buttons,
    /// Drag origin, in window pixels
    last_cursor: (f64, f64),
    ramp: JointRamp,
    /// Control slots for [`ACTUATOR_NAMES`], resolved once
    actuators: [Option<ActuatorId>; 2],
    show_info: bool,
    fps: FpsCounter,
}

impl<S: Simulation> ControlLoop<S> {
    pub fn new(sim: S, ramp: RampConfig) -> Self {
        let actuators = ACTUATOR_NAMES.map(|name| {
            let id = sim.actuator_id(name);
            if id.is_none() {
                log::warn!("model has no actuator named {:?}; it will not be driven", name);
            }
            id
        });
        ControlLoop {
            sim,
            camera: Camera::default(),
            options: VisualOptions::default(),
            buttons: Buttons::default(),
            last_cursor: (0.0, 0.0),
            ramp: JointRamp::new(ramp),
            actuators,
            show_info: false,
            fps: FpsCounter::new(),
        }
    }

    pub fn sim(&self) -> &S {
        &self.sim
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn options(&self) -> &VisualOptions {
        &self.options
    }

    pub fn buttons(&self) -> Buttons {
        self.buttons
    }

    pub fn drag_origin(&self) -> (f64, f64) {
        self.last_cursor
    }

    pub fn targets(&self) -> [f64; 2] {
        self.ramp.targets()
    }

    pub fn ramp_phase(&self) -> RampPhase {
        self.ramp.phase()
    }

    pub fn show_info(&self) -> bool {
        self.show_info
    }

    /// Advance the joint sweep and write both targets into their control slots
    pub fn per_frame_update(&mut self) {
        self.ramp.advance();
        for (slot, target) in self.actuators.iter().zip(self.ramp.targets()) {
            if let Some(id) = slot {
                self.sim.set_ctrl(*id, target);
            }
        }
    }

    /// Step once, redraw, and present
    pub fn render_frame<W: Surface>(
        &mut self,
        window: &mut W,
        scene: &mut Scene,
        context: &mut RenderContext,
    ) -> io::Result<()> {
        self.sim.step();

        let viewport = window.framebuffer_size();
        scene.update(&self.sim, &self.options, &self.camera);
        context.render(viewport, scene);
        self.fps.tick();

        let overlay = if self.show_info {
            self.info_lines()
        } else {
            Vec::new()
        };
        window.swap_buffers(context.framebuffer(), &overlay)
    }

    fn info_lines(&self) -> Vec<String> {
        let [t1, t2] = self.ramp.targets();
        vec![
            format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            format!("Time: {:.3} s", self.sim.time()),
            format!(
                "Targets: {:.2}°, {:.2}° ({:?})",
                t1.to_degrees(),
                t2.to_degrees(),
                self.ramp.phase()
            ),
            format!(
                "Camera: az {:.1} el {:.1} dist {:.2}",
                self.camera.azimuth, self.camera.elevation, self.camera.distance
            ),
            format!("FPS: {:.2}", self.fps.fps),
            "[r] reset  [w] wireframe  [d] info  [q] quit".to_string(),
        ]
    }
}

impl<S: Simulation> InputHandler for ControlLoop<S> {
    fn on_mouse_button(&mut self, button: MouseButton, action: Action, cursor: (f64, f64)) {
        // Terminals may not say which button went up, and a release outside
        // the window is never seen, so any release ends the whole drag.
        if action == Action::Release {
            self.buttons = Buttons::default();
        } else {
            self.buttons.set(button, true);
        }
        self.last_cursor = cursor;
    }

    fn on_mouse_move(&mut self, x: f64, y: f64, window: &WindowInfo) {
        if !self.buttons.any() {
            return;
        }

        let dx = x - self.last_cursor.0;
        let dy = y - self.last_cursor.1;
        self.last_cursor = (x, y);

        let height = window.height.max(1.0);
        let action = self.buttons.drag_action(window.shift);
        let extent = self.sim.model().stat.extent;
        self.camera.move_camera(action, dx / height, dy / height, extent);
    }

    fn on_scroll(&mut self, _x_offset: f64, y_offset: f64) {
        let extent = self.sim.model().stat.extent;
        self.camera
            .move_camera(CameraAction::Zoom, 0.0, -SCROLL_ZOOM * y_offset, extent);
    }

    fn on_key(&mut self, key: KeyCode, action: Action) {
        if action != Action::Press {
            return;
        }
        match key {
            KeyCode::Char('r') | KeyCode::Char('R') => {
                log::info!("resetting simulation");
                self.sim.reset();
                self.ramp.reset();
            }
            KeyCode::Char('w') | KeyCode::Char('W') => {
                self.options.wireframe = !self.options.wireframe;
            }
            KeyCode::Char('d') | KeyCode::Char('D') => {
                self.show_info = !self.show_info;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Framebuffer;
    use crate::sim::Model;
    use approx::assert_relative_eq;
    use nalgebra::Isometry3;

    const ARM: &str = r#"
<mujoco>
  <worldbody>
    <body name="link1" pos="0 0 0.5">
      <joint name="shoulder" axis="0 1 0"/>
      <geom type="capsule" fromto="0 0 0 0.5 0 0" size="0.05"/>
      <body name="link2" pos="0.5 0 0">
        <joint name="elbow" axis="0 1 0"/>
        <geom type="box" size="0.2 0.04 0.04" pos="0.2 0 0"/>
      </body>
    </body>
  </worldbody>
  <actuator>
    <position name="joint1" joint="shoulder" kp="10"/>
    <position name="joint2" joint="elbow" kp="10"/>
  </actuator>
</mujoco>"#;

    const WINDOW: WindowInfo = WindowInfo {
        width: 1200.0,
        height: 900.0,
        shift: false,
    };

    const SHIFTED: WindowInfo = WindowInfo {
        shift: true,
        ..WINDOW
    };

    /// Records what the control loop asks of the simulation.
    struct FakeSim {
        model: Model,
        ctrl: Vec<f64>,
        steps: usize,
        resets: usize,
    }

    impl FakeSim {
        fn new(xml: &str) -> Self {
            let model = Model::from_xml_str(xml).unwrap();
            let ctrl = vec![0.0; model.actuators.len()];
            FakeSim {
                model,
                ctrl,
                steps: 0,
                resets: 0,
            }
        }
    }

    impl Simulation for FakeSim {
        fn model(&self) -> &Model {
            &self.model
        }

        fn ctrl(&self, id: ActuatorId) -> f64 {
            self.ctrl[id.0]
        }

        fn set_ctrl(&mut self, id: ActuatorId, value: f64) {
            self.ctrl[id.0] = value;
        }

        fn reset(&mut self) {
            self.resets += 1;
            self.ctrl.iter_mut().for_each(|c| *c = 0.0);
        }

        fn step(&mut self) {
            self.steps += 1;
        }

        fn time(&self) -> f64 {
            self.steps as f64 * self.model.options.timestep
        }

        fn geom_pose(&self, geom: usize) -> Isometry3<f64> {
            self.model.geom_world_pose(&self.model.geoms[geom])
        }
    }

    /// Surface that keeps the last presented frame.
    struct FakeSurface {
        presented: usize,
        overlay: Vec<String>,
        size: (usize, usize),
    }

    impl Surface for FakeSurface {
        fn framebuffer_size(&self) -> (usize, usize) {
            self.size
        }

        fn swap_buffers(&mut self, frame: &Framebuffer, overlay: &[String]) -> io::Result<()> {
            assert_eq!((frame.width(), frame.height()), self.size);
            self.presented += 1;
            self.overlay = overlay.to_vec();
            Ok(())
        }
    }

    fn control() -> ControlLoop<FakeSim> {
        ControlLoop::new(FakeSim::new(ARM), RampConfig::default())
    }

    fn drag(
        control: &mut ControlLoop<FakeSim>,
        button: MouseButton,
        moves: &[(f64, f64)],
        window: &WindowInfo,
    ) {
        control.on_mouse_button(button, Action::Press, (0.0, 0.0));
        for &(x, y) in moves {
            control.on_mouse_move(x, y, window);
        }
        control.on_mouse_button(button, Action::Release, moves.last().copied().unwrap_or_default());
    }

    fn assert_same_camera(a: &Camera, b: &Camera) {
        assert_relative_eq!(a.azimuth, b.azimuth, epsilon = 1e-9);
        assert_relative_eq!(a.elevation, b.elevation, epsilon = 1e-9);
        assert_relative_eq!(a.distance, b.distance, epsilon = 1e-9);
        assert_relative_eq!(a.lookat, b.lookat, epsilon = 1e-9);
    }

    #[test]
    fn targets_ramp_then_clamp_at_ceiling() {
        let ramp = RampConfig::default();
        let mut control = control();

        let n = 40;
        for _ in 0..n {
            control.per_frame_update();
        }
        for target in control.targets() {
            assert_relative_eq!(target, n as f64 * ramp.increment, epsilon = 1e-12);
        }
        assert_eq!(control.ramp_phase(), RampPhase::Ramping);

        for _ in 0..200 {
            control.per_frame_update();
            for target in control.targets() {
                assert!((0.0..=ramp.max_angle).contains(&target));
            }
        }
        assert_eq!(control.targets(), [ramp.max_angle; 2]);
        assert_eq!(control.ramp_phase(), RampPhase::Holding);

        control.per_frame_update();
        assert_eq!(control.targets(), [ramp.max_angle; 2]);
    }

    #[test]
    fn targets_are_written_to_named_slots() {
        let mut control = control();
        for _ in 0..3 {
            control.per_frame_update();
        }
        let sim = control.sim();
        let j1 = sim.actuator_id("joint1").unwrap();
        let j2 = sim.actuator_id("joint2").unwrap();
        assert_eq!(sim.ctrl(j1), control.targets()[0]);
        assert_eq!(sim.ctrl(j2), control.targets()[1]);
    }

    #[test]
    fn missing_actuators_are_skipped() {
        let xml = r#"<mujoco><worldbody><body><joint name="a"/><geom size="0.1"/></body></worldbody>
                     <actuator><position name="joint1" joint="a"/></actuator></mujoco>"#;
        let mut control = ControlLoop::new(FakeSim::new(xml), RampConfig::default());
        control.per_frame_update();
        assert_eq!(control.sim().ctrl(ActuatorId(0)), control.targets()[0]);
    }

    #[test]
    fn reset_zeroes_targets_and_is_idempotent() {
        let mut control = control();
        for _ in 0..250 {
            control.per_frame_update();
        }
        control.on_key(KeyCode::Char('r'), Action::Press);
        assert_eq!(control.targets(), [0.0, 0.0]);
        assert_eq!(control.ramp_phase(), RampPhase::Ramping);
        assert_eq!(control.sim().resets, 1);

        control.on_key(KeyCode::Char('R'), Action::Press);
        assert_eq!(control.targets(), [0.0, 0.0]);
        assert_eq!(control.sim().resets, 2);
    }

    #[test]
    fn reset_ignores_repeat_and_release() {
        let mut control = control();
        control.per_frame_update();
        control.on_key(KeyCode::Char('r'), Action::Repeat);
        control.on_key(KeyCode::Char('r'), Action::Release);
        assert!(control.targets()[0] > 0.0);
        assert_eq!(control.sim().resets, 0);
    }

    #[test]
    fn move_without_buttons_changes_nothing() {
        let mut control = control();
        control.on_mouse_button(MouseButton::Left, Action::Press, (100.0, 100.0));
        control.on_mouse_button(MouseButton::Left, Action::Release, (100.0, 100.0));
        let before = *control.camera();

        control.on_mouse_move(300.0, 250.0, &WINDOW);
        assert_eq!(*control.camera(), before);
        assert_eq!(control.drag_origin(), (100.0, 100.0));

        // A drag whose button event is lost still measures from the old origin.
        control.buttons.left = true;
        control.on_mouse_move(110.0, 100.0, &WINDOW);
        let mut expected = before;
        let extent = control.sim().model().stat.extent;
        expected.move_camera(CameraAction::RotateV, 10.0 / 900.0, 0.0, extent);
        assert_same_camera(control.camera(), &expected);
    }

    #[test]
    fn drags_are_frame_relative() {
        for button in [MouseButton::Left, MouseButton::Right] {
            let mut split = control();
            drag(&mut split, button, &[(10.0, 0.0), (15.0, 0.0)], &WINDOW);
            let mut whole = control();
            drag(&mut whole, button, &[(15.0, 0.0)], &WINDOW);
            assert_same_camera(split.camera(), whole.camera());
            assert_ne!(*whole.camera(), Camera::default());
        }
    }

    #[test]
    fn shift_selects_pan_axis() {
        let mut vertical = control();
        drag(&mut vertical, MouseButton::Right, &[(0.0, 90.0)], &WINDOW);
        let mut horizontal = control();
        drag(&mut horizontal, MouseButton::Right, &[(0.0, 90.0)], &SHIFTED);

        assert!(vertical.camera().lookat.z > 0.0);
        assert_relative_eq!(horizontal.camera().lookat.z, 0.0, epsilon = 1e-12);
        assert!((vertical.camera().lookat - horizontal.camera().lookat).norm() > 1e-3);
    }

    #[test]
    fn shift_selects_rotation_axis() {
        let mut free = control();
        drag(&mut free, MouseButton::Left, &[(90.0, 90.0)], &WINDOW);
        let mut turntable = control();
        drag(&mut turntable, MouseButton::Left, &[(90.0, 90.0)], &SHIFTED);

        assert_relative_eq!(free.camera().azimuth, turntable.camera().azimuth);
        assert!(free.camera().elevation < -45.0);
        assert_relative_eq!(turntable.camera().elevation, -45.0);
    }

    #[test]
    fn middle_drag_zooms() {
        let mut control = control();
        drag(&mut control, MouseButton::Middle, &[(0.0, 45.0)], &WINDOW);
        let camera = control.camera();
        assert!(camera.distance > 2.0);
        assert_eq!(camera.lookat, Camera::default().lookat);
        assert_eq!(camera.azimuth, Camera::default().azimuth);
    }

    #[test]
    fn drag_is_normalized_by_window_height() {
        let small = WindowInfo {
            width: 600.0,
            height: 450.0,
            shift: false,
        };
        let mut a = control();
        drag(&mut a, MouseButton::Left, &[(10.0, 0.0)], &small);
        let mut b = control();
        drag(&mut b, MouseButton::Left, &[(20.0, 0.0)], &WINDOW);
        assert_same_camera(a.camera(), b.camera());
    }

    #[test]
    fn positive_scroll_zooms_in() {
        let mut control = control();
        control.on_scroll(0.0, 1.0);
        assert!(control.camera().distance < 2.0);
        control.on_scroll(0.0, -2.0);
        assert!(control.camera().distance > 2.0);
    }

    #[test]
    fn scroll_matches_middle_drag_of_five_percent() {
        let mut scrolled = control();
        scrolled.on_scroll(0.0, 1.0);
        let mut dragged = control();
        drag(&mut dragged, MouseButton::Middle, &[(0.0, -45.0)], &WINDOW);
        assert_same_camera(scrolled.camera(), dragged.camera());

        let mut twice = control();
        twice.on_scroll(0.0, -2.0);
        let mut long_drag = control();
        drag(&mut long_drag, MouseButton::Middle, &[(0.0, 90.0)], &WINDOW);
        assert_same_camera(twice.camera(), long_drag.camera());
    }

    #[test]
    fn any_release_ends_the_drag() {
        let mut control = control();
        control.on_mouse_button(MouseButton::Right, Action::Press, (0.0, 0.0));
        control.on_mouse_button(MouseButton::Left, Action::Press, (0.0, 0.0));
        control.on_mouse_button(MouseButton::Left, Action::Release, (0.0, 0.0));
        assert_eq!(control.buttons(), Buttons::default());

        control.on_mouse_move(50.0, 50.0, &WINDOW);
        assert_eq!(*control.camera(), Camera::default());
    }

    #[test]
    fn toggles_view_options() {
        let mut control = control();
        control.on_key(KeyCode::Char('w'), Action::Press);
        control.on_key(KeyCode::Char('d'), Action::Press);
        assert!(control.options().wireframe);
        assert!(control.show_info());
        control.on_key(KeyCode::Char('w'), Action::Press);
        assert!(!control.options().wireframe);
    }

    #[test]
    fn render_frame_steps_and_presents() {
        let mut control = control();
        let mut surface = FakeSurface {
            presented: 0,
            overlay: Vec::new(),
            size: (40, 30),
        };
        let mut scene = Scene::new(100);
        let mut context = RenderContext::new();

        control.render_frame(&mut surface, &mut scene, &mut context).unwrap();
        assert_eq!(control.sim().steps, 1);
        assert_eq!(surface.presented, 1);
        assert!(surface.overlay.is_empty());
        assert_eq!(scene.geoms().len(), 2);

        control.on_key(KeyCode::Char('d'), Action::Press);
        control.render_frame(&mut surface, &mut scene, &mut context).unwrap();
        assert_eq!(control.sim().steps, 2);
        assert!(surface.overlay[0].starts_with(env!("CARGO_PKG_NAME")));
    }
}
