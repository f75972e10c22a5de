//! Input vocabulary shared by the window and the control loop.

pub use crossterm::event::KeyCode;

/// Mouse buttons the viewer reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

/// Button/key transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Press,
    Repeat,
    Release,
}

/// Window state sampled when an event is dispatched
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowInfo {
    /// Window width in pixels
    pub width: f64,
    /// Window height in pixels
    pub height: f64,
    /// Whether a shift key is held
    pub shift: bool,
}

/// Receiver of window input events
pub trait InputHandler {
    /// A mouse button changed state with the cursor at `cursor` (pixels)
    fn on_mouse_button(&mut self, button: MouseButton, action: Action, cursor: (f64, f64));

    /// The cursor moved to (`x`, `y`) pixels
    fn on_mouse_move(&mut self, x: f64, y: f64, window: &WindowInfo);

    /// The scroll wheel moved
    fn on_scroll(&mut self, x_offset: f64, y_offset: f64);

    /// A key changed state
    fn on_key(&mut self, key: KeyCode, action: Action);
}
