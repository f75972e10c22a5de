//! The terminal as a window: raw mode, mouse capture, and half-block output.
//!
//! Every terminal cell shows two vertically stacked framebuffer pixels: the
//! upper half block is drawn in the top pixel's color over the bottom pixel's
//! color. Mouse positions are reported in window pixels using the configured
//! cell size, so drags measure the same as in a desktop window.
//!
//! Key repeat is only distinguishable from a fresh press on terminals that
//! support the kitty keyboard protocol. Elsewhere every auto-repeat arrives as
//! a press.

use std::io::{self, BufWriter, IsTerminal, Stdout, Write};
use std::time::{Duration, Instant};

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyEvent, KeyEventKind, KeyModifiers,
    KeyboardEnhancementFlags, MouseEvent, MouseEventKind, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{
    self, disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
    SetSize, SetTitle,
};
use crossterm::{execute, queue};

use crate::config::ViewerConfig;
use crate::error::ViewerError;
use crate::input::{Action, InputHandler, KeyCode, MouseButton, WindowInfo};
use crate::render::{Framebuffer, Rgb};

const HALF_BLOCK: char = '▀';

/// Asks the terminal to tag key events as press, repeat or release
const KEYBOARD_FLAGS: KeyboardEnhancementFlags = KeyboardEnhancementFlags::REPORT_EVENT_TYPES;

/// Something a frame can be presented on
pub trait Surface {
    /// Size in pixels of the framebuffer this surface displays
    fn framebuffer_size(&self) -> (usize, usize);

    /// Show `frame` with `overlay` lines of text in the top-left corner
    fn swap_buffers(&mut self, frame: &Framebuffer, overlay: &[String]) -> io::Result<()>;
}

pub struct TerminalWindow {
    out: BufWriter<Stdout>,
    /// Grid size in cells (columns, rows)
    grid: (u16, u16),
    cell_size: (u32, u32),
    frame_duration: Option<Duration>,
    deadline: Instant,
    should_close: bool,
    /// Modifiers of the last event, used to report shift during drags
    modifiers: KeyModifiers,
    screen_entered: bool,
    keyboard_enhanced: bool,
}

impl TerminalWindow {
    /// Take over the terminal.
    pub fn create(config: &ViewerConfig) -> Result<Self, ViewerError> {
        let stdout = io::stdout();
        if !stdout.is_terminal() {
            return Err(ViewerError::WindowInit(
                "standard output is not a terminal".to_string(),
            ));
        }
        enable_raw_mode().map_err(|e| ViewerError::WindowInit(e.to_string()))?;

        // From here on, Drop restores whatever was set up
        let mut window = TerminalWindow {
            out: BufWriter::new(stdout),
            grid: config.grid_size(),
            cell_size: (config.cell_size.0.max(1), config.cell_size.1.max(1)),
            frame_duration: config.frame_duration(),
            deadline: Instant::now(),
            should_close: false,
            modifiers: KeyModifiers::NONE,
            screen_entered: false,
            keyboard_enhanced: false,
        };

        execute!(window.out, EnterAlternateScreen).map_err(ViewerError::WindowCreate)?;
        window.screen_entered = true;
        execute!(
            window.out,
            EnableMouseCapture,
            Hide,
            SetTitle(&config.title)
        )
        .map_err(ViewerError::WindowCreate)?;

        if terminal::supports_keyboard_enhancement().unwrap_or(false) {
            execute!(window.out, PushKeyboardEnhancementFlags(KEYBOARD_FLAGS))
                .map_err(ViewerError::WindowCreate)?;
            window.keyboard_enhanced = true;
        } else {
            log::debug!("no keyboard enhancement; held keys repeat as presses");
        }

        let (cols, rows) = config.grid_size();
        if let Err(e) = execute!(window.out, SetSize(cols, rows)) {
            log::debug!("terminal refused resize to {}x{}: {}", cols, rows, e);
        }
        window.grid = current_grid().unwrap_or(window.grid);
        log::info!(
            "window {:?} on a {}x{} cell grid",
            config.title,
            window.grid.0,
            window.grid.1
        );
        window.deadline = Instant::now();
        Ok(window)
    }

    /// Window size in pixels
    pub fn window_size(&self) -> (f64, f64) {
        (
            self.grid.0 as f64 * self.cell_size.0 as f64,
            self.grid.1 as f64 * self.cell_size.1 as f64,
        )
    }

    pub fn window_info(&self) -> WindowInfo {
        let (width, height) = self.window_size();
        WindowInfo {
            width,
            height,
            shift: self.modifiers.contains(KeyModifiers::SHIFT),
        }
    }

    pub fn should_close(&self) -> bool {
        self.should_close
    }

    /// Dispatch pending input, waiting out the rest of the frame when paced
    pub fn poll_events<H: InputHandler>(&mut self, handler: &mut H) -> io::Result<()> {
        match self.frame_duration {
            Some(frame) => {
                loop {
                    let remaining = self.deadline.saturating_duration_since(Instant::now());
                    if !event::poll(remaining)? {
                        break;
                    }
                    let event = event::read()?;
                    self.dispatch(event, handler);
                }
                self.deadline += frame;
                let now = Instant::now();
                if self.deadline < now {
                    self.deadline = now;
                }
            }
            None => {
                while event::poll(Duration::ZERO)? {
                    let event = event::read()?;
                    self.dispatch(event, handler);
                }
            }
        }
        Ok(())
    }

    fn dispatch<H: InputHandler>(&mut self, event: Event, handler: &mut H) {
        match event {
            Event::Mouse(mouse) => self.dispatch_mouse(mouse, handler),
            Event::Key(key) => self.dispatch_key(key, handler),
            Event::Resize(cols, rows) => {
                log::debug!("terminal resized to {}x{}", cols, rows);
                self.grid = (cols, rows);
            }
            _ => {}
        }
    }

    fn dispatch_mouse<H: InputHandler>(&mut self, mouse: MouseEvent, handler: &mut H) {
        self.modifiers = mouse.modifiers;
        let cursor = self.cell_to_pixels(mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Down(button) => {
                handler.on_mouse_button(map_button(button), Action::Press, cursor)
            }
            MouseEventKind::Up(button) => {
                handler.on_mouse_button(map_button(button), Action::Release, cursor)
            }
            MouseEventKind::Drag(_) | MouseEventKind::Moved => {
                let info = self.window_info();
                handler.on_mouse_move(cursor.0, cursor.1, &info);
            }
            MouseEventKind::ScrollUp => handler.on_scroll(0.0, 1.0),
            MouseEventKind::ScrollDown => handler.on_scroll(0.0, -1.0),
            MouseEventKind::ScrollLeft => handler.on_scroll(-1.0, 0.0),
            MouseEventKind::ScrollRight => handler.on_scroll(1.0, 0.0),
        }
    }

    fn dispatch_key<H: InputHandler>(&mut self, key: KeyEvent, handler: &mut H) {
        self.modifiers = key.modifiers;
        let action = key_action(key.kind);
        if action == Action::Press && is_close_request(&key) {
            log::debug!("close requested");
            self.should_close = true;
        }
        handler.on_key(key.code, action);
    }

    /// Center of a cell, in window pixels
    fn cell_to_pixels(&self, column: u16, row: u16) -> (f64, f64) {
        let (w, h) = (self.cell_size.0 as f64, self.cell_size.1 as f64);
        (column as f64 * w + w / 2.0, row as f64 * h + h / 2.0)
    }
}

impl Surface for TerminalWindow {
    fn framebuffer_size(&self) -> (usize, usize) {
        (self.grid.0 as usize, self.grid.1 as usize * 2)
    }

    fn swap_buffers(&mut self, frame: &Framebuffer, overlay: &[String]) -> io::Result<()> {
        let cols = frame.width().min(self.grid.0 as usize);
        let rows = (frame.height() / 2).min(self.grid.1 as usize);

        for row in 0..rows {
            queue!(self.out, MoveTo(0, row as u16))?;
            let mut colors: Option<(Rgb, Rgb)> = None;
            for col in 0..cols {
                let top = frame.pixel(col, 2 * row);
                let bottom = frame.pixel(col, 2 * row + 1);
                if colors != Some((top, bottom)) {
                    queue!(
                        self.out,
                        SetForegroundColor(to_color(top)),
                        SetBackgroundColor(to_color(bottom))
                    )?;
                    colors = Some((top, bottom));
                }
                queue!(self.out, Print(HALF_BLOCK))?;
            }
        }

        for (row, line) in overlay.iter().take(rows).enumerate() {
            queue!(
                self.out,
                MoveTo(0, row as u16),
                SetForegroundColor(Color::White),
                SetBackgroundColor(Color::Black),
                Print(truncate(line, cols))
            )?;
        }
        queue!(self.out, ResetColor)?;
        self.out.flush()
    }
}

impl Drop for TerminalWindow {
    fn drop(&mut self) {
        if self.keyboard_enhanced {
            let _ = execute!(self.out, PopKeyboardEnhancementFlags);
        }
        if self.screen_entered {
            let _ = execute!(
                self.out,
                ResetColor,
                Show,
                DisableMouseCapture,
                LeaveAlternateScreen
            );
        }
        let _ = disable_raw_mode();
    }
}

fn current_grid() -> Option<(u16, u16)> {
    termsize::get()
        .map(|size| (size.cols, size.rows))
        .or_else(|| terminal::size().ok())
        .filter(|&(cols, rows)| cols > 0 && rows > 0)
}

fn map_button(button: event::MouseButton) -> MouseButton {
    match button {
        event::MouseButton::Left => MouseButton::Left,
        event::MouseButton::Middle => MouseButton::Middle,
        event::MouseButton::Right => MouseButton::Right,
    }
}

fn key_action(kind: KeyEventKind) -> Action {
    match kind {
        KeyEventKind::Press => Action::Press,
        KeyEventKind::Repeat => Action::Repeat,
        KeyEventKind::Release => Action::Release,
    }
}

fn is_close_request(key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

fn to_color([r, g, b]: Rgb) -> Color {
    Color::Rgb { r, g, b }
}

fn truncate(line: &str, width: usize) -> String {
    line.chars().take(width).collect()
}
