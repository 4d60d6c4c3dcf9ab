//! Button domain shared by the input backends and the device controller.

use std::sync::Arc;

/// The physical buttons the accelerator knows about.
///
/// The first eight are wired to GPIO joypad lines in declaration order; Home
/// only exists for the host-side menu and has no hardware line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Button {
    Start,
    Select,
    B,
    A,
    Down,
    Up,
    Left,
    Right,
    Home,
}

impl Button {
    pub const COUNT: usize = 9;

    pub const ALL: [Button; Self::COUNT] = [
        Button::Start,
        Button::Select,
        Button::B,
        Button::A,
        Button::Down,
        Button::Up,
        Button::Left,
        Button::Right,
        Button::Home,
    ];

    /// Index of the GPIO joypad line driving this button, if it has one.
    pub fn joypad_line(self) -> Option<usize> {
        match self {
            Button::Home => None,
            _ => Some(self as usize),
        }
    }
}

/// Normalized button events fan in through this callback. Backends invoke it
/// from their own threads, so implementations must synchronize internally
/// (the system wiring locks the controller around each call).
pub type ButtonCallback = Arc<dyn Fn(Button, bool) + Send + Sync>;

/// One input backend: a source of button events constructed around a
/// [`ButtonCallback`].
///
/// `run` consumes the backend and either returns promptly because the backing
/// device is absent, or loops for the life of the process. The active set is
/// a fixed list built at startup, each backend on its own thread.
pub trait InputBackend: Send {
    fn run(self: Box<Self>);
}
