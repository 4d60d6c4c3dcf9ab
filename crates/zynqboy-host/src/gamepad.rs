//! USB gamepad input backend on gilrs.

use std::thread;
use std::time::Duration;

use gilrs::{Axis, EventType, Gilrs};
use log::{info, warn};
use zynqboy_core::input::{Button, ButtonCallback, InputBackend};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// D-pads that report as hats deliver axis values of -1.0, 0.0 or 1.0.
const AXIS_THRESHOLD: f32 = 0.5;

pub struct GamepadBackend {
    callback: ButtonCallback,
}

impl GamepadBackend {
    pub fn new(callback: ButtonCallback) -> Self {
        Self { callback }
    }
}

/// The face buttons are crossed on purpose: a pad's south button sits where
/// B sits on the Game Boy.
fn map_button(button: gilrs::Button) -> Option<Button> {
    match button {
        gilrs::Button::South => Some(Button::B),
        gilrs::Button::East => Some(Button::A),
        gilrs::Button::Start => Some(Button::Start),
        gilrs::Button::Select => Some(Button::Select),
        gilrs::Button::DPadUp => Some(Button::Up),
        gilrs::Button::DPadDown => Some(Button::Down),
        gilrs::Button::DPadLeft => Some(Button::Left),
        gilrs::Button::DPadRight => Some(Button::Right),
        _ => None,
    }
}

/// Hat motion becomes a state pair for the two directions on the axis, so
/// releasing the hat releases the button.
fn map_axis(axis: Axis, value: f32) -> Option<[(Button, bool); 2]> {
    match axis {
        Axis::DPadX => Some([
            (Button::Left, value < -AXIS_THRESHOLD),
            (Button::Right, value > AXIS_THRESHOLD),
        ]),
        Axis::DPadY => Some([
            (Button::Down, value < -AXIS_THRESHOLD),
            (Button::Up, value > AXIS_THRESHOLD),
        ]),
        _ => None,
    }
}

impl InputBackend for GamepadBackend {
    fn run(self: Box<Self>) {
        let mut gilrs = match Gilrs::new() {
            Ok(gilrs) => gilrs,
            Err(e) => {
                warn!("Gamepad support unavailable: {e}");
                return;
            }
        };

        match gilrs.gamepads().next() {
            Some((_, pad)) => info!("Using gamepad: {}", pad.name()),
            None => {
                warn!("No gamepad connected");
                return;
            }
        }

        loop {
            while let Some(event) = gilrs.next_event() {
                match event.event {
                    EventType::ButtonPressed(button, _) => {
                        if let Some(mapped) = map_button(button) {
                            (self.callback)(mapped, true);
                        }
                    }
                    EventType::ButtonReleased(button, _) => {
                        if let Some(mapped) = map_button(button) {
                            (self.callback)(mapped, false);
                        }
                    }
                    EventType::AxisChanged(axis, value, _) => {
                        if let Some(pair) = map_axis(axis, value) {
                            for (mapped, pressed) in pair {
                                (self.callback)(mapped, pressed);
                            }
                        }
                    }
                    _ => {}
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}
