//! Ties the device controller to its input backends and the process
//! lifecycle.

use std::io;
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel as cb;
use log::info;
use zynqboy_core::gameboy::GameBoy;
use zynqboy_core::input::{ButtonCallback, InputBackend};

pub struct System {
    gameboy: Arc<Mutex<GameBoy>>,
}

impl System {
    pub fn new(gameboy: GameBoy) -> Self {
        Self {
            gameboy: Arc::new(Mutex::new(gameboy)),
        }
    }

    /// Callback handed to each input backend; forwards events to the device
    /// under the shared lock.
    pub fn button_callback(&self) -> ButtonCallback {
        let gameboy = Arc::clone(&self.gameboy);
        Arc::new(move |button, pressed| {
            if let Ok(mut gb) = gameboy.lock() {
                gb.set_button(button, pressed);
            }
        })
    }

    pub fn spawn_backend(&self, backend: Box<dyn InputBackend>) {
        thread::spawn(move || backend.run());
    }

    /// Unpauses the accelerator and blocks until SIGINT, then pauses it and
    /// persists battery-backed state.
    pub fn run(&self) -> io::Result<()> {
        let (stop_tx, stop_rx) = cb::bounded::<()>(1);
        ctrlc::set_handler(move || {
            let _ = stop_tx.try_send(());
        })
        .map_err(io::Error::other)?;

        if let Ok(mut gb) = self.gameboy.lock() {
            gb.set_paused(false);
        }

        info!("Running; press Ctrl-C to stop");
        let _ = stop_rx.recv();
        info!("Stopping");

        // Save even if an input thread panicked while holding the lock.
        let mut gb = match self.gameboy.lock() {
            Ok(gb) => gb,
            Err(poisoned) => poisoned.into_inner(),
        };
        gb.set_paused(true);
        gb.persist_ram()
    }
}
